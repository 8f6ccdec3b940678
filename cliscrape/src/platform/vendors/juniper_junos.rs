//! Juniper JUNOS platform definition.
//!
//! # Prompt Examples
//!
//! ```text
//! user@router>              # exec mode
//! user@router#              # configuration mode
//! user@router%              # shell mode
//! root@router:RE:0%         # root shell mode
//! {master:0}                # routing-engine indicator (separate line)
//! user@router>              # exec prompt on next line
//! ```
//!
//! # Privilege Tree
//!
//! ```text
//! exec ─┬─ configure / exit configuration-mode ── configuration
//!       ├─ start shell / exit ─────────────────── shell
//!       └─ start shell user root / exit ───────── root_shell
//! ```

use crate::platform::{PlatformDefinition, PrivilegeLevel};

/// Platform name for Juniper JUNOS.
pub const PLATFORM_NAME: &str = "juniper_junos";

/// Create the Juniper JUNOS platform definition.
pub fn platform() -> PlatformDefinition {
    let exec = PrivilegeLevel::new(
        "exec",
        r"(?i)^(\{\w+(:(\w+)?\d)?\}\n)?[\w\-@()/:\.]{1,63}>\s?$",
    )
    .unwrap();

    // Outranks root_shell when logged in as root: "root@router#"
    let configuration = PrivilegeLevel::new(
        "configuration",
        r"(?i)^(\{\w+(:(\w+)?\d)?\}\[edit\]\n)?[\w\-@()/:\.]{1,63}#\s?$",
    )
    .unwrap()
    .with_parent("exec")
    .with_escalate("configure")
    .with_deescalate("exit configuration-mode")
    .with_rank(1);

    let shell = PrivilegeLevel::new("shell", r"(?i)^[^\n]*[%$]\s?$")
        .unwrap()
        .with_parent("exec")
        .with_escalate("start shell")
        .with_deescalate("exit")
        .with_not_contains("root");

    let root_shell = PrivilegeLevel::new("root_shell", r"(?i)^[^\n]*root@(?:\S*:?\S*\s?)?[%#]\s?$")
        .unwrap()
        .with_parent("exec")
        .with_escalate("start shell user root")
        .with_deescalate("exit")
        .with_auth(r"(?i)^password:\s?$")
        .unwrap();

    PlatformDefinition::new(PLATFORM_NAME)
        .with_privilege(exec)
        .with_privilege(configuration)
        .with_privilege(shell)
        .with_privilege(root_shell)
        .with_default_privilege("exec")
        .with_config_privilege("configuration")
        .with_failure_pattern("unknown command")
        .with_failure_pattern("syntax error")
        .with_failure_pattern("error:")
        .with_failure_pattern("missing argument")
        .with_failure_pattern("is ambiguous")
        .with_failure_pattern("No valid completions")
        .with_on_open_command("set cli screen-length 0")
        .with_on_open_command("set cli screen-width 511")
        .with_terminal_size(511, 24)
}
