//! Arista EOS platform definition.
//!
//! # Prompt Examples
//!
//! ```text
//! switch>                            # exec mode
//! switch#                            # privilege_exec mode
//! switch(config)#                    # configuration mode
//! switch(config-if-Et1)#             # config sub-mode (interface)
//! switch(config-s-my_ses)#           # named config session
//! ```
//!
//! # Privilege Tree
//!
//! ```text
//! ┌──────┐  enable     ┌────────────────┐  configure terminal  ┌───────────────┐
//! │ exec ├─────────────► privilege_exec ├──────────────────────► configuration │
//! │  >   │   disable   │       #        │        end           │  (config*)#   │
//! └──────┘◄────────────┴───────┬────────┘◄─────────────────────┴───────────────┘
//!                              │ configure session NAME / end
//!                              ▼
//!                      (config-s-NAME)#   registered at runtime
//! ```

use crate::platform::{PlatformDefinition, PrivilegeLevel, SessionTemplate};

/// Platform name for Arista EOS.
pub const PLATFORM_NAME: &str = "arista_eos";

/// Create the Arista EOS platform definition.
pub fn platform() -> PlatformDefinition {
    let exec = PrivilegeLevel::new("exec", r"(?i)^[\w.\-@()/: ]{1,63}>\s?$").unwrap();

    // "(config" keeps configuration prompts out of this level
    let privilege_exec = PrivilegeLevel::new("privilege_exec", r"(?i)^[\w.\-@()/: ]{1,63}#\s?$")
        .unwrap()
        .with_parent("exec")
        .with_escalate("enable")
        .with_deescalate("disable")
        .with_auth(r"(?i)^password:\s?$")
        .unwrap()
        .with_not_contains("(config");

    let configuration = PrivilegeLevel::new(
        "configuration",
        r"(?i)^[\w.\-@()/: ]{1,63}\(config[\w.\-@/:+]{0,63}\)#\s?$",
    )
    .unwrap()
    .with_parent("privilege_exec")
    .with_escalate("configure terminal")
    .with_deescalate("end")
    .with_not_contains("(config-s-");

    // EOS shows only the first six characters of a session name
    let session = SessionTemplate::new(
        "privilege_exec",
        r"(?i)^[\w.\-@()/: ]{1,63}\(config-s-{name}[\w.\-@/:+]{0,63}\)#\s?$",
        "configure session {name}",
        "end",
    )
    .with_name_truncate(6)
    .with_commit("commit")
    .with_abort("abort");

    PlatformDefinition::new(PLATFORM_NAME)
        .with_privilege(exec)
        .with_privilege(privilege_exec)
        .with_privilege(configuration)
        .with_default_privilege("privilege_exec")
        .with_config_privilege("configuration")
        .with_session_template(session)
        .with_failure_pattern("% Ambiguous command")
        .with_failure_pattern("% Error")
        .with_failure_pattern("% Incomplete command")
        .with_failure_pattern("% Invalid input")
        .with_failure_pattern("% Cannot commit")
        .with_failure_pattern("% Unavailable command")
        .with_failure_pattern("% Duplicate sequence number")
        .with_on_open_command("terminal length 0")
        .with_on_open_command("terminal width 32767")
        .with_terminal_size(32767, 24)
}
