//! Cisco IOS-XE platform definition.
//!
//! # Prompt Examples
//!
//! ```text
//! router>                    # exec
//! router#                    # privilege_exec
//! router(config)#            # configuration
//! router(config-if)#         # configuration sub-mode
//! router(tcl)#               # tclsh
//! ```
//!
//! # Privilege Tree
//!
//! ```text
//! exec ── enable / disable ── privilege_exec ─┬─ configure terminal / end ── configuration
//!                                             └─ tclsh / tclquit ─────────── tclsh
//! ```

use crate::platform::{PlatformDefinition, PrivilegeLevel};

/// Platform name for Cisco IOS-XE.
pub const PLATFORM_NAME: &str = "cisco_iosxe";

/// Create the Cisco IOS-XE platform definition.
pub fn platform() -> PlatformDefinition {
    let exec = PrivilegeLevel::new("exec", r"(?i)^[\w.\-@/:]{1,63}>\s*$").unwrap();

    let privilege_exec = PrivilegeLevel::new("privilege_exec", r"(?i)^[\w.\-@/:]{1,63}#\s*$")
        .unwrap()
        .with_parent("exec")
        .with_escalate("enable")
        .with_deescalate("disable")
        .with_auth(r"(?i)^password:\s*$")
        .unwrap();

    let configuration = PrivilegeLevel::new(
        "configuration",
        r"(?i)^[\w.\-@/:]{1,63}\(conf[\w.\-@/:+]{0,32}\)#\s*$",
    )
    .unwrap()
    .with_parent("privilege_exec")
    .with_escalate("configure terminal")
    .with_deescalate("end")
    .with_not_contains("tcl)");

    let tclsh = PrivilegeLevel::new("tclsh", r"(?i)^([\w.\-@/+>:]+\(tcl\)[>#]|\+>)\s*$")
        .unwrap()
        .with_parent("privilege_exec")
        .with_escalate("tclsh")
        .with_deescalate("tclquit");

    PlatformDefinition::new(PLATFORM_NAME)
        .with_privilege(exec)
        .with_privilege(privilege_exec)
        .with_privilege(configuration)
        .with_privilege(tclsh)
        .with_default_privilege("privilege_exec")
        .with_config_privilege("configuration")
        .with_failure_pattern("% Ambiguous command")
        .with_failure_pattern("% Incomplete command")
        .with_failure_pattern("% Invalid input detected")
        .with_failure_pattern("% Unknown command")
        .with_on_open_command("terminal length 0")
        .with_on_open_command("terminal width 512")
        .with_terminal_size(512, 24)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iosxe_platform() {
        let platform = platform();
        assert_eq!(platform.name, "cisco_iosxe");
        assert_eq!(platform.privilege_levels.len(), 4);
        assert_eq!(platform.default_privilege, "privilege_exec");
        assert_eq!(platform.config_privilege.as_deref(), Some("configuration"));
    }

    #[test]
    fn test_prompts_are_disjoint() {
        let platform = platform();
        let cases = [
            ("router>", "exec"),
            ("router#", "privilege_exec"),
            ("router(config)#", "configuration"),
            ("router(config-if)#", "configuration"),
            ("router(tcl)#", "tclsh"),
        ];
        for (prompt, expected) in cases {
            let matching: Vec<&str> = platform
                .privilege_levels
                .values()
                .filter(|level| level.matches(prompt))
                .map(|level| level.name.as_str())
                .collect();
            assert_eq!(matching, vec![expected], "prompt {prompt}");
        }
    }

    #[test]
    fn test_enable_requires_auth() {
        let platform = platform();
        let privilege_exec = platform.get_privilege("privilege_exec").unwrap();
        assert!(privilege_exec.escalate_auth);
        assert!(
            privilege_exec
                .auth_prompt()
                .unwrap()
                .find_at_tail(b"enable\nPassword: ")
                .is_some()
        );
    }
}
