//! Linux platform definition.
//!
//! The simplest platform: a user shell with a `$` prompt and a root shell
//! with a `#` prompt reached through `sudo -i`.

use crate::platform::{PlatformDefinition, PrivilegeLevel};

/// Platform name for Linux shells.
pub const PLATFORM_NAME: &str = "linux";

/// Create the Linux platform definition.
pub fn platform() -> PlatformDefinition {
    let user = PrivilegeLevel::new("user", r"^[^\n]{0,128}[$]\s*$").unwrap();

    let root = PrivilegeLevel::new("root", r"^[^\n]{0,128}[#]\s*$")
        .unwrap()
        .with_parent("user")
        .with_escalate("sudo -i")
        .with_deescalate("exit")
        .with_auth(r"(?i)password( for \S+)?:\s*$")
        .unwrap();

    PlatformDefinition::new(PLATFORM_NAME)
        .with_privilege(user)
        .with_privilege(root)
        .with_default_privilege("user")
        .with_base_prompt(r"^[^\n]{0,128}[$#>%]\s*$")
        .unwrap()
        .with_failure_pattern("command not found")
        .with_failure_pattern("No such file or directory")
        .with_failure_pattern("Permission denied")
        .with_failure_pattern("Operation not permitted")
        .with_terminal_size(511, 24)
}
