//! Built-in platform definitions.
//!
//! Prompt patterns are adapted from [scrapli](https://github.com/carlmontanari/scrapli).

pub mod arista_eos;
pub mod cisco_iosxe;
pub mod juniper_junos;
pub mod linux;

use super::PlatformDefinition;

/// Every built-in platform, in registration order.
pub fn builtin() -> Vec<PlatformDefinition> {
    vec![
        linux::platform(),
        cisco_iosxe::platform(),
        arista_eos::platform(),
        juniper_junos::platform(),
    ]
}
