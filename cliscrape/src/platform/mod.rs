//! Platform definitions for multi-vendor support.
//!
//! A platform is data: its privilege levels, prompt patterns, failure
//! substrings and the commands run around a session. Code enters only
//! through the optional open/close hooks.

mod definition;
mod privilege_level;
mod registry;
mod session;
mod spec;
pub mod vendors;

pub use definition::{DEFAULT_BASE_PROMPT, HookFn, PlatformDefinition, hook};
pub use privilege_level::{DEFAULT_AUTH_PROMPT, PrivilegeLevel, validate_tree};
pub use registry::PlatformRegistry;
pub use session::{NAME_PLACEHOLDER, SessionTemplate};
pub use spec::{PlatformSpec, PrivilegeLevelSpec};
