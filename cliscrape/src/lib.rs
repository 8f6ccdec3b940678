//! # cliscrape
//!
//! Prompt-driven CLI scraping for network devices and shells.
//!
//! cliscrape talks to a device the way a person at a terminal does: it
//! writes a line, waits for a prompt it recognises, and hands back what the
//! device printed in between. On top of that it tracks which privilege level
//! (exec, enable, configuration, a named config session...) the device is in
//! and walks between levels on request.
//!
//! ## Features
//!
//! - One async engine over any byte [`Transport`](transport::Transport): SSH
//!   via russh, raw TCP consoles, scripted sessions for tests
//! - Tail-window prompt search with negative substrings, ANSI stripping and
//!   echo handling
//! - Privilege levels as a tree; paths go through the lowest common ancestor
//! - Secondary credentials (enable secret, sudo password) answered in flight
//! - Named configuration sessions registered at runtime
//! - Platforms as data: built-in tables, serde records, a global registry
//! - A blocking facade with its own runtime
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cliscrape::DriverBuilder;
//!
//! #[tokio::main]
//! async fn main() -> cliscrape::Result<()> {
//!     let mut driver = DriverBuilder::new("192.168.1.1")
//!         .username("admin")
//!         .password("secret")
//!         .platform("linux")
//!         .build()?;
//!
//!     driver.open().await?;
//!
//!     let response = driver.send_command("uname -a").await?;
//!     println!("{}", response.result);
//!
//!     driver.close().await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod driver;
pub mod error;
pub mod platform;
pub mod transport;

// Re-export main types for convenience
pub use channel::{Channel, ChannelConfig, InteractiveBuilder, InteractiveEvent, PromptPattern};
pub use driver::{
    BlockingDriver, CommandStream, ConfigSession, Driver, DriverBuilder, GenericDriver, Response,
};
pub use error::{Error, Result};
pub use platform::{PlatformDefinition, PlatformRegistry, PlatformSpec, PrivilegeLevel};
pub use transport::{AuthMethod, SshConfig, TimeoutConfig, Transport};
