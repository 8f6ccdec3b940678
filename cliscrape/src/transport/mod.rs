//! Transport boundary: the connected byte stream under a channel.
//!
//! A transport only moves bytes. It knows nothing about prompts, commands or
//! framing; all completion detection happens in the channel above it.

pub mod config;
mod scripted;
mod ssh;
mod stream;

pub use config::{AuthMethod, HostKeyVerification, SshConfig, TimeoutConfig};
pub use scripted::{ScriptedTransport, WriteLog};
pub use ssh::SshTransport;
pub use stream::StreamTransport;

use async_trait::async_trait;

use crate::error::Result;

/// Byte-level session consumed by the channel engine.
///
/// `read` may suspend until bytes arrive; the channel bounds every call with
/// its own deadline and drops the future when the deadline or a cancellation
/// fires, so implementations must be cancel-safe. An empty read is not an
/// error: the channel consults [`is_alive`](Transport::is_alive) and keeps
/// reading.
#[async_trait]
pub trait Transport: Send {
    /// Establish the session (connect, authenticate, allocate a shell).
    async fn open(&mut self) -> Result<()>;

    /// Write raw bytes.
    async fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read whatever bytes are available.
    async fn read(&mut self) -> Result<Vec<u8>>;

    /// Whether the session can still carry data.
    fn is_alive(&self) -> bool;

    /// Tear the session down.
    async fn close(&mut self) -> Result<()>;
}
