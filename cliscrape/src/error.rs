//! Error types for cliscrape.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for cliscrape operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel operation errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Driver-level errors
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// Platform/vendor errors
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}

impl Error {
    /// Whether the caller may retry the operation on the same connection.
    ///
    /// Only operation timeouts qualify: the transport is still usable and
    /// nothing about the device state was guessed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Channel(ChannelError::Timeout { .. }))
    }

    /// Whether the connection has to be reopened before further use.
    pub fn requires_reopen(&self) -> bool {
        matches!(
            self,
            Error::Channel(ChannelError::Closed { .. })
                | Error::Transport(TransportError::NotOpened)
                | Error::Transport(TransportError::Disconnected)
                | Error::Driver(DriverError::NotConnected)
        )
    }
}

/// Transport layer errors (connection, authentication, raw I/O).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Transport used before `open()`
    #[error("Transport not opened")]
    NotOpened,

    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Server presented a key that differs from the known_hosts entry
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// Strict checking rejected a host that is not in known_hosts
    #[error("Host key for {host}:{port} is not known")]
    HostKeyUnknown { host: String, port: u16 },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Connect or session setup timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Channel layer errors (prompt matching, reads, cancellation).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// No expected pattern appeared before the deadline.
    #[error(
        "Pattern not found within {timeout:?} (elapsed {elapsed:?}, expected {expected:?}, buffer tail {buffer_tail:?})"
    )]
    Timeout {
        timeout: Duration,
        elapsed: Duration,
        expected: Vec<String>,
        buffer_tail: String,
    },

    /// Transport reported not-alive while waiting for output.
    #[error("Channel closed (buffer tail {buffer_tail:?})")]
    Closed { buffer_tail: String },

    /// A pending read was cancelled through a `CancelHandle`.
    #[error("Read cancelled after {elapsed:?}")]
    Cancelled { elapsed: Duration },

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Driver layer errors (command execution, privilege navigation).
#[derive(Error, Debug)]
pub enum DriverError {
    /// Driver not connected
    #[error("Driver not connected - call open() first")]
    NotConnected,

    /// Driver already connected
    #[error("Driver already connected")]
    AlreadyConnected,

    /// Command execution failed
    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    /// A step of a privilege change did not land on the expected level.
    #[error(
        "Failed to acquire privilege level '{target}' at step '{from}' -> '{to}' (reached {reached:?}): {reason}"
    )]
    PrivilegeTransitionFailed {
        target: String,
        from: String,
        to: String,
        reached: Option<String>,
        reason: String,
    },

    /// Invalid configuration in the driver builder
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The device prompt matched no registered privilege level.
    #[error("Unrecognized prompt: '{prompt}'")]
    UnrecognizedPrompt { prompt: String },

    /// A privilege level with this name already exists.
    #[error("Privilege level '{name}' already registered")]
    DuplicateLevel { name: String },

    /// No privilege level with this name exists.
    #[error("Unknown privilege level '{name}'")]
    UnknownLevel { name: String },

    /// The level exists but may not be requested directly.
    #[error("Privilege level '{name}' is not requestable")]
    NotRequestable { name: String },

    /// No path found between privilege levels
    #[error("No path from privilege '{from}' to '{to}'")]
    NoPrivilegePath { from: String, to: String },
}

/// Platform/vendor definition errors.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// Invalid platform definition
    #[error("Invalid platform definition: {message}")]
    InvalidDefinition { message: String },

    /// No platform registered under this name
    #[error("Unknown platform '{name}'")]
    UnknownPlatform { name: String },

    /// A platform with this name is already registered
    #[error("Platform '{name}' already registered")]
    AlreadyRegistered { name: String },
}

/// Result type alias using cliscrape's Error.
pub type Result<T> = std::result::Result<T, Error>;
