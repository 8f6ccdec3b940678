//! Builder for creating device drivers.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use super::blocking::BlockingDriver;
use super::generic::GenericDriver;
use crate::channel::ChannelConfig;
use crate::error::{DriverError, Error, Result};
use crate::platform::{PlatformDefinition, PlatformRegistry};
use crate::transport::{
    AuthMethod, HostKeyVerification, SshConfig, SshTransport, TimeoutConfig, Transport,
};

/// Builder for constructing device drivers.
///
/// SSH is the default transport; [`transport`](Self::transport) injects any
/// other [`Transport`] (a raw TCP console, a scripted session).
///
/// # Example
///
/// ```rust,no_run
/// use cliscrape::DriverBuilder;
///
/// # async fn example() -> cliscrape::Result<()> {
/// let mut driver = DriverBuilder::new("192.168.1.1")
///     .username("admin")
///     .password("secret")
///     .enable_secret("enable-secret")
///     .platform("cisco_iosxe")
///     .build()?;
/// driver.open().await?;
/// # Ok(())
/// # }
/// ```
pub struct DriverBuilder {
    host: String,
    port: u16,
    username: Option<String>,
    auth: AuthMethod,
    secondary: Option<SecretString>,
    platform_name: Option<String>,
    custom_platform: Option<PlatformDefinition>,
    timeouts: TimeoutConfig,
    terminal_size: Option<(u32, u32)>,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    transport: Option<Box<dyn Transport>>,
    channel: ChannelConfig,
}

impl DriverBuilder {
    /// Create a new driver builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: None,
            auth: AuthMethod::None,
            secondary: None,
            platform_name: None,
            custom_platform: None,
            timeouts: TimeoutConfig::default(),
            terminal_size: None,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            transport: None,
            channel: ChannelConfig::default(),
        }
    }

    /// Set the SSH port (default: 22).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username for authentication.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set password authentication.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Password(SecretString::from(password.into()));
        self
    }

    /// Set private key authentication.
    pub fn private_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: None,
        };
        self
    }

    /// Set private key authentication with passphrase.
    pub fn private_key_with_passphrase(
        mut self,
        key_path: impl Into<PathBuf>,
        passphrase: impl Into<String>,
    ) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: Some(SecretString::from(passphrase.into())),
        };
        self
    }

    /// Secondary credential answered at escalation prompts (enable, sudo).
    pub fn enable_secret(mut self, secret: impl Into<String>) -> Self {
        self.secondary = Some(SecretString::from(secret.into()));
        self
    }

    /// Set the platform name (e.g., "linux", "cisco_iosxe").
    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform_name = Some(platform.into());
        self
    }

    /// Set a custom platform definition.
    pub fn custom_platform(mut self, platform: PlatformDefinition) -> Self {
        self.custom_platform = Some(platform);
        self
    }

    /// Set every timeout at once.
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// TCP connect timeout.
    pub fn timeout_socket(mut self, timeout: Duration) -> Self {
        self.timeouts.socket = timeout;
        self
    }

    /// Handshake and authentication timeout.
    pub fn timeout_transport(mut self, timeout: Duration) -> Self {
        self.timeouts.transport = timeout;
        self
    }

    /// Default per-operation timeout.
    pub fn timeout_ops(mut self, timeout: Duration) -> Self {
        self.timeouts.ops = timeout;
        self
    }

    /// Set terminal dimensions (default: the platform's).
    pub fn terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_size = Some((width, height));
        self
    }

    /// Set host key verification mode.
    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// Set a custom known_hosts file path.
    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// Use `transport` instead of SSH.
    ///
    /// Host, port, credentials and host key settings are then ignored.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Bytes of output searched for the prompt.
    pub fn search_depth(mut self, depth: usize) -> Self {
        self.channel.search_depth = depth;
        self
    }

    /// Line terminator sent after every input.
    pub fn return_char(mut self, return_char: impl Into<String>) -> Self {
        self.channel.return_char = return_char.into();
        self
    }

    /// Build the driver.
    ///
    /// This creates the driver but does not connect. Call `open()` on the
    /// returned driver to establish the connection.
    pub fn build(self) -> Result<GenericDriver> {
        let platform = match (self.custom_platform, self.platform_name) {
            (Some(custom), _) => custom,
            (None, Some(name)) => PlatformRegistry::lookup(&name)?,
            (None, None) => return Err(invalid("platform must be specified")),
        };
        let (terminal_width, terminal_height) = self
            .terminal_size
            .unwrap_or((platform.terminal_width, platform.terminal_height));

        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let username = self
                    .username
                    .ok_or_else(|| invalid("username is required"))?;
                let config = SshConfig {
                    port: self.port,
                    auth: self.auth,
                    timeout_socket: self.timeouts.socket,
                    timeout_transport: self.timeouts.transport,
                    terminal_width,
                    terminal_height,
                    host_key_verification: self.host_key_verification,
                    known_hosts_path: self.known_hosts_path,
                    ..SshConfig::new(self.host, username)
                };
                Box::new(SshTransport::new(config)) as Box<dyn Transport>
            }
        };

        let channel = ChannelConfig {
            timeout_ops: self.timeouts.ops,
            ..self.channel
        };
        let mut driver = GenericDriver::new(transport, platform, channel)?;
        driver.set_secondary_credential(self.secondary);
        Ok(driver)
    }

    /// Build a [`BlockingDriver`] with its own runtime.
    pub fn build_blocking(self) -> Result<BlockingDriver> {
        BlockingDriver::new(self.build()?)
    }
}

fn invalid(message: &str) -> Error {
    DriverError::InvalidConfig {
        message: message.to_string(),
    }
    .into()
}
