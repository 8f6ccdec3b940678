//! SSH transport implementation using russh.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use log::{debug, warn};
use russh::client::{self, Handle, Msg};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, load_secret_key};
use russh::{Channel, ChannelMsg};
use secrecy::ExposeSecret;
use tokio::net::TcpStream;

use super::Transport;
use super::config::{AuthMethod, HostKeyVerification, SshConfig};
use crate::error::{Result, TransportError};

/// SSH transport wrapping a russh client session and one PTY shell channel.
pub struct SshTransport {
    /// Configuration used for this connection.
    config: SshConfig,

    /// The russh session handle (None until opened).
    session: Option<Handle<SshHandler>>,

    /// Interactive shell channel.
    channel: Option<Channel<Msg>>,

    /// Set once the server sent EOF/close for the shell channel.
    eof: bool,
}

impl SshTransport {
    /// Create an unopened SSH transport.
    pub fn new(config: SshConfig) -> Self {
        Self {
            config,
            session: None,
            channel: None,
            eof: false,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &SshConfig {
        &self.config
    }

    async fn connect(&self) -> Result<Handle<SshHandler>> {
        let config = &self.config;

        let stream = tokio::time::timeout(
            config.timeout_socket,
            TcpStream::connect((config.host.as_str(), config.port)),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.timeout_socket))?
        .map_err(|source| TransportError::ConnectionFailed {
            host: config.host.clone(),
            port: config.port,
            source,
        })?;

        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: None,
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            host_key_verification: config.host_key_verification.clone(),
            known_hosts_path: config.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        let mut session = tokio::time::timeout(
            config.timeout_transport,
            client::connect_stream(ssh_config, stream, handler),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.timeout_transport))?
        .map_err(|e| {
            // Prefer the detailed host-key error over russh's generic one
            host_key_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take()
                .unwrap_or(TransportError::Ssh(e))
        })?;

        tokio::time::timeout(
            config.timeout_transport,
            Self::authenticate(&mut session, config),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.timeout_transport))??;

        Ok(session)
    }

    /// Open a PTY shell channel on the session.
    async fn open_shell(&self, session: &Handle<SshHandler>) -> Result<Channel<Msg>> {
        let config = &self.config;
        let channel = session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_pty(
                true,
                "xterm",
                config.terminal_width,
                config.terminal_height,
                0,
                0,
                &[],
            )
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_shell(true)
            .await
            .map_err(TransportError::Ssh)?;

        Ok(channel)
    }

    /// Authenticate with the server.
    async fn authenticate(session: &mut Handle<SshHandler>, config: &SshConfig) -> Result<()> {
        let success = match &config.auth {
            AuthMethod::None => session
                .authenticate_none(&config.username)
                .await
                .map_err(TransportError::Ssh)?
                .success(),
            AuthMethod::Password(password) => session
                .authenticate_password(&config.username, password.expose_secret())
                .await
                .map_err(TransportError::Ssh)?
                .success(),
            AuthMethod::PrivateKey { path, passphrase } => {
                let key = load_secret_key(path, passphrase.as_ref().map(|p| p.expose_secret()))
                    .map_err(|e| TransportError::Key(e.to_string()))?;

                // Get the best RSA hash algorithm supported by the server
                let hash_alg = session
                    .best_supported_rsa_hash()
                    .await
                    .map_err(TransportError::Ssh)?
                    .flatten();

                session
                    .authenticate_publickey(
                        &config.username,
                        PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                    )
                    .await
                    .map_err(TransportError::Ssh)?
                    .success()
            }
        };

        if !success {
            return Err(TransportError::AuthenticationFailed {
                user: config.username.clone(),
            }
            .into());
        }

        Ok(())
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn open(&mut self) -> Result<()> {
        debug!("ssh: connecting to {}", self.config.socket_addr());
        let session = self.connect().await?;
        let channel = self.open_shell(&session).await?;
        self.session = Some(session);
        self.channel = Some(channel);
        self.eof = false;
        debug!("ssh: shell open on {}", self.config.socket_addr());
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let channel = self.channel.as_ref().ok_or(TransportError::NotOpened)?;
        channel.data(data).await.map_err(TransportError::Ssh)?;
        Ok(())
    }

    async fn read(&mut self) -> Result<Vec<u8>> {
        let channel = self.channel.as_mut().ok_or(TransportError::NotOpened)?;
        if self.eof {
            return Ok(Vec::new());
        }

        // ChannelMsg::wait is an mpsc receive and safe to drop mid-await
        match channel.wait().await {
            Some(ChannelMsg::Data { data }) => Ok(data.to_vec()),
            Some(ChannelMsg::ExtendedData { data, .. }) => Ok(data.to_vec()),
            Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                debug!("ssh: shell channel closed by peer");
                self.eof = true;
                Ok(Vec::new())
            }
            Some(_) => Ok(Vec::new()),
        }
    }

    fn is_alive(&self) -> bool {
        !self.eof
            && self.channel.is_some()
            && self.session.as_ref().is_some_and(|s| !s.is_closed())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(channel) = self.channel.take() {
            if let Err(e) = channel.close().await {
                warn!("ssh: failed to close shell channel: {}", e);
            }
        }
        if let Some(session) = self.session.take() {
            session
                .disconnect(russh::Disconnect::ByApplication, "", "en")
                .await
                .map_err(TransportError::Ssh)?;
        }
        self.eof = true;
        Ok(())
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Stores a detailed host-key error so connect() can surface it
    /// instead of the generic russh::Error::UnknownKey.
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// Check the host key against known_hosts.
    ///
    /// Returns `Ok(true)` if matched, `Ok(false)` if host not found,
    /// `Err(TransportError::HostKeyChanged)` if key changed.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> std::result::Result<bool, TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::check_known_hosts(&self.host, self.port, pubkey)
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    /// Save a new host key to known_hosts.
    fn learn_host_key(&self, pubkey: &PublicKey) -> std::result::Result<(), TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey)
        };

        result.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    fn reject(&self, error: TransportError) -> bool {
        *self
            .host_key_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error);
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match self.host_key_verification {
            HostKeyVerification::Disabled => Ok(true),

            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => {
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("Failed to save host key: {}", e);
                    }
                    Ok(true)
                }
                Err(e) => Ok(self.reject(e)),
            },

            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => Ok(self.reject(TransportError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                })),
                Err(e) => Ok(self.reject(e)),
            },
        }
    }
}
