//! Transport over any async byte stream (raw TCP console servers, sockets).

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use super::Transport;
use crate::error::{Result, TransportError};

const READ_CHUNK: usize = 8192;

/// Transport wrapping an already-connected `AsyncRead + AsyncWrite` stream.
///
/// No negotiation happens on the stream; bytes pass through untouched. Useful
/// for terminal servers exposing a device console as a plain TCP port.
pub struct StreamTransport<S> {
    stream: S,
    opened: bool,
    eof: bool,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            opened: false,
            eof: false,
        }
    }

    /// Unwrap the inner stream.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl StreamTransport<TcpStream> {
    /// Connect to `host:port` within `timeout`.
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
            .map_err(|source| TransportError::ConnectionFailed {
                host: host.to_string(),
                port,
                source,
            })?;
        debug!("stream: connected to {}:{}", host, port);
        Ok(Self::new(stream))
    }
}

#[async_trait]
impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn open(&mut self) -> Result<()> {
        self.opened = true;
        self.eof = false;
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        if !self.opened {
            return Err(TransportError::NotOpened.into());
        }
        self.stream
            .write_all(data)
            .await
            .map_err(TransportError::Io)?;
        self.stream.flush().await.map_err(TransportError::Io)?;
        Ok(())
    }

    async fn read(&mut self) -> Result<Vec<u8>> {
        if !self.opened {
            return Err(TransportError::NotOpened.into());
        }
        if self.eof {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; READ_CHUNK];
        let n = self.stream.read(&mut buf).await.map_err(TransportError::Io)?;
        if n == 0 {
            debug!("stream: peer closed");
            self.eof = true;
        }
        buf.truncate(n);
        Ok(buf)
    }

    fn is_alive(&self) -> bool {
        self.opened && !self.eof
    }

    async fn close(&mut self) -> Result<()> {
        if self.opened && !self.eof {
            self.stream.shutdown().await.map_err(TransportError::Io)?;
        }
        self.eof = true;
        Ok(())
    }
}
