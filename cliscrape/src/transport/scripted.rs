//! Scripted transport replaying a recorded device conversation.
//!
//! Useful for exercising drivers and platform definitions without hardware:
//! the script lists the exact bytes the driver must write and the chunks the
//! "device" answers with, in order.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use log::trace;

use super::Transport;
use crate::error::{Result, TransportError};

#[derive(Debug, Clone)]
enum Step {
    /// The next write must be exactly these bytes.
    Expect(Vec<u8>),
    /// A chunk the next read returns.
    Reply(Vec<u8>),
    /// A zero-byte read while the session stays alive.
    Empty,
    /// The peer goes away.
    Close,
}

/// Shared record of everything written to a [`ScriptedTransport`].
#[derive(Debug, Clone, Default)]
pub struct WriteLog(Arc<Mutex<Vec<String>>>);

impl WriteLog {
    /// Every write so far, lossily decoded.
    pub fn writes(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of writes so far.
    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, data: &[u8]) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(String::from_utf8_lossy(data).into_owned());
    }
}

/// Transport that replays a script.
///
/// Reads return reply chunks in order. When the next step is an expected
/// write, a read suspends forever, exactly like a quiet device; the channel's
/// deadline ends the wait. A write that differs from the expected one fails
/// with an I/O error naming both.
///
/// ```rust
/// use cliscrape::transport::ScriptedTransport;
///
/// let transport = ScriptedTransport::new()
///     .reply("router>")
///     .expect_write("enable\n")
///     .reply("enable\nPassword: ");
/// ```
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: VecDeque<Step>,
    log: WriteLog,
    opened: bool,
    alive: bool,
}

impl ScriptedTransport {
    /// Create an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect the driver to write exactly `data` next.
    pub fn expect_write(mut self, data: impl AsRef<[u8]>) -> Self {
        self.script.push_back(Step::Expect(data.as_ref().to_vec()));
        self
    }

    /// Queue a chunk for the next read.
    pub fn reply(mut self, data: impl AsRef<[u8]>) -> Self {
        self.script.push_back(Step::Reply(data.as_ref().to_vec()));
        self
    }

    /// Queue one reply per chunk.
    pub fn reply_chunks<I, B>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        for chunk in chunks {
            self = self.reply(chunk);
        }
        self
    }

    /// Queue a zero-byte read.
    pub fn empty_read(mut self) -> Self {
        self.script.push_back(Step::Empty);
        self
    }

    /// Close the session at this point of the script.
    pub fn close_here(mut self) -> Self {
        self.script.push_back(Step::Close);
        self
    }

    /// Handle on the write record, usable after the transport is moved.
    pub fn write_log(&self) -> WriteLog {
        self.log.clone()
    }

    /// Whether every scripted step has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.script.is_empty()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.opened {
            Ok(())
        } else {
            Err(TransportError::NotOpened.into())
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&mut self) -> Result<()> {
        self.opened = true;
        self.alive = true;
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_open()?;
        if !self.alive {
            return Err(TransportError::Disconnected.into());
        }
        self.log.push(data);
        trace!("scripted: write {:?}", String::from_utf8_lossy(data));

        match self.script.front() {
            Some(Step::Expect(expected)) if expected.as_slice() == data => {
                self.script.pop_front();
                Ok(())
            }
            next => Err(TransportError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "unexpected write {:?}, script expected {:?}",
                    String::from_utf8_lossy(data),
                    next
                ),
            ))
            .into()),
        }
    }

    async fn read(&mut self) -> Result<Vec<u8>> {
        self.ensure_open()?;
        match self.script.front() {
            Some(Step::Reply(_)) => match self.script.pop_front() {
                Some(Step::Reply(chunk)) => Ok(chunk),
                _ => Ok(Vec::new()),
            },
            Some(Step::Empty) => {
                self.script.pop_front();
                Ok(Vec::new())
            }
            Some(Step::Close) => {
                self.script.pop_front();
                self.alive = false;
                Ok(Vec::new())
            }
            None if !self.alive => Ok(Vec::new()),
            Some(Step::Expect(_)) | None => std::future::pending().await,
        }
    }

    fn is_alive(&self) -> bool {
        self.opened && self.alive
    }

    async fn close(&mut self) -> Result<()> {
        self.alive = false;
        Ok(())
    }
}
