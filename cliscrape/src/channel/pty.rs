//! The channel: prompt-driven reads and writes over a transport.

use std::ops::Range;
use std::time::Duration;

use log::{debug, trace};
use memchr::memmem;
use tokio::time::Instant;

use super::buffer::PatternBuffer;
use super::cancel::{CancelHandle, Operation};
use super::patterns::{PromptPattern, describe};
use crate::error::{ChannelError, DriverError, Error, Result};
use crate::transport::Transport;

/// Bytes of buffer tail attached to errors.
pub(crate) const ERROR_TAIL: usize = 256;

/// Configuration for channel behavior.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Default per-operation timeout.
    pub timeout_ops: Duration,

    /// Search depth for pattern matching.
    pub search_depth: usize,

    /// Line terminator appended to every input.
    pub return_char: String,

    /// Pause after a zero-byte read before reading again.
    pub read_backoff: Duration,

    /// Bytes of transcript a trigger read keeps; older output is dropped.
    pub transcript_limit: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            timeout_ops: Duration::from_secs(30),
            search_depth: 1000,
            return_char: "\n".to_string(),
            read_backoff: Duration::from_millis(5),
            transcript_limit: 64 * 1024,
        }
    }
}

/// Per-call overrides for [`Channel::send_input_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SendOptions {
    /// Timeout for this call instead of the channel default.
    pub timeout: Option<Duration>,

    /// The input is a secret: not echoed by the device, masked in logs.
    pub hidden: bool,
}

impl SendOptions {
    /// Options for sending a secret.
    pub fn hidden() -> Self {
        Self {
            timeout: None,
            hidden: true,
        }
    }

    /// Override the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A completed prompt-bounded read.
#[derive(Debug, Clone)]
pub struct ChannelOutput {
    /// Everything read (ANSI-stripped), including echo and prompt.
    pub raw: Vec<u8>,

    /// Output with the input echo and trailing prompt removed.
    pub output: String,

    /// The prompt that ended the read.
    pub prompt: String,

    /// Index of the matching pattern in the prompt set.
    pub matched: usize,

    /// Time from the start of the operation to the prompt.
    pub elapsed: Duration,
}

/// Outcome of one transport read.
#[derive(Debug)]
pub(crate) enum ReadEvent {
    Data(Vec<u8>),
    Deadline,
    Closed,
}

/// Where the device's echo of `input` ends in `data`.
///
/// `None` while the echo has not fully arrived. In sync the echo leads the
/// data, and `Some(0)` means the data diverges from the input (the device
/// does not echo). Out of sync, late output of an abandoned operation may
/// precede the echo; everything up to the echo is skipped.
pub(crate) fn echo_end(data: &[u8], input: &[u8], in_sync: bool) -> Option<usize> {
    if !in_sync {
        return memmem::find(data, input).map(|pos| pos + input.len());
    }
    let lead = data.iter().take_while(|b| b.is_ascii_whitespace()).count();
    let rest = &data[lead..];
    if rest.len() < input.len() {
        if input.starts_with(rest) { None } else { Some(0) }
    } else if rest.starts_with(input) {
        Some(lead + input.len())
    } else {
        Some(0)
    }
}

/// Mask secrets in logs.
pub(crate) fn loggable(input: &str, hidden: bool) -> &str {
    if hidden { "********" } else { input }
}

/// Prompt-driven channel over a boxed transport.
///
/// Every operation takes `&mut self`, so one channel is never driven by two
/// operations at once. Reads suspend only inside [`Channel::read_chunk`].
///
/// An operation that times out or is cancelled leaves its unread output on
/// the wire. The channel is then out of sync until an echoed input completes
/// at a prompt: meanwhile echoes are searched for instead of expected at the
/// start of the output.
pub struct Channel {
    transport: Box<dyn Transport>,
    config: ChannelConfig,
    buffer: PatternBuffer,
    cancel: CancelHandle,
    is_open: bool,
    desynced: bool,
}

impl Channel {
    /// Create a new channel over `transport`.
    pub fn new(transport: Box<dyn Transport>, config: ChannelConfig) -> Self {
        Self {
            buffer: PatternBuffer::new(config.search_depth),
            transport,
            config,
            cancel: CancelHandle::new(),
            is_open: false,
            desynced: false,
        }
    }

    /// Create a channel with default configuration.
    pub fn with_defaults(transport: Box<dyn Transport>) -> Self {
        Self::new(transport, ChannelConfig::default())
    }

    /// Open the underlying transport.
    pub async fn open(&mut self) -> Result<()> {
        if self.is_open {
            return Err(DriverError::AlreadyConnected.into());
        }
        self.transport.open().await?;
        self.buffer.clear();
        self.is_open = true;
        self.desynced = false;
        Ok(())
    }

    /// Close the underlying transport.
    pub async fn close(&mut self) -> Result<()> {
        if !self.is_open {
            return Ok(());
        }
        self.is_open = false;
        self.transport.close().await
    }

    /// Check if the channel is open.
    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Check if the channel is open and the transport alive.
    pub fn is_alive(&self) -> bool {
        self.is_open && self.transport.is_alive()
    }

    /// Handle for cancelling the operation in flight from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Whether output of an abandoned operation may still be on the wire.
    pub fn is_desynced(&self) -> bool {
        self.desynced
    }

    pub(crate) fn in_sync(&self) -> bool {
        !self.desynced
    }

    pub(crate) fn mark_synced(&mut self) {
        if self.desynced {
            debug!("channel: back in sync");
        }
        self.desynced = false;
    }

    pub(crate) fn begin(&self) -> Operation {
        self.cancel.begin()
    }

    /// Get the configuration.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Get the default timeout.
    pub fn timeout(&self) -> Duration {
        self.config.timeout_ops
    }

    /// Set the default timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.config.timeout_ops = timeout;
    }

    /// Get a reference to the buffer.
    pub fn buffer(&self) -> &PatternBuffer {
        &self.buffer
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut PatternBuffer {
        &mut self.buffer
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open {
            Ok(())
        } else {
            Err(DriverError::NotConnected.into())
        }
    }

    /// Write raw bytes.
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.transport.write(data).await
    }

    /// Write `input` followed by the return char.
    pub async fn write_line(&mut self, input: &str, hidden: bool) -> Result<()> {
        debug!("channel: write {:?}", loggable(input, hidden));
        let line = format!("{}{}", input, self.config.return_char);
        self.write(line.as_bytes()).await
    }

    /// Send `input` and wait for any of `prompts` at the tail of the output.
    pub async fn send_input(
        &mut self,
        input: &str,
        prompts: &[PromptPattern],
    ) -> Result<ChannelOutput> {
        self.send_input_with(input, prompts, SendOptions::default())
            .await
    }

    /// [`send_input`](Self::send_input) with per-call options.
    pub async fn send_input_with(
        &mut self,
        input: &str,
        prompts: &[PromptPattern],
        options: SendOptions,
    ) -> Result<ChannelOutput> {
        let _op = self.begin();
        let start = Instant::now();
        let timeout = options.timeout.unwrap_or(self.config.timeout_ops);

        self.buffer.clear();
        self.write_line(input, options.hidden).await?;

        let echo = (!options.hidden).then_some(input);
        let output = self.read_prompt(echo, prompts, timeout, start).await?;
        debug!(
            "channel: {:?} completed in {:?} at prompt {:?}",
            loggable(input, options.hidden),
            output.elapsed,
            output.prompt
        );
        Ok(output)
    }

    /// Wait for a prompt without sending anything.
    ///
    /// Bytes already buffered count toward the match.
    pub async fn read_until_prompt(
        &mut self,
        prompts: &[PromptPattern],
        timeout: Option<Duration>,
    ) -> Result<ChannelOutput> {
        let _op = self.begin();
        let timeout = timeout.unwrap_or(self.config.timeout_ops);
        self.read_prompt(None, prompts, timeout, Instant::now()).await
    }

    /// Send the return char and wait for a prompt.
    pub async fn get_prompt(&mut self, prompts: &[PromptPattern]) -> Result<ChannelOutput> {
        self.send_input("", prompts).await
    }

    /// Read until `needle` appears anywhere in the buffer.
    ///
    /// Returns everything buffered up to this point and clears the buffer.
    pub async fn read_until_contains(
        &mut self,
        needle: &str,
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>> {
        let _op = self.begin();
        let start = Instant::now();
        let timeout = timeout.unwrap_or(self.config.timeout_ops);
        self.read_contains(None, needle, timeout, start).await?;
        Ok(self.buffer.take())
    }

    /// Core prompt loop shared by every prompt-bounded operation.
    ///
    /// `echo` is the input whose echo leads the output; until it has fully
    /// arrived (or the output diverged from it) no prompt is tested, so a
    /// half-echoed input can never be mistaken for a prompt. Completing at a
    /// prompt after a visible echo puts the channel back in sync.
    pub(crate) async fn read_prompt(
        &mut self,
        echo: Option<&str>,
        prompts: &[PromptPattern],
        timeout: Duration,
        start: Instant,
    ) -> Result<ChannelOutput> {
        let deadline = Instant::now() + timeout;
        let mut body_start = match echo {
            Some(input) if !input.is_empty() => None,
            _ => Some(0),
        };

        loop {
            if body_start.is_none() {
                if let Some(input) = echo {
                    body_start =
                        echo_end(self.buffer.as_slice(), input.as_bytes(), self.in_sync());
                }
            }

            if let Some(from) = body_start {
                if let Some((matched, span)) = self.buffer.search_prompts(prompts, from) {
                    if echo.is_some_and(|input| !input.is_empty()) {
                        self.mark_synced();
                    }
                    return Ok(self.finish(from, matched, span, start));
                }
            }

            self.fill(start, deadline, timeout, || describe(prompts))
                .await?;
        }
    }

    /// Wait for `needle` after the echo of `echo`; returns where output
    /// (after the echo) begins. The buffer is left untouched.
    pub(crate) async fn read_contains(
        &mut self,
        echo: Option<&str>,
        needle: &str,
        timeout: Duration,
        start: Instant,
    ) -> Result<usize> {
        let deadline = Instant::now() + timeout;
        let mut body_start = match echo {
            Some(input) if !input.is_empty() => None,
            _ => Some(0),
        };

        loop {
            if body_start.is_none() {
                if let Some(input) = echo {
                    body_start =
                        echo_end(self.buffer.as_slice(), input.as_bytes(), self.in_sync());
                }
            }

            if let Some(from) = body_start {
                if self.buffer.find_from(needle.as_bytes(), from).is_some() {
                    return Ok(from);
                }
            }

            self.fill(start, deadline, timeout, || vec![needle.to_string()])
                .await?;
        }
    }

    /// Read one chunk into the buffer or fail with full context.
    async fn fill<F>(
        &mut self,
        start: Instant,
        deadline: Instant,
        timeout: Duration,
        expected: F,
    ) -> Result<()>
    where
        F: FnOnce() -> Vec<String>,
    {
        match self.read_chunk(start, deadline).await? {
            ReadEvent::Data(chunk) => {
                self.buffer.extend(&chunk);
                Ok(())
            }
            ReadEvent::Deadline => Err(ChannelError::Timeout {
                timeout,
                elapsed: start.elapsed(),
                expected: expected(),
                buffer_tail: self.buffer.tail_lossy(ERROR_TAIL),
            }
            .into()),
            ReadEvent::Closed => Err(ChannelError::Closed {
                buffer_tail: self.buffer.tail_lossy(ERROR_TAIL),
            }
            .into()),
        }
    }

    fn finish(
        &mut self,
        from: usize,
        matched: usize,
        span: Range<usize>,
        start: Instant,
    ) -> ChannelOutput {
        let raw = self.buffer.take();
        let output = String::from_utf8_lossy(&raw[from..span.start])
            .trim_start_matches('\n')
            .trim_end()
            .to_string();
        let prompt = String::from_utf8_lossy(&raw[span]).trim().to_string();
        ChannelOutput {
            raw,
            output,
            prompt,
            matched,
            elapsed: start.elapsed(),
        }
    }

    /// Read one non-empty chunk from the transport.
    ///
    /// This is the only suspension point of the engine. Zero-byte reads
    /// from a live transport are retried after `read_backoff`; a dead
    /// transport yields [`ReadEvent::Closed`]. A pending cancellation wins
    /// over data, data wins over the deadline. Cancellation and the deadline
    /// both leave the channel out of sync.
    pub(crate) async fn read_chunk(&mut self, start: Instant, deadline: Instant) -> Result<ReadEvent> {
        self.ensure_open()?;

        loop {
            if self.cancel.take() {
                debug!("channel: read cancelled");
                self.desynced = true;
                return Err(cancelled(start));
            }

            let Self {
                transport, cancel, ..
            } = &mut *self;

            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                read = transport.read() => Some(read),
                _ = tokio::time::sleep_until(deadline) => None,
            };

            let Some(read) = read else {
                if self.cancel.is_cancelled() {
                    continue;
                }
                self.desynced = true;
                return Ok(ReadEvent::Deadline);
            };

            let chunk = read?;
            if !chunk.is_empty() {
                trace!("channel: read {:?}", String::from_utf8_lossy(&chunk));
                return Ok(ReadEvent::Data(chunk));
            }

            if !self.transport.is_alive() {
                debug!("channel: transport no longer alive");
                return Ok(ReadEvent::Closed);
            }

            let now = Instant::now();
            if now >= deadline {
                self.desynced = true;
                return Ok(ReadEvent::Deadline);
            }
            tokio::time::sleep(self.config.read_backoff.min(deadline - now)).await;
        }
    }
}

fn cancelled(start: Instant) -> Error {
    ChannelError::Cancelled {
        elapsed: start.elapsed(),
    }
    .into()
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("config", &self.config)
            .field("buffer", &self.buffer)
            .field("is_open", &self.is_open)
            .field("desynced", &self.desynced)
            .finish()
    }
}
