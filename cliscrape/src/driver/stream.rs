//! Streaming command output with a sliding-window prompt detector.
//!
//! For long-running commands, `CommandStream` delivers output in real time
//! without accumulating the entire response in memory. A `BytesMut` sliding
//! window of `search_depth` bytes is used for prompt detection, so memory
//! usage is O(search_depth), not O(output_size).

use std::time::{Duration, SystemTime};

use bytes::{Buf, BytesMut};
use log::{debug, trace, warn};
use memchr::{memchr, memrchr};
use tokio::time::Instant;

use super::privilege::PrivilegeManager;
use super::response::Response;
use crate::channel::{
    Channel, ERROR_TAIL, Operation, PromptPattern, ReadEvent, describe, echo_end,
};
use crate::error::{ChannelError, DriverError, Result};
use crate::platform::PlatformDefinition;

/// Real-time streaming handle for a single command's output.
///
/// Created by [`GenericDriver::send_command_stream`](super::GenericDriver::send_command_stream).
/// Call [`next_chunk`](Self::next_chunk) in a loop to receive output as it
/// arrives, then [`into_response`](Self::into_response) to finalize.
///
/// Chunks are ANSI-stripped; the command echo and the trailing prompt are
/// not part of them.
///
/// # Example
///
/// ```rust,no_run
/// # async fn example(driver: &mut cliscrape::GenericDriver) -> cliscrape::Result<()> {
/// let mut stream = driver.send_command_stream("show tech-support").await?;
/// while let Some(chunk) = stream.next_chunk().await? {
///     print!("{}", String::from_utf8_lossy(&chunk));
/// }
/// let response = stream.into_response()?;
/// assert!(response.is_success());
/// # Ok(())
/// # }
/// ```
pub struct CommandStream<'a> {
    _op: Operation,
    channel: &'a mut Channel,
    platform: &'a PlatformDefinition,
    privilege: &'a mut PrivilegeManager,
    prompts: &'a [PromptPattern],
    command: String,
    /// Bytes held back until the command echo is resolved.
    echo: Option<Vec<u8>>,
    start: Instant,
    start_time: SystemTime,
    deadline: Instant,
    timeout: Duration,
    finished: bool,
    window: BytesMut,
    /// Window offset up to which output was handed out.
    emitted: usize,
    search_depth: usize,
    failure_message: Option<String>,
    prompt: String,
}

impl<'a> CommandStream<'a> {
    /// Create a new command stream.
    ///
    /// The command must already have been written to the channel.
    pub(crate) fn new(
        op: Operation,
        channel: &'a mut Channel,
        platform: &'a PlatformDefinition,
        privilege: &'a mut PrivilegeManager,
        prompts: &'a [PromptPattern],
        command: String,
        timeout: Duration,
    ) -> Self {
        let search_depth = channel.config().search_depth;
        let start = Instant::now();
        let echo = (!command.is_empty()).then(Vec::new);
        Self {
            _op: op,
            channel,
            platform,
            privilege,
            prompts,
            command,
            echo,
            start,
            start_time: SystemTime::now(),
            deadline: start + timeout,
            timeout,
            finished: false,
            window: BytesMut::with_capacity(search_depth * 2),
            emitted: 0,
            search_depth,
            failure_message: None,
            prompt: String::new(),
        }
    }

    /// Get the next chunk of output, or `None` once the prompt is detected.
    ///
    /// Each call waits until the device sends output or the prompt is
    /// matched. The timeout covers the whole command, not each chunk.
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            if self.finished {
                return Ok(None);
            }

            let data = match self.channel.read_chunk(self.start, self.deadline).await? {
                ReadEvent::Data(data) => data,
                ReadEvent::Deadline => {
                    return Err(ChannelError::Timeout {
                        timeout: self.timeout,
                        elapsed: self.start.elapsed(),
                        expected: describe(self.prompts),
                        buffer_tail: self.window_tail(),
                    }
                    .into());
                }
                ReadEvent::Closed => {
                    return Err(ChannelError::Closed {
                        buffer_tail: self.window_tail(),
                    }
                    .into());
                }
            };

            let buffer = self.channel.buffer_mut();
            buffer.extend(&data);
            let text = buffer.take();

            let Some(chunk) = self.skip_echo(text) else {
                continue;
            };
            let output = self.push(chunk);
            if !output.is_empty() {
                return Ok(Some(output));
            }
        }
    }

    /// Hold output back until the echo of the command has been seen.
    fn skip_echo(&mut self, chunk: Vec<u8>) -> Option<Vec<u8>> {
        let Some(pending) = self.echo.as_mut() else {
            return Some(chunk);
        };
        pending.extend_from_slice(&chunk);

        let end = echo_end(pending, self.command.as_bytes(), self.channel.in_sync())?;
        let mut rest = pending.split_off(end);
        self.echo = None;
        if end > 0 && rest.first() == Some(&b'\n') {
            rest.remove(0);
        }
        Some(rest)
    }

    /// Append `chunk` to the window and return the output that is ready.
    ///
    /// A prompt is always the last line, so the unfinished last line is held
    /// back until its newline arrives (or it outgrows the window).
    fn push(&mut self, chunk: Vec<u8>) -> Vec<u8> {
        self.window.extend_from_slice(&chunk);

        let found = self
            .prompts
            .iter()
            .find_map(|prompt| prompt.find_at_tail(&self.window));

        if let Some(span) = found {
            self.finished = true;
            if !self.command.is_empty() {
                self.channel.mark_synced();
            }
            self.prompt = String::from_utf8_lossy(&self.window[span.clone()])
                .trim()
                .to_string();
            self.check_failure(span.start);
            debug!("stream: prompt {:?} detected", self.prompt);

            let output = self
                .window
                .get(self.emitted..span.start)
                .map(<[u8]>::to_vec)
                .unwrap_or_default();
            self.emitted = self.window.len();
            return output;
        }

        self.check_failure(self.window.len());

        let pending = &self.window[self.emitted..];
        let ready = match memrchr(b'\n', pending) {
            Some(pos) => self.emitted + pos + 1,
            None if pending.len() > self.search_depth => self.window.len(),
            None => self.emitted,
        };
        let output = self.window[self.emitted..ready].to_vec();
        self.emitted = ready;

        // Keep the last `search_depth` bytes, cut at a line start when one
        // is available so `^` never sees a fake line beginning. Bytes not
        // handed out yet always stay.
        if self.window.len() > self.search_depth {
            let excess = self.window.len() - self.search_depth;
            let cut = memchr(b'\n', &self.window[excess..])
                .map_or(excess, |pos| excess + pos + 1)
                .min(self.emitted);
            self.window.advance(cut);
            self.emitted -= cut;
        }

        trace!(
            "stream chunk: {} bytes in, {} bytes out, window: {} bytes",
            chunk.len(),
            output.len(),
            self.window.len()
        );
        output
    }

    /// Record the first failure substring found in `window[..end]`.
    fn check_failure(&mut self, end: usize) {
        if self.failure_message.is_some() {
            return;
        }
        let text = String::from_utf8_lossy(&self.window[..end]);
        if let Some(pattern) = self
            .platform
            .failed_when_contains
            .iter()
            .find(|p| text.contains(p.as_str()))
        {
            debug!("stream: failure pattern matched: {:?}", pattern);
            self.failure_message = Some(pattern.clone());
        }
    }

    fn window_tail(&self) -> String {
        let start = self.window.len().saturating_sub(ERROR_TAIL);
        String::from_utf8_lossy(&self.window[start..]).into_owned()
    }

    /// Consume the stream and build a [`Response`].
    ///
    /// `result` and `raw_result` are empty because the output was already
    /// handed out through [`next_chunk`](Self::next_chunk). The prompt,
    /// timing and failure fields are populated normally, and the current
    /// privilege level follows the final prompt.
    ///
    /// # Errors
    ///
    /// Fails if the prompt has not been detected yet.
    pub fn into_response(mut self) -> Result<Response> {
        if !self.finished {
            return Err(DriverError::CommandFailed {
                message: format!("stream for {:?} not finished", self.command),
            }
            .into());
        }

        match self.privilege.classify(&self.prompt).map(|l| l.name.clone()) {
            Some(name) => {
                let _ = self.privilege.set_current(&name);
            }
            None => self.privilege.clear_current(),
        }

        let elapsed = self.start.elapsed();
        debug!(
            "stream: completed in {:?}, prompt={:?}, success={}",
            elapsed,
            self.prompt,
            self.failure_message.is_none()
        );

        let mut response = Response::new(
            std::mem::take(&mut self.command),
            String::new(),
            Vec::new(),
            std::mem::take(&mut self.prompt),
            self.start_time,
            elapsed,
        );
        response.failure_message = self.failure_message.take();
        Ok(response)
    }

    /// Whether the stream has finished (prompt detected).
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The command that was sent.
    pub fn command(&self) -> &str {
        &self.command
    }
}

impl Drop for CommandStream<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!(
                "CommandStream for {:?} dropped before prompt was detected",
                self.command
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelConfig;
    use crate::driver::GenericDriver;
    use crate::platform::PrivilegeLevel;
    use crate::transport::ScriptedTransport;

    fn driver(transport: ScriptedTransport, search_depth: usize) -> GenericDriver {
        let platform = PlatformDefinition::new("lab")
            .with_privilege(PrivilegeLevel::new("exec", r"^\S+>\s*$").unwrap())
            .with_privilege(
                PrivilegeLevel::new("privilege_exec", r"^[\w.\-]+#\s*$")
                    .unwrap()
                    .with_parent("exec")
                    .with_escalate("enable")
                    .with_deescalate("disable"),
            )
            .with_default_privilege("privilege_exec")
            .with_failure_pattern("% Error");
        let config = ChannelConfig {
            search_depth,
            ..ChannelConfig::default()
        };
        GenericDriver::new(Box::new(transport), platform, config).unwrap()
    }

    /// Script of an open at `router#` followed by `rest`.
    fn opened(rest: impl FnOnce(ScriptedTransport) -> ScriptedTransport) -> ScriptedTransport {
        rest(
            ScriptedTransport::new()
                .reply("router#")
                .expect_write("\n")
                .reply("\nrouter#"),
        )
    }

    async fn collect(stream: &mut CommandStream<'_>) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next_chunk().await.unwrap() {
            out.extend_from_slice(&chunk);
        }
        out
    }

    #[tokio::test]
    async fn test_stream_chunks_then_prompt() {
        let transport = opened(|script| {
            script
                .expect_write("show log\n")
                .reply_chunks(["show log\nline 1\n", "line 2\n", "line 3\nrou", "ter#"])
        });
        let mut driver = driver(transport, 1000);
        driver.open().await.unwrap();

        let mut stream = driver.send_command_stream("show log").await.unwrap();
        let out = collect(&mut stream).await;
        assert_eq!(out, b"line 1\nline 2\nline 3\n");
        assert!(stream.is_finished());

        let response = stream.into_response().unwrap();
        assert!(response.is_success());
        assert_eq!(response.prompt, "router#");
        assert!(response.result.is_empty());
    }

    #[tokio::test]
    async fn test_window_stays_bounded() {
        let lines: Vec<String> = (0..200).map(|i| format!("entry {i:04}\n")).collect();
        let transport = opened(|script| {
            script
                .expect_write("show table\n")
                .reply("show table\n")
                .reply_chunks(&lines)
                .reply("router#")
        });
        let mut driver = driver(transport, 64);
        driver.open().await.unwrap();

        let mut stream = driver.send_command_stream("show table").await.unwrap();
        while let Some(_chunk) = stream.next_chunk().await.unwrap() {
            assert!(stream.window.len() <= 64 + 16);
        }
        assert_eq!(stream.into_response().unwrap().prompt, "router#");
    }

    #[tokio::test]
    async fn test_failure_detected_across_chunks() {
        let transport = opened(|script| {
            script
                .expect_write("copy x y\n")
                .reply_chunks(["copy x y\n% Er", "ror opening x\nrouter#"])
        });
        let mut driver = driver(transport, 1000);
        driver.open().await.unwrap();

        let mut stream = driver.send_command_stream("copy x y").await.unwrap();
        collect(&mut stream).await;
        let response = stream.into_response().unwrap();
        assert_eq!(response.failure_message.as_deref(), Some("% Error"));
    }

    #[tokio::test]
    async fn test_unfinished_stream_has_no_response() {
        let transport = opened(|script| {
            script
                .expect_write("show log\n")
                .reply("show log\npartial\n")
        });
        let mut driver = driver(transport, 1000);
        driver.open().await.unwrap();

        let mut stream = driver.send_command_stream("show log").await.unwrap();
        assert_eq!(stream.next_chunk().await.unwrap().unwrap(), b"partial\n");
        assert!(stream.into_response().is_err());
    }
}
