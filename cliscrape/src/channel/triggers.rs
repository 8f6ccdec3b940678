//! Trigger-driven reads for output without a known prompt.
//!
//! Installers, file copies and boot loaders print questions at arbitrary
//! points. A [`Trigger`] reacts to a substring as soon as it streams past;
//! the read ends when the [`Termination`] condition is seen.

use std::fmt;
use std::ops::Range;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::time::Instant;

use super::buffer::PatternBuffer;
use super::patterns::PromptPattern;
use super::pty::{Channel, ERROR_TAIL, ReadEvent};
use crate::error::{ChannelError, Result};

/// Custom reaction to a trigger.
///
/// The handler gets the channel itself and may send input and wait for
/// prompts; whatever it reads that way is not part of the trigger
/// transcript.
#[async_trait]
pub trait TriggerHandler: Send {
    async fn on_trigger(&mut self, channel: &mut Channel, matched: &str) -> Result<()>;
}

/// What a trigger does when it fires.
pub enum TriggerAction {
    /// Send a line.
    Send(String),

    /// Send a secret line.
    SendHidden(String),

    /// Run a handler.
    Handler(Box<dyn TriggerHandler>),
}

impl fmt::Debug for TriggerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerAction::Send(input) => f.debug_tuple("Send").field(input).finish(),
            TriggerAction::SendHidden(_) => f.write_str("SendHidden(********)"),
            TriggerAction::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

/// A substring watch with an action.
#[derive(Debug)]
pub struct Trigger {
    needle: String,
    action: TriggerAction,
    once: bool,
    cursor: usize,
    fired: usize,
}

impl Trigger {
    pub fn new(needle: impl Into<String>, action: TriggerAction) -> Self {
        Self {
            needle: needle.into(),
            action,
            once: false,
            cursor: 0,
            fired: 0,
        }
    }

    /// Answer `needle` with `input`.
    pub fn send(needle: impl Into<String>, input: impl Into<String>) -> Self {
        Self::new(needle, TriggerAction::Send(input.into()))
    }

    /// Answer `needle` with a secret.
    pub fn send_hidden(needle: impl Into<String>, input: impl Into<String>) -> Self {
        Self::new(needle, TriggerAction::SendHidden(input.into()))
    }

    /// Run `handler` on `needle`.
    pub fn handler(needle: impl Into<String>, handler: impl TriggerHandler + 'static) -> Self {
        Self::new(needle, TriggerAction::Handler(Box::new(handler)))
    }

    /// Fire at most once.
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    pub fn needle(&self) -> &str {
        &self.needle
    }

    /// How many times this trigger fired.
    pub fn fired(&self) -> usize {
        self.fired
    }

    /// Next occurrence at or after the cursor; spans are relative to `log`,
    /// which starts at absolute offset `base`.
    fn next_match(&self, log: &PatternBuffer, base: usize) -> Option<Range<usize>> {
        if self.once && self.fired > 0 {
            return None;
        }
        log.find_from(self.needle.as_bytes(), self.cursor.saturating_sub(base))
    }
}

/// Where the next scan for `needle` starts once `end` bytes were scanned
/// without a match: a needle split across chunks is still found.
fn rescan_from(end: usize, needle: &str) -> usize {
    end.saturating_sub(needle.len().saturating_sub(1))
}

/// When a trigger read is complete.
#[derive(Debug, Clone)]
pub enum Termination {
    /// A substring anywhere in the output.
    Contains(String),

    /// A prompt at the tail of the output.
    Prompt(PromptPattern),
}

impl Termination {
    /// Check `log` (starting at absolute `base`) from the absolute offset
    /// `scanned`, then advance it.
    fn is_met(&self, log: &PatternBuffer, base: usize, scanned: &mut usize) -> bool {
        match self {
            Termination::Contains(needle) => {
                let found = log
                    .find_from(needle.as_bytes(), scanned.saturating_sub(base))
                    .is_some();
                *scanned = rescan_from(base + log.len(), needle);
                found
            }
            Termination::Prompt(pattern) => log.search_tail(pattern).is_some(),
        }
    }

    fn needle_len(&self) -> usize {
        match self {
            Termination::Contains(needle) => needle.len(),
            Termination::Prompt(_) => 0,
        }
    }

    fn describe(&self) -> String {
        match self {
            Termination::Contains(needle) => needle.clone(),
            Termination::Prompt(pattern) => pattern.as_str().to_string(),
        }
    }
}

/// Result of a trigger read.
#[derive(Debug, Clone)]
pub struct TriggerOutput {
    /// The last `transcript_limit` bytes read, ANSI-stripped.
    pub raw: Vec<u8>,

    /// Total bytes read, including those dropped from `raw`.
    pub total: usize,

    /// Lossy text of `raw`, trimmed.
    pub output: String,

    /// Needles of the triggers in the order they fired.
    pub fired: Vec<String>,

    pub elapsed: Duration,
}

impl Channel {
    /// Read until `until`, firing `triggers` as their substrings appear.
    ///
    /// Each occurrence after a trigger's previous firing fires it again
    /// unless the trigger is `once`. Triggers are checked before the
    /// termination condition, so a question printed together with the
    /// final prompt is still answered.
    ///
    /// Every byte is scanned once per trigger. Only the last
    /// [`transcript_limit`](super::ChannelConfig::transcript_limit) bytes of
    /// the transcript are kept, so boot consoles can be followed for hours.
    pub async fn read_with_triggers(
        &mut self,
        triggers: &mut [Trigger],
        until: &Termination,
        timeout: Option<Duration>,
    ) -> Result<TriggerOutput> {
        let _op = self.begin();
        let start = Instant::now();
        let timeout = timeout.unwrap_or(self.timeout());
        let deadline = start + timeout;
        let mut log = PatternBuffer::new(self.config().search_depth);
        let keep = triggers
            .iter()
            .map(|t| t.needle.len())
            .chain([until.needle_len(), self.config().search_depth])
            .fold(self.config().transcript_limit, usize::max);
        // absolute offset of log[0]
        let mut base = 0;
        let mut scanned = 0;
        let mut fired = Vec::new();

        self.buffer_mut().clear();
        for trigger in triggers.iter_mut() {
            trigger.cursor = 0;
        }

        loop {
            let end = base + log.len();
            let mut i = 0;
            while i < triggers.len() {
                let Some(span) = triggers[i].next_match(&log, base) else {
                    let trigger = &mut triggers[i];
                    trigger.cursor = trigger.cursor.max(rescan_from(end, &trigger.needle));
                    i += 1;
                    continue;
                };
                let trigger = &mut triggers[i];
                trigger.cursor = base + span.end;
                trigger.fired += 1;
                fired.push(trigger.needle.clone());
                debug!("channel: trigger {:?} fired", trigger.needle);

                let matched = trigger.needle.clone();
                match &mut trigger.action {
                    TriggerAction::Send(input) => self.write_line(input, false).await?,
                    TriggerAction::SendHidden(input) => self.write_line(input, true).await?,
                    TriggerAction::Handler(handler) => handler.on_trigger(self, &matched).await?,
                }
            }

            if until.is_met(&log, base, &mut scanned) {
                let raw = log.take();
                return Ok(TriggerOutput {
                    output: String::from_utf8_lossy(&raw).trim().to_string(),
                    raw,
                    total: end,
                    fired,
                    elapsed: start.elapsed(),
                });
            }

            // cut back to `keep` once twice that has piled up
            if log.len() > keep * 2 {
                let cut = log.len() - keep;
                log.discard_front(cut);
                base += cut;
            }

            match self.read_chunk(start, deadline).await? {
                ReadEvent::Data(chunk) => log.extend(&chunk),
                ReadEvent::Deadline => {
                    return Err(ChannelError::Timeout {
                        timeout,
                        elapsed: start.elapsed(),
                        expected: vec![until.describe()],
                        buffer_tail: log.tail_lossy(ERROR_TAIL),
                    }
                    .into());
                }
                ReadEvent::Closed => {
                    return Err(ChannelError::Closed {
                        buffer_tail: log.tail_lossy(ERROR_TAIL),
                    }
                    .into());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelConfig;
    use crate::error::Error;
    use crate::transport::ScriptedTransport;

    async fn open(transport: ScriptedTransport) -> Channel {
        let mut channel = Channel::with_defaults(Box::new(transport));
        channel.open().await.unwrap();
        channel
    }

    #[tokio::test]
    async fn test_trigger_fires_per_occurrence() {
        let transport = ScriptedTransport::new()
            .reply("Overwrite file a? [y/n]")
            .expect_write("y\n")
            .reply("\nOverwrite file b? [y/n]")
            .expect_write("y\n")
            .reply("\nCopy complete\nrouter#");
        let mut channel = open(transport).await;

        let mut triggers = vec![Trigger::send("[y/n]", "y")];
        let until = Termination::Prompt(PromptPattern::new(r"^router#\s*$").unwrap());
        let out = channel
            .read_with_triggers(&mut triggers, &until, None)
            .await
            .unwrap();

        assert_eq!(triggers[0].fired(), 2);
        assert_eq!(out.fired, vec!["[y/n]", "[y/n]"]);
        assert!(out.output.contains("Copy complete"));
    }

    #[tokio::test]
    async fn test_once_trigger() {
        let transport = ScriptedTransport::new()
            .reply("--More--")
            .expect_write(" \n")
            .reply("--More--\nDONE");
        let mut channel = open(transport).await;

        let mut triggers = vec![Trigger::send("--More--", " ").once()];
        let until = Termination::Contains("DONE".to_string());
        let out = channel
            .read_with_triggers(&mut triggers, &until, None)
            .await
            .unwrap();
        assert_eq!(out.fired.len(), 1);
    }

    struct Confirm;

    #[async_trait]
    impl TriggerHandler for Confirm {
        async fn on_trigger(&mut self, channel: &mut Channel, _matched: &str) -> Result<()> {
            channel.write_line("yes", false).await
        }
    }

    #[tokio::test]
    async fn test_handler_trigger() {
        let transport = ScriptedTransport::new()
            .reply("Are you sure? ")
            .expect_write("yes\n")
            .reply("erased\nrouter#");
        let mut channel = open(transport).await;

        let mut triggers = vec![Trigger::handler("Are you sure?", Confirm)];
        let until = Termination::Prompt(PromptPattern::new(r"^router#\s*$").unwrap());
        let out = channel
            .read_with_triggers(&mut triggers, &until, None)
            .await
            .unwrap();
        assert_eq!(out.fired, vec!["Are you sure?"]);
    }

    #[tokio::test]
    async fn test_long_console_keeps_bounded_transcript() {
        let mut transport = ScriptedTransport::new();
        for n in 0..2000 {
            transport = transport.reply(format!("boot step {n:04} ok\n"));
        }
        // needle and terminator both split across reads
        let transport = transport
            .reply_chunks(["Press RET", "URN to continue"])
            .expect_write("\n")
            .reply_chunks(["\nSystem re", "ady"]);
        let config = ChannelConfig {
            search_depth: 100,
            transcript_limit: 256,
            ..ChannelConfig::default()
        };
        let mut channel = Channel::new(Box::new(transport), config);
        channel.open().await.unwrap();

        let mut triggers = vec![Trigger::send("Press RETURN", "")];
        let until = Termination::Contains("System ready".to_string());
        let out = channel
            .read_with_triggers(&mut triggers, &until, None)
            .await
            .unwrap();

        assert_eq!(out.fired, vec!["Press RETURN"]);
        assert!(out.raw.len() <= 2 * 256 + 20, "{}", out.raw.len());
        assert!(out.total > 2000 * 18);
        assert!(out.output.ends_with("System ready"));
        assert!(!out.output.contains("boot step 0000"));
    }

    #[tokio::test]
    async fn test_trigger_read_times_out() {
        let transport = ScriptedTransport::new()
            .reply("working...")
            .expect_write("never\n");
        let mut channel = open(transport).await;

        let until = Termination::Contains("DONE".to_string());
        let err = channel
            .read_with_triggers(&mut [], &until, Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        match err {
            Error::Channel(ChannelError::Timeout {
                expected,
                buffer_tail,
                ..
            }) => {
                assert_eq!(expected, vec!["DONE"]);
                assert_eq!(buffer_tail, "working...");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
