//! Scripted interactive exchanges.
//!
//! Many device commands stop mid-way and ask something:
//! - `reload` asks "Proceed with reload? [confirm]"
//! - `copy running-config startup-config` asks for a destination filename
//! - `enable` asks for a password
//!
//! An interactive sequence sends one input per event. Every event except the
//! last waits for a substring; the last one waits for a real prompt.

use std::time::Duration;

use log::debug;
use tokio::time::Instant;

use super::patterns::PromptPattern;
use super::pty::{Channel, ChannelOutput, loggable};
use crate::error::{DriverError, Result};

/// One step of an interactive sequence.
///
/// ```rust
/// use cliscrape::channel::InteractiveEvent;
///
/// let events = vec![
///     InteractiveEvent::new("reload", "[confirm]"),
///     InteractiveEvent::prompt("y"),
/// ];
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractiveEvent {
    /// Text to send.
    pub input: String,

    /// Substring to wait for after sending. `None` waits for a prompt.
    pub response: Option<String>,

    /// Input is a secret: no echo handling, masked in logs.
    pub hidden: bool,

    /// Timeout override for this step.
    pub timeout: Option<Duration>,
}

impl InteractiveEvent {
    /// Send `input` and wait for `response` anywhere in the output.
    pub fn new(input: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            response: Some(response.into()),
            hidden: false,
            timeout: None,
        }
    }

    /// Send `input` and wait for a prompt.
    pub fn prompt(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            response: None,
            hidden: false,
            timeout: None,
        }
    }

    /// Send a secret and wait for `response`.
    pub fn hidden(input: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            hidden: true,
            ..Self::new(input, response)
        }
    }

    /// Set a custom timeout for this event.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Mark this event's input as hidden.
    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }
}

/// What one step of a sequence produced.
#[derive(Debug, Clone)]
pub struct InteractiveStep {
    /// The input that was sent, masked if hidden.
    pub input: String,

    /// Output after the echo, up to and including the awaited text.
    pub output: String,

    /// Time taken by this step.
    pub elapsed: Duration,
}

/// Result of a whole interactive sequence.
#[derive(Debug, Clone)]
pub struct InteractiveOutput {
    /// Per-step results, in order.
    pub steps: Vec<InteractiveStep>,

    /// Concatenated raw transcript of every step.
    pub raw: Vec<u8>,

    /// The prompt that ended the sequence.
    pub prompt: String,

    /// Index of the pattern that matched the final prompt.
    pub matched: usize,

    /// Total time for the sequence.
    pub elapsed: Duration,
}

impl InteractiveOutput {
    /// Output of every step joined by newlines.
    pub fn full_output(&self) -> String {
        self.steps
            .iter()
            .map(|s| s.output.as_str())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Output of the last step.
    pub fn final_output(&self) -> Option<&str> {
        self.steps.last().map(|s| s.output.as_str())
    }
}

/// Fluent builder for interactive sequences.
///
/// ```rust
/// use cliscrape::channel::InteractiveBuilder;
/// use std::time::Duration;
///
/// let events = InteractiveBuilder::new()
///     .send("copy running-config startup-config")
///     .expect("Destination filename")
///     .send("")
///     .expect_prompt()
///     .with_timeout(Duration::from_secs(60))
///     .build();
/// assert_eq!(events.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct InteractiveBuilder {
    events: Vec<InteractiveEvent>,
    default_timeout: Option<Duration>,
}

impl InteractiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an input to send; follow with `expect` or `expect_prompt`.
    pub fn send(self, input: impl Into<String>) -> InteractiveBuilderWithInput {
        InteractiveBuilderWithInput {
            builder: self,
            input: input.into(),
            hidden: false,
            timeout: None,
        }
    }

    /// Add a hidden input.
    pub fn send_hidden(self, input: impl Into<String>) -> InteractiveBuilderWithInput {
        InteractiveBuilderWithInput {
            hidden: true,
            ..self.send(input)
        }
    }

    /// Timeout for every event without its own.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Vec<InteractiveEvent> {
        let default_timeout = self.default_timeout;
        self.events
            .into_iter()
            .map(|mut event| {
                event.timeout = event.timeout.or(default_timeout);
                event
            })
            .collect()
    }
}

/// Builder state after `send()`.
#[derive(Debug)]
pub struct InteractiveBuilderWithInput {
    builder: InteractiveBuilder,
    input: String,
    hidden: bool,
    timeout: Option<Duration>,
}

impl InteractiveBuilderWithInput {
    /// Wait for `response` anywhere in the output.
    pub fn expect(self, response: impl Into<String>) -> InteractiveBuilder {
        self.push(Some(response.into()))
    }

    /// Wait for a prompt.
    pub fn expect_prompt(self) -> InteractiveBuilder {
        self.push(None)
    }

    /// Timeout for this event.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn push(mut self, response: Option<String>) -> InteractiveBuilder {
        self.builder.events.push(InteractiveEvent {
            input: self.input,
            response,
            hidden: self.hidden,
            timeout: self.timeout,
        });
        self.builder
    }
}

impl Channel {
    /// Run an interactive sequence, ending at one of `prompts`.
    ///
    /// The final event always waits for a prompt, whatever its `response`.
    pub async fn send_interactive(
        &mut self,
        events: &[InteractiveEvent],
        prompts: &[PromptPattern],
    ) -> Result<InteractiveOutput> {
        let Some((last, leading)) = events.split_last() else {
            return Err(DriverError::InvalidConfig {
                message: "interactive sequence has no events".to_string(),
            }
            .into());
        };

        let _op = self.begin();
        let start = Instant::now();
        let mut steps = Vec::with_capacity(events.len());
        let mut raw = Vec::new();

        for event in leading {
            let step_start = Instant::now();
            let timeout = event.timeout.unwrap_or(self.timeout());
            let echo = (!event.hidden).then_some(event.input.as_str());
            let input = loggable(&event.input, event.hidden).to_string();

            self.buffer_mut().clear();
            self.write_line(&event.input, event.hidden).await?;

            let output = match event.response.as_deref() {
                Some(response) if !response.is_empty() => {
                    let from = self.read_contains(echo, response, timeout, start).await?;
                    let chunk = self.buffer_mut().take();
                    debug!("channel: interactive {:?} saw {:?}", input, response);
                    let output = String::from_utf8_lossy(&chunk[from..]).trim().to_string();
                    raw.extend_from_slice(&chunk);
                    output
                }
                _ => {
                    let step = self.read_prompt(echo, prompts, timeout, start).await?;
                    raw.extend_from_slice(&step.raw);
                    step.output
                }
            };
            steps.push(InteractiveStep {
                input,
                output,
                elapsed: step_start.elapsed(),
            });
        }

        let step_start = Instant::now();
        let timeout = last.timeout.unwrap_or(self.timeout());
        let echo = (!last.hidden).then_some(last.input.as_str());

        self.buffer_mut().clear();
        self.write_line(&last.input, last.hidden).await?;

        let ChannelOutput {
            raw: chunk,
            output,
            prompt,
            matched,
            ..
        } = self.read_prompt(echo, prompts, timeout, start).await?;
        raw.extend_from_slice(&chunk);
        steps.push(InteractiveStep {
            input: loggable(&last.input, last.hidden).to_string(),
            output,
            elapsed: step_start.elapsed(),
        });

        Ok(InteractiveOutput {
            steps,
            raw,
            prompt,
            matched,
            elapsed: start.elapsed(),
        })
    }
}
