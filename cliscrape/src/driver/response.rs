//! Response type for command execution results.

use std::time::{Duration, SystemTime};

use crate::channel::{ChannelOutput, InteractiveOutput};

/// Response from a command execution.
#[derive(Debug, Clone)]
pub struct Response {
    /// The command that was executed (secrets masked).
    pub command: String,

    /// The command output with echo and trailing prompt removed.
    pub result: String,

    /// Everything read for this command, ANSI-stripped.
    pub raw_result: Vec<u8>,

    /// The prompt that was matched at the end.
    pub prompt: String,

    /// Wall-clock time the command was sent.
    pub start_time: SystemTime,

    /// Wall-clock time the prompt was seen.
    pub end_time: SystemTime,

    /// Time taken to execute the command.
    pub elapsed: Duration,

    /// The failed-when substring found in the output, if any.
    pub failure_message: Option<String>,
}

impl Response {
    /// Create a successful response.
    pub fn new(
        command: impl Into<String>,
        result: impl Into<String>,
        raw_result: Vec<u8>,
        prompt: impl Into<String>,
        start_time: SystemTime,
        elapsed: Duration,
    ) -> Self {
        Self {
            command: command.into(),
            result: result.into(),
            raw_result,
            prompt: prompt.into(),
            start_time,
            end_time: start_time + elapsed,
            elapsed,
            failure_message: None,
        }
    }

    /// Build from a channel read, classifying with `failed_when`.
    pub fn from_output(
        command: impl Into<String>,
        output: ChannelOutput,
        start_time: SystemTime,
        failed_when: &[String],
    ) -> Self {
        Self::new(
            command,
            output.output,
            output.raw,
            output.prompt,
            start_time,
            output.elapsed,
        )
        .classify(failed_when)
    }

    /// Build from an interactive sequence, classifying with `failed_when`.
    pub fn from_interactive(
        output: InteractiveOutput,
        start_time: SystemTime,
        failed_when: &[String],
    ) -> Self {
        let command = output
            .steps
            .iter()
            .map(|s| s.input.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Self::new(
            command,
            output.full_output(),
            output.raw,
            output.prompt,
            start_time,
            output.elapsed,
        )
        .classify(failed_when)
    }

    /// Mark the response failed on the first `failed_when` substring found.
    pub fn classify(mut self, failed_when: &[String]) -> Self {
        self.failure_message = failed_when
            .iter()
            .find(|pattern| self.result.contains(pattern.as_str()))
            .cloned();
        self
    }

    /// Check if the response indicates success.
    pub fn is_success(&self) -> bool {
        self.failure_message.is_none()
    }

    /// Lossy text of the raw output.
    pub fn raw_text(&self) -> String {
        String::from_utf8_lossy(&self.raw_result).into_owned()
    }

    /// Get the result lines as an iterator.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.result.lines()
    }

    /// Check if the result contains a substring.
    pub fn contains(&self, pattern: &str) -> bool {
        self.result.contains(pattern)
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(text: &str) -> ChannelOutput {
        ChannelOutput {
            raw: format!("cmd\n{text}\nrouter#").into_bytes(),
            output: text.to_string(),
            prompt: "router#".to_string(),
            matched: 0,
            elapsed: Duration::from_millis(20),
        }
    }

    #[test]
    fn test_success() {
        let start = SystemTime::now();
        let response = Response::from_output("cmd", output("all good"), start, &[]);
        assert!(response.is_success());
        assert_eq!(response.end_time, start + Duration::from_millis(20));
        assert_eq!(response.to_string(), "all good");
    }

    #[test]
    fn test_failed_when() {
        let failed_when = vec!["% Invalid input".to_string(), "% Error".to_string()];
        let response = Response::from_output(
            "shw ver",
            output("% Invalid input detected at '^' marker."),
            SystemTime::now(),
            &failed_when,
        );
        assert!(!response.is_success());
        assert_eq!(response.failure_message.as_deref(), Some("% Invalid input"));
    }

    #[test]
    fn test_failed_when_ignores_prompt_and_echo() {
        // The substring only appears in the echoed command
        let mut out = output("ok");
        out.raw = b"echo error:\nok\nrouter#".to_vec();
        let response =
            Response::from_output("echo error:", out, SystemTime::now(), &["error:".to_string()]);
        assert!(response.is_success());
    }
}
