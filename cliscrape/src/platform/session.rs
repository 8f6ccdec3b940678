//! Templates for runtime-created privilege levels.
//!
//! Some platforms create a mode on demand: Arista's `configure session NAME`
//! lands in a prompt like `switch(config-s-NAME)#`. A [`SessionTemplate`]
//! describes such a mode once; [`SessionTemplate::build`] stamps out the
//! concrete level for one session name.

use serde::{Deserialize, Serialize};

use super::privilege_level::PrivilegeLevel;
use crate::error::{ChannelError, DriverError, Result};

/// Placeholder replaced by the session name.
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Description of a dynamically created privilege level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTemplate {
    /// Level the session is entered from and returns to.
    pub parent: String,

    /// Prompt regex; `{name}` becomes the (escaped, truncated) session name.
    pub pattern: String,

    /// Command entering the session; `{name}` becomes the full name.
    pub escalate: String,

    /// Command leaving the session.
    pub deescalate: String,

    /// Devices showing only the first N characters of the name in the prompt.
    #[serde(default)]
    pub name_truncate: Option<usize>,

    /// Substrings the session prompt must not contain.
    #[serde(default)]
    pub not_contains: Vec<String>,

    /// Command committing the session's changes.
    #[serde(default)]
    pub commit: Option<String>,

    /// Command discarding the session's changes.
    #[serde(default)]
    pub abort: Option<String>,
}

impl SessionTemplate {
    pub fn new(
        parent: impl Into<String>,
        pattern: impl Into<String>,
        escalate: impl Into<String>,
        deescalate: impl Into<String>,
    ) -> Self {
        Self {
            parent: parent.into(),
            pattern: pattern.into(),
            escalate: escalate.into(),
            deescalate: deescalate.into(),
            name_truncate: None,
            not_contains: Vec::new(),
            commit: None,
            abort: None,
        }
    }

    /// Only the first `chars` characters of the name appear in the prompt.
    pub fn with_name_truncate(mut self, chars: usize) -> Self {
        self.name_truncate = Some(chars);
        self
    }

    pub fn with_not_contains(mut self, substring: impl Into<String>) -> Self {
        self.not_contains.push(substring.into());
        self
    }

    pub fn with_commit(mut self, command: impl Into<String>) -> Self {
        self.commit = Some(command.into());
        self
    }

    pub fn with_abort(mut self, command: impl Into<String>) -> Self {
        self.abort = Some(command.into());
        self
    }

    /// The part of `name` the device shows in its prompt.
    pub fn prompt_name<'a>(&self, name: &'a str) -> &'a str {
        match self.name_truncate {
            Some(chars) => match name.char_indices().nth(chars) {
                Some((end, _)) => &name[..end],
                None => name,
            },
            None => name,
        }
    }

    /// Build the dynamic level for session `name`.
    pub fn build(&self, name: &str) -> Result<PrivilegeLevel> {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(DriverError::InvalidConfig {
                message: format!("invalid session name {name:?}"),
            }
            .into());
        }

        let pattern = self
            .pattern
            .replace(NAME_PLACEHOLDER, &regex::escape(self.prompt_name(name)));
        let mut level = PrivilegeLevel::new(name, &pattern)
            .map_err(ChannelError::from)?
            .with_parent(&self.parent)
            .with_escalate(self.escalate.replace(NAME_PLACEHOLDER, name))
            .with_deescalate(&self.deescalate);
        for substring in &self.not_contains {
            level = level.with_not_contains(substring);
        }
        level.dynamic = true;
        Ok(level)
    }
}
