//! Declarative platform records.
//!
//! A [`PlatformSpec`] is the data-only form of a [`PlatformDefinition`]: it
//! can be deserialized from any serde format and converted with `TryFrom`.
//! Hooks are code and have no data form.

use serde::{Deserialize, Serialize};

use super::definition::{DEFAULT_BASE_PROMPT, PlatformDefinition};
use super::privilege_level::PrivilegeLevel;
use super::session::SessionTemplate;
use crate::channel::PromptPattern;
use crate::error::{Error, PlatformError};

/// Data form of a [`PrivilegeLevel`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivilegeLevelSpec {
    pub name: String,
    pub pattern: String,
    #[serde(default)]
    pub not_contains: Vec<String>,
    #[serde(default)]
    pub previous_priv: Option<String>,
    #[serde(default)]
    pub escalate: Option<String>,
    #[serde(default)]
    pub deescalate: Option<String>,
    #[serde(default)]
    pub escalate_auth: bool,
    #[serde(default)]
    pub escalate_prompt: Option<String>,
    #[serde(default = "yes")]
    pub requestable: bool,
    #[serde(default)]
    pub rank: i32,
}

/// Data form of a [`PlatformDefinition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSpec {
    pub name: String,
    pub default_privilege: String,
    pub privilege_levels: Vec<PrivilegeLevelSpec>,
    #[serde(default)]
    pub config_privilege: Option<String>,
    #[serde(default = "default_base_prompt")]
    pub base_prompt: String,
    #[serde(default)]
    pub failed_when_contains: Vec<String>,
    #[serde(default)]
    pub on_open_commands: Vec<String>,
    #[serde(default)]
    pub on_close_commands: Vec<String>,
    #[serde(default)]
    pub session_template: Option<SessionTemplate>,
    #[serde(default = "default_width")]
    pub terminal_width: u32,
    #[serde(default = "default_height")]
    pub terminal_height: u32,
}

fn yes() -> bool {
    true
}

fn default_base_prompt() -> String {
    DEFAULT_BASE_PROMPT.to_string()
}

fn default_width() -> u32 {
    511
}

fn default_height() -> u32 {
    24
}

fn bad_pattern(level: &str, e: regex::Error) -> PlatformError {
    PlatformError::InvalidDefinition {
        message: format!("privilege level '{level}': {e}"),
    }
}

impl TryFrom<PrivilegeLevelSpec> for PrivilegeLevel {
    type Error = PlatformError;

    fn try_from(spec: PrivilegeLevelSpec) -> Result<Self, Self::Error> {
        let pattern = PromptPattern::with_not_contains(&spec.pattern, spec.not_contains)
            .map_err(|e| bad_pattern(&spec.name, e))?;
        let escalate_prompt = match &spec.escalate_prompt {
            Some(prompt) => {
                Some(PromptPattern::new(prompt).map_err(|e| bad_pattern(&spec.name, e))?)
            }
            None => None,
        };

        Ok(PrivilegeLevel {
            name: spec.name,
            pattern,
            previous_priv: spec.previous_priv,
            escalate_command: spec.escalate,
            deescalate_command: spec.deescalate,
            escalate_auth: spec.escalate_auth || escalate_prompt.is_some(),
            escalate_prompt,
            requestable: spec.requestable,
            rank: spec.rank,
            dynamic: false,
        })
    }
}

impl TryFrom<PlatformSpec> for PlatformDefinition {
    type Error = Error;

    /// Convert and validate.
    fn try_from(spec: PlatformSpec) -> Result<Self, Self::Error> {
        let mut platform = PlatformDefinition::new(spec.name)
            .with_default_privilege(spec.default_privilege)
            .with_base_prompt(&spec.base_prompt)?
            .with_terminal_size(spec.terminal_width, spec.terminal_height);

        for level in spec.privilege_levels {
            let level = PrivilegeLevel::try_from(level)?;
            if platform.privilege_levels.contains_key(&level.name) {
                return Err(PlatformError::InvalidDefinition {
                    message: format!("duplicate privilege level '{}'", level.name),
                }
                .into());
            }
            platform = platform.with_privilege(level);
        }

        platform.config_privilege = spec.config_privilege;
        platform.failed_when_contains = spec.failed_when_contains;
        platform.on_open_commands = spec.on_open_commands;
        platform.on_close_commands = spec.on_close_commands;
        platform.session_template = spec.session_template;

        platform.validate()?;
        Ok(platform)
    }
}

impl PlatformDefinition {
    /// Build a definition from its data form.
    pub fn from_spec(spec: PlatformSpec) -> crate::error::Result<Self> {
        Self::try_from(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IOS_LIKE: &str = r#"{
        "name": "lab_ios",
        "default_privilege": "privilege_exec",
        "config_privilege": "configuration",
        "privilege_levels": [
            { "name": "exec", "pattern": "^[\\w.\\-]{1,63}>\\s*$" },
            {
                "name": "privilege_exec",
                "pattern": "^[\\w.\\-]{1,63}#\\s*$",
                "not_contains": ["(config"],
                "previous_priv": "exec",
                "escalate": "enable",
                "deescalate": "disable",
                "escalate_auth": true,
                "escalate_prompt": "^[Pp]assword:\\s*$"
            },
            {
                "name": "configuration",
                "pattern": "^[\\w.\\-]{1,63}\\(config[\\w.\\-@/:+]{0,32}\\)#\\s*$",
                "previous_priv": "privilege_exec",
                "escalate": "configure terminal",
                "deescalate": "end"
            }
        ],
        "failed_when_contains": ["% Invalid input"],
        "on_open_commands": ["terminal length 0"]
    }"#;

    #[test]
    fn test_platform_from_json() {
        let spec: PlatformSpec = serde_json::from_str(IOS_LIKE).unwrap();
        let platform = PlatformDefinition::try_from(spec).unwrap();

        assert_eq!(platform.name, "lab_ios");
        assert_eq!(platform.privilege_levels.len(), 3);
        assert_eq!(platform.terminal_width, 511);
        assert_eq!(platform.base_prompt.as_str(), DEFAULT_BASE_PROMPT);

        let privileged = platform.get_privilege("privilege_exec").unwrap();
        assert!(privileged.escalate_auth);
        assert!(privileged.requestable);
        assert!(privileged.matches("router#"));
        assert!(!privileged.matches("router(config)#"));
    }

    #[test]
    fn test_invalid_pattern_is_platform_error() {
        let spec = PrivilegeLevelSpec {
            name: "broken".to_string(),
            pattern: "([".to_string(),
            not_contains: vec![],
            previous_priv: None,
            escalate: None,
            deescalate: None,
            escalate_auth: false,
            escalate_prompt: None,
            requestable: true,
            rank: 0,
        };
        assert!(matches!(
            PrivilegeLevel::try_from(spec),
            Err(PlatformError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn test_invalid_tree_rejected() {
        let mut spec: PlatformSpec = serde_json::from_str(IOS_LIKE).unwrap();
        spec.privilege_levels[2].previous_priv = Some("nowhere".to_string());
        assert!(PlatformDefinition::try_from(spec).is_err());
    }

    #[test]
    fn test_duplicate_level_rejected() {
        let mut spec: PlatformSpec = serde_json::from_str(IOS_LIKE).unwrap();
        let copy = spec.privilege_levels[1].clone();
        spec.privilege_levels.push(copy);
        assert!(PlatformDefinition::try_from(spec).is_err());
    }
}
