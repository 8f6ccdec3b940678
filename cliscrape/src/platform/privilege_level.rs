//! Privilege level definition and tree validation.

use indexmap::IndexMap;

use crate::channel::PromptPattern;
use crate::error::PlatformError;

/// Auth prompt used when a level requires auth but names no prompt.
pub const DEFAULT_AUTH_PROMPT: &str = r"(?i)password( for \S+)?:\s*$";

/// A named operating mode of a device.
///
/// Levels form a tree: each level except the root names its parent
/// (`previous_priv`), the command that enters it from the parent and the
/// command that leaves it back to the parent.
#[derive(Debug, Clone, PartialEq)]
pub struct PrivilegeLevel {
    /// Name of this privilege level (e.g., "exec", "privilege_exec", "configuration").
    pub name: String,

    /// Prompt of this level, including its negative substrings.
    pub pattern: PromptPattern,

    /// Name of the parent level (None for the root).
    pub previous_priv: Option<String>,

    /// Command to escalate TO this level from the parent.
    pub escalate_command: Option<String>,

    /// Command to de-escalate FROM this level to the parent.
    pub deescalate_command: Option<String>,

    /// Whether escalation asks for a secondary credential.
    pub escalate_auth: bool,

    /// Prompt asking for the secondary credential.
    pub escalate_prompt: Option<PromptPattern>,

    /// Whether callers may acquire this level directly.
    pub requestable: bool,

    /// Tie-break when several level patterns match one prompt; highest wins.
    pub rank: i32,

    /// Registered at runtime rather than declared by the platform.
    pub dynamic: bool,
}

impl PrivilegeLevel {
    /// Create a root-less level with the given prompt pattern.
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            pattern: PromptPattern::new(pattern)?,
            previous_priv: None,
            escalate_command: None,
            deescalate_command: None,
            escalate_auth: false,
            escalate_prompt: None,
            requestable: true,
            rank: 0,
            dynamic: false,
        })
    }

    /// Set the parent privilege level.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.previous_priv = Some(parent.into());
        self
    }

    /// Set the escalation command.
    pub fn with_escalate(mut self, command: impl Into<String>) -> Self {
        self.escalate_command = Some(command.into());
        self
    }

    /// Set the de-escalation command.
    pub fn with_deescalate(mut self, command: impl Into<String>) -> Self {
        self.deescalate_command = Some(command.into());
        self
    }

    /// Escalation asks for a secondary credential at `prompt_pattern`.
    pub fn with_auth(mut self, prompt_pattern: &str) -> Result<Self, regex::Error> {
        self.escalate_auth = true;
        self.escalate_prompt = Some(PromptPattern::new(prompt_pattern)?);
        Ok(self)
    }

    /// Add a substring that must not appear in this level's prompt.
    pub fn with_not_contains(mut self, substring: impl Into<String>) -> Self {
        self.pattern = self.pattern.not_containing(substring);
        self
    }

    pub fn with_rank(mut self, rank: i32) -> Self {
        self.rank = rank;
        self
    }

    /// Recognised and traversed, never a direct target.
    pub fn not_requestable(mut self) -> Self {
        self.requestable = false;
        self
    }

    /// Whether `prompt` (the prompt line) belongs to this level.
    pub fn matches(&self, prompt: &str) -> bool {
        self.pattern.find_at_tail(prompt.as_bytes()).is_some()
    }

    /// The negative substrings of this level's prompt.
    pub fn not_contains(&self) -> &[String] {
        self.pattern.negatives()
    }

    /// The auth prompt, falling back to a generic password prompt.
    pub fn auth_prompt(&self) -> Result<PromptPattern, regex::Error> {
        match &self.escalate_prompt {
            Some(prompt) => Ok(prompt.clone()),
            None => PromptPattern::new(DEFAULT_AUTH_PROMPT),
        }
    }
}

/// Check that `levels` form a single tree; returns the root's name.
///
/// Every parent must exist, exactly one level may lack a parent and every
/// chain of parents must end at that root.
pub fn validate_tree(levels: &IndexMap<String, PrivilegeLevel>) -> Result<String, PlatformError> {
    let invalid = |message: String| PlatformError::InvalidDefinition { message };

    let roots: Vec<&str> = levels
        .values()
        .filter(|l| l.previous_priv.is_none())
        .map(|l| l.name.as_str())
        .collect();
    let root = match roots.as_slice() {
        [root] => root.to_string(),
        [] => return Err(invalid("no root privilege level".to_string())),
        many => return Err(invalid(format!("multiple root privilege levels: {many:?}"))),
    };

    for (key, level) in levels {
        if key != &level.name {
            return Err(invalid(format!(
                "privilege level '{}' stored under key '{}'",
                level.name, key
            )));
        }
        if let Some(parent) = &level.previous_priv {
            if !levels.contains_key(parent) {
                return Err(invalid(format!(
                    "privilege level '{}' has unknown parent '{}'",
                    level.name, parent
                )));
            }
            if level.escalate_command.is_none() {
                return Err(invalid(format!(
                    "privilege level '{}' has no escalate command",
                    level.name
                )));
            }
            if level.deescalate_command.is_none() {
                return Err(invalid(format!(
                    "privilege level '{}' has no deescalate command",
                    level.name
                )));
            }
        }

        let mut current = level;
        let mut steps = 0;
        while let Some(parent) = &current.previous_priv {
            steps += 1;
            if steps > levels.len() {
                return Err(invalid(format!(
                    "privilege level '{}' is part of a cycle",
                    level.name
                )));
            }
            current = levels.get(parent).ok_or_else(|| {
                invalid(format!(
                    "privilege level '{}' has unknown parent '{}'",
                    current.name, parent
                ))
            })?;
        }
    }

    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(levels: Vec<PrivilegeLevel>) -> IndexMap<String, PrivilegeLevel> {
        levels.into_iter().map(|l| (l.name.clone(), l)).collect()
    }

    fn child(name: &str, parent: &str) -> PrivilegeLevel {
        PrivilegeLevel::new(name, &format!(r"^{name}#\s*$"))
            .unwrap()
            .with_parent(parent)
            .with_escalate(format!("enter {name}"))
            .with_deescalate("exit")
    }

    #[test]
    fn test_matches_respects_not_contains() {
        let level = PrivilegeLevel::new("privilege_exec", r"^\S+#\s*$")
            .unwrap()
            .with_not_contains("(config");
        assert!(level.matches("router#"));
        assert!(!level.matches("router(config)#"));
    }

    #[test]
    fn test_auth_prompt_fallback() {
        let level = child("root", "user");
        assert!(level.auth_prompt().unwrap().is_match(b"[sudo] password for admin: "));
        assert!(level.auth_prompt().unwrap().is_match(b"Password:"));
    }

    #[test]
    fn test_valid_tree() {
        let levels = tree(vec![
            PrivilegeLevel::new("exec", r">\s*$").unwrap(),
            child("privilege_exec", "exec"),
            child("configuration", "privilege_exec"),
        ]);
        assert_eq!(validate_tree(&levels).unwrap(), "exec");
    }

    #[test]
    fn test_two_roots_rejected() {
        let levels = tree(vec![
            PrivilegeLevel::new("a", r"a>\s*$").unwrap(),
            PrivilegeLevel::new("b", r"b>\s*$").unwrap(),
        ]);
        assert!(validate_tree(&levels).is_err());
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let levels = tree(vec![
            PrivilegeLevel::new("exec", r">\s*$").unwrap(),
            child("configuration", "privilege_exec"),
        ]);
        assert!(validate_tree(&levels).is_err());
    }

    #[test]
    fn test_cycle_rejected() {
        let levels = tree(vec![
            PrivilegeLevel::new("exec", r">\s*$").unwrap(),
            child("a", "b"),
            child("b", "a"),
        ]);
        assert!(matches!(
            validate_tree(&levels),
            Err(PlatformError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn test_empty_rejected() {
        assert!(validate_tree(&IndexMap::new()).is_err());
    }
}
