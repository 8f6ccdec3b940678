//! Privilege level tree: classification, paths and dynamic levels.

use indexmap::IndexMap;
use log::debug;

use crate::channel::PromptPattern;
use crate::error::{DriverError, Result};
use crate::platform::{PrivilegeLevel, validate_tree};

/// Direction of a single transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Parent to child, using the child's escalate command.
    Escalate,
    /// Child to parent, using the child's deescalate command.
    Deescalate,
}

/// One step between adjacent levels.
#[derive(Debug, Clone)]
pub struct Transition {
    pub from: String,
    pub to: String,
    pub command: String,
    pub direction: Direction,
    /// Set when the step asks for the secondary credential.
    pub auth_prompt: Option<PromptPattern>,
}

/// Tracks the privilege tree of one connection and its current level.
///
/// Levels form a tree rooted at the single level without a parent. A path
/// between two levels climbs from the source to the lowest common ancestor
/// and descends to the target, so its length is the tree distance.
#[derive(Debug, Clone)]
pub struct PrivilegeManager {
    levels: IndexMap<String, PrivilegeLevel>,
    root: String,
    current: Option<String>,
}

impl PrivilegeManager {
    /// Build a manager, rejecting anything that is not a single tree.
    ///
    /// The current level starts unknown.
    pub fn new(levels: IndexMap<String, PrivilegeLevel>) -> Result<Self> {
        let root = validate_tree(&levels)?;
        Ok(Self {
            levels,
            root,
            current: None,
        })
    }

    /// The root level's name.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Get the current privilege level.
    pub fn current(&self) -> Option<&PrivilegeLevel> {
        self.current.as_ref().and_then(|name| self.levels.get(name))
    }

    /// Name of the current level, if known.
    pub fn current_name(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Set the current privilege level by name.
    pub fn set_current(&mut self, name: &str) -> Result<()> {
        self.level(name)?;
        self.current = Some(name.to_string());
        Ok(())
    }

    /// Forget the current level.
    pub fn clear_current(&mut self) {
        self.current = None;
    }

    /// Get a privilege level by name.
    pub fn get(&self, name: &str) -> Option<&PrivilegeLevel> {
        self.levels.get(name)
    }

    /// Get a privilege level or fail with `UnknownLevel`.
    pub fn level(&self, name: &str) -> Result<&PrivilegeLevel> {
        self.levels.get(name).ok_or_else(|| {
            DriverError::UnknownLevel {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// All levels in declaration order, dynamic ones last.
    pub fn levels(&self) -> impl Iterator<Item = &PrivilegeLevel> {
        self.levels.values()
    }

    /// Every level's prompt, in declaration order.
    pub fn prompts(&self) -> Vec<PromptPattern> {
        self.levels.values().map(|l| l.pattern.clone()).collect()
    }

    /// The level a prompt belongs to.
    ///
    /// When several levels match, the highest `rank` wins, then the one
    /// declared first.
    pub fn classify(&self, prompt: &str) -> Option<&PrivilegeLevel> {
        self.levels
            .values()
            .filter(|level| level.matches(prompt))
            .fold(None, |best: Option<&PrivilegeLevel>, level| match best {
                Some(b) if b.rank >= level.rank => Some(b),
                _ => Some(level),
            })
    }

    /// Classify or fail with `UnrecognizedPrompt`.
    pub fn determine_from_prompt(&self, prompt: &str) -> Result<&PrivilegeLevel> {
        self.classify(prompt).ok_or_else(|| {
            DriverError::UnrecognizedPrompt {
                prompt: prompt.to_string(),
            }
            .into()
        })
    }

    /// `name` followed by each of its ancestors up to the root.
    fn ancestry<'a>(&'a self, name: &'a str) -> Result<Vec<&'a str>> {
        let mut chain = vec![self.level(name)?.name.as_str()];
        let mut current = self.level(name)?;
        while let Some(parent) = &current.previous_priv {
            current = self.level(parent)?;
            chain.push(current.name.as_str());
        }
        Ok(chain)
    }

    /// Levels visited going from `from` to `to`, both included.
    pub fn find_path(&self, from: &str, to: &str) -> Result<Vec<String>> {
        let up = self.ancestry(from)?;
        let down = self.ancestry(to)?;

        let (up_len, down_len) = up
            .iter()
            .enumerate()
            .find_map(|(i, name)| down.iter().position(|d| d == name).map(|j| (i, j)))
            .ok_or_else(|| DriverError::NoPrivilegePath {
                from: from.to_string(),
                to: to.to_string(),
            })?;

        let mut path: Vec<String> = up[..=up_len].iter().map(|s| s.to_string()).collect();
        path.extend(down[..down_len].iter().rev().map(|s| s.to_string()));
        Ok(path)
    }

    /// The transition between two adjacent levels.
    pub fn get_transition(&self, from: &str, to: &str) -> Option<Transition> {
        let from_level = self.levels.get(from)?;
        let to_level = self.levels.get(to)?;

        if to_level.previous_priv.as_deref() == Some(from) {
            return Some(Transition {
                from: from.to_string(),
                to: to.to_string(),
                command: to_level.escalate_command.clone()?,
                direction: Direction::Escalate,
                auth_prompt: if to_level.escalate_auth {
                    to_level.auth_prompt().ok()
                } else {
                    None
                },
            });
        }

        if from_level.previous_priv.as_deref() == Some(to) {
            return Some(Transition {
                from: from.to_string(),
                to: to.to_string(),
                command: from_level.deescalate_command.clone()?,
                direction: Direction::Deescalate,
                auth_prompt: None,
            });
        }

        None
    }

    /// Every transition from `from` to `to`.
    pub fn transitions(&self, from: &str, to: &str) -> Result<Vec<Transition>> {
        self.find_path(from, to)?
            .windows(2)
            .map(|pair| {
                self.get_transition(&pair[0], &pair[1]).ok_or_else(|| {
                    DriverError::NoPrivilegePath {
                        from: pair[0].clone(),
                        to: pair[1].clone(),
                    }
                    .into()
                })
            })
            .collect()
    }

    /// Insert a level at runtime.
    ///
    /// A new leaf cannot create a cycle, so only the name and the parent
    /// are checked. Nothing changes on error.
    pub fn register(&mut self, mut level: PrivilegeLevel) -> Result<()> {
        if self.levels.contains_key(&level.name) {
            return Err(DriverError::DuplicateLevel { name: level.name }.into());
        }
        let parent = level
            .previous_priv
            .as_deref()
            .ok_or_else(|| DriverError::InvalidConfig {
                message: format!("dynamic level '{}' needs a parent", level.name),
            })?;
        self.level(parent)?;
        if level.escalate_command.is_none() || level.deescalate_command.is_none() {
            return Err(DriverError::InvalidConfig {
                message: format!(
                    "dynamic level '{}' needs escalate and deescalate commands",
                    level.name
                ),
            }
            .into());
        }

        level.dynamic = true;
        debug!("privilege: registered dynamic level {}", level.name);
        self.levels.insert(level.name.clone(), level);
        Ok(())
    }

    /// Remove a level added with [`register`](Self::register).
    ///
    /// Static levels and levels with children stay. If the removed level was
    /// current, the current level becomes unknown.
    pub fn remove_dynamic(&mut self, name: &str) -> Result<PrivilegeLevel> {
        let level = self.level(name)?;
        if !level.dynamic {
            return Err(DriverError::InvalidConfig {
                message: format!("'{name}' is a static privilege level"),
            }
            .into());
        }
        if self
            .levels
            .values()
            .any(|l| l.previous_priv.as_deref() == Some(name))
        {
            return Err(DriverError::InvalidConfig {
                message: format!("'{name}' still has child levels"),
            }
            .into());
        }

        if self.current.as_deref() == Some(name) {
            self.current = None;
        }
        debug!("privilege: removed dynamic level {}", name);
        self.levels
            .shift_remove(name)
            .ok_or_else(|| {
                DriverError::UnknownLevel {
                    name: name.to_string(),
                }
                .into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn level(name: &str, pattern: &str, parent: Option<&str>) -> PrivilegeLevel {
        let level = PrivilegeLevel::new(name, pattern).unwrap();
        match parent {
            Some(parent) => level
                .with_parent(parent)
                .with_escalate(format!("to {name}"))
                .with_deescalate(format!("leave {name}")),
            None => level,
        }
    }

    fn make_test_levels() -> IndexMap<String, PrivilegeLevel> {
        let user = level("user", r"^\w+>\s*$", None);
        let privileged = level("privileged", r"^\w+#\s*$", Some("user"))
            .with_auth(r"[Pp]assword:\s*$")
            .unwrap()
            .with_not_contains("(config");
        let configuration = level("configuration", r"^\w+\(config[^)]*\)#\s*$", Some("privileged"));
        let shell = level("shell", r"^\w+%\s*$", Some("user"));

        [user, privileged, configuration, shell]
            .into_iter()
            .map(|l| (l.name.clone(), l))
            .collect()
    }

    #[test]
    fn test_starts_unknown() {
        let manager = PrivilegeManager::new(make_test_levels()).unwrap();
        assert!(manager.current().is_none());
        assert_eq!(manager.root(), "user");
    }

    #[test]
    fn test_rejects_invalid_tree() {
        let mut levels = make_test_levels();
        levels.insert("orphan".to_string(), level("orphan", r"x", None));
        assert!(matches!(
            PrivilegeManager::new(levels),
            Err(Error::Platform(_))
        ));
    }

    #[test]
    fn test_classify() {
        let manager = PrivilegeManager::new(make_test_levels()).unwrap();
        assert_eq!(manager.classify("router>").unwrap().name, "user");
        assert_eq!(manager.classify("router#").unwrap().name, "privileged");
        assert_eq!(
            manager.classify("router(config)#").unwrap().name,
            "configuration"
        );
        assert!(manager.classify("login:").is_none());
        assert!(manager.determine_from_prompt("login:").is_err());
    }

    #[test]
    fn test_classify_rank_tie_break() {
        let mut levels = make_test_levels();
        levels.insert(
            "maintenance".to_string(),
            level("maintenance", r"^\w+#\s*$", Some("privileged")),
        );
        let manager = PrivilegeManager::new(levels.clone()).unwrap();
        // Equal rank: declared first wins
        assert_eq!(manager.classify("router#").unwrap().name, "privileged");

        levels["maintenance"].rank = 5;
        let manager = PrivilegeManager::new(levels).unwrap();
        assert_eq!(manager.classify("router#").unwrap().name, "maintenance");
    }

    #[test]
    fn test_find_path() {
        let manager = PrivilegeManager::new(make_test_levels()).unwrap();

        let path = manager.find_path("user", "configuration").unwrap();
        assert_eq!(path, vec!["user", "privileged", "configuration"]);

        let path = manager.find_path("configuration", "user").unwrap();
        assert_eq!(path, vec!["configuration", "privileged", "user"]);

        let path = manager.find_path("configuration", "shell").unwrap();
        assert_eq!(path, vec!["configuration", "privileged", "user", "shell"]);

        let path = manager.find_path("user", "user").unwrap();
        assert_eq!(path, vec!["user"]);

        assert!(manager.find_path("user", "nowhere").is_err());
    }

    #[test]
    fn test_get_transition() {
        let manager = PrivilegeManager::new(make_test_levels()).unwrap();

        let trans = manager.get_transition("user", "privileged").unwrap();
        assert_eq!(trans.command, "to privileged");
        assert_eq!(trans.direction, Direction::Escalate);
        assert!(trans.auth_prompt.is_some());

        let trans = manager.get_transition("privileged", "user").unwrap();
        assert_eq!(trans.command, "leave privileged");
        assert_eq!(trans.direction, Direction::Deescalate);
        assert!(trans.auth_prompt.is_none());

        assert!(manager.get_transition("user", "configuration").is_none());
    }

    #[test]
    fn test_register_and_remove_dynamic() {
        let mut manager = PrivilegeManager::new(make_test_levels()).unwrap();
        let session = level("s1", r"^\w+\(config-s-s1\)#\s*$", Some("privileged"));

        manager.register(session.clone()).unwrap();
        assert!(manager.get("s1").unwrap().dynamic);
        assert_eq!(manager.prompts().len(), 5);

        let err = manager.register(session).unwrap_err();
        assert!(matches!(
            err,
            Error::Driver(DriverError::DuplicateLevel { .. })
        ));

        manager.set_current("s1").unwrap();
        manager.remove_dynamic("s1").unwrap();
        assert!(manager.get("s1").is_none());
        assert!(manager.current().is_none());
    }

    #[test]
    fn test_register_unknown_parent_changes_nothing() {
        let mut manager = PrivilegeManager::new(make_test_levels()).unwrap();
        let session = level("s1", r"s1#", Some("nowhere"));
        assert!(manager.register(session).is_err());
        assert_eq!(manager.levels().count(), 4);
    }

    #[test]
    fn test_static_levels_cannot_be_removed() {
        let mut manager = PrivilegeManager::new(make_test_levels()).unwrap();
        assert!(manager.remove_dynamic("configuration").is_err());
        assert!(manager.get("configuration").is_some());
    }
}
