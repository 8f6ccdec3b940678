//! Global platform registry for looking up platform definitions.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use log::debug;
use once_cell::sync::Lazy;

use super::definition::PlatformDefinition;
use super::vendors;
use crate::error::{PlatformError, Result};

/// Global platform registry.
static REGISTRY: Lazy<RwLock<PlatformRegistry>> = Lazy::new(|| {
    let mut registry = PlatformRegistry::new();
    registry.register_builtin_platforms();
    RwLock::new(registry)
});

/// Registry for platform definitions.
#[derive(Debug, Default)]
pub struct PlatformRegistry {
    platforms: HashMap<String, PlatformDefinition>,
}

impl PlatformRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            platforms: HashMap::new(),
        }
    }

    /// Get the global registry.
    pub fn global() -> &'static RwLock<PlatformRegistry> {
        &REGISTRY
    }

    /// Look up a platform in the global registry.
    pub fn lookup(name: &str) -> Result<PlatformDefinition> {
        Self::global()
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| {
                PlatformError::UnknownPlatform {
                    name: name.to_string(),
                }
                .into()
            })
    }

    /// Register a platform in the global registry.
    pub fn register_global(platform: PlatformDefinition) -> Result<()> {
        Self::global()
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(platform)
    }

    fn register_builtin_platforms(&mut self) {
        for platform in vendors::builtin() {
            self.platforms.insert(platform.name.clone(), platform);
        }
    }

    /// Register a validated platform definition.
    pub fn register(&mut self, platform: PlatformDefinition) -> Result<()> {
        if self.platforms.contains_key(&platform.name) {
            return Err(PlatformError::AlreadyRegistered {
                name: platform.name.clone(),
            }
            .into());
        }
        platform.validate()?;
        debug!("registry: registered platform {}", platform.name);
        self.platforms.insert(platform.name.clone(), platform);
        Ok(())
    }

    /// Get a platform by name.
    pub fn get(&self, name: &str) -> Option<&PlatformDefinition> {
        self.platforms.get(name)
    }

    /// Check if a platform is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.platforms.contains_key(name)
    }

    /// All registered platform names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.platforms.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
