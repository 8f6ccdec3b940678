//! Platform definition: everything the engine needs to know about a device
//! family.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use indexmap::IndexMap;

use super::privilege_level::{PrivilegeLevel, validate_tree};
use super::session::SessionTemplate;
use crate::channel::PromptPattern;
use crate::driver::GenericDriver;
use crate::error::{ChannelError, PlatformError, Result};

/// Generic "looks like a prompt" pattern used to tell an unknown prompt from
/// output that is still arriving.
pub const DEFAULT_BASE_PROMPT: &str = r"(?i)^[a-z0-9.\-@()/:]{1,48}[#>$]\s*$";

/// Hook run by the driver on open or close.
///
/// A plain function value rather than a trait object with several methods:
///
/// ```rust
/// use cliscrape::GenericDriver;
/// use cliscrape::platform::{HookFn, hook};
/// use futures_util::future::BoxFuture;
///
/// fn disable_paging(driver: &mut GenericDriver) -> BoxFuture<'_, cliscrape::Result<()>> {
///     Box::pin(async move {
///         driver.send_command("terminal length 0").await?;
///         Ok(())
///     })
/// }
///
/// let on_open: HookFn = hook(disable_paging);
/// ```
pub type HookFn =
    Arc<dyn for<'a> Fn(&'a mut GenericDriver) -> BoxFuture<'a, Result<()>> + Send + Sync>;

/// Wrap a function into a [`HookFn`].
pub fn hook<F>(f: F) -> HookFn
where
    F: for<'a> Fn(&'a mut GenericDriver) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Platform definition containing all vendor-specific configuration.
#[derive(Clone)]
pub struct PlatformDefinition {
    /// Platform name (e.g., "linux", "cisco_iosxe", "juniper_junos").
    pub name: String,

    /// Privilege levels, in declaration order.
    pub privilege_levels: IndexMap<String, PrivilegeLevel>,

    /// Level acquired after connecting.
    pub default_privilege: String,

    /// Level `send_config` enters, if the platform has one.
    pub config_privilege: Option<String>,

    /// Catch-all prompt used to detect prompts no level recognises.
    pub base_prompt: PromptPattern,

    /// Output substrings that mark a command as failed.
    pub failed_when_contains: Vec<String>,

    /// Commands to run when connection is established.
    pub on_open_commands: Vec<String>,

    /// Commands to run before connection is closed.
    pub on_close_commands: Vec<String>,

    /// Hook run once the default privilege is acquired, before the on-open
    /// commands.
    pub on_open: Option<HookFn>,

    /// Hook run before the on-close commands.
    pub on_close: Option<HookFn>,

    /// Template for named configuration sessions.
    pub session_template: Option<SessionTemplate>,

    /// Terminal width for PTY.
    pub terminal_width: u32,

    /// Terminal height for PTY.
    pub terminal_height: u32,
}

impl PlatformDefinition {
    /// Create an empty definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            privilege_levels: IndexMap::new(),
            default_privilege: String::new(),
            config_privilege: None,
            base_prompt: default_base_prompt(),
            failed_when_contains: vec![],
            on_open_commands: vec![],
            on_close_commands: vec![],
            on_open: None,
            on_close: None,
            session_template: None,
            terminal_width: 511,
            terminal_height: 24,
        }
    }

    /// Add a privilege level.
    pub fn with_privilege(mut self, level: PrivilegeLevel) -> Self {
        self.privilege_levels.insert(level.name.clone(), level);
        self
    }

    /// Set the default privilege level.
    pub fn with_default_privilege(mut self, name: impl Into<String>) -> Self {
        self.default_privilege = name.into();
        self
    }

    /// Set the level used by `send_config`.
    pub fn with_config_privilege(mut self, name: impl Into<String>) -> Self {
        self.config_privilege = Some(name.into());
        self
    }

    /// Replace the base prompt.
    pub fn with_base_prompt(mut self, pattern: &str) -> Result<Self> {
        self.base_prompt = PromptPattern::new(pattern).map_err(ChannelError::from)?;
        Ok(self)
    }

    /// Add a failure substring.
    pub fn with_failure_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.failed_when_contains.push(pattern.into());
        self
    }

    /// Add an on_open command.
    pub fn with_on_open_command(mut self, command: impl Into<String>) -> Self {
        self.on_open_commands.push(command.into());
        self
    }

    /// Add an on_close command.
    pub fn with_on_close_command(mut self, command: impl Into<String>) -> Self {
        self.on_close_commands.push(command.into());
        self
    }

    /// Set the on-open hook.
    pub fn with_on_open(mut self, hook: HookFn) -> Self {
        self.on_open = Some(hook);
        self
    }

    /// Set the on-close hook.
    pub fn with_on_close(mut self, hook: HookFn) -> Self {
        self.on_close = Some(hook);
        self
    }

    /// Set the named session template.
    pub fn with_session_template(mut self, template: SessionTemplate) -> Self {
        self.session_template = Some(template);
        self
    }

    /// Set terminal dimensions.
    pub fn with_terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_width = width;
        self.terminal_height = height;
        self
    }

    /// Get a privilege level by name.
    pub fn get_privilege(&self, name: &str) -> Option<&PrivilegeLevel> {
        self.privilege_levels.get(name)
    }

    /// Check the definition for structural errors.
    ///
    /// The levels must form one tree, and every level named elsewhere in the
    /// definition must exist.
    pub fn validate(&self) -> std::result::Result<(), PlatformError> {
        validate_tree(&self.privilege_levels)?;

        let missing = |what: &str, name: &str| PlatformError::InvalidDefinition {
            message: format!("{}: {} '{}' is not a privilege level", self.name, what, name),
        };

        if !self.privilege_levels.contains_key(&self.default_privilege) {
            return Err(missing("default privilege", &self.default_privilege));
        }
        if let Some(config) = &self.config_privilege {
            if !self.privilege_levels.contains_key(config) {
                return Err(missing("config privilege", config));
            }
        }
        if let Some(template) = &self.session_template {
            if !self.privilege_levels.contains_key(&template.parent) {
                return Err(missing("session parent", &template.parent));
            }
        }
        Ok(())
    }
}

fn default_base_prompt() -> PromptPattern {
    PromptPattern::new(DEFAULT_BASE_PROMPT).expect("default base prompt is a valid regex")
}

impl fmt::Debug for PlatformDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformDefinition")
            .field("name", &self.name)
            .field("privilege_levels", &self.privilege_levels)
            .field("default_privilege", &self.default_privilege)
            .field("config_privilege", &self.config_privilege)
            .field("base_prompt", &self.base_prompt)
            .field("failed_when_contains", &self.failed_when_contains)
            .field("on_open_commands", &self.on_open_commands)
            .field("on_close_commands", &self.on_close_commands)
            .field("on_open", &self.on_open.as_ref().map(|_| "<hook>"))
            .field("on_close", &self.on_close.as_ref().map(|_| "<hook>"))
            .field("session_template", &self.session_template)
            .field("terminal_width", &self.terminal_width)
            .field("terminal_height", &self.terminal_height)
            .finish()
    }
}
