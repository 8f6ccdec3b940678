//! Configuration session traits and RAII guards.
//!
//! Config sessions are treated as **transactions** layered on privilege
//! levels. They use Rust's ownership system for safety:
//! - The guard holds `&mut GenericDriver`, preventing concurrent driver use
//! - `commit()`/`abort()` consume the guard, ensuring single-use
//! - `detach()` releases the guard without ending the session
//!
//! # Example
//!
//! ```rust,no_run
//! use cliscrape::DriverBuilder;
//! use cliscrape::driver::ConfigSession;
//!
//! # async fn example() -> cliscrape::Result<()> {
//! let mut driver = DriverBuilder::new("192.168.1.1")
//!     .username("admin")
//!     .password("secret")
//!     .platform("arista_eos")
//!     .build()?;
//! driver.open().await?;
//!
//! let mut session = driver.named_config_session("uplinks").await?;
//! session.send_command("interface Ethernet1").await?;
//! session.send_command("description core").await?;
//! session.commit().await?; // consumes session, returns to original privilege
//! # Ok(())
//! # }
//! ```

use std::future::Future;

use log::{debug, warn};

use super::generic::GenericDriver;
use super::response::Response;
use crate::error::{DriverError, Error, Result};

/// Core configuration session trait.
///
/// `commit()`, `abort()` and `detach()` consume the session by value,
/// enforcing single use at compile time.
pub trait ConfigSession: Send {
    /// Send a command within the configuration session.
    fn send_command(&mut self, cmd: &str) -> impl Future<Output = Result<Response>> + Send;

    /// Commit the configuration and leave the session.
    fn commit(self) -> impl Future<Output = Result<()>> + Send;

    /// Discard the configuration and leave the session.
    fn abort(self) -> impl Future<Output = Result<()>> + Send;

    /// Release the guard without committing or aborting.
    ///
    /// The session stays active on the device.
    fn detach(self) -> Result<()>;
}

/// Named configuration sessions.
pub trait NamedSession: ConfigSession {
    /// Get the session name.
    fn session_name(&self) -> &str;
}

/// RAII guard for the platform's configuration level.
///
/// Entering acquires `config_privilege`; commit and abort both return to the
/// level the driver was in before. Platforms without candidate configuration
/// apply each command immediately, so the two only differ in intent.
pub struct GenericConfigSession<'a> {
    driver: &'a mut GenericDriver,
    original_privilege: String,
    config_privilege: String,
    consumed: bool,
}

impl<'a> GenericConfigSession<'a> {
    /// Enter the platform's configuration level.
    pub async fn new(driver: &'a mut GenericDriver) -> Result<Self> {
        let config_privilege = driver.platform().config_privilege.clone().ok_or_else(|| {
            Error::from(DriverError::InvalidConfig {
                message: format!(
                    "platform {} has no configuration level",
                    driver.platform().name
                ),
            })
        })?;
        let original_privilege = driver
            .current_privilege()
            .unwrap_or(&driver.platform().default_privilege)
            .to_string();

        driver.acquire_privilege(&config_privilege).await?;

        Ok(Self {
            driver,
            original_privilege,
            config_privilege,
            consumed: false,
        })
    }

    async fn leave(&mut self) -> Result<()> {
        self.consumed = true;
        if self.original_privilege != self.config_privilege {
            self.driver
                .acquire_privilege(&self.original_privilege)
                .await?;
        }
        Ok(())
    }
}

impl ConfigSession for GenericConfigSession<'_> {
    async fn send_command(&mut self, cmd: &str) -> Result<Response> {
        self.driver.send_command(cmd).await
    }

    async fn commit(mut self) -> Result<()> {
        self.leave().await
    }

    async fn abort(mut self) -> Result<()> {
        self.leave().await
    }

    fn detach(mut self) -> Result<()> {
        self.consumed = true;
        Ok(())
    }
}

impl Drop for GenericConfigSession<'_> {
    fn drop(&mut self) {
        if !self.consumed {
            warn!("GenericConfigSession dropped without explicit commit/abort/detach");
        }
    }
}

/// RAII guard for a named session built from the platform's
/// [`SessionTemplate`](crate::platform::SessionTemplate).
///
/// Entering registers the session as a dynamic privilege level (or reuses
/// it when a detached session of that name is still registered) and
/// acquires it. Commit and abort send the template's command, return to the
/// original level and remove the dynamic level. Detach keeps the level so
/// the session can be re-entered later.
pub struct NamedConfigSession<'a> {
    driver: &'a mut GenericDriver,
    name: String,
    original_privilege: String,
    commit_command: Option<String>,
    abort_command: Option<String>,
    consumed: bool,
}

impl<'a> NamedConfigSession<'a> {
    /// Enter (or re-enter) the named session `name`.
    pub async fn new(driver: &'a mut GenericDriver, name: &str) -> Result<Self> {
        let template = driver.platform().session_template.clone().ok_or_else(|| {
            Error::from(DriverError::InvalidConfig {
                message: format!("platform {} has no session template", driver.platform().name),
            })
        })?;

        let existing = driver.privilege_manager().get(name).map(|level| level.dynamic);
        let registered_here = match existing {
            Some(true) => false,
            Some(false) => {
                return Err(DriverError::DuplicateLevel {
                    name: name.to_string(),
                }
                .into());
            }
            None => {
                driver.register_session_with(name, &template)?;
                true
            }
        };

        let original_privilege = match driver.current_privilege() {
            Some(current) if current != name => current.to_string(),
            _ => template.parent.clone(),
        };

        if let Err(e) = driver.acquire_privilege(name).await {
            if registered_here {
                let _ = driver.remove_dynamic_level(name);
            }
            return Err(e);
        }
        debug!("config session {} entered from {}", name, original_privilege);

        Ok(Self {
            driver,
            name: name.to_string(),
            original_privilege,
            commit_command: template.commit,
            abort_command: template.abort,
            consumed: false,
        })
    }

    /// Send `command` (if any), return to the original level and drop the
    /// dynamic level.
    async fn finish(&mut self, command: Option<String>) -> Result<()> {
        self.consumed = true;
        if let Some(command) = command {
            let response = self.driver.send_command(&command).await?;
            if let Some(failure) = response.failure_message {
                return Err(DriverError::CommandFailed {
                    message: format!("{:?} in session {}: {}", command, self.name, failure),
                }
                .into());
            }
        }
        self.driver
            .acquire_privilege(&self.original_privilege)
            .await?;
        self.driver.remove_dynamic_level(&self.name)
    }
}

impl ConfigSession for NamedConfigSession<'_> {
    async fn send_command(&mut self, cmd: &str) -> Result<Response> {
        self.driver.send_command(cmd).await
    }

    async fn commit(mut self) -> Result<()> {
        let command = self.commit_command.take();
        self.finish(command).await
    }

    async fn abort(mut self) -> Result<()> {
        let command = self.abort_command.take();
        self.finish(command).await
    }

    fn detach(mut self) -> Result<()> {
        self.consumed = true;
        debug!("config session {} detached", self.name);
        Ok(())
    }
}

impl NamedSession for NamedConfigSession<'_> {
    fn session_name(&self) -> &str {
        &self.name
    }
}

impl Drop for NamedConfigSession<'_> {
    fn drop(&mut self) {
        if !self.consumed {
            warn!(
                "NamedConfigSession {:?} dropped without explicit commit/abort/detach",
                self.name
            );
        }
    }
}

impl GenericDriver {
    /// Enter the platform's configuration level as a guarded session.
    pub async fn config_session(&mut self) -> Result<GenericConfigSession<'_>> {
        GenericConfigSession::new(self).await
    }

    /// Enter the named session `name` from the platform's session template.
    pub async fn named_config_session(&mut self, name: &str) -> Result<NamedConfigSession<'_>> {
        NamedConfigSession::new(self, name).await
    }
}
