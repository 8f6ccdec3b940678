//! Blocking facade over [`GenericDriver`].
//!
//! Each call runs the async engine to completion on a current-thread tokio
//! runtime owned by the driver: one connection, one thread, no executor to
//! set up. Background work of the transport (SSH keepalives) only makes
//! progress while a call is running.

use std::time::Duration;

use log::debug;
use tokio::runtime::{Builder, Runtime};

use super::generic::GenericDriver;
use super::response::Response;
use crate::channel::{CancelHandle, InteractiveEvent};
use crate::error::{Result, TransportError};

/// Synchronous driver owning its own runtime.
///
/// ```rust,no_run
/// use cliscrape::DriverBuilder;
///
/// # fn example() -> cliscrape::Result<()> {
/// let mut driver = DriverBuilder::new("192.168.1.1")
///     .username("admin")
///     .password("secret")
///     .platform("cisco_iosxe")
///     .build_blocking()?;
/// driver.open()?;
/// let response = driver.send_command("show version")?;
/// println!("{}", response.result);
/// driver.close()?;
/// # Ok(())
/// # }
/// ```
pub struct BlockingDriver {
    runtime: Runtime,
    driver: GenericDriver,
}

impl BlockingDriver {
    /// Wrap `driver` with a fresh current-thread runtime.
    ///
    /// Must not be called from inside an async context; `block_on` would
    /// panic there.
    pub fn new(driver: GenericDriver) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(TransportError::Io)?;
        debug!("blocking: runtime ready for {}", driver.platform().name);
        Ok(Self { runtime, driver })
    }

    pub fn open(&mut self) -> Result<()> {
        self.runtime.block_on(self.driver.open())
    }

    pub fn close(&mut self) -> Result<()> {
        self.runtime.block_on(self.driver.close())
    }

    pub fn send_command(&mut self, command: &str) -> Result<Response> {
        self.runtime.block_on(self.driver.send_command(command))
    }

    pub fn send_commands(&mut self, commands: &[&str]) -> Result<Vec<Response>> {
        self.runtime.block_on(self.driver.send_commands(commands))
    }

    pub fn send_interactive(&mut self, events: &[InteractiveEvent]) -> Result<Response> {
        self.runtime.block_on(self.driver.send_interactive(events))
    }

    pub fn send_config(&mut self, commands: &[&str]) -> Result<Vec<Response>> {
        self.runtime.block_on(self.driver.send_config(commands))
    }

    pub fn acquire_privilege(&mut self, target: &str) -> Result<()> {
        self.runtime.block_on(self.driver.acquire_privilege(target))
    }

    pub fn get_current_level(&mut self) -> Result<String> {
        self.runtime.block_on(self.driver.get_current_level())
    }

    pub fn register_session(&mut self, name: &str) -> Result<()> {
        self.driver.register_session(name)
    }

    pub fn remove_dynamic_level(&mut self, name: &str) -> Result<()> {
        self.driver.remove_dynamic_level(name)
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.driver.set_timeout(timeout);
    }

    /// Handle usable from another thread to cancel the operation in flight.
    ///
    /// A cancel requested while no operation runs is discarded.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.driver.cancel_handle()
    }

    pub fn current_privilege(&self) -> Option<&str> {
        self.driver.current_privilege()
    }

    pub fn is_open(&self) -> bool {
        self.driver.is_open()
    }

    pub fn is_alive(&self) -> bool {
        self.driver.is_alive()
    }

    /// The wrapped async driver.
    pub fn inner(&self) -> &GenericDriver {
        &self.driver
    }

    pub fn inner_mut(&mut self) -> &mut GenericDriver {
        &mut self.driver
    }

    /// Give the async driver back, dropping the runtime.
    pub fn into_inner(self) -> GenericDriver {
        self.driver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelConfig;
    use crate::platform::{PlatformDefinition, PrivilegeLevel};
    use crate::transport::ScriptedTransport;

    #[test]
    fn test_blocking_round_trip() {
        let transport = ScriptedTransport::new()
            .reply("host$ ")
            .expect_write("\n")
            .reply("\nhost$ ")
            .expect_write("uptime\n")
            .reply("uptime\n10:00 up 1 day\nhost$ ");
        let platform = PlatformDefinition::new("shell")
            .with_privilege(PrivilegeLevel::new("user", r"^\S+\$\s*$").unwrap())
            .with_default_privilege("user");
        let driver =
            GenericDriver::new(Box::new(transport), platform, ChannelConfig::default()).unwrap();

        let mut driver = BlockingDriver::new(driver).unwrap();
        driver.open().unwrap();
        let response = driver.send_command("uptime").unwrap();
        assert_eq!(response.result, "10:00 up 1 day");
        assert_eq!(driver.current_privilege(), Some("user"));
        driver.close().unwrap();
        assert!(!driver.is_open());
    }
}
