//! High-level driver for device interaction.
//!
//! The driver layer provides the main API for sending commands
//! and managing privilege levels on network devices.

mod blocking;
mod builder;
pub mod config_session;
mod generic;
mod privilege;
pub(crate) mod response;
mod stream;

pub use blocking::BlockingDriver;
pub use builder::DriverBuilder;
pub use config_session::{ConfigSession, GenericConfigSession, NamedConfigSession, NamedSession};
pub use generic::GenericDriver;
pub use privilege::{Direction, PrivilegeManager, Transition};
pub use response::Response;
pub use stream::CommandStream;

use std::future::Future;

use crate::channel::InteractiveEvent;
use crate::error::Result;

/// Trait for device drivers.
pub trait Driver: Send {
    /// Open the connection to the device.
    fn open(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Close the connection.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Send a command and wait for the prompt.
    fn send_command(&mut self, command: &str) -> impl Future<Output = Result<Response>> + Send;

    /// Send multiple commands sequentially.
    fn send_commands(
        &mut self,
        commands: &[&str],
    ) -> impl Future<Output = Result<Vec<Response>>> + Send {
        async move {
            let mut responses = Vec::with_capacity(commands.len());
            for cmd in commands {
                responses.push(self.send_command(cmd).await?);
            }
            Ok(responses)
        }
    }

    /// Send an interactive command sequence.
    ///
    /// This handles commands that require additional input or confirmation,
    /// such as `reload`, `copy`, or `delete` commands.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use cliscrape::driver::Driver;
    /// use cliscrape::channel::InteractiveEvent;
    ///
    /// # async fn example(driver: &mut impl Driver) -> cliscrape::Result<()> {
    /// let events = vec![
    ///     InteractiveEvent::new("reload", "[confirm]"),
    ///     InteractiveEvent::prompt("y"),
    /// ];
    /// let response = driver.send_interactive(&events).await?;
    /// # Ok(())
    /// # }
    /// ```
    fn send_interactive(
        &mut self,
        events: &[InteractiveEvent],
    ) -> impl Future<Output = Result<Response>> + Send;

    /// Send commands in configuration mode.
    ///
    /// This method:
    /// 1. Acquires the configuration privilege level
    /// 2. Sends all the provided commands
    /// 3. Returns to the previous privilege level
    fn send_config(
        &mut self,
        commands: &[&str],
    ) -> impl Future<Output = Result<Vec<Response>>> + Send;

    /// Acquire a specific privilege level.
    fn acquire_privilege(&mut self, privilege: &str) -> impl Future<Output = Result<()>> + Send;

    /// Probe the device and return the level its prompt belongs to.
    fn get_current_level(&mut self) -> impl Future<Output = Result<String>> + Send;

    /// Check if the driver is connected.
    fn is_open(&self) -> bool;

    /// Check if the underlying session is still alive.
    ///
    /// Returns `false` when the driver is not connected or the transport
    /// reports the peer gone (disconnect, keepalive timeout, I/O error).
    ///
    /// ```rust,no_run
    /// # use cliscrape::driver::Driver;
    /// # async fn example(driver: &mut impl Driver) -> cliscrape::Result<()> {
    /// if !driver.is_alive() {
    ///     println!("Connection lost, reconnecting...");
    ///     driver.close().await.ok();
    ///     driver.open().await?;
    /// }
    /// let response = driver.send_command("show version").await?;
    /// # Ok(())
    /// # }
    /// ```
    fn is_alive(&self) -> bool;

    /// Get the current privilege level name.
    fn current_privilege(&self) -> Option<&str>;
}

impl Driver for GenericDriver {
    async fn open(&mut self) -> Result<()> {
        GenericDriver::open(self).await
    }

    async fn close(&mut self) -> Result<()> {
        GenericDriver::close(self).await
    }

    async fn send_command(&mut self, command: &str) -> Result<Response> {
        GenericDriver::send_command(self, command).await
    }

    async fn send_commands(&mut self, commands: &[&str]) -> Result<Vec<Response>> {
        GenericDriver::send_commands(self, commands).await
    }

    async fn send_interactive(&mut self, events: &[InteractiveEvent]) -> Result<Response> {
        GenericDriver::send_interactive(self, events).await
    }

    async fn send_config(&mut self, commands: &[&str]) -> Result<Vec<Response>> {
        GenericDriver::send_config(self, commands).await
    }

    async fn acquire_privilege(&mut self, privilege: &str) -> Result<()> {
        GenericDriver::acquire_privilege(self, privilege).await
    }

    async fn get_current_level(&mut self) -> Result<String> {
        GenericDriver::get_current_level(self).await
    }

    fn is_open(&self) -> bool {
        GenericDriver::is_open(self)
    }

    fn is_alive(&self) -> bool {
        GenericDriver::is_alive(self)
    }

    fn current_privilege(&self) -> Option<&str> {
        GenericDriver::current_privilege(self)
    }
}
