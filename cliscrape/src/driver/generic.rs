//! Generic driver implementation that works with any platform.

use std::time::{Duration, SystemTime};

use log::{debug, info, warn};
use secrecy::{ExposeSecret, SecretString};

use super::privilege::{PrivilegeManager, Transition};
use super::response::Response;
use super::stream::CommandStream;
use crate::channel::{
    CancelHandle, Channel, ChannelConfig, ChannelOutput, InteractiveEvent, PromptPattern,
    SendOptions, Termination, Trigger, TriggerOutput,
};
use crate::error::{ChannelError, DriverError, Error, Result};
use crate::platform::{PlatformDefinition, SessionTemplate};
use crate::transport::Transport;

/// Generic driver that works with any platform definition.
///
/// Owns one [`Channel`] over a boxed transport and a [`PrivilegeManager`]
/// built from the platform's levels. It handles:
/// - the open/close sequences (initial prompt, default privilege, hooks)
/// - command execution with failure classification
/// - privilege navigation, including secondary-credential prompts
/// - named configuration sessions registered at runtime
pub struct GenericDriver {
    channel: Channel,
    platform: PlatformDefinition,
    privilege: PrivilegeManager,

    /// Secondary credential answered at escalation auth prompts.
    secondary: Option<SecretString>,

    /// Every level's prompt, rebuilt when levels are added or removed.
    prompts: Vec<PromptPattern>,
}

impl GenericDriver {
    /// Create a driver over `transport`. Nothing is sent until [`open`](Self::open).
    pub fn new(
        transport: Box<dyn Transport>,
        platform: PlatformDefinition,
        config: ChannelConfig,
    ) -> Result<Self> {
        platform.validate()?;
        let privilege = PrivilegeManager::new(platform.privilege_levels.clone())?;
        let prompts = privilege.prompts();
        Ok(Self {
            channel: Channel::new(transport, config),
            platform,
            privilege,
            secondary: None,
            prompts,
        })
    }

    /// Set the secondary credential (e.g. the enable secret).
    pub fn with_secondary_credential(mut self, secret: SecretString) -> Self {
        self.secondary = Some(secret);
        self
    }

    /// Replace or clear the secondary credential.
    pub fn set_secondary_credential(&mut self, secret: Option<SecretString>) {
        self.secondary = secret;
    }

    /// Get a reference to the platform definition.
    pub fn platform(&self) -> &PlatformDefinition {
        &self.platform
    }

    /// Get the privilege manager.
    pub fn privilege_manager(&self) -> &PrivilegeManager {
        &self.privilege
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Direct channel access for exchanges the driver does not model.
    ///
    /// The driver does not see what happens here; call
    /// [`get_current_level`](Self::get_current_level) afterwards if the
    /// privilege level may have changed.
    pub fn channel_mut(&mut self) -> &mut Channel {
        &mut self.channel
    }

    /// Handle that cancels the operation in flight.
    ///
    /// A cancellation aborts the whole driver operation running when it is
    /// requested, including multi-step ones such as
    /// [`acquire_privilege`](Self::acquire_privilege). One requested while
    /// the driver is idle does not latch: the next operation discards it.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.channel.cancel_handle()
    }

    /// Default per-operation timeout.
    pub fn timeout(&self) -> Duration {
        self.channel.timeout()
    }

    /// Set the default per-operation timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.channel.set_timeout(timeout);
    }

    /// Check if the driver is connected.
    pub fn is_open(&self) -> bool {
        self.channel.is_open()
    }

    /// Whether the connection is open and the transport still carries data.
    pub fn is_alive(&self) -> bool {
        self.channel.is_alive()
    }

    /// Get the current privilege level name.
    pub fn current_privilege(&self) -> Option<&str> {
        self.privilege.current_name()
    }

    /// Level prompts plus the platform's base prompt, last.
    fn prompts_with_base(&self) -> Vec<PromptPattern> {
        let mut prompts = self.prompts.clone();
        prompts.push(self.platform.base_prompt.clone());
        prompts
    }

    /// Record the level `prompt` belongs to; unknown prompts clear it.
    fn track_prompt(&mut self, prompt: &str) {
        match self.privilege.classify(prompt).map(|l| l.name.clone()) {
            Some(name) => {
                // The name came from the manager itself.
                let _ = self.privilege.set_current(&name);
            }
            None => {
                debug!("driver: prompt {:?} matches no level", prompt);
                self.privilege.clear_current();
            }
        }
    }

    fn response(&self, command: &str, output: ChannelOutput, start_time: SystemTime) -> Response {
        let response =
            Response::from_output(command, output, start_time, &self.platform.failed_when_contains);
        if let Some(failure) = &response.failure_message {
            debug!("driver: {:?} failed with {:?}", command, failure);
        }
        response
    }

    /// Connect and bring the session into the platform's default state.
    ///
    /// Reads the initial prompt, acquires the default privilege, then runs
    /// the on-open hook followed by the on-open commands.
    pub async fn open(&mut self) -> Result<()> {
        self.channel.open().await?;
        let _op = self.channel.begin();
        info!("driver: opened {} session", self.platform.name);

        let expected = self.prompts_with_base();
        let initial = self.channel.read_until_prompt(&expected, None).await?;
        self.track_prompt(&initial.prompt);
        debug!(
            "driver: initial prompt {:?} ({:?})",
            initial.prompt,
            self.privilege.current_name()
        );

        let default = self.platform.default_privilege.clone();
        self.acquire_privilege(&default).await?;

        if let Some(hook) = self.platform.on_open.clone() {
            hook(&mut *self).await?;
        }

        for command in self.platform.on_open_commands.clone() {
            let response = self.send_command(&command).await?;
            if !response.is_success() {
                warn!(
                    "driver: on-open command {:?} failed: {:?}",
                    command, response.failure_message
                );
            }
        }
        Ok(())
    }

    /// Run the on-close hook and commands, then close the transport.
    ///
    /// The transport is closed even when the hook or a command fails; the
    /// first error is returned.
    pub async fn close(&mut self) -> Result<()> {
        if !self.channel.is_open() {
            return Ok(());
        }

        let op = self.channel.begin();
        let teardown = self.run_on_close().await;
        drop(op);
        if let Err(e) = &teardown {
            warn!("driver: on-close sequence failed: {}", e);
        }

        let closed = self.channel.close().await;
        self.privilege.clear_current();
        info!("driver: closed {} session", self.platform.name);
        teardown.and(closed)
    }

    async fn run_on_close(&mut self) -> Result<()> {
        if let Some(hook) = self.platform.on_close.clone() {
            hook(&mut *self).await?;
        }
        for command in self.platform.on_close_commands.clone() {
            self.send_command(&command).await?;
        }
        Ok(())
    }

    /// Send a command and wait for any level prompt.
    pub async fn send_command(&mut self, command: &str) -> Result<Response> {
        self.send_command_with(command, SendOptions::default()).await
    }

    /// [`send_command`](Self::send_command) with a per-call timeout or
    /// hidden input.
    pub async fn send_command_with(
        &mut self,
        command: &str,
        options: SendOptions,
    ) -> Result<Response> {
        let start_time = SystemTime::now();
        let output = self
            .channel
            .send_input_with(command, &self.prompts, options)
            .await?;
        self.track_prompt(&output.prompt);

        let shown = if options.hidden { "********" } else { command };
        Ok(self.response(shown, output, start_time))
    }

    /// Send multiple commands sequentially, stopping at the first error.
    pub async fn send_commands(&mut self, commands: &[&str]) -> Result<Vec<Response>> {
        let _op = self.channel.begin();
        let mut responses = Vec::with_capacity(commands.len());
        for command in commands {
            responses.push(self.send_command(command).await?);
        }
        Ok(responses)
    }

    /// Run an interactive sequence; the final event waits for a level prompt.
    pub async fn send_interactive(&mut self, events: &[InteractiveEvent]) -> Result<Response> {
        let start_time = SystemTime::now();
        let output = self.channel.send_interactive(events, &self.prompts).await?;
        self.track_prompt(&output.prompt);
        Ok(Response::from_interactive(
            output,
            start_time,
            &self.platform.failed_when_contains,
        ))
    }

    /// Send commands in the platform's configuration level.
    ///
    /// Acquires the configuration level, sends every command, then returns
    /// to the level the session was in before (the default privilege when
    /// that was unknown). A failing command does not stop the sequence; check
    /// each response.
    pub async fn send_config(&mut self, commands: &[&str]) -> Result<Vec<Response>> {
        let config = self.platform.config_privilege.clone().ok_or_else(|| {
            Error::from(DriverError::InvalidConfig {
                message: format!("platform {} has no configuration level", self.platform.name),
            })
        })?;
        let previous = self
            .privilege
            .current_name()
            .unwrap_or(&self.platform.default_privilege)
            .to_string();

        let _op = self.channel.begin();
        self.acquire_privilege(&config).await?;
        let responses = self.send_commands(commands).await?;
        self.acquire_privilege(&previous).await?;
        Ok(responses)
    }

    /// Probe the device and classify its prompt.
    ///
    /// A prompt only the platform's base pattern recognises fails with
    /// `UnrecognizedPrompt` and leaves the current level unknown.
    pub async fn get_current_level(&mut self) -> Result<String> {
        let expected = self.prompts_with_base();
        let output = self.channel.get_prompt(&expected).await?;

        match self.privilege.classify(&output.prompt).map(|l| l.name.clone()) {
            Some(name) => {
                self.privilege.set_current(&name)?;
                debug!("driver: current level {}", name);
                Ok(name)
            }
            None => {
                self.privilege.clear_current();
                Err(DriverError::UnrecognizedPrompt {
                    prompt: output.prompt,
                }
                .into())
            }
        }
    }

    /// Move the session to privilege level `target`.
    ///
    /// Probes once. When the device already sits at `target` nothing else is
    /// sent; otherwise every step of the tree path is sent in turn and the
    /// prompt it produces must belong to the step's destination.
    pub async fn acquire_privilege(&mut self, target: &str) -> Result<()> {
        let level = self.privilege.level(target)?;
        if !level.requestable {
            return Err(DriverError::NotRequestable {
                name: target.to_string(),
            }
            .into());
        }

        let _op = self.channel.begin();
        let current = self.get_current_level().await?;
        if current == target {
            debug!("driver: already at {}", target);
            return Ok(());
        }

        let transitions = self.privilege.transitions(&current, target)?;
        if self.secondary.is_none() {
            if let Some(step) = transitions.iter().find(|t| t.auth_prompt.is_some()) {
                return Err(transition_failed(
                    step,
                    target,
                    None,
                    "escalation requires a secondary credential and none is configured".into(),
                ));
            }
        }

        info!(
            "driver: acquiring {} from {} in {} step(s)",
            target,
            current,
            transitions.len()
        );
        for step in &transitions {
            self.step(step, target).await?;
        }
        Ok(())
    }

    /// Send one transition command and confirm where it landed.
    async fn step(&mut self, step: &Transition, target: &str) -> Result<()> {
        debug!(
            "driver: {} -> {} ({:?}) via {:?}",
            step.from, step.to, step.direction, step.command
        );

        let outcome = match &step.auth_prompt {
            Some(auth) => {
                let mut expected = Vec::with_capacity(self.prompts.len() + 1);
                expected.push(auth.clone());
                expected.extend(self.prompts.iter().cloned());

                match self.channel.send_input(&step.command, &expected).await {
                    Ok(output) if output.matched == 0 => {
                        debug!("driver: answering auth prompt {:?}", output.prompt);
                        let secret = self
                            .secondary
                            .as_ref()
                            .map(|s| s.expose_secret())
                            .unwrap_or_default();
                        self.channel
                            .send_input_with(secret, &self.prompts, SendOptions::hidden())
                            .await
                    }
                    other => other,
                }
            }
            None => self.channel.send_input(&step.command, &self.prompts).await,
        };

        let output = match outcome {
            Ok(output) => output,
            Err(err @ Error::Channel(ChannelError::Timeout { .. })) => {
                let _ = self.privilege.set_current(&step.from);
                return Err(transition_failed(step, target, None, err.to_string()));
            }
            Err(err) => {
                self.privilege.clear_current();
                return Err(err);
            }
        };

        match self.privilege.classify(&output.prompt).map(|l| l.name.clone()) {
            Some(reached) if reached == step.to => {
                self.privilege.set_current(&reached)?;
                Ok(())
            }
            Some(reached) => {
                self.privilege.set_current(&reached)?;
                Err(transition_failed(
                    step,
                    target,
                    Some(reached),
                    format!("unexpected prompt {:?}", output.prompt),
                ))
            }
            None => {
                let _ = self.privilege.set_current(&step.from);
                Err(transition_failed(
                    step,
                    target,
                    None,
                    format!("unrecognized prompt {:?}", output.prompt),
                ))
            }
        }
    }

    /// Register a named session from the platform's session template.
    pub fn register_session(&mut self, name: &str) -> Result<()> {
        let template = self.platform.session_template.clone().ok_or_else(|| {
            Error::from(DriverError::InvalidConfig {
                message: format!("platform {} has no session template", self.platform.name),
            })
        })?;
        self.register_session_with(name, &template)
    }

    /// Register a named session from an explicit template.
    ///
    /// A name already in use fails with `DuplicateLevel` and changes nothing.
    pub fn register_session_with(&mut self, name: &str, template: &SessionTemplate) -> Result<()> {
        if self.privilege.get(name).is_some() {
            return Err(DriverError::DuplicateLevel {
                name: name.to_string(),
            }
            .into());
        }
        let level = template.build(name)?;
        self.privilege.register(level)?;
        self.prompts = self.privilege.prompts();
        info!("driver: registered session {}", name);
        Ok(())
    }

    /// Remove a level added with [`register_session`](Self::register_session).
    pub fn remove_dynamic_level(&mut self, name: &str) -> Result<()> {
        self.privilege.remove_dynamic(name)?;
        self.prompts = self.privilege.prompts();
        info!("driver: removed session {}", name);
        Ok(())
    }

    /// Read while answering triggers until `until` ends the read.
    ///
    /// Nothing is sent first; write the command with
    /// [`Channel::write_line`] through [`channel_mut`](Self::channel_mut).
    pub async fn read_with_triggers(
        &mut self,
        triggers: &mut [Trigger],
        until: &Termination,
        timeout: Option<Duration>,
    ) -> Result<TriggerOutput> {
        self.channel.read_with_triggers(triggers, until, timeout).await
    }

    /// Send a command and stream its output as it arrives.
    ///
    /// Memory use is bounded by the channel's search depth, not by the size
    /// of the output.
    pub async fn send_command_stream(&mut self, command: &str) -> Result<CommandStream<'_>> {
        self.send_command_stream_with(command, None).await
    }

    /// [`send_command_stream`](Self::send_command_stream) with a timeout
    /// covering the whole command.
    pub async fn send_command_stream_with(
        &mut self,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandStream<'_>> {
        let timeout = timeout.unwrap_or(self.channel.timeout());
        let op = self.channel.begin();
        self.channel.buffer_mut().clear();
        self.channel.write_line(command, false).await?;
        debug!("driver: streaming {:?}", command);

        Ok(CommandStream::new(
            op,
            &mut self.channel,
            &self.platform,
            &mut self.privilege,
            &self.prompts,
            command.to_string(),
            timeout,
        ))
    }
}

fn transition_failed(
    step: &Transition,
    target: &str,
    reached: Option<String>,
    reason: String,
) -> Error {
    DriverError::PrivilegeTransitionFailed {
        target: target.to_string(),
        from: step.from.clone(),
        to: step.to.clone(),
        reached,
        reason,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PrivilegeLevel;
    use crate::transport::ScriptedTransport;

    fn platform() -> PlatformDefinition {
        PlatformDefinition::new("lab")
            .with_privilege(PrivilegeLevel::new("exec", r"^\S+>\s*$").unwrap())
            .with_privilege(
                PrivilegeLevel::new("privilege_exec", r"^[\w.\-]+#\s*$")
                    .unwrap()
                    .with_parent("exec")
                    .with_escalate("enable")
                    .with_deescalate("disable")
                    .with_auth(r"^[Pp]assword:\s*$")
                    .unwrap(),
            )
            .with_default_privilege("exec")
            .with_failure_pattern("% Invalid input")
    }

    fn driver(transport: ScriptedTransport) -> GenericDriver {
        GenericDriver::new(Box::new(transport), platform(), ChannelConfig::default()).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_platform() {
        let broken = platform().with_default_privilege("nowhere");
        let result = GenericDriver::new(
            Box::new(ScriptedTransport::new()),
            broken,
            ChannelConfig::default(),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_send_command_before_open() {
        let mut driver = driver(ScriptedTransport::new());
        let err = driver.send_command("show clock").await.unwrap_err();
        assert!(matches!(err, Error::Driver(DriverError::NotConnected)));
    }

    #[tokio::test]
    async fn test_open_and_failed_when() {
        let transport = ScriptedTransport::new()
            .reply("Welcome\nrouter>")
            .expect_write("\n")
            .reply("\nrouter>")
            .expect_write("shw clock\n")
            .reply("shw clock\n% Invalid input detected\nrouter>");
        let mut driver = driver(transport);

        driver.open().await.unwrap();
        assert_eq!(driver.current_privilege(), Some("exec"));

        let response = driver.send_command("shw clock").await.unwrap();
        assert!(!response.is_success());
        assert_eq!(response.prompt, "router>");
    }

    #[tokio::test]
    async fn test_missing_secondary_credential_sends_nothing() {
        let transport = ScriptedTransport::new()
            .reply("router>")
            .expect_write("\n")
            .reply("\nrouter>")
            .expect_write("\n")
            .reply("\nrouter>");
        let log = transport.write_log();
        let mut driver = driver(transport);
        driver.open().await.unwrap();

        let err = driver.acquire_privilege("privilege_exec").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Driver(DriverError::PrivilegeTransitionFailed { .. })
        ));
        assert_eq!(log.writes(), vec!["\n", "\n"]);
        assert_eq!(driver.current_privilege(), Some("exec"));
    }

    #[tokio::test]
    async fn test_unrecognized_prompt() {
        let transport = ScriptedTransport::new()
            .reply("router>")
            .expect_write("\n")
            .reply("\nrouter>")
            .expect_write("\n")
            .reply("\nrouter$");
        let mut driver = driver(transport);
        driver.open().await.unwrap();

        let err = driver.get_current_level().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Driver(DriverError::UnrecognizedPrompt { .. })
        ));
        assert_eq!(driver.current_privilege(), None);
    }

    #[test]
    fn test_register_session_without_template() {
        let mut driver = driver(ScriptedTransport::new());
        assert!(driver.register_session("s1").is_err());
    }
}
