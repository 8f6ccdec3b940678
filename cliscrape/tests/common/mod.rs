#![allow(dead_code)]

use cliscrape::transport::ScriptedTransport;
use cliscrape::{ChannelConfig, GenericDriver, PlatformDefinition};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn driver(transport: ScriptedTransport, platform: PlatformDefinition) -> GenericDriver {
    init_logging();
    GenericDriver::new(Box::new(transport), platform, ChannelConfig::default()).unwrap()
}

/// Device sitting at `prompt` when the session opens: the banner read plus
/// the probe made while acquiring the default privilege.
pub fn opened_at(prompt: &str) -> ScriptedTransport {
    ScriptedTransport::new()
        .reply(prompt)
        .expect_write("\n")
        .reply(format!("\n{prompt}"))
}

/// `command` is echoed, followed by `output` lines and `prompt`.
pub fn answer(
    script: ScriptedTransport,
    command: &str,
    output: &str,
    prompt: &str,
) -> ScriptedTransport {
    let reply = if output.is_empty() {
        format!("{command}\r\n{prompt}")
    } else {
        format!("{command}\r\n{output}\r\n{prompt}")
    };
    script.expect_write(format!("{command}\n")).reply(reply)
}

/// A probe answered with `prompt`.
pub fn probe(script: ScriptedTransport, prompt: &str) -> ScriptedTransport {
    script.expect_write("\n").reply(format!("\r\n{prompt}"))
}
