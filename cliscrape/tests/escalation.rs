//! Escalation through a secondary-credential prompt.

mod common;

use cliscrape::error::DriverError;
use cliscrape::transport::ScriptedTransport;
use cliscrape::{DriverBuilder, Error, GenericDriver, PlatformDefinition, PrivilegeLevel};

use common::{answer, init_logging, opened_at, probe};

fn platform() -> PlatformDefinition {
    PlatformDefinition::new("two_level")
        .with_privilege(PrivilegeLevel::new("exec", r"^host>\s*$").unwrap())
        .with_privilege(
            PrivilegeLevel::new("privilege_exec", r"^host#\s*$")
                .unwrap()
                .with_parent("exec")
                .with_escalate("enable")
                .with_deescalate("disable")
                .with_auth(r"^Password:\s*$")
                .unwrap(),
        )
        .with_default_privilege("exec")
}

fn build(script: ScriptedTransport, secret: &str) -> GenericDriver {
    init_logging();
    DriverBuilder::new("host")
        .custom_platform(platform())
        .enable_secret(secret)
        .transport(script)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_enable_secret_then_disable() {
    let script = probe(opened_at("host>"), "host>")
        .expect_write("enable\n")
        .reply("enable\r\nPassword: ")
        .expect_write("s3cret\n")
        .reply("\r\nhost#");
    let script = probe(script, "host#");
    let script = answer(script, "disable", "", "host>");
    let log = script.write_log();

    let mut driver = build(script, "s3cret");
    driver.open().await.unwrap();
    assert_eq!(driver.current_privilege(), Some("exec"));

    driver.acquire_privilege("privilege_exec").await.unwrap();
    assert_eq!(driver.current_privilege(), Some("privilege_exec"));

    driver.acquire_privilege("exec").await.unwrap();
    assert_eq!(driver.current_privilege(), Some("exec"));

    assert_eq!(
        log.writes(),
        vec!["\n", "\n", "enable\n", "s3cret\n", "\n", "disable\n"]
    );
}

#[tokio::test]
async fn test_rejected_secret_reports_reached_level() {
    let script = probe(opened_at("host>"), "host>")
        .expect_write("enable\n")
        .reply("enable\r\nPassword: ")
        .expect_write("wrong\n")
        .reply("\r\n% Access denied\r\n\r\nhost>");

    let mut driver = build(script, "wrong");
    driver.open().await.unwrap();

    let err = driver.acquire_privilege("privilege_exec").await.unwrap_err();
    match err {
        Error::Driver(DriverError::PrivilegeTransitionFailed {
            target, reached, ..
        }) => {
            assert_eq!(target, "privilege_exec");
            assert_eq!(reached.as_deref(), Some("exec"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(driver.current_privilege(), Some("exec"));
}

#[tokio::test]
async fn test_device_without_password_prompt() {
    // no enable secret configured on the device: straight to the prompt
    let script = probe(opened_at("host>"), "host>");
    let script = answer(script, "enable", "", "host#");

    let mut driver = build(script, "unused");
    driver.open().await.unwrap();
    driver.acquire_privilege("privilege_exec").await.unwrap();
    assert_eq!(driver.current_privilege(), Some("privilege_exec"));
}

#[tokio::test]
async fn test_builtin_iosxe_open_escalates() {
    init_logging();
    let script = ScriptedTransport::new()
        .reply("\r\nUser Access Verification\r\n\r\nedge1>")
        .expect_write("\n")
        .reply("\r\nedge1>")
        .expect_write("enable\n")
        .reply("enable\r\nPassword: ")
        .expect_write("s3cret\n")
        .reply("\r\nedge1#");
    let script = answer(script, "terminal length 0", "", "edge1#");
    let script = answer(script, "terminal width 512", "", "edge1#");
    let script = answer(
        script,
        "show ip route 10.0.0.1",
        "% Invalid input detected at '^' marker.",
        "edge1#",
    );

    let mut driver = DriverBuilder::new("edge1")
        .platform("cisco_iosxe")
        .enable_secret("s3cret")
        .transport(script)
        .build()
        .unwrap();
    driver.open().await.unwrap();
    assert_eq!(driver.current_privilege(), Some("privilege_exec"));

    let response = driver.send_command("show ip route 10.0.0.1").await.unwrap();
    assert!(!response.is_success());
    assert_eq!(
        response.failure_message.as_deref(),
        Some("% Invalid input detected")
    );

    driver.close().await.unwrap();
    assert!(!driver.is_open());
    assert_eq!(driver.current_privilege(), None);
}
