mod common;

use std::time::{Duration, Instant};

use cliscrape::channel::SendOptions;
use cliscrape::error::ChannelError;
use cliscrape::transport::ScriptedTransport;
use cliscrape::{Error, PlatformDefinition, PrivilegeLevel, PromptPattern};

use common::{answer, driver, opened_at};

const REPLY: &str = "show version\r\nCisco IOS XE Software, Version 17.03.04\r\nuptime is 3 weeks\r\nrouter#";

fn platform() -> PlatformDefinition {
    PlatformDefinition::new("single")
        .with_privilege(PrivilegeLevel::new("privilege_exec", r"^router#\s*$").unwrap())
        .with_default_privilege("privilege_exec")
}

fn chunked(chunks: Vec<&[u8]>) -> ScriptedTransport {
    opened_at("router#")
        .expect_write("show version\n")
        .reply_chunks(chunks)
}

#[tokio::test]
async fn test_prompt_split_at_every_byte() {
    let bytes = REPLY.as_bytes();
    for split in 1..bytes.len() {
        let (head, tail) = bytes.split_at(split);
        let mut driver = driver(chunked(vec![head, tail]), platform());
        driver.open().await.unwrap();

        let response = driver.send_command("show version").await.unwrap();
        assert_eq!(response.prompt, "router#", "split at {split}");
        assert_eq!(
            response.result, "Cisco IOS XE Software, Version 17.03.04\nuptime is 3 weeks",
            "split at {split}"
        );
    }
}

#[tokio::test]
async fn test_prompt_split_into_n_chunks() {
    let bytes = REPLY.as_bytes();
    for n in 1..=bytes.len() {
        let size = bytes.len().div_ceil(n);
        let mut driver = driver(chunked(bytes.chunks(size).collect()), platform());
        driver.open().await.unwrap();

        let response = driver.send_command("show version").await.unwrap();
        assert_eq!(response.prompt, "router#", "{n} chunks");
        assert!(response.result.ends_with("uptime is 3 weeks"), "{n} chunks");
    }
}

#[tokio::test]
async fn test_ansi_and_empty_reads_between_chunks() {
    let script = opened_at("router#")
        .expect_write("show clock\n")
        .reply("show clock\r\n\x1b[1m12:00:00\x1b[0m")
        .empty_read()
        .reply("\r\nrou")
        .empty_read()
        .reply("ter#");
    let mut driver = driver(script, platform());
    driver.open().await.unwrap();

    let response = driver.send_command("show clock").await.unwrap();
    assert_eq!(response.result, "12:00:00");
    assert_eq!(response.prompt, "router#");
}

#[test]
fn test_negative_substring_pattern() {
    let exact = PromptPattern::with_not_contains(r"^host#\s*$", ["(config"]).unwrap();
    assert!(exact.find_at_tail(b"show run\nhost(config)#").is_none());
    assert!(exact.find_at_tail(b"show run\nhost#").is_some());

    let loose = PromptPattern::with_not_contains(r"^host\S*#\s*$", ["(config"]).unwrap();
    assert!(loose.find_at_tail(b"host(config)#").is_none());
    assert!(loose.find_at_tail(b"host(config-if)# ").is_none());
    assert!(loose.find_at_tail(b"host-01#").is_some());
}

#[tokio::test]
async fn test_negative_substring_routes_to_config_level() {
    let platform = PlatformDefinition::new("negatives")
        .with_privilege(
            PrivilegeLevel::new("privilege_exec", r"^host\S*#\s*$")
                .unwrap()
                .with_not_contains("(config"),
        )
        .with_privilege(
            PrivilegeLevel::new("configuration", r"^host\(config[\w\-]*\)#\s*$")
                .unwrap()
                .with_parent("privilege_exec")
                .with_escalate("configure terminal")
                .with_deescalate("end"),
        )
        .with_default_privilege("privilege_exec");
    let script = answer(opened_at("host#"), "configure terminal", "", "host(config)#");
    let mut driver = driver(script, platform);
    driver.open().await.unwrap();

    let response = driver.send_command("configure terminal").await.unwrap();
    assert_eq!(response.prompt, "host(config)#");
    assert_eq!(driver.current_privilege(), Some("configuration"));
}

#[tokio::test]
async fn test_timeout_fires_near_deadline() {
    let script = opened_at("router#")
        .expect_write("show tech-support\n")
        .reply("show tech-support\r\n------ show version ------\r\n");
    let mut driver = driver(script, platform());
    driver.open().await.unwrap();

    let timeout = Duration::from_millis(300);
    let started = Instant::now();
    let err = driver
        .send_command_with(
            "show tech-support",
            SendOptions::default().with_timeout(timeout),
        )
        .await
        .unwrap_err();
    let waited = started.elapsed();

    assert!(waited >= timeout, "returned early after {waited:?}");
    assert!(waited < timeout + Duration::from_secs(2), "hung for {waited:?}");
    match err {
        Error::Channel(ChannelError::Timeout {
            timeout: reported,
            buffer_tail,
            ..
        }) => {
            assert_eq!(reported, timeout);
            assert!(buffer_tail.contains("show version"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(driver.is_open());
}

#[tokio::test]
async fn test_retry_after_timeout_gets_its_own_output() {
    let script = opened_at("router#")
        .expect_write("show tech-support\n")
        .reply("show tech-support\r\n------ show version ------\r\n")
        .expect_write("show clock\n")
        // the rest of show tech-support lands after the retry went out
        .reply("------ show inventory ------\r\nrouter#")
        .reply("show clock\r\n12:00:00 UTC\r\nrouter#");
    let mut driver = driver(script, platform());
    driver.open().await.unwrap();

    let options = SendOptions::default().with_timeout(Duration::from_millis(200));
    let err = driver
        .send_command_with("show tech-support", options)
        .await
        .unwrap_err();
    assert!(err.is_retryable());

    let response = driver.send_command("show clock").await.unwrap();
    assert_eq!(response.result, "12:00:00 UTC");
    assert_eq!(response.prompt, "router#");
    assert!(!driver.channel().is_desynced());
}

#[tokio::test]
async fn test_level_check_after_timeout() {
    let script = opened_at("router#")
        .expect_write("show tech-support\n")
        .reply("show tech-support\r\n------ show version ------\r\n")
        .expect_write("\n")
        .reply("------ show inventory ------\r\nrouter#")
        .expect_write("show clock\n")
        // the return's own prompt is still on the wire
        .reply("\r\nrouter#")
        .reply("show clock\r\n12:00:00 UTC\r\nrouter#");
    let mut driver = driver(script, platform());
    driver.open().await.unwrap();

    let options = SendOptions::default().with_timeout(Duration::from_millis(200));
    driver
        .send_command_with("show tech-support", options)
        .await
        .unwrap_err();

    assert_eq!(driver.get_current_level().await.unwrap(), "privilege_exec");
    let response = driver.send_command("show clock").await.unwrap();
    assert_eq!(response.result, "12:00:00 UTC");
}

#[tokio::test]
async fn test_peer_close_is_not_a_timeout() {
    let script = opened_at("router#")
        .expect_write("reload\n")
        .reply("reload\r\nConnection closing")
        .close_here();
    let mut driver = driver(script, platform());
    driver.open().await.unwrap();

    let started = Instant::now();
    let err = driver.send_command("reload").await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(matches!(err, Error::Channel(ChannelError::Closed { .. })));
    assert!(!driver.is_alive());
}
