//! Configuration levels, named sessions and the `Driver` trait against the
//! built-in Arista EOS platform.

mod common;

use cliscrape::driver::{ConfigSession, NamedSession};
use cliscrape::error::DriverError;
use cliscrape::transport::ScriptedTransport;
use cliscrape::{Driver, DriverBuilder, Error, GenericDriver};

use common::{answer, init_logging, opened_at, probe};

fn switch() -> ScriptedTransport {
    let script = opened_at("switch#");
    let script = answer(script, "terminal length 0", "", "switch#");
    answer(script, "terminal width 32767", "", "switch#")
}

fn eos(script: ScriptedTransport) -> GenericDriver {
    init_logging();
    DriverBuilder::new("switch")
        .platform("arista_eos")
        .transport(script)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_registered_session_returns_with_one_end() {
    let script = probe(switch(), "switch#");
    let script = answer(script, "configure session SESS1", "", "switch(config-s-SESS1)#");
    let script = probe(script, "switch(config-s-SESS1)#");
    let script = answer(script, "end", "", "switch#");
    let log = script.write_log();

    let mut driver = eos(script);
    driver.open().await.unwrap();
    let opened = log.len();

    driver.register_session("SESS1").unwrap();
    driver.acquire_privilege("SESS1").await.unwrap();
    assert_eq!(driver.current_privilege(), Some("SESS1"));

    driver.acquire_privilege("privilege_exec").await.unwrap();
    assert_eq!(driver.current_privilege(), Some("privilege_exec"));

    let writes = log.writes().split_off(opened);
    assert_eq!(
        writes,
        vec!["\n", "configure session SESS1\n", "\n", "end\n"]
    );
    assert_eq!(writes.iter().filter(|w| *w == "end\n").count(), 1);
}

#[tokio::test]
async fn test_duplicate_session_names() {
    let mut driver = eos(ScriptedTransport::new());
    driver.register_session("SESS1").unwrap();

    for name in ["SESS1", "configuration"] {
        let err = driver.register_session(name).unwrap_err();
        assert!(matches!(
            err,
            Error::Driver(DriverError::DuplicateLevel { .. })
        ));
    }

    driver.remove_dynamic_level("SESS1").unwrap();
    assert!(driver.privilege_manager().get("SESS1").is_none());
    assert!(driver.remove_dynamic_level("configuration").is_err());
}

#[tokio::test]
async fn test_send_config_returns_to_previous_level() {
    let script = probe(switch(), "switch#");
    let script = answer(script, "configure terminal", "", "switch(config)#");
    let script = answer(script, "interface Ethernet1", "", "switch(config-if-Et1)#");
    let script = answer(
        script,
        "descripton uplink",
        "% Invalid input",
        "switch(config-if-Et1)#",
    );
    let script = probe(script, "switch(config-if-Et1)#");
    let script = answer(script, "end", "", "switch#");

    let mut driver = eos(script);
    driver.open().await.unwrap();

    let responses = driver
        .send_config(&["interface Ethernet1", "descripton uplink"])
        .await
        .unwrap();
    assert_eq!(responses.len(), 2);
    assert!(responses[0].is_success());
    assert!(!responses[1].is_success());
    assert_eq!(driver.current_privilege(), Some("privilege_exec"));
}

#[tokio::test]
async fn test_named_session_commit() {
    let script = probe(switch(), "switch#");
    let script = answer(script, "configure session uplinks", "", "switch(config-s-uplink)#");
    let script = answer(script, "interface Ethernet1", "", "switch(config-s-uplink-if-Et1)#");
    let script = answer(script, "commit", "", "switch#");
    let script = probe(script, "switch#");

    let mut driver = eos(script);
    driver.open().await.unwrap();

    let mut session = driver.named_config_session("uplinks").await.unwrap();
    assert_eq!(session.session_name(), "uplinks");
    let response = session.send_command("interface Ethernet1").await.unwrap();
    assert_eq!(response.prompt, "switch(config-s-uplink-if-Et1)#");
    session.commit().await.unwrap();

    assert_eq!(driver.current_privilege(), Some("privilege_exec"));
    assert!(driver.privilege_manager().get("uplinks").is_none());
}

#[tokio::test]
async fn test_named_session_abort_failure() {
    let script = probe(switch(), "switch#");
    let script = answer(script, "configure session lab", "", "switch(config-s-lab)#");
    let script = answer(
        script,
        "abort",
        "% Error: session lab is locked",
        "switch(config-s-lab)#",
    );

    let mut driver = eos(script);
    driver.open().await.unwrap();

    let session = driver.named_config_session("lab").await.unwrap();
    let err = session.abort().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Driver(DriverError::CommandFailed { .. })
    ));
    assert_eq!(driver.current_privilege(), Some("lab"));
}

#[tokio::test]
async fn test_detached_session_is_reentered() {
    let script = probe(switch(), "switch#");
    let script = answer(script, "configure session uplinks", "", "switch(config-s-uplink)#");
    let script = probe(script, "switch(config-s-uplink)#");
    let script = answer(script, "abort", "", "switch#");
    let script = probe(script, "switch#");
    let log = script.write_log();

    let mut driver = eos(script);
    driver.open().await.unwrap();

    let session = driver.named_config_session("uplinks").await.unwrap();
    session.detach().unwrap();
    assert!(driver.privilege_manager().get("uplinks").is_some());
    assert_eq!(driver.current_privilege(), Some("uplinks"));

    let before = log.len();
    let session = driver.named_config_session("uplinks").await.unwrap();
    assert_eq!(log.len(), before + 1);
    session.abort().await.unwrap();

    assert_eq!(driver.current_privilege(), Some("privilege_exec"));
    assert!(driver.privilege_manager().get("uplinks").is_none());
}

async fn uptime<D: Driver>(driver: &mut D) -> cliscrape::Result<String> {
    driver.open().await?;
    let response = driver.send_command("show uptime").await?;
    driver.close().await?;
    Ok(response.result)
}

#[tokio::test]
async fn test_driver_trait_is_generic() {
    let script = answer(switch(), "show uptime", "Up 3 days, 4 hours", "switch#");
    let mut driver = eos(script);

    let result = uptime(&mut driver).await.unwrap();
    assert_eq!(result, "Up 3 days, 4 hours");
    assert!(!Driver::is_open(&driver));
}
