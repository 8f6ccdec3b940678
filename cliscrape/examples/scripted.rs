//! Offline example: drive a scripted IOS-XE session.
//!
//! No device needed. A `ScriptedTransport` plays the device side of an
//! enable/configure/disable conversation while the blocking driver walks the
//! privilege tree. Run with `RUST_LOG=debug` to watch every step.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example scripted
//! ```

use cliscrape::DriverBuilder;
use cliscrape::transport::ScriptedTransport;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let device = ScriptedTransport::new()
        .reply("\r\nUser Access Verification\r\n\r\nedge1>")
        // default privilege: probe, enable, secret
        .expect_write("\n")
        .reply("\r\nedge1>")
        .expect_write("enable\n")
        .reply("enable\r\nPassword: ")
        .expect_write("s3cret\n")
        .reply("\r\nedge1#")
        // on-open paging commands
        .expect_write("terminal length 0\n")
        .reply("terminal length 0\r\nedge1#")
        .expect_write("terminal width 512\n")
        .reply("terminal width 512\r\nedge1#")
        .expect_write("show clock\n")
        .reply("show clock\r\n*10:42:17.123 UTC Fri Oct 16 2026\r\nedge1#")
        // send_config
        .expect_write("\n")
        .reply("\r\nedge1#")
        .expect_write("configure terminal\n")
        .reply("configure terminal\r\nEnter configuration commands, one per line.\r\nedge1(config)#")
        .expect_write("hostname edge1\n")
        .reply("hostname edge1\r\nedge1(config)#")
        .expect_write("\n")
        .reply("\r\nedge1(config)#")
        .expect_write("end\n")
        .reply("end\r\nedge1#");
    let log = device.write_log();

    let mut driver = DriverBuilder::new("edge1")
        .platform("cisco_iosxe")
        .enable_secret("s3cret")
        .transport(device)
        .build_blocking()?;

    driver.open()?;
    println!("privilege after open: {:?}", driver.current_privilege());

    let clock = driver.send_command("show clock")?;
    println!("show clock -> {:?} ({:?})", clock.result, clock.elapsed);

    let responses = driver.send_config(&["hostname edge1"])?;
    println!("config applied: {}", responses.iter().all(|r| r.is_success()));
    println!("privilege after config: {:?}", driver.current_privilege());

    driver.close()?;
    println!("\nbytes written by the driver:");
    for write in log.writes() {
        println!("  {:?}", write);
    }
    Ok(())
}
