//! Offline example: stream output while the driver keeps track of the session.
//!
//! A scripted IOS-XE device answers three streamed commands. The first one
//! arrives in small pieces, the second one fails, the third one changes the
//! privilege level. A fourth one stalls past its timeout and the session
//! recovers on the next command. Run with `RUST_LOG=debug` to see the
//! channel at work.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example streaming
//! ```

use std::time::Duration;

use cliscrape::transport::ScriptedTransport;
use cliscrape::{DriverBuilder, GenericDriver};

const LOG_LINES: [&str; 5] = [
    "*Oct 16 10:40:01.120: %LINK-3-UPDOWN: Interface Gi1/0/1, changed state to up\r\n",
    "*Oct 16 10:40:02.480: %LINEPROTO-5-UPDOWN: Line protocol on Interface Gi1/0/1, changed state to up\r\n",
    "*Oct 16 10:41:17.002: %SYS-5-CONFIG_I: Configured from console by admin\r\n",
    "*Oct 16 10:42:09.731: %SEC_LOGIN-5-LOGIN_SUCCESS: Login Success [user: admin]\r\n",
    "*Oct 16 10:42:17.123: %SYS-6-CLOCKUPDATE: System clock has been updated\r\n",
];

fn device() -> ScriptedTransport {
    let mut device = ScriptedTransport::new()
        .reply("\r\nedge1#")
        .expect_write("\n")
        .reply("\r\nedge1#")
        .expect_write("terminal length 0\n")
        .reply("terminal length 0\r\nedge1#")
        .expect_write("terminal width 512\n")
        .reply("terminal width 512\r\nedge1#")
        .expect_write("show logging\n")
        .reply("show logging\r\n");
    for line in LOG_LINES {
        // the prompt detector must not trip over half lines
        let (head, tail) = line.split_at(line.len() / 2);
        device = device.reply(head).empty_read().reply(tail);
    }
    device
        .reply("edge1#")
        .expect_write("show interfaces Gi9/9\n")
        .reply("show interfaces Gi9/9\r\n                     ^\r\n% Invalid input detected at '^' marker.\r\n\r\nedge1#")
        .expect_write("configure terminal\n")
        .reply("configure terminal\r\nEnter configuration commands, one per line.  End with CNTL/Z.\r\nedge1(config)#")
        .expect_write("do show tech-support\n")
        .reply("do show tech-support\r\n------------------ show clock ------------------\r\n")
        .expect_write("do show clock\n")
        // the rest of show tech-support only arrives now
        .reply("*10:42:17.123 UTC Fri Oct 16 2026\r\nedge1(config)#")
        .reply("do show clock\r\n*10:42:18.004 UTC Fri Oct 16 2026\r\nedge1(config)#")
        .expect_write("\n")
        .reply("\r\nedge1(config)#")
        .expect_write("end\n")
        .reply("end\r\nedge1#")
}

async fn stream(
    driver: &mut GenericDriver,
    command: &str,
    timeout: Option<Duration>,
) -> cliscrape::Result<()> {
    println!("--- {command}");
    let mut stream = driver.send_command_stream_with(command, timeout).await?;
    let mut chunks = 0usize;
    while let Some(chunk) = stream.next_chunk().await? {
        chunks += 1;
        print!("{}", String::from_utf8_lossy(&chunk));
    }
    assert!(stream.is_finished());

    let response = stream.into_response()?;
    println!(
        "--- {chunks} chunk(s) in {:?}, prompt {:?}, success: {}",
        response.elapsed,
        response.prompt,
        response.is_success()
    );
    if let Some(pattern) = &response.failure_message {
        println!("    failed on {pattern:?}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut driver = DriverBuilder::new("edge1")
        .platform("cisco_iosxe")
        .transport(device())
        .build()?;
    driver.open().await?;
    println!("privilege after open: {:?}\n", driver.current_privilege());

    stream(&mut driver, "show logging", None).await?;
    stream(&mut driver, "show interfaces Gi9/9", None).await?;
    stream(&mut driver, "configure terminal", None).await?;
    println!("privilege after configure: {:?}\n", driver.current_privilege());

    let stalled = stream(
        &mut driver,
        "do show tech-support",
        Some(Duration::from_millis(200)),
    )
    .await;
    if let Err(e) = stalled {
        println!("\n--- gave up: {e} (retryable: {})", e.is_retryable());
        println!("    channel out of sync: {}", driver.channel().is_desynced());
    }
    // late output of the abandoned command is skipped
    stream(&mut driver, "do show clock", None).await?;
    println!("    channel out of sync: {}", driver.channel().is_desynced());

    driver.acquire_privilege("privilege_exec").await?;
    println!("\nprivilege at the end: {:?}", driver.current_privilege());
    Ok(())
}
