//! Config Session example
//!
//! Demonstrates the two ways of changing configuration:
//! - `send_config` on any platform with a configuration level
//! - a guarded named session (Arista EOS `configure session NAME`) that is
//!   committed or aborted explicitly
//!
//! # Usage
//!
//! ```bash
//! # Cisco IOS-XE, plain configuration mode
//! cargo run --example config_session -- --host router1 --user admin --password secret \
//!     --platform cisco_iosxe --enable-secret s3cret
//!
//! # Arista EOS named session, aborted at the end
//! cargo run --example config_session -- --host switch1 --user admin --password secret \
//!     --platform arista_eos --session demo
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use cliscrape::DriverBuilder;
use cliscrape::driver::{ConfigSession, NamedSession};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    println!(
        "Connecting to {}:{} (platform: {})...",
        args.host, args.port, args.platform
    );

    let mut builder = DriverBuilder::new(&args.host)
        .port(args.port)
        .username(&args.user)
        .platform(&args.platform)
        .timeout_ops(Duration::from_secs(args.timeout));

    if let Some(password) = &args.password {
        builder = builder.password(password);
    } else if let Some(key_path) = &args.key {
        builder = builder.private_key(key_path);
    } else {
        eprintln!("Error: Must provide either --password or --key");
        std::process::exit(1);
    }
    if let Some(secret) = &args.enable_secret {
        builder = builder.enable_secret(secret);
    }

    let mut driver = builder.build()?;
    driver.open().await?;
    println!(
        "Connected at privilege level {:?}\n",
        driver.current_privilege()
    );

    match &args.session {
        Some(name) => {
            println!("--- Named session {} ---", name);
            let mut session = driver.named_config_session(name).await?;
            println!("Entered session {}", session.session_name());
            let response = session.send_command("interface Loopback99").await?;
            println!("  interface Loopback99 -> success: {}", response.is_success());
            let response = session.send_command("description cliscrape demo").await?;
            println!("  description -> success: {}", response.is_success());
            session.abort().await?;
            println!("Session aborted, changes discarded");
        }
        None => {
            println!("--- send_config ---");
            let responses = driver
                .send_config(&["interface Loopback99", "description cliscrape demo"])
                .await?;
            for response in &responses {
                println!(
                    "  {} -> success: {}",
                    response.command,
                    response.is_success()
                );
            }
            driver.send_config(&["no interface Loopback99"]).await?;
        }
    }

    println!(
        "\nBack at privilege level {:?}",
        driver.current_privilege()
    );
    driver.close().await?;
    println!("Done!");

    Ok(())
}

/// Simple argument parser
struct Args {
    host: String,
    port: u16,
    user: String,
    password: Option<String>,
    key: Option<PathBuf>,
    timeout: u64,
    platform: String,
    enable_secret: Option<String>,
    session: Option<String>,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut parsed = Self {
            host: "localhost".to_string(),
            port: 22,
            user: env::var("USER").unwrap_or_else(|_| "root".to_string()),
            password: None,
            key: None,
            timeout: 30,
            platform: "arista_eos".to_string(),
            enable_secret: None,
            session: None,
        };

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1).cloned();
            match args[i].as_str() {
                "--host" | "-h" => parsed.host = value.unwrap_or(parsed.host),
                "--port" | "-p" => {
                    parsed.port = value.and_then(|v| v.parse().ok()).unwrap_or(22)
                }
                "--user" | "-u" => parsed.user = value.unwrap_or(parsed.user),
                "--password" | "-P" => parsed.password = value,
                "--key" | "-k" => parsed.key = value.map(PathBuf::from),
                "--timeout" | "-t" => {
                    parsed.timeout = value.and_then(|v| v.parse().ok()).unwrap_or(30)
                }
                "--platform" => parsed.platform = value.unwrap_or(parsed.platform),
                "--enable-secret" => parsed.enable_secret = value,
                "--session" => parsed.session = value,
                other => {
                    eprintln!("Unknown argument: {}", other);
                    i += 1;
                    continue;
                }
            }
            i += 2;
        }
        parsed
    }
}
