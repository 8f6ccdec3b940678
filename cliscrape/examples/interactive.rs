//! Interactive command example
//!
//! Demonstrates `send_interactive` for commands that stop and ask for
//! input, plus a trigger-driven read that answers prompts as they appear.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example interactive -- --host localhost --user your_username --password your_password
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use cliscrape::channel::{Termination, Trigger};
use cliscrape::{DriverBuilder, InteractiveBuilder, InteractiveEvent};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut builder = DriverBuilder::new(&args.host)
        .port(args.port)
        .username(&args.user)
        .platform("linux")
        .timeout_ops(Duration::from_secs(args.timeout));

    if let Some(password) = &args.password {
        builder = builder.password(password);
    } else if let Some(key_path) = &args.key {
        builder = builder.private_key(key_path);
    } else {
        eprintln!("Error: Must provide either --password or --key");
        std::process::exit(1);
    }

    let mut driver = builder.build()?;

    println!("Connecting to {}:{}...", args.host, args.port);
    driver.open().await?;
    println!("Connected!\n");

    // A single event waits for the prompt
    println!("--- Single event ---");
    let response = driver
        .send_interactive(&[InteractiveEvent::prompt("echo hello")])
        .await?;
    println!("  Output: {}", response.result.trim());
    println!("  Took: {:?}\n", response.elapsed);

    // The shell asks a question; answer it, then wait for the prompt
    println!("--- Question and answer ---");
    let events = InteractiveBuilder::new()
        .send("read -p 'Continue? [y/n] ' answer && echo \"You said: $answer\"")
        .expect("[y/n]")
        .send("y")
        .expect_prompt()
        .with_timeout(Duration::from_secs(5))
        .build();
    let response = driver.send_interactive(&events).await?;
    println!("  Inputs: {}", response.command);
    println!("  Output:\n{}", response.result);
    println!("  Success: {}\n", response.is_success());

    // Triggers answer every occurrence until the prompt shows up
    println!("--- Triggers ---");
    driver
        .channel_mut()
        .write_line("for i in 1 2 3; do read -p \"again? \" x; done; echo finished", false)
        .await?;
    let mut triggers = [Trigger::send("again?", "y")];
    let until = Termination::Contains("finished".to_string());
    let output = driver
        .read_with_triggers(&mut triggers, &until, Some(Duration::from_secs(10)))
        .await?;
    println!("  Trigger fired {} time(s)", triggers[0].fired());
    println!("  Took: {:?}\n", output.elapsed);
    driver.get_current_level().await?;

    if let Some(level) = driver.current_privilege() {
        println!("Current privilege level: {}", level);
    }

    println!("Closing connection...");
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
