//! Commit confirmed example
//!
//! Shows the candidate diff for a set of `set` commands, runs a commit
//! check, then commits with an automatic rollback unless confirmed.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example commit_confirmed -- --host router1 --user admin --password secret \
//!     --commands "set system ntp server 10.0.0.1, set system ntp server 10.0.0.2"
//! ```

use std::env;

use jaide::{CommandBatch, CommitMode, CommitOptions, DeviceBuilder};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let commands = CommandBatch::parse(&args.commands)?;

    let mut device = DeviceBuilder::new(&args.host)
        .port(args.port)
        .username(&args.user)
        .password(&args.password)
        .build()?;

    println!("--- show | compare ---");
    match device.compare_config(commands.as_slice()).await {
        Ok(diff) => println!("{diff}"),
        Err(e) => {
            eprintln!("Compare failed: {e}");
            device.disconnect().await;
            return Err(e.into());
        }
    }

    println!("--- commit check ---");
    match device.commit_check(commands.as_slice()).await {
        Ok(results) => print!("{results}"),
        Err(e) => {
            eprintln!("Commit check failed: {e}");
            device.disconnect().await;
            return Err(e.into());
        }
    }

    println!("--- commit confirmed {}s ---", args.confirm);
    let mode = CommitMode::confirmed(args.confirm)?;
    let options = CommitOptions {
        comment: Some("committed by jaide example".to_string()),
        synchronize: false,
    };
    let outcome = device
        .commit(commands.as_slice(), &mode, &options, false)
        .await;
    device.disconnect().await;

    print!("{}", outcome?);
    if let Some(minutes) = mode.confirm_minutes() {
        println!("Rolls back in {minutes} minute(s) unless committed again.");
    }
    Ok(())
}

struct Args {
    host: String,
    port: u16,
    user: String,
    password: String,
    confirm: u64,
    commands: String,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut host = "localhost".to_string();
        let mut port = 22u16;
        let mut user = env::var("USER").unwrap_or_else(|_| "admin".to_string());
        let mut password = String::new();
        let mut confirm = 300u64;
        let mut commands = String::new();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-i" => {
                    i += 1;
                    if i < args.len() {
                        host = args[i].clone();
                    }
                }
                "--port" | "-P" => {
                    i += 1;
                    if i < args.len() {
                        port = args[i].parse().unwrap_or(22);
                    }
                }
                "--user" | "-u" => {
                    i += 1;
                    if i < args.len() {
                        user = args[i].clone();
                    }
                }
                "--password" | "-p" => {
                    i += 1;
                    if i < args.len() {
                        password = args[i].clone();
                    }
                }
                "--confirm" | "-C" => {
                    i += 1;
                    if i < args.len() {
                        confirm = args[i].parse().unwrap_or(300);
                    }
                }
                "--commands" | "-c" => {
                    i += 1;
                    if i < args.len() {
                        commands = args[i].clone();
                    }
                }
                _ => {}
            }
            i += 1;
        }

        Self {
            host,
            port,
            user,
            password,
            confirm,
            commands,
        }
    }
}
