//! Bulk operational commands example
//!
//! Runs a few `show` commands against several Junos devices at once and
//! prints each device's report as soon as it finishes.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example bulk_show -- --hosts 10.0.0.1,10.0.0.2 --user admin --password secret
//!
//! # Hosts from a file, custom commands with an inline extraction expression
//! cargo run --example bulk_show -- --hosts routers.txt --user admin --password secret \
//!     --commands "show version, show interfaces terse % //physical-interface/name"
//! ```

use std::env;
use std::pin::pin;
use std::time::Duration;

use futures_util::StreamExt;

use jaide::{CommandBatch, Coordinator, DeviceBuilder, Operation, OutputFormat};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let targets = CommandBatch::parse(&args.hosts)?;
    println!("Running on {} device(s)...\n", targets.len());

    let template = DeviceBuilder::new("")
        .port(args.port)
        .username(&args.user)
        .password(&args.password)
        .session_timeout(Duration::from_secs(args.timeout));

    let operation = Operation::OpCommand {
        commands: CommandBatch::parse(&args.commands)?,
        format: OutputFormat::Text,
        xpath: None,
    };

    // Results arrive in completion order, not input order
    let coordinator = Coordinator::new(template).concurrency(args.concurrency);
    let mut results = pin!(coordinator.stream(&targets, &operation)?);

    let mut failed = 0;
    while let Some(result) = results.next().await {
        if !result.is_success() {
            failed += 1;
        }
        print!("{}", result);
    }

    println!("\n{} device(s) done, {} failed", targets.len(), failed);
    Ok(())
}

struct Args {
    hosts: String,
    port: u16,
    user: String,
    password: String,
    timeout: u64,
    concurrency: usize,
    commands: String,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut hosts = "localhost".to_string();
        let mut port = 22u16;
        let mut user = env::var("USER").unwrap_or_else(|_| "admin".to_string());
        let mut password = String::new();
        let mut timeout = 300u64;
        let mut concurrency = 8usize;
        let mut commands = "show version, show system uptime".to_string();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--hosts" | "-i" => {
                    i += 1;
                    if i < args.len() {
                        hosts = args[i].clone();
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
                "--timeout" | "-t" => {
                    i += 1;
                    if i < args.len() {
                        timeout = args[i].parse().unwrap_or(300);
                    }
                }
                "--concurrency" | "-n" => {
                    i += 1;
                    if i < args.len() {
                        concurrency = args[i].parse().unwrap_or(8);
                    }
                }
                "--commands" | "-c" => {
                    i += 1;
                    if i < args.len() {
                        commands = args[i].clone();
                    }
                }
                "--help" => {
                    println!("Usage: bulk_show [OPTIONS]");
                    println!();
                    println!("Options:");
                    println!("  -i, --hosts <HOSTS>      Hosts, comma separated or a file (default: localhost)");
                    println!("  -P, --port <PORT>        SSH port (default: 22)");
                    println!("  -u, --user <USER>        Username (default: $USER)");
                    println!("  -p, --password <PASS>    Password");
                    println!("  -t, --timeout <SECS>     Session timeout (default: 300)");
                    println!("  -n, --concurrency <N>    Devices worked on at once (default: 8)");
                    println!("  -c, --commands <CMDS>    Commands, comma separated or a file");
                    println!("      --help               Show this help");
                    std::process::exit(0);
                }
                _ => {}
            }
            i += 1;
        }

        Self {
            hosts,
            port,
            user,
            password,
            timeout,
            concurrency,
            commands,
        }
    }
}
