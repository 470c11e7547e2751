//! `jaide` - run one operation against many Junos devices.
//!
//! Every device gets its own connection. Per-device failures are reported
//! in that device's output and never change the exit code; the process exits
//! non-zero only when the arguments are rejected before any device is
//! contacted.

mod cli;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::{debug, warn};

use jaide::error::UsageError;
use jaide::{
    CommandBatch, CommitMode, CommitOptions, Coordinator, DeviceBuilder, DiffMode, Operation,
    OutputFormat, OutputSink, SinkMode,
};

use cli::{Cli, Commands, DiffModeArg, FormatArg};

/// Exit code for rejected arguments.
const USAGE_EXIT: u8 = 2;

/// Exit code when interrupted.
const INTERRUPTED_EXIT: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let (targets, operation, sink) = match prepare(&cli) {
        Ok(prepared) => prepared,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(USAGE_EXIT);
        }
    };

    let template = DeviceBuilder::new("")
        .port(cli.port)
        .username(&cli.username)
        .password(&cli.password)
        .connect_timeout(Duration::from_secs(cli.connect_timeout))
        .session_timeout(Duration::from_secs(cli.session_timeout));

    let mut coordinator = Coordinator::new(template).sink(sink);
    if let Some(n) = cli.concurrency {
        coordinator = coordinator.concurrency(n);
    }

    tokio::select! {
        outcome = coordinator.run(&targets, &operation) => match outcome {
            Ok(results) => {
                let failed = results.iter().filter(|r| !r.is_success()).count();
                debug!("{} device(s) done, {} failed", results.len(), failed);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::from(USAGE_EXIT)
            }
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, abandoning devices still in progress");
            ExitCode::from(INTERRUPTED_EXIT)
        }
    }
}

/// Turn the arguments into targets, one operation and an output sink.
fn prepare(cli: &Cli) -> jaide::Result<(CommandBatch, Operation, OutputSink)> {
    let targets = CommandBatch::parse(&cli.hosts)?;
    let operation = build_operation(&cli.command, targets.len())?;
    let sink = build_sink(cli.write.as_deref(), cli.quiet)?;
    operation.validate(targets.len())?;
    Ok((targets, operation, sink))
}

fn build_operation(command: &Commands, target_count: usize) -> jaide::Result<Operation> {
    let operation = match command {
        Commands::Commit {
            commands,
            blank,
            check,
            sync,
            comment,
            confirm,
            at_time,
        } => {
            let commands = CommandBatch::parse(commands)?;
            if *check {
                Operation::CommitCheck { commands }
            } else {
                let mode = match (confirm, at_time) {
                    (Some(_), Some(_)) => {
                        return Err(UsageError::Conflict {
                            first: "--confirm",
                            second: "--at",
                        }
                        .into());
                    }
                    (Some(seconds), None) => CommitMode::confirmed(*seconds)?,
                    (None, Some(time)) => CommitMode::at(time)?,
                    (None, None) => CommitMode::Immediate,
                };
                Operation::Commit {
                    commands,
                    mode,
                    options: CommitOptions {
                        comment: comment.clone(),
                        synchronize: *sync,
                    },
                    blank: *blank,
                }
            }
        }

        Commands::Compare { commands } => Operation::CompareConfig {
            commands: CommandBatch::parse(commands)?,
        },

        Commands::Pull {
            source,
            destination,
            progress,
        } => Operation::ScpPull {
            source: source.clone(),
            destination: destination.clone(),
            progress: *progress,
            multi: target_count > 1,
        },

        Commands::Push {
            source,
            destination,
            progress,
        } => Operation::ScpPush {
            source: source.clone(),
            destination: destination.clone(),
            progress: *progress,
        },

        Commands::Operational {
            commands,
            format,
            xpath,
        } => Operation::OpCommand {
            commands: CommandBatch::parse(commands)?,
            format: match format {
                FormatArg::Text => OutputFormat::Text,
                FormatArg::Xml => OutputFormat::Xml,
            },
            xpath: xpath.clone(),
        },

        Commands::Info => Operation::DeviceInfo,

        Commands::Diff { second_host, mode } => Operation::DiffConfig {
            second_host: second_host.clone(),
            mode: match mode {
                DiffModeArg::Set => DiffMode::Set,
                DiffModeArg::Stanza => DiffMode::Stanza,
            },
        },

        Commands::Health => Operation::HealthCheck,

        Commands::Errors => Operation::InterfaceErrors,

        Commands::Shell { commands } => Operation::ShellCommand {
            commands: CommandBatch::parse(commands)?,
        },
    };
    Ok(operation)
}

/// Output destination from `-w MODE FILE` and `--quiet`.
fn build_sink(write: Option<&[String]>, quiet: bool) -> jaide::Result<OutputSink> {
    let mode = match write {
        None if quiet => SinkMode::Quiet,
        None => SinkMode::Stdout,
        Some([mode, file]) => {
            let path = PathBuf::from(file);
            match mode.to_lowercase().as_str() {
                "s" | "single" => SinkMode::SingleFile(path),
                "m" | "multiple" => SinkMode::PerTarget(path),
                _ => {
                    return Err(UsageError::Invalid {
                        message: "The first argument of the -w/--write option must specify whether \
                                  to write to one file per device, or all device output to a single \
                                  file. Valid options are \"s\", \"single\", \"m\", and \"multiple\""
                            .to_string(),
                    }
                    .into());
                }
            }
        }
        Some(_) => {
            return Err(UsageError::Invalid {
                message: "-w/--write expects a mode and a file path".to_string(),
            }
            .into());
        }
    };
    Ok(OutputSink::new(mode).announce(!quiet))
}
