//! Command dispatcher.
//!
//! Every device operation is a method on [`DeviceHandle`] that first asks the
//! session state machine for the transport it needs, then performs the Junos
//! exchange. [`Operation`] names one of these requests so that the
//! coordinator can fan it out across hosts and [`DeviceHandle::run`] can turn
//! it into a formatted [`DeviceResult`].
//!
//! [`DeviceHandle`]: crate::session::DeviceHandle
//! [`DeviceHandle::run`]: crate::session::DeviceHandle::run

mod batch;
mod builder;
pub mod config_session;
mod diff;
mod dispatch;
mod inventory;
mod operational;
mod response;
mod transfer;

pub use batch::CommandBatch;
pub use builder::DeviceBuilder;
pub use config_session::{
    BLANK_COMMIT, CommitMode, CommitOptions, CommitState, CommitTime, ConfigTransaction,
    parse_commit_results,
};
pub use diff::DiffMode;
pub use inventory::scan_interface_errors;
pub use operational::split_extraction;
pub use response::{DeviceResult, ResultStatus};
pub use transfer::{ProgressReporter, normalize_destination, normalize_source};

use std::fmt;

use crate::error::{Error, Result, UsageError};
use crate::session::{SessionKind, ShellMode};

/// Output format requested for an operational command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Xml,
}

/// One request the dispatcher can run against a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Operational-mode CLI commands.
    OpCommand {
        commands: CommandBatch,
        format: OutputFormat,
        /// Extraction expression applied to every command's XML reply.
        xpath: Option<String>,
    },

    /// Commands for the raw OS shell.
    ShellCommand { commands: CommandBatch },

    /// Load `set` commands and commit them.
    Commit {
        commands: CommandBatch,
        mode: CommitMode,
        options: CommitOptions,
        /// Commit without changes, e.g. to confirm a pending commit confirmed.
        blank: bool,
    },

    /// Load `set` commands and run a commit check.
    CommitCheck { commands: CommandBatch },

    /// Load `set` commands and show the candidate diff.
    CompareConfig { commands: CommandBatch },

    /// Diff this device's configuration against `second_host`.
    DiffConfig { second_host: String, mode: DiffMode },

    /// Copy a file or directory from the device.
    ScpPull {
        source: String,
        destination: String,
        progress: bool,
        /// Prefix local files with the target name.
        multi: bool,
    },

    /// Copy a file or directory to the device.
    ScpPush {
        source: String,
        destination: String,
        progress: bool,
    },

    DeviceInfo,
    HealthCheck,
    InterfaceErrors,
}

impl Operation {
    /// The session kind this operation needs.
    ///
    /// Operational commands use an exec channel unless the account lands in
    /// the raw shell, in which case they run through the CLI of an
    /// interactive shell.
    pub fn required_kind(&self, root_login: bool) -> SessionKind {
        match self {
            Operation::OpCommand { .. } if root_login => {
                SessionKind::InteractiveShell(ShellMode::Cli)
            }
            Operation::OpCommand { .. } => SessionKind::ExecChannel,
            Operation::ShellCommand { .. } => SessionKind::InteractiveShell(ShellMode::Shell),
            Operation::ScpPull { .. } | Operation::ScpPush { .. } => SessionKind::Transfer,
            Operation::Commit { .. }
            | Operation::CommitCheck { .. }
            | Operation::CompareConfig { .. }
            | Operation::DiffConfig { .. }
            | Operation::DeviceInfo
            | Operation::HealthCheck
            | Operation::InterfaceErrors => SessionKind::StructuredRpc,
        }
    }

    /// Reject requests that can never succeed, before any device is contacted.
    pub fn validate(&self, target_count: usize) -> Result<()> {
        if target_count == 0 {
            return Err(UsageError::NoTargets.into());
        }
        match self {
            Operation::OpCommand { commands, .. } | Operation::ShellCommand { commands }
                if commands.is_empty() =>
            {
                Err(Error::invalid_command("No commands specified"))
            }
            Operation::CommitCheck { commands } | Operation::CompareConfig { commands }
                if commands.is_empty() =>
            {
                Err(Error::invalid_command("No commands specified"))
            }
            Operation::Commit {
                commands, blank, ..
            } if commands.is_empty() && !blank => Err(UsageError::Invalid {
                message: "no commit commands given; use a blank commit to commit without changes"
                    .to_string(),
            }
            .into()),
            Operation::DiffConfig { .. } if target_count > 1 => {
                Err(UsageError::MultiTargetDiff {
                    count: target_count,
                }
                .into())
            }
            Operation::DiffConfig { second_host, .. } if second_host.trim().is_empty() => {
                Err(UsageError::Invalid {
                    message: "diff needs a second device".to_string(),
                }
                .into())
            }
            _ => Ok(()),
        }
    }

    /// Whether a transfer draws a progress line on the terminal.
    pub fn reports_progress(&self) -> bool {
        match self {
            Operation::ScpPull { progress, .. } | Operation::ScpPush { progress, .. } => *progress,
            _ => false,
        }
    }

    /// The same operation with transfer progress switched off.
    pub fn without_progress(mut self) -> Self {
        if let Operation::ScpPull { progress, .. } | Operation::ScpPush { progress, .. } = &mut self {
            *progress = false;
        }
        self
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::OpCommand { .. } => "operational command",
            Operation::ShellCommand { .. } => "shell command",
            Operation::Commit { .. } => "commit",
            Operation::CommitCheck { .. } => "commit check",
            Operation::CompareConfig { .. } => "compare config",
            Operation::DiffConfig { .. } => "config diff",
            Operation::ScpPull { .. } => "scp pull",
            Operation::ScpPush { .. } => "scp push",
            Operation::DeviceInfo => "device info",
            Operation::HealthCheck => "health check",
            Operation::InterfaceErrors => "interface errors",
        };
        f.write_str(name)
    }
}
