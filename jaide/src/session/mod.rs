//! Session state machine.
//!
//! A [`DeviceHandle`] owns at most one [`ActiveSession`] at a time. Every
//! dispatcher operation declares the [`SessionKind`] it needs and calls
//! [`DeviceHandle::ensure_session`] before touching the device; the handle
//! decides whether the current session can be reused, whether an interactive
//! shell only needs to move between the CLI and the raw shell, or whether the
//! old session must be closed and a new one opened.
//!
//! The transports themselves sit behind the object-safe traits in this
//! module ([`RpcSession`], [`ExecSession`], [`ShellSession`],
//! [`TransferSession`]) and are opened through a [`Connector`]. The shipped
//! implementation is [`crate::transport::SshConnector`].

mod handle;

pub use handle::{DeviceHandle, ShellTiming};

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::Result;
use crate::transport::HostKeyVerification;
use crate::xml::XmlElement;

/// Where an interactive shell is currently positioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShellMode {
    /// At the Junos CLI (`user@host>` prompt)
    Cli,
    /// At the underlying raw OS shell (`%`, `$` or root `#` prompt)
    Shell,
}

impl fmt::Display for ShellMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellMode::Cli => write!(f, "cli"),
            ShellMode::Shell => write!(f, "shell"),
        }
    }
}

/// The transport kind an operation requires.
///
/// For [`SessionKind::InteractiveShell`] the mode is the prompt the caller
/// needs the shell to be sitting at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    StructuredRpc,
    ExecChannel,
    InteractiveShell(ShellMode),
    Transfer,
}

impl SessionKind {
    /// Whether two kinds share the same underlying transport.
    ///
    /// Two interactive shells are the same transport even when positioned at
    /// different prompts.
    pub fn same_transport(self, other: SessionKind) -> bool {
        matches!(
            (self, other),
            (SessionKind::StructuredRpc, SessionKind::StructuredRpc)
                | (SessionKind::ExecChannel, SessionKind::ExecChannel)
                | (SessionKind::InteractiveShell(_), SessionKind::InteractiveShell(_))
                | (SessionKind::Transfer, SessionKind::Transfer)
        )
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::StructuredRpc => write!(f, "structured-rpc"),
            SessionKind::ExecChannel => write!(f, "exec-channel"),
            SessionKind::InteractiveShell(mode) => write!(f, "interactive-shell ({mode})"),
            SessionKind::Transfer => write!(f, "transfer"),
        }
    }
}

/// Everything a [`Connector`] needs to reach one device.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    /// Hostname or IP address.
    pub host: String,

    /// SSH port.
    pub port: u16,

    /// Login user.
    pub username: String,

    /// Login password.
    pub password: SecretString,

    /// Time permitted to establish and authenticate the transport.
    pub connect_timeout: Duration,

    /// Time permitted for a single command or RPC to produce output.
    pub session_timeout: Duration,

    /// Host key checking mode.
    pub host_key_verification: HostKeyVerification,

    /// known_hosts file; the user's default when unset.
    pub known_hosts_path: Option<PathBuf>,

    /// Where an interactive login lands when the prompt cannot be recognised.
    pub landing: ShellMode,
}

/// Collected output of one exec request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    /// Standard output followed by standard error.
    pub fn combined(self) -> String {
        let mut out = self.stdout;
        out.push_str(&self.stderr);
        out
    }
}

/// Modifiers of a `commit-configuration` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitRequest {
    /// Roll back automatically after this many minutes unless re-confirmed.
    pub confirm_minutes: Option<u64>,

    /// Schedule the commit for this time instead of committing now.
    pub at_time: Option<String>,

    /// Commit log comment.
    pub comment: Option<String>,

    /// Commit on both routing engines.
    pub synchronize: bool,
}

/// Per-file progress hook for transfers: `(file, total_bytes, transferred)`.
pub type ProgressFn<'a> = &'a mut (dyn FnMut(&str, u64, u64) + Send);

/// Structured RPC session (NETCONF on Junos).
#[async_trait]
pub trait RpcSession: Send {
    /// Lock the candidate configuration.
    async fn lock(&mut self) -> Result<()>;

    /// Release the candidate configuration lock.
    async fn unlock(&mut self) -> Result<()>;

    /// Load `set`-style commands into the candidate configuration.
    async fn load_configuration(&mut self, commands: &[String]) -> Result<()>;

    /// Run a commit check against the candidate.
    async fn validate(&mut self) -> Result<XmlElement>;

    /// Commit the candidate configuration.
    async fn commit(&mut self, request: &CommitRequest) -> Result<XmlElement>;

    /// Compare the candidate against the active configuration.
    async fn compare_configuration(&mut self) -> Result<XmlElement>;

    /// Run a CLI command, returning the reply tree.
    ///
    /// With `text` set the device wraps its plain-text output in the reply.
    async fn command(&mut self, command: &str, text: bool) -> Result<XmlElement>;

    /// Issue an argument-less RPC such as `get-software-information`.
    async fn rpc(&mut self, name: &str) -> Result<XmlElement>;

    /// Close the session.
    async fn close(&mut self) -> Result<()>;
}

/// Non-interactive command execution.
#[async_trait]
pub trait ExecSession: Send {
    /// Run one command and collect its output.
    async fn exec(&mut self, command: &str) -> Result<ExecOutput>;

    /// Close the connection.
    async fn close(&mut self) -> Result<()>;
}

/// Interactive pseudo-terminal.
#[async_trait]
pub trait ShellSession: Send {
    /// The prompt the login landed on, when it could be recognised.
    fn landed_at(&self) -> Option<ShellMode>;

    /// Write raw text to the terminal.
    async fn send(&mut self, text: &str) -> Result<()>;

    /// Collect output until nothing new arrives for `idle`.
    ///
    /// Waits up to `first_byte` for output to begin.
    async fn read_until_idle(&mut self, first_byte: Duration, idle: Duration) -> Result<String>;

    /// Collect whatever arrives within `settle` and throw it away.
    async fn settle(&mut self, settle: Duration) -> Result<()>;

    /// Close the channel and the connection.
    async fn close(&mut self) -> Result<()>;
}

/// File copy channel.
#[async_trait]
pub trait TransferSession: Send {
    /// Copy a remote file or directory tree to exactly `local`.
    async fn pull(
        &mut self,
        remote: &str,
        local: &Path,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<()>;

    /// Copy a local file or directory tree to exactly `remote`.
    async fn push(
        &mut self,
        local: &Path,
        remote: &str,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<()>;

    /// Close the connection.
    async fn close(&mut self) -> Result<()>;
}

/// Opens transports of each kind.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open_rpc(&self, params: &ConnectParams) -> Result<Box<dyn RpcSession>>;

    async fn open_exec(&self, params: &ConnectParams) -> Result<Box<dyn ExecSession>>;

    async fn open_shell(&self, params: &ConnectParams) -> Result<Box<dyn ShellSession>>;

    async fn open_transfer(&self, params: &ConnectParams) -> Result<Box<dyn TransferSession>>;
}

/// The one live session of a [`DeviceHandle`].
pub enum ActiveSession {
    StructuredRpc(Box<dyn RpcSession>),
    ExecChannel(Box<dyn ExecSession>),
    InteractiveShell {
        shell: Box<dyn ShellSession>,
        in_cli: bool,
    },
    Transfer(Box<dyn TransferSession>),
}

impl ActiveSession {
    /// The kind of this session, including the shell position.
    pub fn kind(&self) -> SessionKind {
        match self {
            ActiveSession::StructuredRpc(_) => SessionKind::StructuredRpc,
            ActiveSession::ExecChannel(_) => SessionKind::ExecChannel,
            ActiveSession::InteractiveShell { in_cli: true, .. } => {
                SessionKind::InteractiveShell(ShellMode::Cli)
            }
            ActiveSession::InteractiveShell { in_cli: false, .. } => {
                SessionKind::InteractiveShell(ShellMode::Shell)
            }
            ActiveSession::Transfer(_) => SessionKind::Transfer,
        }
    }

    async fn close(self) -> Result<()> {
        match self {
            ActiveSession::StructuredRpc(mut s) => s.close().await,
            ActiveSession::ExecChannel(mut s) => s.close().await,
            ActiveSession::InteractiveShell { mut shell, .. } => shell.close().await,
            ActiveSession::Transfer(mut s) => s.close().await,
        }
    }
}

impl fmt::Debug for ActiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ActiveSession").field(&self.kind()).finish()
    }
}
