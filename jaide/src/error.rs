//! Error types for jaide.
//!
//! Errors are layered the same way the engine is: transport problems
//! (connect, authenticate, host keys), channel problems (reads, framing),
//! device-reported RPC failures, dispatcher misuse, and argument validation.
//! [`Error::kind`] folds all of them into the small taxonomy the coordinator
//! reports per device.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::session::SessionKind;

/// Main error type for jaide operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel operation errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Errors reported by the device over the structured RPC session
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// Dispatcher-level errors
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// Invalid or conflicting arguments, raised before any device is contacted
    #[error("Usage error: {0}")]
    Usage(#[from] UsageError),
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// The host key differs from the one stored in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// The host is not in known_hosts and strict checking is enabled
    #[error("Host key for {host}:{port} is unknown")]
    HostKeyUnknown { host: String, port: u16 },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Channel layer errors (exec, PTY, subsystem framing).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Failed to open a PTY shell
    #[error("Failed to request shell")]
    ShellRequestFailed,

    /// The exec request was refused by the server
    #[error("Exec request refused: {command}")]
    ExecRefused { command: String },

    /// The subsystem request was refused by the server
    #[error("Subsystem '{name}' refused")]
    SubsystemRefused { name: String },

    /// Nothing arrived on the channel within the session timeout
    #[error("No output within {0:?}")]
    Timeout(Duration),

    /// Channel closed unexpectedly
    #[error("Channel closed")]
    Closed,

    /// SSH protocol error on the channel
    #[error("Channel SSH error: {0}")]
    Ssh(russh::Error),

    /// The peer sent a message that violates the session framing
    #[error("Framing error: {0}")]
    Framing(String),

    /// SFTP subsystem error
    #[error("SFTP error: {0}")]
    Sftp(String),
}

/// Errors carried back by the structured RPC session.
#[derive(Error, Debug)]
pub enum RpcError {
    /// The device returned an `<rpc-error>` with severity `error`
    #[error("{message}")]
    Reply { message: String },

    /// The candidate configuration is locked or has uncommitted edits
    #[error("Candidate configuration could not be locked: {message}")]
    LockContention { message: String },

    /// The device rejected the commit; `message` is the device text
    #[error("{message}")]
    CommitFailed { message: String },

    /// The reply was not well-formed XML
    #[error("Malformed XML: {0}")]
    Xml(String),
}

/// Dispatcher errors (misuse, missing data, transfers).
#[derive(Error, Debug)]
pub enum DriverError {
    /// An empty or missing command set where one was required
    #[error("Invalid command: {message}")]
    InvalidCommand { message: String },

    /// The active session is not of the kind the operation needs
    #[error("Expected a {expected} session, found {actual}")]
    SessionMismatch {
        expected: SessionKind,
        actual: SessionKind,
    },

    /// Driver not connected
    #[error("No active session")]
    NotConnected,

    /// A structured reply lacked an element the operation relies on
    #[error("Missing '{path}' in device reply")]
    MissingElement { path: String },

    /// An extraction expression could not be parsed
    #[error("Invalid query expression '{expression}': {message}")]
    InvalidQuery { expression: String, message: String },

    /// A file copy failed part way
    #[error("Transfer failed for {path}: {message}")]
    Transfer { path: String, message: String },

    /// The second device of a cross-device diff failed
    #[error("{host}: {source}")]
    Peer {
        host: String,
        #[source]
        source: Box<Error>,
    },
}

/// Invalid or conflicting arguments.
#[derive(Error, Debug)]
pub enum UsageError {
    /// A cross-device diff was requested against several targets
    #[error("diff accepts exactly one target, got {count}")]
    MultiTargetDiff { count: usize },

    /// No targets were supplied
    #[error("no target devices were given")]
    NoTargets,

    /// A scheduled-commit time is malformed
    #[error(
        "A commit at time must be in one of the two formats: 'hh:mm[:ss]' or \
         'yyyy-mm-dd hh:mm[:ss]' (seconds are optional), got '{0}'"
    )]
    InvalidCommitTime(String),

    /// A commit-confirm timeout is out of range
    #[error("commit confirm timeout must be between 60 and 7200 seconds, got {0}")]
    InvalidConfirmTimeout(u64),

    /// Two options were given that exclude each other
    #[error("{first} and {second} are mutually exclusive")]
    Conflict {
        first: &'static str,
        second: &'static str,
    },

    /// A required value was missing or malformed
    #[error("{message}")]
    Invalid { message: String },
}

/// Coarse classification of an [`Error`], used for per-device reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unreachable host, refused port, SSH negotiation or host-key failure
    Connection,
    /// Bad credentials
    Authentication,
    /// Connect or command/session bound exceeded
    Timeout,
    /// Candidate configuration already locked
    LockContention,
    /// Device rejected the commit
    Commit,
    /// Empty or missing command set
    InvalidCommand,
    /// Malformed or conflicting arguments
    Usage,
    /// Any other device interaction failure
    Operation,
}

impl ErrorKind {
    /// Whether the target could not be reached or logged into at all.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            ErrorKind::Connection | ErrorKind::Authentication | ErrorKind::Timeout
        )
    }
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(TransportError::AuthenticationFailed { .. }) => {
                ErrorKind::Authentication
            }
            Error::Transport(TransportError::Timeout(_)) => ErrorKind::Timeout,
            Error::Transport(_) => ErrorKind::Connection,
            Error::Channel(ChannelError::Timeout(_)) => ErrorKind::Timeout,
            Error::Channel(ChannelError::Ssh(_))
            | Error::Channel(ChannelError::ShellRequestFailed)
            | Error::Channel(ChannelError::SubsystemRefused { .. }) => ErrorKind::Connection,
            Error::Channel(_) => ErrorKind::Operation,
            Error::Rpc(RpcError::LockContention { .. }) => ErrorKind::LockContention,
            Error::Rpc(RpcError::CommitFailed { .. }) => ErrorKind::Commit,
            Error::Rpc(_) => ErrorKind::Operation,
            Error::Driver(DriverError::InvalidCommand { .. }) => ErrorKind::InvalidCommand,
            Error::Driver(DriverError::Peer { source, .. }) => source.kind(),
            Error::Driver(_) => ErrorKind::Operation,
            Error::Usage(_) => ErrorKind::Usage,
        }
    }

    /// Shorthand for [`DriverError::InvalidCommand`].
    pub fn invalid_command(message: impl Into<String>) -> Self {
        DriverError::InvalidCommand {
            message: message.into(),
        }
        .into()
    }
}

/// Result type alias using jaide's Error.
pub type Result<T> = std::result::Result<T, Error>;
