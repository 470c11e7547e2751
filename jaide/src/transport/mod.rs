//! SSH transport layer wrapping russh.
//!
//! Connection setup and authentication live in [`SshTransport`]; each
//! session kind gets its own adapter on top of it:
//!
//! - [`SshExec`]: one `exec` channel per command
//! - [`SshShell`]: a PTY shell
//! - [`NetconfSession`]: the `netconf` subsystem
//! - [`SftpTransfer`]: the `sftp` subsystem
//!
//! [`SshConnector`] ties them to the [`crate::session::Connector`] seam.

pub mod config;
mod connector;
mod exec;
mod netconf;
mod sftp;
mod shell;
mod ssh;

pub use config::{HostKeyVerification, SshConfig};
pub use connector::SshConnector;
pub use exec::SshExec;
pub use netconf::NetconfSession;
pub use sftp::SftpTransfer;
pub use shell::SshShell;
pub use ssh::SshTransport;
