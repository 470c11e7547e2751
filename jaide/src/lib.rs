//! # Jaide
//!
//! Async engine for bulk automation of Junos devices over SSH.
//!
//! Jaide runs operational and shell commands, commits configuration, copies
//! files and diffs configurations, against one device or many at once.
//!
//! ## Features
//!
//! - One live session per device, switched on demand between NETCONF, exec
//!   channels, an interactive PTY shell (CLI or raw shell prompt) and SFTP
//! - Candidate configuration transactions that always unlock
//! - Commit confirmed, scheduled commits, commit check and `show | compare`
//! - Canned device info, health check and interface error reports
//! - Concurrent fan-out with per-device failure isolation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jaide::{CommandBatch, Coordinator, DeviceBuilder, Operation, OutputFormat};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), jaide::Error> {
//!     let template = DeviceBuilder::new("")
//!         .username("netops")
//!         .password("secret");
//!
//!     let targets = CommandBatch::parse("10.0.0.1, 10.0.0.2")?;
//!     let operation = Operation::OpCommand {
//!         commands: CommandBatch::parse("show version, show chassis alarms")?,
//!         format: OutputFormat::Text,
//!         xpath: None,
//!     };
//!
//!     // Results are printed as each device finishes
//!     let results = Coordinator::new(template).run(&targets, &operation).await?;
//!     println!("{} of {} succeeded", results.iter().filter(|r| r.is_success()).count(), results.len());
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod driver;
pub mod error;
pub mod fanout;
pub mod session;
pub mod transport;
pub mod xml;

// Re-export main types for convenience
pub use driver::{
    CommandBatch, CommitMode, CommitOptions, DeviceBuilder, DeviceResult, DiffMode, Operation,
    OutputFormat, ResultStatus,
};
pub use error::{Error, ErrorKind, Result};
pub use fanout::{Coordinator, OutputSink, SinkMode};
pub use session::{DeviceHandle, SessionKind, ShellMode};
pub use transport::{HostKeyVerification, SshConnector};
