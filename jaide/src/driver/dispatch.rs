//! Running an [`Operation`] and rendering its output.

use std::io;

use log::debug;

use super::config_session::CommitMode;
use super::transfer::normalize_source;
use super::{DeviceResult, Operation, OutputFormat, split_extraction};
use crate::error::{ChannelError, DriverError, Error, ErrorKind, Result, RpcError, TransportError};
use crate::session::DeviceHandle;

const LOCK_CONTENTION: &str = "Uncommitted changes left on the device or someone else is in edit \
                               mode, couldn't lock the candidate configuration.\n";

impl DeviceHandle {
    /// Run `operation` and render its output.
    ///
    /// Never fails: errors are rendered into the body after whatever output
    /// was already produced, and classified in the result status. The live
    /// session is left open; call [`disconnect`](Self::disconnect) when done
    /// with the device.
    pub async fn run(&mut self, operation: &Operation) -> DeviceResult {
        let host = self.host().to_string();
        debug!("{}: running {}", host, operation);

        let mut body = String::new();
        match self.perform(operation, &mut body).await {
            Ok(None) => DeviceResult::success(host, body),
            Ok(Some(kind)) => DeviceResult::failure(host, body, kind),
            Err(e) => {
                debug!("{}: {} failed: {}", host, operation, e);
                body.push_str(&describe(&host, self.port(), &e, operation));
                DeviceResult::failure(host, body, e.kind())
            }
        }
    }

    /// Write the output of `operation` to `out`.
    ///
    /// Returns the kind of a failure that has already been rendered.
    async fn perform(&mut self, operation: &Operation, out: &mut String) -> Result<Option<ErrorKind>> {
        let host = self.host().to_string();

        match operation {
            Operation::OpCommand {
                commands,
                format,
                xpath,
            } => {
                for line in commands {
                    out.push_str(&format!("> {line}\n"));
                    let (command, inline) = split_extraction(line);
                    match inline.or(xpath.as_deref()) {
                        Some(expression) => {
                            match self.op_cmd(command, OutputFormat::Xml, Some(expression)).await {
                                Ok(text) => {
                                    out.push_str(&text);
                                    out.push('\n');
                                }
                                Err(Error::Rpc(RpcError::Xml(reason))) => {
                                    debug!("{}: extraction skipped: {}", host, reason);
                                    out.push_str("Xpath expression resulted in no response.\n");
                                }
                                Err(e) => return Err(e),
                            }
                        }
                        None => {
                            out.push_str(&self.op_cmd(command, *format, None).await?);
                            out.push('\n');
                        }
                    }
                }
            }

            Operation::ShellCommand { commands } => {
                for command in commands {
                    out.push_str(&format!("> {command}\n"));
                    out.push_str(&self.shell_cmd(command).await?);
                    out.push('\n');
                }
            }

            Operation::Commit {
                commands,
                mode,
                options,
                blank,
            } => {
                if !commands.is_empty() && !blank {
                    self.show_compare(commands.as_slice(), out).await?;
                }
                out.push_str(&format!("Attempting to commit on device: {host}\n"));
                let results = self
                    .commit(commands.as_slice(), mode, options, *blank)
                    .await?;

                if let Some((before, _)) = results.split_once("commit complete") {
                    out.push_str(before);
                    out.push('\n');
                    out.push_str(&format!("Commit complete on device: {host}\n"));
                    if let Some(minutes) = mode.confirm_minutes() {
                        out.push_str(&format!(
                            "Commit confirm will rollback in {minutes} minutes unless you commit again.\n"
                        ));
                    }
                } else if results.contains("commit at") {
                    let before = results
                        .split("commit at will be executed at")
                        .next()
                        .unwrap_or_default();
                    out.push_str(before);
                    if let CommitMode::At(time) = mode {
                        out.push_str(&format!("Commit staged to happen at: {time}\n"));
                    }
                } else {
                    out.push_str(&results);
                    out.push_str(&format!("Commit Failed on device: {host}\n"));
                    return Ok(Some(ErrorKind::Commit));
                }
            }

            Operation::CommitCheck { commands } => {
                self.show_compare(commands.as_slice(), out).await?;
                out.push_str(&format!("Commit check results from: {host}\n"));
                out.push_str(&self.commit_check(commands.as_slice()).await?);
                out.push('\n');
            }

            Operation::CompareConfig { commands } => {
                out.push_str("show | compare:\n");
                out.push_str(&self.compare_config(commands.as_slice()).await?);
            }

            Operation::DiffConfig { second_host, mode } => {
                let diff = self.diff_config(second_host, *mode).await?;
                if diff.trim().is_empty() {
                    out.push_str(&format!(
                        "There were no config differences between {host} and {second_host}\n"
                    ));
                } else {
                    out.push_str(&diff);
                }
            }

            Operation::ScpPull {
                source,
                destination,
                progress,
                multi,
            } => {
                out.push_str(&format!(
                    "Retrieving {host}:{source}, and putting it in {}\n",
                    normalize_source(destination)
                ));
                let local = self
                    .scp_pull(source, destination, *progress, *multi)
                    .await?;
                out.push_str(&format!(
                    "Received {host}:{} and stored it in {local}.\n",
                    normalize_source(source)
                ));
            }

            Operation::ScpPush {
                source,
                destination,
                progress,
            } => {
                out.push_str(&format!("Pushing {source} to {host}:{destination}\n"));
                let remote = self.scp_push(source, destination, *progress).await?;
                out.push_str(&format!(
                    "Pushed {} to {host}:{remote}\n",
                    normalize_source(source)
                ));
            }

            Operation::DeviceInfo => out.push_str(&self.device_info().await?),

            Operation::HealthCheck => out.push_str(&self.health_check().await?),

            Operation::InterfaceErrors => out.push_str(&self.interface_errors().await?),
        }

        Ok(None)
    }

    /// `show | compare` section printed ahead of commits and commit checks.
    ///
    /// Connection failures and a held lock abort the operation; anything
    /// else is noted and the commit goes ahead.
    async fn show_compare(&mut self, commands: &[String], out: &mut String) -> Result<()> {
        out.push_str("show | compare:\n");
        match self.compare_config(commands).await {
            Ok(diff) => {
                out.push_str(&diff);
                out.push('\n');
                Ok(())
            }
            Err(e) if e.kind().is_fatal() || e.kind() == ErrorKind::LockContention => Err(e),
            Err(e) => {
                out.push_str(&format!(
                    "Could not get config comparison results before committing due to the \
                     following error:\n{e}\n"
                ));
                Ok(())
            }
        }
    }
}

/// Render an error the way it is shown to the user.
fn describe(host: &str, port: u16, error: &Error, operation: &Operation) -> String {
    match error {
        Error::Driver(DriverError::Peer { host, source }) => describe(host, port, source, operation),

        Error::Transport(TransportError::AuthenticationFailed { .. }) => {
            format!("Authentication failed for device: {host}\n")
        }
        Error::Transport(TransportError::Timeout(_)) => {
            format!("Timeout exceeded connecting to device: {host}\n")
        }
        Error::Transport(TransportError::ConnectionFailed { source, .. }) => {
            connection_failure(host, port, source)
        }
        Error::Transport(e) => format!("Error connecting to device: {host}\nError: {e}\n"),

        Error::Channel(ChannelError::Timeout(after)) => {
            format!("Timeout exceeded waiting for output from device: {host} ({after:?})\n")
        }

        Error::Rpc(RpcError::LockContention { message }) => {
            format!("{LOCK_CONTENTION}{message}\n")
        }
        Error::Rpc(RpcError::CommitFailed { message }) => match operation {
            Operation::CommitCheck { .. } => format!(
                "Commit check failed on device: {host}, due to the following error(s):\n{message}\n"
            ),
            _ => format!(
                "Commit could not be completed on this device, due to the following error(s):\n{message}\n"
            ),
        },

        Error::Driver(DriverError::Transfer { .. }) => format!(
            "!!! Error during copy from {host}. Some files may have failed to transfer. \
             Error:\n{error} !!!\n"
        ),

        other => format!("Error on device {host}: {other}\n"),
    }
}

fn connection_failure(host: &str, port: u16, source: &io::Error) -> String {
    match source.kind() {
        io::ErrorKind::ConnectionRefused => {
            format!("The device refused the connection on port {port}, or no route to host.\n")
        }
        io::ErrorKind::HostUnreachable
        | io::ErrorKind::NetworkUnreachable
        | io::ErrorKind::NotFound => format!("No route to host, or invalid hostname: {host}\n"),
        _ if source.to_string().contains("failed to lookup address") => {
            format!("No route to host, or invalid hostname: {host}\n")
        }
        _ => format!("Unable to connect to port {port} on device: {host}\n"),
    }
}
