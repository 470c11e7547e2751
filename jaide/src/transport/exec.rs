//! One-shot command execution over SSH `exec` channels.

use async_trait::async_trait;
use log::trace;
use russh::ChannelMsg;

use super::SshTransport;
use crate::error::{ChannelError, Result};
use crate::session::{ExecOutput, ExecSession};

/// Exec session: one SSH connection, one channel per command.
pub struct SshExec {
    transport: SshTransport,
}

impl SshExec {
    pub fn new(transport: SshTransport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl ExecSession for SshExec {
    async fn exec(&mut self, command: &str) -> Result<ExecOutput> {
        let timeout = self.transport.config().session_timeout;
        let mut channel = self.transport.open_session_channel().await?;
        channel
            .exec(true, command)
            .await
            .map_err(|_| ChannelError::ExecRefused {
                command: command.to_string(),
            })?;
        trace!("exec: {:?}", command);

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        loop {
            let msg = tokio::time::timeout(timeout, channel.wait())
                .await
                .map_err(|_| ChannelError::Timeout(timeout))?;
            match msg {
                Some(ChannelMsg::Data { data }) => stdout.extend_from_slice(&data),
                Some(ChannelMsg::ExtendedData { data, .. }) => stderr.extend_from_slice(&data),
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    trace!("exec exit status {}", exit_status);
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => break,
                Some(_) => {}
            }
        }

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }

    async fn close(&mut self) -> Result<()> {
        self.transport.close().await
    }
}
