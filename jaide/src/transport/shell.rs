//! Interactive PTY shell over SSH.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, trace, warn};
use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use tokio::time::Instant;

use super::SshTransport;
use crate::channel::{JunosPrompts, OutputBuffer};
use crate::error::{ChannelError, Result};
use crate::session::{ShellMode, ShellSession};

/// Quiet period that marks the end of the login banner.
const BANNER_IDLE: Duration = Duration::from_secs(2);

/// A PTY shell on its own SSH connection.
pub struct SshShell {
    transport: SshTransport,
    channel: Channel<Msg>,
    buffer: OutputBuffer,
    landed: Option<ShellMode>,
}

impl SshShell {
    /// Request a shell, read the login banner and classify the prompt.
    pub async fn open(transport: SshTransport) -> Result<Self> {
        let channel = transport.open_shell().await?;
        let first_byte = transport.config().connect_timeout;
        let mut shell = Self {
            transport,
            channel,
            buffer: OutputBuffer::default(),
            landed: None,
        };

        let banner = shell.read_until_idle(first_byte, BANNER_IDLE).await?;
        shell.landed = match JunosPrompts::new() {
            Ok(prompts) => prompts.classify(&banner),
            Err(e) => {
                warn!("prompt patterns failed to compile: {}", e);
                None
            }
        };
        debug!(
            "{}: login prompt classified as {:?}",
            shell.transport.config().host,
            shell.landed
        );
        Ok(shell)
    }

    async fn next_message(&mut self, deadline: Instant) -> Option<Option<ChannelMsg>> {
        tokio::time::timeout_at(deadline, self.channel.wait()).await.ok()
    }
}

#[async_trait]
impl ShellSession for SshShell {
    fn landed_at(&self) -> Option<ShellMode> {
        self.landed
    }

    async fn send(&mut self, text: &str) -> Result<()> {
        trace!("shell send: {:?}", text);
        self.channel
            .data(text.as_bytes())
            .await
            .map_err(|e| ChannelError::Ssh(e).into())
    }

    async fn read_until_idle(&mut self, first_byte: Duration, idle: Duration) -> Result<String> {
        self.buffer.clear();
        let mut deadline = Instant::now() + first_byte;

        loop {
            match self.next_message(deadline).await {
                // Quiet for the whole window
                None => break,
                Some(Some(ChannelMsg::Data { data }))
                | Some(Some(ChannelMsg::ExtendedData { data, .. })) => {
                    self.buffer.extend(&data);
                    deadline = Instant::now() + idle;
                }
                Some(Some(ChannelMsg::Eof)) | Some(Some(ChannelMsg::Close)) | Some(None) => {
                    if self.buffer.is_empty() {
                        return Err(ChannelError::Closed.into());
                    }
                    break;
                }
                Some(Some(_)) => {}
            }
        }

        if self.buffer.is_empty() {
            return Err(ChannelError::Timeout(first_byte).into());
        }
        Ok(self.buffer.take())
    }

    async fn settle(&mut self, settle: Duration) -> Result<()> {
        let deadline = Instant::now() + settle;
        loop {
            match self.next_message(deadline).await {
                None => break,
                Some(Some(ChannelMsg::Eof)) | Some(Some(ChannelMsg::Close)) | Some(None) => {
                    return Err(ChannelError::Closed.into());
                }
                Some(Some(_)) => {}
            }
        }
        self.buffer.clear();
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Err(e) = self.channel.close().await {
            debug!("shell channel close: {}", e);
        }
        self.transport.close().await
    }
}
