//! Recursive file copy over the SSH `sftp` subsystem.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, trace};
use russh_sftp::client::SftpSession;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::SshTransport;
use crate::error::{ChannelError, DriverError, Error, Result};
use crate::session::{ProgressFn, TransferSession};

const CHUNK: usize = 32 * 1024;

/// SFTP session on its own SSH connection.
pub struct SftpTransfer {
    transport: SshTransport,
    sftp: SftpSession,
}

impl SftpTransfer {
    /// Start the `sftp` subsystem.
    pub async fn open(transport: SshTransport) -> Result<Self> {
        let channel = transport.open_subsystem("sftp").await?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| ChannelError::Sftp(e.to_string()))?;
        Ok(Self { transport, sftp })
    }

    async fn pull_file(
        &self,
        remote: &str,
        local: &Path,
        size: u64,
        progress: &mut Option<ProgressFn<'_>>,
    ) -> Result<()> {
        let mut source = self
            .sftp
            .open(remote)
            .await
            .map_err(|e| transfer_error(remote, e))?;
        let mut target = tokio::fs::File::create(local)
            .await
            .map_err(|e| transfer_error(&local.display().to_string(), e))?;

        let mut chunk = vec![0u8; CHUNK];
        let mut done = 0u64;
        report(progress, remote, size, done);
        loop {
            let n = source
                .read(&mut chunk)
                .await
                .map_err(|e| transfer_error(remote, e))?;
            if n == 0 {
                break;
            }
            target
                .write_all(&chunk[..n])
                .await
                .map_err(|e| transfer_error(&local.display().to_string(), e))?;
            done += n as u64;
            report(progress, remote, size.max(done), done);
        }
        target
            .flush()
            .await
            .map_err(|e| transfer_error(&local.display().to_string(), e))?;
        Ok(())
    }

    async fn push_file(
        &self,
        local: &Path,
        remote: &str,
        progress: &mut Option<ProgressFn<'_>>,
    ) -> Result<()> {
        let name = local.display().to_string();
        let mut source = tokio::fs::File::open(local)
            .await
            .map_err(|e| transfer_error(&name, e))?;
        let size = source
            .metadata()
            .await
            .map_err(|e| transfer_error(&name, e))?
            .len();
        let mut target = self
            .sftp
            .create(remote)
            .await
            .map_err(|e| transfer_error(remote, e))?;

        let mut chunk = vec![0u8; CHUNK];
        let mut done = 0u64;
        report(progress, &name, size, done);
        loop {
            let n = source
                .read(&mut chunk)
                .await
                .map_err(|e| transfer_error(&name, e))?;
            if n == 0 {
                break;
            }
            target
                .write_all(&chunk[..n])
                .await
                .map_err(|e| transfer_error(remote, e))?;
            done += n as u64;
            report(progress, &name, size.max(done), done);
        }
        target
            .shutdown()
            .await
            .map_err(|e| transfer_error(remote, e))?;
        Ok(())
    }
}

fn report(progress: &mut Option<ProgressFn<'_>>, file: &str, size: u64, done: u64) {
    if let Some(callback) = progress.as_deref_mut() {
        callback(file, size, done);
    }
}

fn transfer_error(path: &str, e: impl std::fmt::Display) -> Error {
    DriverError::Transfer {
        path: path.to_string(),
        message: e.to_string(),
    }
    .into()
}

fn join_remote(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

#[async_trait]
impl TransferSession for SftpTransfer {
    async fn pull(
        &mut self,
        remote: &str,
        local: &Path,
        mut progress: Option<ProgressFn<'_>>,
    ) -> Result<()> {
        let mut pending: Vec<(String, PathBuf)> = vec![(remote.to_string(), local.to_path_buf())];

        while let Some((remote, local)) = pending.pop() {
            let meta = self
                .sftp
                .metadata(remote.as_str())
                .await
                .map_err(|e| transfer_error(&remote, e))?;

            if meta.is_dir() {
                trace!("pull dir {} -> {}", remote, local.display());
                tokio::fs::create_dir_all(&local)
                    .await
                    .map_err(|e| transfer_error(&local.display().to_string(), e))?;
                let entries = self
                    .sftp
                    .read_dir(remote.as_str())
                    .await
                    .map_err(|e| transfer_error(&remote, e))?;
                for entry in entries {
                    let name = entry.file_name();
                    if name == "." || name == ".." {
                        continue;
                    }
                    pending.push((join_remote(&remote, &name), local.join(&name)));
                }
            } else {
                trace!("pull file {} -> {}", remote, local.display());
                let size = meta.size.unwrap_or(0);
                self.pull_file(&remote, &local, size, &mut progress).await?;
            }
        }

        debug!("pulled {} -> {}", remote, local.display());
        Ok(())
    }

    async fn push(
        &mut self,
        local: &Path,
        remote: &str,
        mut progress: Option<ProgressFn<'_>>,
    ) -> Result<()> {
        let mut pending: Vec<(PathBuf, String)> = vec![(local.to_path_buf(), remote.to_string())];

        while let Some((local, remote)) = pending.pop() {
            let name = local.display().to_string();
            let meta = tokio::fs::metadata(&local)
                .await
                .map_err(|e| transfer_error(&name, e))?;

            if meta.is_dir() {
                trace!("push dir {} -> {}", name, remote);
                let exists = self
                    .sftp
                    .try_exists(remote.as_str())
                    .await
                    .map_err(|e| transfer_error(&remote, e))?;
                if !exists {
                    self.sftp
                        .create_dir(remote.as_str())
                        .await
                        .map_err(|e| transfer_error(&remote, e))?;
                }
                let mut entries = tokio::fs::read_dir(&local)
                    .await
                    .map_err(|e| transfer_error(&name, e))?;
                while let Some(entry) = entries
                    .next_entry()
                    .await
                    .map_err(|e| transfer_error(&name, e))?
                {
                    let file_name = entry.file_name().to_string_lossy().into_owned();
                    pending.push((entry.path(), join_remote(&remote, &file_name)));
                }
            } else {
                trace!("push file {} -> {}", name, remote);
                self.push_file(&local, &remote, &mut progress).await?;
            }
        }

        debug!("pushed {} -> {}", local.display(), remote);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Err(e) = self.sftp.close().await {
            debug!("sftp close: {}", e);
        }
        self.transport.close().await
    }
}
