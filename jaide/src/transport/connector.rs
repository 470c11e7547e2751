//! The SSH-backed [`Connector`].

use async_trait::async_trait;

use super::config::SshConfig;
use super::exec::SshExec;
use super::netconf::NetconfSession;
use super::sftp::SftpTransfer;
use super::shell::SshShell;
use super::ssh::SshTransport;
use crate::error::Result;
use crate::session::{
    ConnectParams, Connector, ExecSession, RpcSession, ShellSession, TransferSession,
};

/// Opens every session kind over its own russh connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct SshConnector;

#[async_trait]
impl Connector for SshConnector {
    async fn open_rpc(&self, params: &ConnectParams) -> Result<Box<dyn RpcSession>> {
        let transport = SshTransport::connect(SshConfig::from(params)).await?;
        Ok(Box::new(NetconfSession::open(transport).await?))
    }

    async fn open_exec(&self, params: &ConnectParams) -> Result<Box<dyn ExecSession>> {
        let transport = SshTransport::connect(SshConfig::from(params)).await?;
        Ok(Box::new(SshExec::new(transport)))
    }

    async fn open_shell(&self, params: &ConnectParams) -> Result<Box<dyn ShellSession>> {
        let transport = SshTransport::connect(SshConfig::from(params)).await?;
        Ok(Box::new(SshShell::open(transport).await?))
    }

    async fn open_transfer(&self, params: &ConnectParams) -> Result<Box<dyn TransferSession>> {
        let transport = SshTransport::connect(SshConfig::from(params)).await?;
        Ok(Box::new(SftpTransfer::open(transport).await?))
    }
}
