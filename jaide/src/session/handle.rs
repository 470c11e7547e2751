//! Per-device handle owning the active session.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use super::{
    ActiveSession, ConnectParams, Connector, ExecSession, RpcSession, SessionKind, ShellMode,
    ShellSession, TransferSession,
};
use crate::error::{DriverError, Error, Result};

/// Command that enters the Junos CLI from the raw shell.
const ENTER_CLI: &str = "cli\n";

/// Command that drops from the Junos CLI to the raw shell.
const ENTER_SHELL: &str = "start shell\n";

/// Delays used while driving an interactive shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShellTiming {
    /// Time for the CLI to come up after `cli`.
    pub cli_settle: Duration,

    /// Time for the shell to come up after `start shell`.
    pub shell_settle: Duration,

    /// Output is complete once the channel has been quiet this long.
    pub idle: Duration,
}

impl Default for ShellTiming {
    fn default() -> Self {
        Self {
            cli_settle: Duration::from_secs(4),
            shell_settle: Duration::from_secs(2),
            idle: Duration::from_millis(750),
        }
    }
}

/// One logical connection target.
///
/// Holds the credentials and timeouts for a host and at most one live
/// [`ActiveSession`]. Create it with [`crate::DeviceBuilder`], run
/// operations against it, then call [`disconnect`](Self::disconnect).
pub struct DeviceHandle {
    params: ConnectParams,
    root_login: bool,
    timing: ShellTiming,
    connector: Arc<dyn Connector>,
    session: Option<ActiveSession>,
}

impl DeviceHandle {
    pub(crate) fn new(
        params: ConnectParams,
        root_login: bool,
        timing: ShellTiming,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            params,
            root_login,
            timing,
            connector,
            session: None,
        }
    }

    /// A handle to another host using the same credentials, timeouts and
    /// connector. No connection is opened.
    pub fn for_host(&self, host: impl Into<String>) -> DeviceHandle {
        let mut params = self.params.clone();
        params.host = host.into();
        DeviceHandle::new(params, self.root_login, self.timing, self.connector.clone())
    }

    /// Target hostname or address.
    pub fn host(&self) -> &str {
        &self.params.host
    }

    /// Target SSH port.
    pub fn port(&self) -> u16 {
        self.params.port
    }

    /// Whether the login account lands in the raw shell rather than the CLI.
    pub fn is_root_login(&self) -> bool {
        self.root_login
    }

    /// Shell delays in use.
    pub fn timing(&self) -> ShellTiming {
        self.timing
    }

    /// Time permitted for one command to produce output.
    pub fn session_timeout(&self) -> Duration {
        self.params.session_timeout
    }

    /// Kind of the live session, if any.
    pub fn session_kind(&self) -> Option<SessionKind> {
        self.session.as_ref().map(ActiveSession::kind)
    }

    /// Make sure the live session is of `required` kind.
    ///
    /// Reuses the current session when it already matches. An interactive
    /// shell at the wrong prompt is moved with [`shell_to_cli`](Self::shell_to_cli)
    /// or [`cli_to_shell`](Self::cli_to_shell) instead of reconnecting. Any
    /// other mismatch closes the current session before opening a new one.
    pub async fn ensure_session(&mut self, required: SessionKind) -> Result<&mut ActiveSession> {
        let current = self.session_kind();

        match current {
            Some(kind) if kind == required => {}
            Some(kind) if kind.same_transport(required) => self.position_shell(required).await?,
            _ => {
                if let Some(kind) = current {
                    debug!(
                        "{}: switching session {} -> {}",
                        self.params.host, kind, required
                    );
                    self.disconnect().await;
                }
                self.open(required).await?;
            }
        }

        self.session
            .as_mut()
            .ok_or_else(|| DriverError::NotConnected.into())
    }

    /// Move an interactive shell to the Junos CLI.
    ///
    /// Returns `false` without touching the device when already there.
    pub async fn shell_to_cli(&mut self) -> Result<bool> {
        let settle = self.timing.cli_settle;
        let host = self.params.host.clone();
        match self.session.as_mut() {
            Some(ActiveSession::InteractiveShell { shell, in_cli }) => {
                if *in_cli {
                    return Ok(false);
                }
                debug!("{}: shell -> cli", host);
                shell.send(ENTER_CLI).await?;
                shell.settle(settle).await?;
                *in_cli = true;
                Ok(true)
            }
            other => Err(mismatch(
                SessionKind::InteractiveShell(ShellMode::Cli),
                other.map(|s| s.kind()),
            )),
        }
    }

    /// Move an interactive shell from the Junos CLI to the raw shell.
    ///
    /// Returns `false` without touching the device when already there.
    pub async fn cli_to_shell(&mut self) -> Result<bool> {
        let settle = self.timing.shell_settle;
        let host = self.params.host.clone();
        match self.session.as_mut() {
            Some(ActiveSession::InteractiveShell { shell, in_cli }) => {
                if !*in_cli {
                    return Ok(false);
                }
                debug!("{}: cli -> shell", host);
                shell.send(ENTER_SHELL).await?;
                shell.settle(settle).await?;
                *in_cli = false;
                Ok(true)
            }
            other => Err(mismatch(
                SessionKind::InteractiveShell(ShellMode::Shell),
                other.map(|s| s.kind()),
            )),
        }
    }

    /// The structured RPC session, opening it if needed.
    pub async fn rpc_session(&mut self) -> Result<&mut dyn RpcSession> {
        match self.ensure_session(SessionKind::StructuredRpc).await? {
            ActiveSession::StructuredRpc(s) => Ok(s.as_mut()),
            other => Err(mismatch(SessionKind::StructuredRpc, Some(other.kind()))),
        }
    }

    /// The exec channel session, opening it if needed.
    pub async fn exec_session(&mut self) -> Result<&mut dyn ExecSession> {
        match self.ensure_session(SessionKind::ExecChannel).await? {
            ActiveSession::ExecChannel(s) => Ok(s.as_mut()),
            other => Err(mismatch(SessionKind::ExecChannel, Some(other.kind()))),
        }
    }

    /// The interactive shell positioned at `mode`, opening it if needed.
    pub async fn shell_session(&mut self, mode: ShellMode) -> Result<&mut dyn ShellSession> {
        let required = SessionKind::InteractiveShell(mode);
        match self.ensure_session(required).await? {
            ActiveSession::InteractiveShell { shell, .. } => Ok(shell.as_mut()),
            other => Err(mismatch(required, Some(other.kind()))),
        }
    }

    /// The file transfer session, opening it if needed.
    pub async fn transfer_session(&mut self) -> Result<&mut dyn TransferSession> {
        match self.ensure_session(SessionKind::Transfer).await? {
            ActiveSession::Transfer(s) => Ok(s.as_mut()),
            other => Err(mismatch(SessionKind::Transfer, Some(other.kind()))),
        }
    }

    /// Close the live session, if any.
    ///
    /// Close failures are logged; the session is gone either way.
    pub async fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            let kind = session.kind();
            if let Err(e) = session.close().await {
                warn!("{}: error closing {} session: {}", self.params.host, kind, e);
            } else {
                debug!("{}: closed {} session", self.params.host, kind);
            }
        }
    }

    async fn open(&mut self, required: SessionKind) -> Result<()> {
        debug!(
            "{}:{}: opening {} session",
            self.params.host, self.params.port, required
        );
        let connector = self.connector.clone();
        let session = match required {
            SessionKind::StructuredRpc => {
                ActiveSession::StructuredRpc(connector.open_rpc(&self.params).await?)
            }
            SessionKind::ExecChannel => {
                ActiveSession::ExecChannel(connector.open_exec(&self.params).await?)
            }
            SessionKind::Transfer => {
                ActiveSession::Transfer(connector.open_transfer(&self.params).await?)
            }
            SessionKind::InteractiveShell(_) => {
                let shell = connector.open_shell(&self.params).await?;
                let landed = shell.landed_at().unwrap_or(self.params.landing);
                debug!("{}: shell landed at {}", self.params.host, landed);
                ActiveSession::InteractiveShell {
                    shell,
                    in_cli: landed == ShellMode::Cli,
                }
            }
        };
        self.session = Some(session);
        self.position_shell(required).await
    }

    async fn position_shell(&mut self, required: SessionKind) -> Result<()> {
        match required {
            SessionKind::InteractiveShell(ShellMode::Cli) => {
                self.shell_to_cli().await?;
            }
            SessionKind::InteractiveShell(ShellMode::Shell) => {
                self.cli_to_shell().await?;
            }
            _ => {}
        }
        Ok(())
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        if let Some(session) = &self.session {
            warn!(
                "{}: DeviceHandle dropped with a live {} session; call disconnect()",
                self.params.host,
                session.kind()
            );
        }
    }
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("host", &self.params.host)
            .field("port", &self.params.port)
            .field("root_login", &self.root_login)
            .field("session", &self.session_kind())
            .finish()
    }
}

fn mismatch(expected: SessionKind, actual: Option<SessionKind>) -> Error {
    match actual {
        Some(actual) => DriverError::SessionMismatch { expected, actual }.into(),
        None => DriverError::NotConnected.into(),
    }
}
