//! SSH transport implementation using russh.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use russh::Channel;
use russh::client::{self, Handle, Msg};
use russh::keys::PublicKey;
use secrecy::ExposeSecret;

use super::config::{HostKeyVerification, SshConfig};
use crate::error::{ChannelError, Result, TransportError};

/// One authenticated SSH connection.
pub struct SshTransport {
    /// The russh session handle.
    session: Handle<SshHandler>,

    /// Configuration used for this connection.
    config: SshConfig,
}

impl SshTransport {
    /// Connect to the SSH server and authenticate.
    ///
    /// TCP connect, key exchange and authentication together are bounded by
    /// the connect timeout.
    pub async fn connect(config: SshConfig) -> Result<Self> {
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: Some(config.session_timeout),
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            host_key_verification: config.host_key_verification.clone(),
            known_hosts_path: config.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        debug!("connecting to {}", config.socket_addr());
        let session = tokio::time::timeout(config.connect_timeout, async {
            let mut session =
                client::connect(ssh_config, (config.host.as_str(), config.port), handler)
                    .await
                    .map_err(|e| {
                        // Prefer the detailed error stored by check_server_key
                        // over the generic russh::Error::UnknownKey.
                        let stored = host_key_error.lock().ok().and_then(|mut slot| slot.take());
                        match (stored, e) {
                            (Some(hk_err), _) => hk_err,
                            (None, russh::Error::IO(source)) => TransportError::ConnectionFailed {
                                host: config.host.clone(),
                                port: config.port,
                                source,
                            },
                            (None, e) => TransportError::Ssh(e),
                        }
                    })?;
            Self::authenticate(&mut session, &config).await?;
            Ok::<_, crate::Error>(session)
        })
        .await
        .map_err(|_| TransportError::Timeout(config.connect_timeout))??;

        debug!("authenticated to {} as {}", config.socket_addr(), config.username);
        Ok(Self { session, config })
    }

    /// Open a bare session channel.
    pub async fn open_session_channel(&self) -> Result<Channel<Msg>> {
        self.session
            .channel_open_session()
            .await
            .map_err(|e| ChannelError::Ssh(e).into())
    }

    /// Open a PTY shell channel.
    pub async fn open_shell(&self) -> Result<Channel<Msg>> {
        let channel = self.open_session_channel().await?;

        channel
            .request_pty(
                true,
                "vt100",
                self.config.terminal_width,
                self.config.terminal_height,
                0,
                0,
                &[],
            )
            .await
            .map_err(|_| ChannelError::ShellRequestFailed)?;

        channel
            .request_shell(true)
            .await
            .map_err(|_| ChannelError::ShellRequestFailed)?;

        Ok(channel)
    }

    /// Open a channel bound to an SSH subsystem such as `netconf` or `sftp`.
    pub async fn open_subsystem(&self, name: &str) -> Result<Channel<Msg>> {
        let channel = self.open_session_channel().await?;
        channel
            .request_subsystem(true, name)
            .await
            .map_err(|_| ChannelError::SubsystemRefused {
                name: name.to_string(),
            })?;
        Ok(channel)
    }

    /// Configuration used for this connection.
    pub fn config(&self) -> &SshConfig {
        &self.config
    }

    /// Authenticate with the server.
    async fn authenticate(session: &mut Handle<SshHandler>, config: &SshConfig) -> Result<()> {
        let success = session
            .authenticate_password(&config.username, config.password.expose_secret())
            .await
            .map_err(TransportError::Ssh)?
            .success();

        if !success {
            return Err(TransportError::AuthenticationFailed {
                user: config.username.clone(),
            }
            .into());
        }

        Ok(())
    }

    /// Close the connection.
    pub async fn close(&self) -> Result<()> {
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(TransportError::Ssh)?;
        Ok(())
    }
}

/// Host key checks for one connection attempt.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// Look the key up in known_hosts: `Ok(false)` when the host is absent.
    fn lookup(&self, key: &PublicKey) -> std::result::Result<bool, TransportError> {
        let found = match &self.known_hosts_path {
            Some(path) => russh::keys::check_known_hosts_path(&self.host, self.port, key, path),
            None => russh::keys::check_known_hosts(&self.host, self.port, key),
        };
        found.map_err(|e| match e {
            russh::keys::Error::KeyChanged { line } => TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            },
            other => TransportError::KnownHosts(other.to_string()),
        })
    }

    fn remember(&self, key: &PublicKey) {
        let saved = match &self.known_hosts_path {
            Some(path) => {
                russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, key, path)
            }
            None => russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, key),
        };
        match saved {
            Ok(()) => debug!("{}: host key added to known_hosts", self.host),
            Err(e) => warn!("{}: could not save host key: {}", self.host, e),
        }
    }

    /// Refuse the key, keeping the reason for `connect` to report.
    fn refuse(&self, error: TransportError) -> bool {
        if let Ok(mut slot) = self.host_key_error.lock() {
            *slot = Some(error);
        }
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        if self.host_key_verification == HostKeyVerification::Disabled {
            return Ok(true);
        }
        Ok(match self.lookup(server_public_key) {
            Ok(true) => true,
            Ok(false) if self.host_key_verification == HostKeyVerification::AcceptNew => {
                self.remember(server_public_key);
                true
            }
            Ok(false) => self.refuse(TransportError::HostKeyUnknown {
                host: self.host.clone(),
                port: self.port,
            }),
            Err(e) => self.refuse(e),
        })
    }
}
