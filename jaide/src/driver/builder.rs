//! Builder for device handles.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::{Result, UsageError};
use crate::session::{ConnectParams, Connector, DeviceHandle, ShellMode, ShellTiming};
use crate::transport::{HostKeyVerification, SshConnector};

/// Builder for [`DeviceHandle`]s.
///
/// One builder is usually configured with credentials and timeouts and then
/// used as a template: [`for_host`](Self::for_host) copies it for each
/// target.
///
/// # Example
///
/// ```rust,no_run
/// use jaide::DeviceBuilder;
///
/// # async fn example() -> Result<(), jaide::Error> {
/// let mut device = DeviceBuilder::new("192.168.1.1")
///     .username("admin")
///     .password("secret")
///     .build()?;
///
/// let output = device.op_cmd("show version", Default::default(), None).await?;
/// println!("{output}");
/// device.disconnect().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DeviceBuilder {
    host: String,
    port: u16,
    username: Option<String>,
    password: SecretString,
    connect_timeout: Duration,
    session_timeout: Duration,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    root_login: Option<bool>,
    landing: Option<ShellMode>,
    timing: ShellTiming,
    connector: Arc<dyn Connector>,
}

impl DeviceBuilder {
    /// Create a new builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: None,
            password: SecretString::from(String::new()),
            connect_timeout: Duration::from_secs(5),
            session_timeout: Duration::from_secs(300),
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            root_login: None,
            landing: None,
            timing: ShellTiming::default(),
            connector: Arc::new(SshConnector),
        }
    }

    /// Copy of this builder pointed at another host.
    pub fn for_host(&self, host: impl Into<String>) -> Self {
        let mut builder = self.clone();
        builder.host = host.into();
        builder
    }

    /// Set the SSH port (default: 22).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username for authentication.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set password authentication.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = SecretString::from(password.into());
        self
    }

    /// Time permitted to connect and authenticate (default: 5s).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Time permitted for one command or RPC (default: 300s).
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Set host key checking (default: accept new keys, reject changed ones).
    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// Use a known_hosts file other than `~/.ssh/known_hosts`.
    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// Whether the account lands in the raw shell instead of the CLI.
    ///
    /// Defaults to `true` for the `root` user.
    pub fn root_login(mut self, root_login: bool) -> Self {
        self.root_login = Some(root_login);
        self
    }

    /// Assumed landing prompt when the login prompt cannot be recognised.
    pub fn landing(mut self, landing: ShellMode) -> Self {
        self.landing = Some(landing);
        self
    }

    /// Delays used while driving interactive shells.
    pub fn shell_timing(mut self, timing: ShellTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Open transports through `connector` instead of SSH.
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    /// Target host of this builder.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Build the handle.
    ///
    /// No connection is made; sessions open on first use.
    pub fn build(self) -> Result<DeviceHandle> {
        let username = self
            .username
            .filter(|u| !u.is_empty())
            .ok_or_else(|| UsageError::Invalid {
                message: "Username is required".to_string(),
            })?;
        if self.host.trim().is_empty() {
            return Err(UsageError::Invalid {
                message: "Host is required".to_string(),
            }
            .into());
        }

        let root_login = self.root_login.unwrap_or(username == "root");
        let landing = self.landing.unwrap_or(if root_login {
            ShellMode::Shell
        } else {
            ShellMode::Cli
        });

        let params = ConnectParams {
            host: self.host,
            port: self.port,
            username,
            password: self.password,
            connect_timeout: self.connect_timeout,
            session_timeout: self.session_timeout,
            host_key_verification: self.host_key_verification,
            known_hosts_path: self.known_hosts_path,
            landing,
        };

        Ok(DeviceHandle::new(params, root_login, self.timing, self.connector))
    }
}

impl fmt::Debug for DeviceBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBuilder")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("connect_timeout", &self.connect_timeout)
            .field("session_timeout", &self.session_timeout)
            .field("host_key_verification", &self.host_key_verification)
            .field("root_login", &self.root_login)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind};

    #[test]
    fn test_defaults() {
        let handle = DeviceBuilder::new("10.0.0.1")
            .username("netops")
            .password("pw")
            .build()
            .unwrap();
        assert_eq!(handle.host(), "10.0.0.1");
        assert_eq!(handle.port(), 22);
        assert!(!handle.is_root_login());
        assert_eq!(handle.session_timeout(), Duration::from_secs(300));
        assert_eq!(handle.timing(), ShellTiming::default());
        assert!(handle.session_kind().is_none());
    }

    #[test]
    fn test_root_user_is_root_login() {
        let handle = DeviceBuilder::new("r1").username("root").build().unwrap();
        assert!(handle.is_root_login());

        let handle = DeviceBuilder::new("r1")
            .username("root")
            .root_login(false)
            .build()
            .unwrap();
        assert!(!handle.is_root_login());
    }

    #[test]
    fn test_template_for_host() {
        let template = DeviceBuilder::new("")
            .username("netops")
            .port(830)
            .session_timeout(Duration::from_secs(60));
        let handle = template.for_host("edge-r2").build().unwrap();
        assert_eq!(handle.host(), "edge-r2");
        assert_eq!(handle.port(), 830);
        assert_eq!(handle.session_timeout(), Duration::from_secs(60));
        assert_eq!(template.host(), "");
    }

    #[test]
    fn test_missing_username() {
        let err = DeviceBuilder::new("r1").build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);

        let err = DeviceBuilder::new(" ").username("lab").build().unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
    }

    #[test]
    fn test_debug_hides_password() {
        let builder = DeviceBuilder::new("r1").username("lab").password("hunter2");
        assert!(!format!("{builder:?}").contains("hunter2"));
    }
}
