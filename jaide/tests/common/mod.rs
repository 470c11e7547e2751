//! In-memory transports that record every call.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use jaide::error::{ChannelError, Result, RpcError, TransportError};
use jaide::session::{
    CommitRequest, ConnectParams, Connector, ExecOutput, ExecSession, ProgressFn, RpcSession,
    ShellMode, ShellSession, ShellTiming, TransferSession,
};
use jaide::xml::{self, XmlElement};
use jaide::DeviceBuilder;

/// One recorded transport call, tagged with the host it went to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open(String, &'static str),
    Close(String, &'static str),
    Lock(String),
    Unlock(String),
    Load(String, Vec<String>),
    Validate(String),
    Commit(String, CommitRequest),
    Compare(String),
    Command(String, String),
    Rpc(String, String),
    Exec(String, String),
    Send(String, String),
    Pull(String, String),
    Push(String, String),
    Progress(String),
}

/// How a host refuses to be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unreachable {
    Refused,
    BadPassword,
}

/// Behaviour of the mock devices.
#[derive(Debug, Default)]
pub struct Script {
    pub unreachable: HashMap<String, Unreachable>,
    pub locked: HashSet<String>,
    pub reject_load: bool,
    pub reject_commit: Option<String>,
    /// The channel drops while a commit check runs.
    pub drop_on_validate: bool,
    /// Hosts that take this long to answer before the session opens.
    pub slow: HashMap<String, Duration>,
    pub configs: HashMap<String, String>,
    pub landed_at: Option<ShellMode>,
}

/// A [`Connector`] whose sessions only record what they were asked to do.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    log: Arc<Mutex<Vec<Call>>>,
    script: Arc<Script>,
}

impl MockConnector {
    pub fn new(script: Script) -> Self {
        Self {
            log: Arc::default(),
            script: Arc::new(script),
        }
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.log.lock().unwrap().clone()
    }

    /// Calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.log.lock().unwrap().iter().filter(|c| predicate(c)).count()
    }

    /// A builder for `host` that opens sessions through this connector.
    pub fn builder(&self, host: &str) -> DeviceBuilder {
        DeviceBuilder::new(host)
            .username("netops")
            .password("lab123")
            .shell_timing(ShellTiming {
                cli_settle: Duration::ZERO,
                shell_settle: Duration::ZERO,
                idle: Duration::from_millis(1),
            })
            .connector(Arc::new(self.clone()))
    }

    fn record(&self, call: Call) {
        self.log.lock().unwrap().push(call);
    }

    async fn open(&self, params: &ConnectParams, kind: &'static str) -> Result<Device> {
        if let Some(delay) = self.script.slow.get(&params.host) {
            tokio::time::sleep(*delay).await;
        }
        match self.script.unreachable.get(&params.host) {
            Some(Unreachable::Refused) => Err(TransportError::ConnectionFailed {
                host: params.host.clone(),
                port: params.port,
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            }
            .into()),
            Some(Unreachable::BadPassword) => Err(TransportError::AuthenticationFailed {
                user: params.username.clone(),
            }
            .into()),
            None => {
                self.record(Call::Open(params.host.clone(), kind));
                Ok(Device {
                    host: params.host.clone(),
                    kind,
                    connector: self.clone(),
                })
            }
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open_rpc(&self, params: &ConnectParams) -> Result<Box<dyn RpcSession>> {
        Ok(Box::new(self.open(params, "rpc").await?))
    }

    async fn open_exec(&self, params: &ConnectParams) -> Result<Box<dyn ExecSession>> {
        Ok(Box::new(self.open(params, "exec").await?))
    }

    async fn open_shell(&self, params: &ConnectParams) -> Result<Box<dyn ShellSession>> {
        Ok(Box::new(self.open(params, "shell").await?))
    }

    async fn open_transfer(&self, params: &ConnectParams) -> Result<Box<dyn TransferSession>> {
        Ok(Box::new(self.open(params, "transfer").await?))
    }
}

/// One open mock session.
struct Device {
    host: String,
    kind: &'static str,
    connector: MockConnector,
}

impl Device {
    fn record(&self, call: Call) {
        self.connector.record(call);
    }

    fn script(&self) -> &Script {
        &self.connector.script
    }

    fn close_call(&self) -> Result<()> {
        self.record(Call::Close(self.host.clone(), self.kind));
        Ok(())
    }
}

fn reply(body: &str) -> Result<XmlElement> {
    xml::parse(&format!("<rpc-reply>{body}</rpc-reply>"))
}

#[async_trait]
impl RpcSession for Device {
    async fn lock(&mut self) -> Result<()> {
        self.record(Call::Lock(self.host.clone()));
        if self.script().locked.contains(&self.host) {
            return Err(RpcError::LockContention {
                message: "configuration database modified".to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn unlock(&mut self) -> Result<()> {
        self.record(Call::Unlock(self.host.clone()));
        Ok(())
    }

    async fn load_configuration(&mut self, commands: &[String]) -> Result<()> {
        self.record(Call::Load(self.host.clone(), commands.to_vec()));
        if self.script().reject_load {
            return Err(RpcError::Reply {
                message: "syntax error".to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn validate(&mut self) -> Result<XmlElement> {
        self.record(Call::Validate(self.host.clone()));
        if self.script().drop_on_validate {
            return Err(ChannelError::Closed.into());
        }
        if let Some(message) = &self.script().reject_commit {
            return Err(RpcError::CommitFailed {
                message: message.clone(),
            }
            .into());
        }
        reply("<commit-results><routing-engine><name>re0</name><commit-check-success/></routing-engine></commit-results>")
    }

    async fn commit(&mut self, request: &CommitRequest) -> Result<XmlElement> {
        self.record(Call::Commit(self.host.clone(), request.clone()));
        if let Some(message) = &self.script().reject_commit {
            return Err(RpcError::CommitFailed {
                message: message.clone(),
            }
            .into());
        }
        reply("<commit-results><routing-engine><name>re0</name><commit-success/></routing-engine></commit-results>")
    }

    async fn compare_configuration(&mut self) -> Result<XmlElement> {
        self.record(Call::Compare(self.host.clone()));
        reply(
            "<configuration-information><configuration-output>\
             [edit system]\n-  host-name old;\n+  host-name new;\n\
             </configuration-output></configuration-information>",
        )
    }

    async fn command(&mut self, command: &str, _text: bool) -> Result<XmlElement> {
        self.record(Call::Command(self.host.clone(), command.to_string()));
        let config = self.script().configs.get(&self.host).cloned().unwrap_or_default();
        reply(&format!(
            "<configuration-information><configuration-output>\n{config}</configuration-output></configuration-information>"
        ))
    }

    async fn rpc(&mut self, name: &str) -> Result<XmlElement> {
        self.record(Call::Rpc(self.host.clone(), name.to_string()));
        reply("")
    }

    async fn close(&mut self) -> Result<()> {
        self.close_call()
    }
}

#[async_trait]
impl ExecSession for Device {
    async fn exec(&mut self, command: &str) -> Result<ExecOutput> {
        self.record(Call::Exec(self.host.clone(), command.to_string()));
        Ok(ExecOutput {
            stdout: format!("{} says hello\n", self.host),
            stderr: String::new(),
        })
    }

    async fn close(&mut self) -> Result<()> {
        self.close_call()
    }
}

#[async_trait]
impl ShellSession for Device {
    fn landed_at(&self) -> Option<ShellMode> {
        self.script().landed_at
    }

    async fn send(&mut self, text: &str) -> Result<()> {
        self.record(Call::Send(self.host.clone(), text.to_string()));
        Ok(())
    }

    async fn read_until_idle(&mut self, _first_byte: Duration, _idle: Duration) -> Result<String> {
        Ok("echoed\nline one\nline two\n\nprompt> ".to_string())
    }

    async fn settle(&mut self, _settle: Duration) -> Result<()> {
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.close_call()
    }
}

#[async_trait]
impl TransferSession for Device {
    async fn pull(
        &mut self,
        remote: &str,
        local: &Path,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<()> {
        self.record(Call::Pull(remote.to_string(), local.display().to_string()));
        if let Some(tick) = progress {
            self.record(Call::Progress(self.host.clone()));
            tick(remote, 10, 10);
        }
        Ok(())
    }

    async fn push(
        &mut self,
        local: &Path,
        remote: &str,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<()> {
        self.record(Call::Push(local.display().to_string(), remote.to_string()));
        if let Some(tick) = progress {
            self.record(Call::Progress(self.host.clone()));
            tick(remote, 10, 10);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.close_call()
    }
}
