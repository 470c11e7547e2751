//! NETCONF 1.0 session over the SSH `netconf` subsystem.
//!
//! Only what the dispatcher needs from a Junos device: candidate locking,
//! `set`-format loads, commit and commit check, compare against rollback 0,
//! CLI commands and argument-less RPCs.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, trace};
use memchr::memmem;
use quick_xml::escape::escape;
use russh::client::Msg;
use russh::{Channel, ChannelMsg};

use super::SshTransport;
use crate::error::{ChannelError, Error, Result, RpcError};
use crate::session::{CommitRequest, RpcSession};
use crate::xml::{self, XmlElement};

/// End-of-message marker for NETCONF 1.0 framing.
const DELIMITER: &[u8] = b"]]>]]>";

const BASE_NS: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

const CLIENT_HELLO: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    r#"<hello xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">"#,
    "<capabilities><capability>urn:ietf:params:netconf:base:1.0</capability></capabilities>",
    "</hello>"
);

/// A NETCONF session on its own SSH connection.
pub struct NetconfSession {
    transport: SshTransport,
    channel: Channel<Msg>,
    inbox: Vec<u8>,
    message_id: u64,
    timeout: Duration,
}

impl NetconfSession {
    /// Start the subsystem and exchange hellos.
    pub async fn open(transport: SshTransport) -> Result<Self> {
        let channel = transport.open_subsystem("netconf").await?;
        let timeout = transport.config().session_timeout;
        let mut session = Self {
            transport,
            channel,
            inbox: Vec::with_capacity(8192),
            message_id: 0,
            timeout,
        };

        session.write_message(CLIENT_HELLO).await?;
        let hello = session.read_message().await?;
        let server = xml::parse(hello.trim())?;
        if server.name != "hello" {
            return Err(ChannelError::Framing(format!(
                "expected <hello>, got <{}>",
                server.name
            ))
            .into());
        }
        debug!(
            "{}: netconf session {} established",
            session.transport.config().host,
            server.child_text("session-id").unwrap_or("?")
        );
        Ok(session)
    }

    async fn write_message(&mut self, message: &str) -> Result<()> {
        let mut framed = Vec::with_capacity(message.len() + DELIMITER.len());
        framed.extend_from_slice(message.as_bytes());
        framed.extend_from_slice(DELIMITER);
        self.channel
            .data(&framed[..])
            .await
            .map_err(|e| ChannelError::Ssh(e).into())
    }

    async fn read_message(&mut self) -> Result<String> {
        loop {
            if let Some(end) = memmem::find(&self.inbox, DELIMITER) {
                let message = String::from_utf8_lossy(&self.inbox[..end]).into_owned();
                self.inbox.drain(..end + DELIMITER.len());
                return Ok(message);
            }

            let msg = tokio::time::timeout(self.timeout, self.channel.wait())
                .await
                .map_err(|_| ChannelError::Timeout(self.timeout))?;
            match msg {
                Some(ChannelMsg::Data { data }) => self.inbox.extend_from_slice(&data),
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    return Err(ChannelError::Closed.into());
                }
                Some(_) => {}
            }
        }
    }

    /// Send one `<rpc>` and return the parsed `<rpc-reply>`.
    async fn call(&mut self, body: &str) -> Result<XmlElement> {
        self.message_id += 1;
        let request = format!(
            r#"<rpc xmlns="{BASE_NS}" message-id="{}">{body}</rpc>"#,
            self.message_id
        );
        trace!("netconf >> {}", request);
        self.write_message(&request).await?;

        let reply = self.read_message().await?;
        trace!("netconf << {}", reply);
        let tree = xml::parse(reply.trim())?;
        match rpc_errors(&tree) {
            Some(message) => Err(RpcError::Reply { message }.into()),
            None => Ok(tree),
        }
    }
}

/// Collect the messages of every `<rpc-error>` that is not a warning.
pub(crate) fn rpc_errors(reply: &XmlElement) -> Option<String> {
    let messages: Vec<String> = reply
        .iter()
        .filter(|e| e.name == "rpc-error")
        .filter(|e| e.child_text("error-severity") != Some("warning"))
        .map(|e| match e.child_text("error-message") {
            Some(message) if !message.is_empty() => message.to_string(),
            _ => e
                .iter()
                .skip(1)
                .map(XmlElement::trimmed_text)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        })
        .collect();

    if messages.is_empty() {
        None
    } else {
        Some(messages.join("\n"))
    }
}

/// Re-tag a device error as a more specific RPC failure.
fn reclassify(error: Error, into: fn(String) -> RpcError) -> Error {
    match error {
        Error::Rpc(RpcError::Reply { message }) => into(message).into(),
        other => other,
    }
}

/// Body of a `<commit-configuration>` request.
pub(crate) fn commit_body(request: &CommitRequest) -> String {
    let mut body = String::from("<commit-configuration>");
    if let Some(minutes) = request.confirm_minutes {
        body.push_str(&format!(
            "<confirmed/><confirm-timeout>{minutes}</confirm-timeout>"
        ));
    }
    if let Some(at) = &request.at_time {
        body.push_str(&format!("<at-time>{}</at-time>", escape(at.as_str())));
    }
    if let Some(comment) = &request.comment {
        body.push_str(&format!("<log>{}</log>", escape(comment.as_str())));
    }
    if request.synchronize {
        body.push_str("<synchronize/>");
    }
    body.push_str("</commit-configuration>");
    body
}

#[async_trait]
impl RpcSession for NetconfSession {
    async fn lock(&mut self) -> Result<()> {
        self.call("<lock><target><candidate/></target></lock>")
            .await
            .map(|_| ())
            .map_err(|e| reclassify(e, |message| RpcError::LockContention { message }))
    }

    async fn unlock(&mut self) -> Result<()> {
        self.call("<unlock><target><candidate/></target></unlock>")
            .await
            .map(|_| ())
    }

    async fn load_configuration(&mut self, commands: &[String]) -> Result<()> {
        let body = format!(
            r#"<load-configuration action="set" format="text"><configuration-set>{}</configuration-set></load-configuration>"#,
            escape(commands.join("\n").as_str())
        );
        self.call(&body).await.map(|_| ())
    }

    async fn validate(&mut self) -> Result<XmlElement> {
        self.call("<commit-configuration><check/></commit-configuration>")
            .await
            .map_err(|e| reclassify(e, |message| RpcError::CommitFailed { message }))
    }

    async fn commit(&mut self, request: &CommitRequest) -> Result<XmlElement> {
        self.call(&commit_body(request))
            .await
            .map_err(|e| reclassify(e, |message| RpcError::CommitFailed { message }))
    }

    async fn compare_configuration(&mut self) -> Result<XmlElement> {
        self.call(r#"<get-configuration compare="rollback" rollback="0" format="text"/>"#)
            .await
    }

    async fn command(&mut self, command: &str, text: bool) -> Result<XmlElement> {
        let body = if text {
            format!(r#"<command format="text">{}</command>"#, escape(command))
        } else {
            format!("<command>{}</command>", escape(command))
        };
        self.call(&body).await
    }

    async fn rpc(&mut self, name: &str) -> Result<XmlElement> {
        self.call(&format!("<{name}/>")).await
    }

    async fn close(&mut self) -> Result<()> {
        if let Err(e) = self.call("<close-session/>").await {
            debug!("close-session: {}", e);
        }
        if let Err(e) = self.channel.close().await {
            debug!("netconf channel close: {}", e);
        }
        self.transport.close().await
    }
}
