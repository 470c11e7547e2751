//! Candidate configuration transactions.
//!
//! Every configuration change follows the same path through the candidate
//! database:
//!
//! ```text
//! Idle -> Locked -> Loaded -> Validated | Committed | Rejected -> Unlocked
//! ```
//!
//! [`ConfigTransaction`] is the RAII guard for that path. It only exists once
//! the lock is held, so a lock failure never leads to a load or an unlock.
//! [`ConfigTransaction::unlock`] consumes the guard and never fails: the
//! caller already has the substantive result, so an unlock error is logged
//! and dropped.

use std::fmt;
use std::time::Duration;

use log::{debug, warn};
use regex::Regex;

use crate::error::{DriverError, Error, Result, UsageError};
use crate::session::{CommitRequest, DeviceHandle, RpcSession};
use crate::xml::XmlElement;

/// Statement loaded for a commit without changes.
///
/// Junos has no blank-commit RPC, so an empty annotation stands in for one.
pub const BLANK_COMMIT: &str = r#"annotate system """#;

/// Bounds for a commit confirmed rollback timer, in seconds.
const CONFIRM_RANGE: std::ops::RangeInclusive<u64> = 60..=7200;

/// Where a [`ConfigTransaction`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitState {
    Idle,
    Locked,
    Loaded,
    Validated,
    Committed,
    Rejected,
    Unlocked,
}

/// A validated `commit at` time: `hh:mm[:ss]` or `yyyy-mm-dd hh:mm[:ss]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitTime(String);

impl CommitTime {
    /// Validate a commit time string.
    pub fn parse(input: &str) -> Result<Self> {
        let value = input.trim();
        let patterns = [
            r"^([0-2]\d)(:[0-5]\d){1,2}$",
            r"^\d{4}-[01]\d-[0-3]\d [0-2]\d:[0-5]\d(:[0-5]\d)?$",
        ];
        for pattern in patterns {
            let re = Regex::new(pattern).map_err(|e| UsageError::Invalid {
                message: e.to_string(),
            })?;
            if re.is_match(value) {
                return Ok(Self(value.to_string()));
            }
        }
        Err(UsageError::InvalidCommitTime(input.to_string()).into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a commit takes effect. The variants exclude each other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CommitMode {
    /// Commit now.
    #[default]
    Immediate,

    /// Commit now and roll back after this long unless committed again.
    Confirmed(Duration),

    /// Schedule the commit.
    At(CommitTime),
}

impl CommitMode {
    /// Commit confirmed with a rollback timer of `seconds` (60 to 7200).
    pub fn confirmed(seconds: u64) -> Result<Self> {
        if !CONFIRM_RANGE.contains(&seconds) {
            return Err(UsageError::InvalidConfirmTimeout(seconds).into());
        }
        Ok(CommitMode::Confirmed(Duration::from_secs(seconds)))
    }

    /// Scheduled commit at a validated time.
    pub fn at(time: &str) -> Result<Self> {
        CommitTime::parse(time).map(CommitMode::At)
    }

    /// Rollback timer in whole minutes, rounded up; Junos counts in minutes.
    pub fn confirm_minutes(&self) -> Option<u64> {
        match self {
            CommitMode::Confirmed(timeout) => Some(timeout.as_secs().div_ceil(60)),
            _ => None,
        }
    }
}

/// Modifiers that combine with any [`CommitMode`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitOptions {
    /// Commit log comment.
    pub comment: Option<String>,

    /// Commit on both routing engines.
    pub synchronize: bool,
}

/// Lock held on the candidate configuration of one device.
pub struct ConfigTransaction<'a> {
    session: &'a mut dyn RpcSession,
    host: String,
    state: CommitState,
}

impl<'a> ConfigTransaction<'a> {
    /// Lock the candidate configuration.
    ///
    /// On failure nothing is held and no guard is returned.
    pub async fn lock(session: &'a mut dyn RpcSession, host: &str) -> Result<Self> {
        if let Err(e) = session.lock().await {
            debug!("{}: candidate lock failed: {}", host, e);
            return Err(e);
        }
        let mut tx = Self {
            session,
            host: host.to_string(),
            state: CommitState::Idle,
        };
        tx.transition(CommitState::Locked);
        Ok(tx)
    }

    /// Load `set` commands into the candidate.
    pub async fn load(&mut self, commands: &[String]) -> Result<()> {
        self.session.load_configuration(commands).await?;
        self.transition(CommitState::Loaded);
        Ok(())
    }

    /// Run a commit check. The state moves to `Validated` whatever the outcome.
    pub async fn validate(&mut self) -> Result<XmlElement> {
        let result = self.session.validate().await;
        self.transition(CommitState::Validated);
        result
    }

    /// Commit the candidate.
    pub async fn commit(&mut self, request: &CommitRequest) -> Result<XmlElement> {
        let result = self.session.commit(request).await;
        self.transition(if result.is_ok() {
            CommitState::Committed
        } else {
            CommitState::Rejected
        });
        result
    }

    /// Diff the candidate against the active configuration.
    pub async fn compare(&mut self) -> Result<XmlElement> {
        self.session.compare_configuration().await
    }

    /// Release the lock, ending the transaction.
    pub async fn unlock(mut self) -> CommitState {
        if let Err(e) = self.session.unlock().await {
            warn!("{}: failed to unlock candidate configuration: {}", self.host, e);
        }
        self.transition(CommitState::Unlocked);
        self.state
    }

    fn transition(&mut self, next: CommitState) {
        debug!("{}: commit state {:?} -> {:?}", self.host, self.state, next);
        self.state = next;
    }
}

impl Drop for ConfigTransaction<'_> {
    fn drop(&mut self) {
        if self.state != CommitState::Unlocked {
            warn!(
                "{}: ConfigTransaction dropped in state {:?} without unlock",
                self.host, self.state
            );
        }
    }
}

/// Flatten a commit or commit-check reply into one line per element.
///
/// Success markers are rendered as the CLI would print them, other elements
/// as their text, and empty leaf elements by name.
pub fn parse_commit_results(reply: &XmlElement) -> String {
    let mut out = String::new();
    for element in reply.iter() {
        let line = match element.name.as_str() {
            "commit-check-success" => "configuration check succeeds",
            "commit-success" | "ok" => "commit complete",
            _ if !element.trimmed_text().is_empty() => element.trimmed_text(),
            _ if element.children.is_empty() => element.name.as_str(),
            _ => continue,
        };
        out.push_str(line);
        out.push('\n');
    }
    out
}

impl DeviceHandle {
    /// Load `commands` and run a commit check, returning the check results.
    ///
    /// The candidate is unlocked afterwards whatever the outcome.
    pub async fn commit_check(&mut self, commands: &[String]) -> Result<String> {
        if commands.is_empty() {
            return Err(Error::invalid_command("No commands specified"));
        }
        let host = self.host().to_string();
        let session = self.rpc_session().await?;
        let mut tx = ConfigTransaction::lock(session, &host).await?;

        let outcome = match tx.load(commands).await {
            Ok(()) => tx.validate().await,
            Err(e) => Err(e),
        };
        tx.unlock().await;

        Ok(parse_commit_results(&outcome?))
    }

    /// Load `commands` and return the candidate diff (`show | compare`).
    pub async fn compare_config(&mut self, commands: &[String]) -> Result<String> {
        if commands.is_empty() {
            return Err(Error::invalid_command("No commands specified"));
        }
        let host = self.host().to_string();
        let session = self.rpc_session().await?;
        let mut tx = ConfigTransaction::lock(session, &host).await?;

        let outcome = match tx.load(commands).await {
            Ok(()) => tx.compare().await,
            Err(e) => Err(e),
        };
        tx.unlock().await;

        let reply = outcome?;
        let path = "configuration-information/configuration-output";
        match reply.find(path)? {
            Some(output) => Ok(output.text.clone()),
            None => Err(DriverError::MissingElement {
                path: path.to_string(),
            }
            .into()),
        }
    }

    /// Load `commands` and commit them, returning the commit results.
    ///
    /// An empty command list, or `blank`, commits [`BLANK_COMMIT`] instead.
    pub async fn commit(
        &mut self,
        commands: &[String],
        mode: &CommitMode,
        options: &CommitOptions,
        blank: bool,
    ) -> Result<String> {
        let payload = if blank || commands.is_empty() {
            vec![BLANK_COMMIT.to_string()]
        } else {
            commands.to_vec()
        };
        let request = CommitRequest {
            confirm_minutes: mode.confirm_minutes(),
            at_time: match mode {
                CommitMode::At(time) => Some(time.as_str().to_string()),
                _ => None,
            },
            comment: options.comment.clone(),
            synchronize: options.synchronize,
        };

        let host = self.host().to_string();
        let session = self.rpc_session().await?;
        let mut tx = ConfigTransaction::lock(session, &host).await?;

        let outcome = match tx.load(&payload).await {
            Ok(()) => tx.commit(&request).await,
            Err(e) => Err(e),
        };
        tx.unlock().await;

        Ok(parse_commit_results(&outcome?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::xml;

    #[test]
    fn test_commit_time_formats() {
        for ok in ["02:30", "23:59:59", "2026-10-17 02:00", "2026-10-17 02:00:30"] {
            assert_eq!(CommitTime::parse(ok).unwrap().as_str(), ok);
        }
        for bad in ["2:30", "12:60", "tomorrow", "2026-10-17", "02:30 junk", "x02:30"] {
            let err = CommitTime::parse(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Usage, "{bad}");
        }
    }

    #[test]
    fn test_confirm_rounds_up_to_minutes() {
        assert_eq!(CommitMode::confirmed(60).unwrap().confirm_minutes(), Some(1));
        assert_eq!(CommitMode::confirmed(61).unwrap().confirm_minutes(), Some(2));
        assert_eq!(CommitMode::confirmed(7200).unwrap().confirm_minutes(), Some(120));
        assert!(CommitMode::confirmed(59).is_err());
        assert!(CommitMode::confirmed(7201).is_err());
        assert_eq!(CommitMode::Immediate.confirm_minutes(), None);
    }

    #[test]
    fn test_parse_commit_results() {
        let reply = xml::parse(
            r#"<rpc-reply xmlns:junos="http://xml.juniper.net/junos/23.4R1/junos">
    <commit-results>
        <routing-engine junos:style="normal">
            <name>re0</name>
            <commit-success/>
            <commit-revision-information>
                <new-db-revision>re0-1760600000-42</new-db-revision>
            </commit-revision-information>
        </routing-engine>
    </commit-results>
</rpc-reply>"#,
        )
        .unwrap();
        assert_eq!(
            parse_commit_results(&reply),
            "re0\ncommit complete\nre0-1760600000-42\n"
        );

        let check = xml::parse(
            "<rpc-reply><commit-results><routing-engine><name>re0</name>\
             <commit-check-success/></routing-engine></commit-results></rpc-reply>",
        )
        .unwrap();
        assert_eq!(
            parse_commit_results(&check),
            "re0\nconfiguration check succeeds\n"
        );
    }

    #[test]
    fn test_parse_scheduled_commit() {
        let reply = xml::parse(
            "<rpc-reply><commit-results><routing-engine><name>re0</name>\
             <output>commit at will be executed at 2026-10-17 02:00:00 UTC</output>\
             </routing-engine></commit-results></rpc-reply>",
        )
        .unwrap();
        let text = parse_commit_results(&reply);
        assert!(text.contains("commit at will be executed at 2026-10-17 02:00:00 UTC"));
        assert!(!text.contains("commit complete"));
    }
}
