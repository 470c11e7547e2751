//! Configuration diff between two devices.

use similar::TextDiff;

use crate::error::{DriverError, Result};
use crate::session::{DeviceHandle, RpcSession};

/// Notation the configurations are compared in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DiffMode {
    /// Flattened `set` statements.
    #[default]
    Set,
    /// Hierarchical curly-brace stanzas.
    Stanza,
}

impl DiffMode {
    fn command(self) -> &'static str {
        match self {
            DiffMode::Set => "show configuration | display set",
            DiffMode::Stanza => "show configuration",
        }
    }
}

async fn fetch_config(session: &mut dyn RpcSession, mode: DiffMode) -> Result<String> {
    let reply = session.command(mode.command(), true).await?;
    Ok(reply
        .query("//configuration-output")?
        .into_iter()
        .map(|output| output.text.trim_start_matches('\n'))
        .collect())
}

/// Unified diff of two configurations; empty when they are identical.
pub(crate) fn unified(first: &str, second: &str, first_name: &str, second_name: &str) -> String {
    if first == second {
        return String::new();
    }
    TextDiff::from_lines(first, second)
        .unified_diff()
        .context_radius(3)
        .header(first_name, second_name)
        .to_string()
}

impl DeviceHandle {
    /// Diff this device's configuration against `second_host`.
    ///
    /// The second device is reached through a sibling handle with the same
    /// credentials; it is always disconnected before returning. Its failures
    /// are wrapped in [`DriverError::Peer`] so they can be told apart from
    /// this device's.
    pub async fn diff_config(&mut self, second_host: &str, mode: DiffMode) -> Result<String> {
        let first = fetch_config(self.rpc_session().await?, mode).await?;

        let mut peer = self.for_host(second_host);
        let second = match peer.rpc_session().await {
            Ok(session) => fetch_config(session, mode).await,
            Err(e) => Err(e),
        };
        peer.disconnect().await;
        let second = second.map_err(|e| DriverError::Peer {
            host: second_host.to_string(),
            source: Box::new(e),
        })?;

        Ok(unified(&first, &second, self.host(), second_host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unified_headers() {
        let first = "set system host-name r1\nset system ntp server 10.0.0.1\n";
        let second = "set system host-name r2\nset system ntp server 10.0.0.1\n";
        let diff = unified(first, second, "r1", "r2");
        assert!(diff.starts_with("--- r1\n+++ r2\n"));
        assert!(diff.contains("-set system host-name r1\n"));
        assert!(diff.contains("+set system host-name r2\n"));
        assert!(diff.contains(" set system ntp server 10.0.0.1\n"));
    }

    #[test]
    fn test_identical_configs() {
        let config = "set system host-name r1\n";
        assert_eq!(unified(config, config, "r1", "r2"), "");
    }
}
