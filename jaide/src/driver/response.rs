//! Per-device result of one operation.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// Width of the separator line above each result.
const SEPARATOR_WIDTH: usize = 50;

/// How an operation ended on one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    /// Everything the operation asked for was done.
    Success,
    /// The device was reached but the operation failed part way.
    Recoverable,
    /// The device could not be reached or logged into.
    Fatal,
}

impl ResultStatus {
    /// Status marker shown in the result header.
    pub fn marker(self) -> &'static str {
        match self {
            ResultStatus::Success => "[OK]",
            ResultStatus::Recoverable => "[ERROR]",
            ResultStatus::Fatal => "[FAILED]",
        }
    }
}

/// Output of one operation against one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceResult {
    /// The target as it was given.
    pub target: String,

    /// Command output, commit results or error text.
    pub body: String,

    /// Completion status.
    pub status: ResultStatus,

    /// Classification of the failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl DeviceResult {
    /// A successful result.
    pub fn success(target: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            body: body.into(),
            status: ResultStatus::Success,
            error: None,
        }
    }

    /// A failed result; fatal kinds give [`ResultStatus::Fatal`].
    pub fn failure(target: impl Into<String>, body: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            target: target.into(),
            body: body.into(),
            status: if kind.is_fatal() {
                ResultStatus::Fatal
            } else {
                ResultStatus::Recoverable
            },
            error: Some(kind),
        }
    }

    /// Check if the operation succeeded.
    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }

    /// Header block: separator line, then the device and status marker.
    pub fn header(&self) -> String {
        format!(
            "{}\nResults from device: {} {}\n",
            "=".repeat(SEPARATOR_WIDTH),
            self.target,
            self.status.marker()
        )
    }

    /// Header followed by body, as written to the output sink.
    pub fn render(&self) -> String {
        let mut out = self.header();
        out.push_str(&self.body);
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out
    }
}

impl std::fmt::Display for DeviceResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let ok = DeviceResult::success("10.0.0.1", "> show version\nHostname: r1\n");
        assert_eq!(
            ok.render(),
            format!(
                "{}\nResults from device: 10.0.0.1 [OK]\n> show version\nHostname: r1\n",
                "=".repeat(50)
            )
        );

        let failed = DeviceResult::failure(
            "10.0.0.2",
            "Authentication failed for device: 10.0.0.2",
            ErrorKind::Authentication,
        );
        assert_eq!(failed.status, ResultStatus::Fatal);
        assert!(failed.render().ends_with("[FAILED]\nAuthentication failed for device: 10.0.0.2\n"));

        let lock = DeviceResult::failure("r3", "locked", ErrorKind::LockContention);
        assert_eq!(lock.status, ResultStatus::Recoverable);
        assert!(!lock.is_success());
    }
}
