//! File copy to and from devices.

use std::io::Write;
use std::path::Path;

use log::debug;

use crate::error::Result;
use crate::session::DeviceHandle;

/// Width progress lines are padded to, so a shorter line overwrites a longer one.
const PROGRESS_WIDTH: usize = 120;

/// Destination directory with exactly one trailing `/`.
pub fn normalize_destination(destination: &str) -> String {
    let trimmed = destination.trim_end_matches('/');
    if trimmed.is_empty() && !destination.is_empty() {
        return "/".to_string();
    }
    if trimmed.is_empty() {
        return "./".to_string();
    }
    format!("{trimmed}/")
}

/// Source path without trailing `/`, so a directory copy keeps its own name.
pub fn normalize_source(source: &str) -> String {
    let trimmed = source.trim_end_matches('/');
    if trimmed.is_empty() && source.starts_with('/') {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Final path component of a `/`-separated path.
pub(crate) fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Percent-complete reporter for one transfer.
///
/// Progress for the current file is redrawn in place; a line break is started
/// whenever the transfer moves to another file.
#[derive(Debug, Default)]
pub struct ProgressReporter {
    current: Option<String>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The text to print for one progress tick.
    pub fn render(&mut self, file: &str, size: u64, transferred: u64) -> String {
        let mut out = String::new();
        if self.current.as_deref() != Some(file) {
            if self.current.is_some() {
                out.push('\n');
            }
            self.current = Some(file.to_string());
        }
        let percent = if size == 0 {
            100.0
        } else {
            transferred as f64 / size as f64 * 100.0
        };
        let line = format!("Transferred {percent:.0}% of the file {file}");
        out.push_str(&format!("\r{line:<PROGRESS_WIDTH$}"));
        out
    }

    /// Print one progress tick to stdout.
    ///
    /// Writes bypass the [`OutputSink`](crate::fanout::OutputSink), so the
    /// coordinator only enables progress when a single target runs.
    pub fn update(&mut self, file: &str, size: u64, transferred: u64) {
        let text = self.render(file, size, transferred);
        let mut stdout = std::io::stdout().lock();
        // Progress is best effort
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    /// Terminate the progress line, if one was started.
    pub fn finish(&mut self) {
        if self.current.take().is_some() {
            println!();
        }
    }
}

impl DeviceHandle {
    /// Copy `source` from the device into the local `destination` directory.
    ///
    /// With `multi` the local name is prefixed with the device host so that
    /// pulls from several devices do not overwrite each other. Returns the
    /// local path written.
    pub async fn scp_pull(
        &mut self,
        source: &str,
        destination: &str,
        progress: bool,
        multi: bool,
    ) -> Result<String> {
        let source = normalize_source(source);
        let destination = normalize_destination(destination);
        let prefix = if multi {
            format!("{}_", self.host())
        } else {
            String::new()
        };
        let local = format!("{destination}{prefix}{}", basename(&source));
        debug!("{}: pull {} -> {}", self.host(), source, local);

        let mut reporter = ProgressReporter::new();
        let mut tick = |file: &str, size: u64, done: u64| reporter.update(file, size, done);
        let session = self.transfer_session().await?;
        let result = if progress {
            session.pull(&source, Path::new(&local), Some(&mut tick)).await
        } else {
            session.pull(&source, Path::new(&local), None).await
        };
        drop(tick);
        reporter.finish();
        result.map(|()| local)
    }

    /// Copy the local `source` into the device directory `destination`.
    ///
    /// Returns the remote path written.
    pub async fn scp_push(
        &mut self,
        source: &str,
        destination: &str,
        progress: bool,
    ) -> Result<String> {
        let source = normalize_source(source);
        let destination = normalize_destination(destination);
        let remote = format!("{destination}{}", basename(&source));
        debug!("{}: push {} -> {}", self.host(), source, remote);

        let mut reporter = ProgressReporter::new();
        let mut tick = |file: &str, size: u64, done: u64| reporter.update(file, size, done);
        let session = self.transfer_session().await?;
        let result = if progress {
            session.push(Path::new(&source), &remote, Some(&mut tick)).await
        } else {
            session.push(Path::new(&source), &remote, None).await
        };
        drop(tick);
        reporter.finish();
        result.map(|()| remote)
    }
}
