//! Destination for rendered device results.

use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::driver::DeviceResult;

/// Where results go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkMode {
    /// Print to standard output.
    Stdout,
    /// Append every result to one shared file.
    SingleFile(PathBuf),
    /// Append each result to `<dir>/<target>_<name>` for the given `<dir>/<name>`.
    PerTarget(PathBuf),
    /// Discard.
    Quiet,
}

/// Serialised writer for device results.
///
/// Each result is written as one record while holding the sink lock, so
/// results from concurrent workers never interleave.
#[derive(Debug)]
pub struct OutputSink {
    mode: SinkMode,
    announce: bool,
    lock: Mutex<()>,
}

impl OutputSink {
    pub fn new(mode: SinkMode) -> Self {
        Self {
            mode,
            announce: true,
            lock: Mutex::new(()),
        }
    }

    /// Whether file modes print `<target> output appended to: <path>`.
    pub fn announce(mut self, announce: bool) -> Self {
        self.announce = announce;
        self
    }

    /// The sink mode.
    pub fn mode(&self) -> &SinkMode {
        &self.mode
    }

    /// File a result for `target` is written to, in the file modes.
    pub fn path_for(&self, target: &str) -> Option<PathBuf> {
        match &self.mode {
            SinkMode::SingleFile(path) => Some(path.clone()),
            SinkMode::PerTarget(path) => Some(per_target_path(path, target)),
            SinkMode::Stdout | SinkMode::Quiet => None,
        }
    }

    /// Write one result.
    pub async fn emit(&self, result: &DeviceResult) -> io::Result<()> {
        let record = result.render();
        let _guard = self.lock.lock().await;

        match self.path_for(&result.target) {
            Some(path) => {
                append(&path, &record).await?;
                debug!("{}: {} bytes appended to {}", result.target, record.len(), path.display());
                if self.announce {
                    let notice = format!("{} output appended to: {}\n", result.target, path.display());
                    write_stdout(&notice).await?;
                }
                Ok(())
            }
            None if self.mode == SinkMode::Quiet => Ok(()),
            None => write_stdout(&record).await,
        }
    }
}

impl Default for OutputSink {
    fn default() -> Self {
        Self::new(SinkMode::Stdout)
    }
}

fn per_target_path(path: &Path, target: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file = format!("{target}_{name}");
    match path.parent() {
        Some(dir) => dir.join(file),
        None => PathBuf::from(file),
    }
}

async fn append(path: &Path, record: &str) -> io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(record.as_bytes()).await?;
    file.flush().await
}

async fn write_stdout(text: &str) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_per_target_path() {
        assert_eq!(
            per_target_path(Path::new("/tmp/out/report.txt"), "10.0.0.1"),
            PathBuf::from("/tmp/out/10.0.0.1_report.txt")
        );
        assert_eq!(
            per_target_path(Path::new("report.txt"), "r1"),
            PathBuf::from("r1_report.txt")
        );
    }

    #[tokio::test]
    async fn test_single_file_records_are_whole() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all.txt");
        let sink = OutputSink::new(SinkMode::SingleFile(path.clone())).announce(false);

        let first = DeviceResult::success("r1", "> show version\nHostname: r1\n");
        let second = DeviceResult::failure(
            "r2",
            "Authentication failed for device: r2\n",
            ErrorKind::Authentication,
        );
        sink.emit(&first).await.unwrap();
        sink.emit(&second).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, format!("{}{}", first.render(), second.render()));
    }

    #[tokio::test]
    async fn test_per_target_files() {
        let dir = tempfile::tempdir().unwrap();
        let sink = OutputSink::new(SinkMode::PerTarget(dir.path().join("out.log"))).announce(false);

        sink.emit(&DeviceResult::success("r1", "one\n")).await.unwrap();
        sink.emit(&DeviceResult::success("r2", "two\n")).await.unwrap();
        sink.emit(&DeviceResult::success("r1", "three\n")).await.unwrap();

        let r1 = std::fs::read_to_string(dir.path().join("r1_out.log")).unwrap();
        let r2 = std::fs::read_to_string(dir.path().join("r2_out.log")).unwrap();
        assert!(r1.contains("one\n") && r1.contains("three\n"));
        assert!(r2.contains("two\n") && !r2.contains("one"));
    }
}
