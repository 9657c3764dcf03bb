//! Where a daemon's output goes: an optional append-only log file, `tracing` at debug
//! level, and a bounded in-memory tail of stderr used in the exit report.

use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::sync::Arc;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Clone)]
pub(crate) struct LogSink {
    label: Arc<str>,
    file: Option<Arc<Mutex<File>>>,
    tail: Arc<Mutex<VecDeque<String>>>,
    tail_cap: usize,
}

impl LogSink {
    /// Opens `path` for appending (creating parent directories) and returns the sink plus a
    /// second handle to the same file for the child's stdout.
    pub(crate) async fn open(
        label: Arc<str>,
        path: Option<&Path>,
        tail_cap: usize,
    ) -> io::Result<(Self, Option<std::fs::File>)> {
        let (file, stdout) = match path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                let file = OpenOptions::new().create(true).append(true).open(path).await?;
                let stdout = file.try_clone().await?.into_std().await;
                (Some(Arc::new(Mutex::new(file))), Some(stdout))
            }
            None => (None, None),
        };
        let sink = Self {
            label,
            file,
            tail: Arc::new(Mutex::new(VecDeque::with_capacity(tail_cap))),
            tail_cap,
        };
        Ok((sink, stdout))
    }

    /// Records one stderr line.
    pub(crate) async fn stderr_line(&self, line: String) {
        tracing::debug!(target: "lnvisor::process", node = %self.label, "{line}");
        if let Err(err) = self.append(&line).await {
            tracing::warn!(target: "lnvisor::process", node = %self.label, error = %err, "log file write failed");
        }
        if self.tail_cap == 0 {
            return;
        }
        let mut tail = self.tail.lock().await;
        if tail.len() == self.tail_cap {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    /// Appends a line to the log file; no-op without one.
    pub(crate) async fn append(&self, line: &str) -> io::Result<()> {
        let Some(file) = &self.file else {
            return Ok(());
        };
        let mut file = file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await
    }

    pub(crate) async fn tail(&self) -> Vec<String> {
        self.tail.lock().await.iter().cloned().collect()
    }
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink")
            .field("label", &self.label)
            .field("file", &self.file.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tail_is_bounded() {
        let (sink, stdout) = LogSink::open("n(0)".into(), None, 2).await.unwrap();
        assert!(stdout.is_none());
        for i in 0..5 {
            sink.stderr_line(format!("line {i}")).await;
        }
        assert_eq!(sink.tail().await, vec!["line 3", "line 4"]);
    }

    #[tokio::test]
    async fn test_lines_are_appended_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("node.log");
        let (sink, stdout) = LogSink::open("n(0)".into(), Some(&path), 4).await.unwrap();
        assert!(stdout.is_some());

        sink.stderr_line("from stderr".into()).await;
        sink.append("marker: test case 1").await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "from stderr\nmarker: test case 1\n");
    }
}
