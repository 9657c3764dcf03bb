//! # Process supervisor: launches one daemon and observes its exit.
//!
//! [`Launcher::launch`] spawns the executable, records its pid, and hands back a
//! [`ProcessHandle`]. Two background tasks live for as long as the child does:
//!
//! ```text
//! launch()
//!   ├─ spawn child (stdin=null, stdout→log file, stderr=piped) ─► publish ProcessStarted
//!   ├─ stderr forwarder:  raw lines (lossy UTF-8) ──► tracing(debug) + log file + tail ring
//!   ├─ waiter:            select! { child.wait(), kill requested → start_kill + wait }
//!   │                        └─► join forwarder (bounded) ─► ExitReport ─► publish ProcessExited
//!   │                                                                    └► fire ExitSignal
//!   └─ record pid file   (failure ⇒ kill, await exit, LaunchError::PidFile)
//! ```
//!
//! ## Rules
//! - The exit signal fires exactly once; any number of tasks may await it.
//! - `kill()` is idempotent and a no-op after exit.
//! - Dropping the handle without `drain()` kills the child (`kill_on_drop`).
//! - The forwarder reads stderr until EOF, even past the child's exit, so a descendant
//!   holding the pipe never sees it closed under it.
//! - The exit signal waits at most [`TAIL_GRACE`] for the forwarder before firing.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::log_sink::LogSink;
use crate::error::LaunchError;
use crate::events::{Bus, Event, EventKind};

/// How long the exit path waits for the stderr forwarder to reach EOF.
const TAIL_GRACE: Duration = Duration::from_millis(250);

/// Consecutive read errors after which the forwarder gives up on the pipe.
const MAX_READ_ERRORS: u32 = 16;

/// How a process ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExitReport {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    pub success: bool,
    /// Human-readable status (`exit status: 1`, `signal: 9 (SIGKILL)`, or a wait error).
    pub status: String,
    /// Last stderr lines, oldest first.
    pub stderr_tail: Vec<String>,
    /// Exit followed a kill request.
    pub killed: bool,
}

impl ExitReport {
    fn from_status(status: std::io::Result<ExitStatus>, stderr_tail: Vec<String>, killed: bool) -> Self {
        match status {
            Ok(status) => Self {
                code: status.code(),
                success: status.success(),
                status: status.to_string(),
                stderr_tail,
                killed,
            },
            Err(err) => Self {
                code: None,
                success: false,
                status: format!("wait failed: {err}"),
                stderr_tail,
                killed,
            },
        }
    }

    /// One-line summary: status plus the last stderr line for unsuccessful exits.
    pub fn summary(&self) -> String {
        match (self.success, self.stderr_tail.last()) {
            (false, Some(line)) => format!("{}; last stderr: {line}", self.status),
            _ => self.status.clone(),
        }
    }
}

/// One-shot, multi-reader notification that the process exited.
#[derive(Clone, Debug)]
pub struct ExitSignal {
    fired: CancellationToken,
    report: Arc<OnceLock<ExitReport>>,
}

impl ExitSignal {
    fn new() -> Self {
        Self {
            fired: CancellationToken::new(),
            report: Arc::new(OnceLock::new()),
        }
    }

    fn fire(&self, report: ExitReport) {
        let _ = self.report.set(report);
        self.fired.cancel();
    }

    /// Waits for the process to exit and returns its report.
    pub async fn wait(&self) -> ExitReport {
        self.fired.cancelled().await;
        self.report.get().cloned().unwrap_or_else(|| ExitReport {
            code: None,
            success: false,
            status: "unknown".to_string(),
            stderr_tail: Vec::new(),
            killed: false,
        })
    }

    /// The report, if the process has already exited.
    pub fn try_report(&self) -> Option<&ExitReport> {
        if self.fired.is_cancelled() {
            self.report.get()
        } else {
            None
        }
    }

    pub fn has_fired(&self) -> bool {
        self.fired.is_cancelled()
    }
}

/// A running (or exited) daemon.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: u32,
    label: Arc<str>,
    kill: CancellationToken,
    exit: ExitSignal,
    waiter: JoinHandle<()>,
    log: LogSink,
}

impl ProcessHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// A cloneable view of the exit notification.
    pub fn exit_signal(&self) -> ExitSignal {
        self.exit.clone()
    }

    pub async fn wait(&self) -> ExitReport {
        self.exit.wait().await
    }

    /// Requests forced termination. Idempotent; a no-op once the process has exited.
    pub fn kill(&self) {
        self.kill.cancel();
    }

    /// Appends a line to the process log file (no-op without one).
    pub async fn append_log(&self, line: &str) -> std::io::Result<()> {
        self.log.append(line).await
    }

    /// Waits for the exit and the background tasks, consuming the handle.
    pub async fn drain(self) -> ExitReport {
        let report = self.exit.wait().await;
        let _ = self.waiter.await;
        report
    }
}

/// Spawns daemons with a fixed label, log destination and event bus.
#[derive(Clone, Debug)]
pub struct Launcher {
    label: Arc<str>,
    bus: Bus,
    log_file: Option<PathBuf>,
    tail_lines: usize,
}

impl Launcher {
    pub fn new(label: impl Into<Arc<str>>, bus: Bus) -> Self {
        Self {
            label: label.into(),
            bus,
            log_file: None,
            tail_lines: 64,
        }
    }

    pub fn with_log_file(mut self, path: Option<PathBuf>) -> Self {
        self.log_file = path;
        self
    }

    pub fn with_tail_lines(mut self, n: usize) -> Self {
        self.tail_lines = n;
        self
    }

    /// Spawns `program args…` and records its pid in `pid_file`.
    pub async fn launch(&self, program: &Path, args: &[String], pid_file: &Path) -> Result<ProcessHandle, LaunchError> {
        let (log, stdout_file) = LogSink::open(self.label.clone(), self.log_file.as_deref(), self.tail_lines)
            .await
            .map_err(|source| LaunchError::LogFile {
                path: self.log_file.clone().unwrap_or_default(),
                source,
            })?;

        let stdout = match stdout_file {
            Some(file) => Stdio::from(file),
            None => Stdio::null(),
        };
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                program: program.to_path_buf(),
                source,
            })?;

        let Some(pid) = child.id() else {
            return Err(LaunchError::NoPid {
                program: program.to_path_buf(),
            });
        };
        self.bus.publish(
            Event::new(EventKind::ProcessStarted)
                .with_node(self.label.clone())
                .with_pid(pid),
        );

        let forwarder = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(forward_stderr(stderr, log.clone())));

        let kill = CancellationToken::new();
        let exit = ExitSignal::new();
        let waiter = tokio::spawn(watch_child(
            child,
            forwarder,
            WaiterCtx {
                pid,
                label: self.label.clone(),
                bus: self.bus.clone(),
                kill: kill.clone(),
                exit: exit.clone(),
                log: log.clone(),
            },
        ));

        let handle = ProcessHandle {
            pid,
            label: self.label.clone(),
            kill,
            exit,
            waiter,
            log,
        };

        if let Err(source) = record_pid(pid_file, pid).await {
            handle.kill();
            let _ = handle.drain().await;
            return Err(LaunchError::PidFile {
                path: pid_file.to_path_buf(),
                source,
            });
        }
        Ok(handle)
    }
}

struct WaiterCtx {
    pid: u32,
    label: Arc<str>,
    bus: Bus,
    kill: CancellationToken,
    exit: ExitSignal,
    log: LogSink,
}

async fn watch_child(mut child: Child, forwarder: Option<JoinHandle<()>>, ctx: WaiterCtx) {
    let (status, killed) = tokio::select! {
        status = child.wait() => (status, false),
        _ = ctx.kill.cancelled() => {
            ctx.bus.publish(
                Event::new(EventKind::ProcessKilled)
                    .with_node(ctx.label.clone())
                    .with_pid(ctx.pid),
            );
            let _ = child.start_kill();
            (child.wait().await, true)
        }
    };

    if let Some(mut forwarder) = forwarder {
        if tokio::time::timeout(TAIL_GRACE, &mut forwarder).await.is_err() {
            // A descendant still holds stderr; the forwarder keeps draining detached.
            tracing::debug!(target: "lnvisor::process", node = %ctx.label, pid = ctx.pid, "stderr still open after exit");
        }
    }

    let report = ExitReport::from_status(status, ctx.log.tail().await, killed);
    ctx.bus.publish(
        Event::new(EventKind::ProcessExited)
            .with_node(ctx.label.clone())
            .with_pid(ctx.pid)
            .with_reason(report.summary()),
    );
    ctx.exit.fire(report);
}

/// Copies stderr line by line into `log` until EOF. Invalid UTF-8 is replaced, not fatal.
async fn forward_stderr(stderr: impl AsyncRead + Unpin, log: LogSink) {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    let mut errors = 0u32;
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                errors = 0;
                let line = buf.strip_suffix(b"\n").unwrap_or(&buf);
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                log.stderr_line(String::from_utf8_lossy(line).into_owned()).await;
            }
            Err(err) => {
                errors += 1;
                tracing::warn!(target: "lnvisor::process", error = %err, "stderr read failed");
                if errors >= MAX_READ_ERRORS {
                    break;
                }
            }
        }
    }
}

/// Writes `pid` followed by a newline to `path`, synced to disk.
pub async fn record_pid(path: &Path, pid: u32) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(format!("{pid}\n").as_bytes()).await?;
    file.sync_all().await
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_exit_report_carries_status_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let launcher = Launcher::new("n(0)", bus);

        let handle = launcher
            .launch(
                Path::new("/bin/sh"),
                &sh("echo first >&2; echo boom >&2; exit 3"),
                &dir.path().join("0.pid"),
            )
            .await
            .unwrap();

        let report = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .unwrap();
        assert_eq!(report.code, Some(3));
        assert!(!report.success);
        assert!(!report.killed);
        assert_eq!(report.stderr_tail, vec!["first", "boom"]);
        assert!(report.summary().ends_with("last stderr: boom"));

        let started = rx.recv().await.unwrap();
        assert_eq!(started.kind, EventKind::ProcessStarted);
        let exited = rx.recv().await.unwrap();
        assert_eq!(exited.kind, EventKind::ProcessExited);
        assert_eq!(exited.pid, Some(handle.pid()));
    }

    #[tokio::test]
    async fn test_pid_file_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("7.pid");
        let handle = Launcher::new("n(7)", Bus::new(4))
            .launch(Path::new("/bin/sh"), &sh("exit 0"), &pid_file)
            .await
            .unwrap();

        let content = tokio::fs::read_to_string(&pid_file).await.unwrap();
        assert_eq!(content, format!("{}\n", handle.pid()));
        assert!(handle.drain().await.success);
    }

    #[tokio::test]
    async fn test_kill_is_idempotent_and_releases_all_waiters() {
        let dir = tempfile::tempdir().unwrap();
        let handle = Launcher::new("n(1)", Bus::new(4))
            .launch(Path::new("/bin/sh"), &sh("exec sleep 30"), &dir.path().join("1.pid"))
            .await
            .unwrap();

        let a = handle.exit_signal();
        let b = handle.exit_signal();
        let wa = tokio::spawn(async move { a.wait().await });
        let wb = tokio::spawn(async move { b.wait().await });

        handle.kill();
        handle.kill();

        let ra = tokio::time::timeout(Duration::from_secs(5), wa).await.unwrap().unwrap();
        let rb = tokio::time::timeout(Duration::from_secs(5), wb).await.unwrap().unwrap();
        assert!(ra.killed && !ra.success);
        assert_eq!(ra, rb);

        handle.kill();
        assert!(handle.exit_signal().has_fired());
        assert!(handle.exit_signal().try_report().is_some());
    }

    #[tokio::test]
    async fn test_pid_file_failure_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let err = Launcher::new("n(2)", bus)
            .launch(
                Path::new("/bin/sh"),
                &sh("exec sleep 30"),
                &dir.path().join("missing").join("2.pid"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::PidFile { .. }));

        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        assert_eq!(
            kinds,
            vec![
                EventKind::ProcessStarted,
                EventKind::ProcessKilled,
                EventKind::ProcessExited
            ]
        );
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = Launcher::new("n(3)", Bus::new(4))
            .launch(Path::new("/definitely/not/here"), &[], &dir.path().join("3.pid"))
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { .. }));
        assert_eq!(err.as_label(), "launch_spawn");
    }

    #[tokio::test]
    async fn test_invalid_utf8_on_stderr_does_not_kill_the_process() {
        let dir = tempfile::tempdir().unwrap();
        let handle = Launcher::new("n(5)", Bus::new(4))
            .launch(
                Path::new("/bin/sh"),
                &sh("printf 'bad \\377\\n' >&2; sleep .3; echo after >&2; exit 0"),
                &dir.path().join("5.pid"),
            )
            .await
            .unwrap();

        let report = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .unwrap();
        assert!(report.success, "{report:?}");
        assert_eq!(report.stderr_tail.len(), 2);
        assert_eq!(report.stderr_tail[0], "bad \u{FFFD}");
        assert_eq!(report.stderr_tail[1], "after");
    }

    #[tokio::test]
    async fn test_exit_fires_while_descendant_holds_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let handle = Launcher::new("n(6)", Bus::new(4))
            .launch(
                Path::new("/bin/sh"),
                &sh("echo parting >&2; sleep 3 & exit 0"),
                &dir.path().join("6.pid"),
            )
            .await
            .unwrap();

        let report = tokio::time::timeout(Duration::from_secs(1), handle.wait())
            .await
            .expect("exit signal should not wait for the descendant");
        assert!(report.success);
        assert_eq!(report.stderr_tail, vec!["parting"]);
    }

    #[tokio::test]
    async fn test_stdout_goes_to_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("out.log");
        let handle = Launcher::new("n(4)", Bus::new(4))
            .with_log_file(Some(log.clone()))
            .launch(Path::new("/bin/sh"), &sh("echo to-stdout"), &dir.path().join("4.pid"))
            .await
            .unwrap();
        handle.drain().await;

        let content = tokio::fs::read_to_string(&log).await.unwrap();
        assert!(content.contains("to-stdout"));
    }
}
