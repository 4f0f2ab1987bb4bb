//! A single long-lived shell session.
//!
//! The child shell is spawned with piped stdio. Two reader tasks drain
//! stdout/stderr into the session's retained tails for as long as the child
//! lives; command multiplexing on top of those tails is the manager's job.

use std::process::Stdio;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex as StdMutex,
};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use shrimp_core::platform::Platform;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, warn};

use crate::buffer::StreamBuf;
use crate::error::{Result, ShellError};
use crate::types::{SessionId, SessionInfo};

pub(crate) type SharedBuf = Arc<StdMutex<StreamBuf>>;

/// A non-interactive command in flight on the long-lived shell.
pub(crate) struct PendingCommand {
    pub token: String,
    pub started_at: Instant,
    pub stdout_start: u64,
    pub stderr_start: u64,
}

/// An interactive command in flight — a separate child with its own streams.
pub(crate) struct InteractiveCommand {
    pub child: Child,
    pub stdin: Option<ChildStdin>,
    pub stdout: SharedBuf,
    pub stderr: SharedBuf,
    pub stdout_cursor: u64,
    pub stderr_cursor: u64,
}

/// Mutable per-session command state.
///
/// At most one of `pending` / `interactive` is populated at any time. The
/// cursors track how far `write_stdin` callers have read the long-lived
/// shell's streams.
#[derive(Default)]
pub(crate) struct CommandState {
    pub pending: Option<PendingCommand>,
    pub interactive: Option<InteractiveCommand>,
    pub stdout_cursor: u64,
    pub stderr_cursor: u64,
}

impl CommandState {
    pub fn busy(&self) -> bool {
        self.pending.is_some() || self.interactive.is_some()
    }
}

pub struct ShellSession {
    pub id: SessionId,
    pub shell: String,
    pub platform: Platform,
    /// Unix timestamp (milliseconds) of creation.
    pub created_at: u64,
    last_used_at: AtomicU64,
    cwd: StdMutex<String>,
    alive: Arc<AtomicBool>,
    child: StdMutex<Child>,
    stdin: TokioMutex<ChildStdin>,
    pub(crate) stdout: SharedBuf,
    pub(crate) stderr: SharedBuf,
    pub(crate) state: TokioMutex<CommandState>,
}

impl ShellSession {
    /// Spawn the shell in `cwd` and start the stream readers.
    pub(crate) fn spawn(shell: &str, cwd: &str, tail_cap: usize) -> Result<Self> {
        let platform = Platform::current();
        let mut child = Command::new(shell)
            .current_dir(cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ShellError::Spawn(format!("{shell}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ShellError::Spawn("child stdin not piped".into()))?;
        let child_stdout = child
            .stdout
            .take()
            .ok_or_else(|| ShellError::Spawn("child stdout not piped".into()))?;
        let child_stderr = child
            .stderr
            .take()
            .ok_or_else(|| ShellError::Spawn("child stderr not piped".into()))?;

        let stdout: SharedBuf = Arc::new(StdMutex::new(StreamBuf::new(tail_cap)));
        let stderr: SharedBuf = Arc::new(StdMutex::new(StreamBuf::new(tail_cap)));
        let alive = Arc::new(AtomicBool::new(true));

        spawn_reader(child_stdout, Arc::clone(&stdout), Some(Arc::clone(&alive)));
        spawn_reader(child_stderr, Arc::clone(&stderr), None);

        let id = SessionId::new();
        let now = now_ms();
        debug!(session_id = %id, shell, cwd, "shell session spawned");

        Ok(Self {
            id,
            shell: shell.to_string(),
            platform,
            created_at: now,
            last_used_at: AtomicU64::new(now),
            cwd: StdMutex::new(cwd.to_string()),
            alive,
            child: StdMutex::new(child),
            stdin: TokioMutex::new(stdin),
            stdout,
            stderr,
            state: TokioMutex::new(CommandState::default()),
        })
    }

    /// Write raw bytes to the long-lived shell's stdin.
    pub(crate) async fn write_shell_stdin(&self, bytes: &[u8]) -> Result<()> {
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(bytes).await?;
        stdin.flush().await?;
        Ok(())
    }

    pub fn cwd(&self) -> String {
        self.cwd.lock().unwrap().clone()
    }

    pub(crate) fn set_cwd(&self, cwd: &str) {
        *self.cwd.lock().unwrap() = cwd.to_string();
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn last_used_at(&self) -> u64 {
        self.last_used_at.load(Ordering::Relaxed)
    }

    pub(crate) fn touch(&self) {
        self.last_used_at.store(now_ms(), Ordering::Relaxed);
    }

    /// Kill the shell child (and any interactive child on a best-effort
    /// basis — it dies with its kill_on_drop handle when the state drops).
    pub(crate) fn kill(&self) {
        if let Ok(mut child) = self.child.lock() {
            if let Err(e) = child.start_kill() {
                warn!(session_id = %self.id, error = %e, "kill failed");
            }
        }
        self.alive.store(false, Ordering::Release);
    }

    /// Metadata snapshot. `busy` is conservative: a session whose state is
    /// momentarily locked reports busy.
    pub fn info(&self) -> SessionInfo {
        let busy = match self.state.try_lock() {
            Ok(state) => state.busy(),
            Err(_) => true,
        };
        SessionInfo {
            id: self.id.clone(),
            shell: self.shell.clone(),
            os: self.platform.as_str().to_string(),
            cwd: self.cwd(),
            created_at: self.created_at,
            last_used_at: self.last_used_at(),
            alive: self.is_alive(),
            busy,
        }
    }
}

/// Drain `stream` into `buf` until EOF. When `alive` is given it is cleared
/// on EOF, marking the session's child as exited.
pub(crate) fn spawn_reader(
    mut stream: impl AsyncRead + Unpin + Send + 'static,
    buf: SharedBuf,
    alive: Option<Arc<AtomicBool>>,
) {
    tokio::spawn(async move {
        let mut raw = [0u8; 4096];
        loop {
            match stream.read(&mut raw).await {
                Ok(0) => break,
                Ok(n) => {
                    buf.lock().unwrap().append(&raw[..n]);
                }
                Err(e) => {
                    warn!(error = %e, "stream reader error");
                    break;
                }
            }
        }
        if let Some(alive) = alive {
            alive.store(false, Ordering::Release);
        }
    });
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
