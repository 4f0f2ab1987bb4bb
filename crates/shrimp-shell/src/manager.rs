//! `ShellManager` — owns and multiplexes all live shell sessions.
//!
//! The manager is shared behind an `Arc` and is safe for concurrent use
//! across turns. Individual sessions are not: a `run_command` against a
//! session that already has a command in flight fails fast with a structured
//! busy result instead of queueing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex as StdMutex, OnceLock};
use std::time::{Duration, Instant};

use regex::Regex;
use shrimp_core::config::{MAX_COMMAND_TIMEOUT_MS, SESSION_TTL_MS, SWEEP_INTERVAL_MS};
use shrimp_core::platform::{default_shell, Platform};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{Result, ShellError};
use crate::session::{spawn_reader, InteractiveCommand, PendingCommand, ShellSession, SharedBuf};
use crate::truncate::trim_tail;
use crate::types::{
    CommandRequest, CommandResult, CompletedCommand, SessionInfo, WriteStdinResult,
};

/// Sentinel poll cadence.
const POLL_INTERVAL: Duration = Duration::from_millis(25);
/// Grace period after an interactive child exits, letting the stream readers
/// drain the last pipe contents.
const DRAIN_GRACE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct ShellManagerConfig {
    pub max_sessions: usize,
    pub session_ttl_ms: u64,
    pub default_timeout_ms: u64,
    pub max_output_chars: usize,
}

impl Default for ShellManagerConfig {
    fn default() -> Self {
        Self {
            max_sessions: 8,
            session_ttl_ms: SESSION_TTL_MS,
            default_timeout_ms: 30_000,
            max_output_chars: 20_000,
        }
    }
}

pub struct ShellManager {
    sessions: StdMutex<HashMap<String, Arc<ShellSession>>>,
    config: ShellManagerConfig,
    last_sweep: StdMutex<Instant>,
}

impl ShellManager {
    pub fn new(config: ShellManagerConfig) -> Self {
        Self {
            sessions: StdMutex::new(HashMap::new()),
            config,
            last_sweep: StdMutex::new(Instant::now()),
        }
    }

    // -----------------------------------------------------------------------
    // Session lifecycle
    // -----------------------------------------------------------------------

    /// Spawn a new session, evicting the oldest idle one when the pool is at
    /// capacity.
    pub fn create_session(&self, cwd: Option<&str>) -> Result<Arc<ShellSession>> {
        self.maybe_sweep();

        let cwd = cwd
            .map(str::to_string)
            .or_else(|| {
                std::env::current_dir()
                    .ok()
                    .and_then(|p| p.to_str().map(str::to_string))
            })
            .unwrap_or_else(|| "/".to_string());

        let shell = default_shell(Platform::current());
        let tail_cap = self.config.max_output_chars.saturating_mul(2);

        let mut sessions = self.sessions.lock().unwrap();
        while sessions.len() >= self.config.max_sessions {
            let oldest = sessions
                .values()
                .min_by_key(|s| s.last_used_at())
                .map(|s| s.id.0.clone());
            match oldest {
                Some(id) => {
                    if let Some(victim) = sessions.remove(&id) {
                        victim.kill();
                        info!(session_id = %id, "evicted oldest session (capacity)");
                    }
                }
                None => break,
            }
        }

        let session = Arc::new(ShellSession::spawn(&shell, &cwd, tail_cap)?);
        sessions.insert(session.id.0.clone(), Arc::clone(&session));
        Ok(session)
    }

    pub fn get(&self, id: &str) -> Result<Arc<ShellSession>> {
        self.sessions
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| ShellError::UnknownSession(id.to_string()))
    }

    /// Kill and remove a session.
    pub fn close_session(&self, id: &str) -> Result<()> {
        let removed = self.sessions.lock().unwrap().remove(id);
        match removed {
            Some(session) => {
                session.kill();
                info!(session_id = %id, "session closed");
                Ok(())
            }
            None => Err(ShellError::UnknownSession(id.to_string())),
        }
    }

    pub fn list(&self) -> Vec<SessionInfo> {
        self.sessions
            .lock()
            .unwrap()
            .values()
            .map(|s| s.info())
            .collect()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Kill and remove sessions idle past the TTL, plus any whose child has
    /// exited. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let now = crate::session::now_ms();
        let ttl = self.config.session_ttl_ms;
        let mut sessions = self.sessions.lock().unwrap();
        let stale: Vec<String> = sessions
            .values()
            .filter(|s| !s.is_alive() || now.saturating_sub(s.last_used_at()) > ttl)
            .map(|s| s.id.0.clone())
            .collect();
        for id in &stale {
            if let Some(session) = sessions.remove(id) {
                session.kill();
                debug!(session_id = %id, "session swept");
            }
        }
        stale.len()
    }

    /// Throttled sweep — runs at most every `SWEEP_INTERVAL_MS`.
    fn maybe_sweep(&self) {
        {
            let mut last = self.last_sweep.lock().unwrap();
            if last.elapsed() < Duration::from_millis(SWEEP_INTERVAL_MS) {
                return;
            }
            *last = Instant::now();
        }
        self.sweep();
    }

    // -----------------------------------------------------------------------
    // Command execution
    // -----------------------------------------------------------------------

    /// Run a command on a session (created on demand when no id is given).
    pub async fn run_command(&self, req: CommandRequest) -> Result<CommandResult> {
        self.maybe_sweep();

        let timeout_ms = req
            .timeout_ms
            .unwrap_or(self.config.default_timeout_ms)
            .min(MAX_COMMAND_TIMEOUT_MS);

        let session = match req.session_id.as_deref() {
            Some(id) => self.get(id)?,
            None => self.create_session(req.cwd.as_deref())?,
        };
        session.touch();

        if req.interactive {
            self.run_interactive(&session, &req.command, req.cwd.as_deref(), timeout_ms)
                .await
        } else {
            if let Some(result) = self.cd_intercept(&session, &req.command) {
                return Ok(result);
            }
            self.run_pending(&session, &req.command, timeout_ms).await
        }
    }

    /// Non-interactive protocol: inject the command plus a sentinel line and
    /// poll stdout until the sentinel appears or the timeout fires.
    async fn run_pending(
        &self,
        session: &Arc<ShellSession>,
        command: &str,
        timeout_ms: u64,
    ) -> Result<CommandResult> {
        let (token, stdout_start, stderr_start) = {
            let mut state = session.state.lock().await;
            if state.busy() {
                return Ok(self.busy_result(session));
            }
            let stdout_start = session.stdout.lock().unwrap().position();
            let stderr_start = session.stderr.lock().unwrap().position();
            let token = uuid::Uuid::new_v4().simple().to_string();
            state.pending = Some(PendingCommand {
                token: token.clone(),
                started_at: Instant::now(),
                stdout_start,
                stderr_start,
            });
            state.stdout_cursor = stdout_start;
            state.stderr_cursor = stderr_start;
            (token, stdout_start, stderr_start)
        };

        debug!(session_id = %session.id, %token, "command dispatched");
        let script = command_script(session.platform, command, &token);
        if let Err(e) = session.write_shell_stdin(script.as_bytes()).await {
            session.state.lock().await.pending = None;
            return Err(e);
        }

        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            tokio::time::sleep(POLL_INTERVAL).await;

            if let Some(outcome) = self.consume_sentinel(session).await {
                return Ok(CommandResult {
                    session_id: session.id.0.clone(),
                    exit_code: Some(outcome.exit_code),
                    stdout: self.trim(&outcome.stdout_full),
                    stderr: self.trim(&outcome.stderr_full),
                    cwd: outcome.cwd,
                    timed_out: false,
                });
            }

            if Instant::now() >= deadline {
                // Leave the pending command in place — a later write_stdin
                // can still reveal the sentinel and complete it.
                let mut state = session.state.lock().await;
                let (stdout, stdout_pos) = {
                    let buf = session.stdout.lock().unwrap();
                    (lossy(buf.slice_from(stdout_start)), buf.position())
                };
                let (stderr, stderr_pos) = {
                    let buf = session.stderr.lock().unwrap();
                    (lossy(buf.slice_from(stderr_start)), buf.position())
                };
                state.stdout_cursor = stdout_pos;
                state.stderr_cursor = stderr_pos;
                warn!(session_id = %session.id, timeout_ms, "command timed out");
                return Ok(CommandResult {
                    session_id: session.id.0.clone(),
                    exit_code: None,
                    stdout: self.trim(&stdout),
                    stderr: self.trim(&stderr),
                    cwd: session.cwd(),
                    timed_out: true,
                });
            }
        }
    }

    /// Interactive protocol: run the command as a separate child with its own
    /// stream tails, so the caller can drip input via `write_stdin`.
    async fn run_interactive(
        &self,
        session: &Arc<ShellSession>,
        command: &str,
        cwd: Option<&str>,
        timeout_ms: u64,
    ) -> Result<CommandResult> {
        let cwd = cwd.map(str::to_string).unwrap_or_else(|| session.cwd());
        let tail_cap = self.config.max_output_chars.saturating_mul(2);

        {
            let mut state = session.state.lock().await;
            if state.busy() {
                return Ok(self.busy_result(session));
            }

            let mut cmd = if session.platform.is_windows() {
                let mut c = Command::new(&session.shell);
                c.args(["/d", "/s", "/c", command]);
                c
            } else {
                let mut c = Command::new(&session.shell);
                c.args(["-lc", command]);
                c
            };
            let mut child = cmd
                .current_dir(&cwd)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| ShellError::Spawn(format!("interactive {}: {e}", session.shell)))?;

            let stdin = child.stdin.take();
            let stdout: SharedBuf =
                Arc::new(StdMutex::new(crate::buffer::StreamBuf::new(tail_cap)));
            let stderr: SharedBuf =
                Arc::new(StdMutex::new(crate::buffer::StreamBuf::new(tail_cap)));
            if let Some(out) = child.stdout.take() {
                spawn_reader(out, Arc::clone(&stdout), None);
            }
            if let Some(err) = child.stderr.take() {
                spawn_reader(err, Arc::clone(&stderr), None);
            }

            state.interactive = Some(InteractiveCommand {
                child,
                stdin,
                stdout,
                stderr,
                stdout_cursor: 0,
                stderr_cursor: 0,
            });
        }

        debug!(session_id = %session.id, "interactive command dispatched");
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            tokio::time::sleep(POLL_INTERVAL).await;

            let exit_code = {
                let mut state = session.state.lock().await;
                let Some(interactive) = state.interactive.as_mut() else {
                    // Consumed by a concurrent write_stdin — nothing left to
                    // report from here.
                    return Ok(CommandResult {
                        session_id: session.id.0.clone(),
                        exit_code: None,
                        stdout: String::new(),
                        stderr: String::new(),
                        cwd: session.cwd(),
                        timed_out: false,
                    });
                };
                match interactive.child.try_wait() {
                    Ok(Some(status)) => Some(status.code()),
                    Ok(None) => None,
                    Err(e) => {
                        state.interactive = None;
                        return Err(ShellError::Io(e));
                    }
                }
            };

            if let Some(code) = exit_code {
                tokio::time::sleep(DRAIN_GRACE).await;
                let mut state = session.state.lock().await;
                let (stdout, stderr) = match state.interactive.take() {
                    Some(interactive) => (
                        lossy(interactive.stdout.lock().unwrap().retained()),
                        lossy(interactive.stderr.lock().unwrap().retained()),
                    ),
                    None => (String::new(), String::new()),
                };
                session.touch();
                return Ok(CommandResult {
                    session_id: session.id.0.clone(),
                    exit_code: code,
                    stdout: self.trim(&stdout),
                    stderr: self.trim(&stderr),
                    cwd: session.cwd(),
                    timed_out: false,
                });
            }

            if Instant::now() >= deadline {
                let mut state = session.state.lock().await;
                if let Some(interactive) = state.interactive.as_mut() {
                    let stdout = {
                        let buf = interactive.stdout.lock().unwrap();
                        let s = lossy(buf.slice_from(interactive.stdout_cursor));
                        interactive.stdout_cursor = buf.position();
                        s
                    };
                    let stderr = {
                        let buf = interactive.stderr.lock().unwrap();
                        let s = lossy(buf.slice_from(interactive.stderr_cursor));
                        interactive.stderr_cursor = buf.position();
                        s
                    };
                    warn!(session_id = %session.id, timeout_ms, "interactive command timed out");
                    return Ok(CommandResult {
                        session_id: session.id.0.clone(),
                        exit_code: None,
                        stdout: self.trim(&stdout),
                        stderr: self.trim(&stderr),
                        cwd: session.cwd(),
                        timed_out: true,
                    });
                }
            }
        }
    }

    /// Feed input to whatever is in flight and return the output delta.
    pub async fn write_stdin(
        &self,
        session_id: &str,
        chars: &str,
        yield_ms: u64,
    ) -> Result<WriteStdinResult> {
        let session = self.get(session_id)?;
        let yield_ms = yield_ms.min(MAX_COMMAND_TIMEOUT_MS);
        session.touch();

        // Interactive child takes priority.
        let wrote_interactive = {
            let mut state = session.state.lock().await;
            if let Some(interactive) = state.interactive.as_mut() {
                if !chars.is_empty() {
                    // Best-effort: a child that just exited gives EPIPE here,
                    // and the caller still needs the completed block below.
                    if let Some(stdin) = interactive.stdin.as_mut() {
                        if let Err(e) = stdin.write_all(chars.as_bytes()).await {
                            warn!(session_id = %session.id, error = %e, "interactive stdin write failed");
                        }
                        let _ = stdin.flush().await;
                    }
                }
                true
            } else {
                false
            }
        };

        if wrote_interactive {
            tokio::time::sleep(Duration::from_millis(yield_ms)).await;

            let mut state = session.state.lock().await;
            let Some(interactive) = state.interactive.as_mut() else {
                return Ok(WriteStdinResult {
                    stdout: String::new(),
                    stderr: String::new(),
                    completed: None,
                });
            };
            let stdout = {
                let buf = interactive.stdout.lock().unwrap();
                let s = lossy(buf.slice_from(interactive.stdout_cursor));
                interactive.stdout_cursor = buf.position();
                s
            };
            let stderr = {
                let buf = interactive.stderr.lock().unwrap();
                let s = lossy(buf.slice_from(interactive.stderr_cursor));
                interactive.stderr_cursor = buf.position();
                s
            };
            let completed = match interactive.child.try_wait() {
                Ok(Some(status)) => Some(CompletedCommand {
                    exit_code: status.code(),
                    cwd: None,
                }),
                _ => None,
            };
            if completed.is_some() {
                state.interactive = None;
                session.touch();
            }
            return Ok(WriteStdinResult {
                stdout: self.trim(&stdout),
                stderr: self.trim(&stderr),
                completed,
            });
        }

        // Pending command (or idle shell): feed the long-lived shell.
        if !chars.is_empty() {
            session.write_shell_stdin(chars.as_bytes()).await?;
        }
        tokio::time::sleep(Duration::from_millis(yield_ms)).await;

        if let Some(outcome) = self.consume_sentinel(&session).await {
            return Ok(WriteStdinResult {
                stdout: self.trim(&outcome.stdout_delta),
                stderr: self.trim(&outcome.stderr_delta),
                completed: Some(CompletedCommand {
                    exit_code: Some(outcome.exit_code),
                    cwd: Some(outcome.cwd),
                }),
            });
        }

        let mut state = session.state.lock().await;
        let stdout = {
            let buf = session.stdout.lock().unwrap();
            let s = lossy(buf.slice_from(state.stdout_cursor));
            state.stdout_cursor = buf.position();
            s
        };
        let stderr = {
            let buf = session.stderr.lock().unwrap();
            let s = lossy(buf.slice_from(state.stderr_cursor));
            state.stderr_cursor = buf.position();
            s
        };
        Ok(WriteStdinResult {
            stdout: self.trim(&stdout),
            stderr: self.trim(&stderr),
            completed: None,
        })
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Try to complete the pending command: locate the sentinel in the stdout
    /// window, slice the command's output, excise the sentinel line from the
    /// retention window, update the session cwd, and clear the pending state.
    async fn consume_sentinel(&self, session: &Arc<ShellSession>) -> Option<SentinelOutcome> {
        let mut state = session.state.lock().await;
        let pending = state.pending.as_ref()?;
        let token = pending.token.clone();
        let started_at = pending.started_at;
        let stdout_start = pending.stdout_start;
        let stderr_start = pending.stderr_start;
        let stdout_cursor = state.stdout_cursor;
        let stderr_cursor = state.stderr_cursor;

        let outcome = {
            let mut buf = session.stdout.lock().unwrap();
            let base = stdout_start.max(buf.dropped());
            let hit = find_sentinel(buf.slice_from(stdout_start), &token)?;
            let marker_abs = base + hit.rel_start as u64;
            let line_end_abs = base + hit.rel_end as u64;

            let stdout_full = lossy(buf.slice_range(stdout_start, marker_abs));
            let stdout_delta = lossy(buf.slice_range(stdout_cursor, marker_abs));
            buf.excise(marker_abs, line_end_abs);

            SentinelOutcome {
                exit_code: hit.exit_code,
                cwd: hit.cwd,
                stdout_full,
                stdout_delta,
                stderr_full: String::new(),
                stderr_delta: String::new(),
            }
        };

        let mut outcome = outcome;
        {
            let buf = session.stderr.lock().unwrap();
            outcome.stderr_full = lossy(buf.slice_from(stderr_start));
            outcome.stderr_delta = lossy(buf.slice_from(stderr_cursor));
        }

        state.pending = None;
        state.stdout_cursor = session.stdout.lock().unwrap().position();
        state.stderr_cursor = session.stderr.lock().unwrap().position();
        drop(state);

        session.set_cwd(&outcome.cwd);
        session.touch();
        debug!(
            session_id = %session.id,
            exit_code = outcome.exit_code,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "command completed"
        );
        Some(outcome)
    }

    /// Handle `cd` locally so the working directory changes without a shell
    /// round-trip.
    fn cd_intercept(&self, session: &Arc<ShellSession>, command: &str) -> Option<CommandResult> {
        static CD_RE: OnceLock<Regex> = OnceLock::new();
        let re = CD_RE.get_or_init(|| Regex::new(r"^\s*cd(?:\s+(.+))?\s*$").unwrap());
        let caps = re.captures(command)?;
        let arg = caps.get(1).map(|m| m.as_str().trim().to_string());

        // Compound commands and expansions go to the real shell.
        if let Some(ref a) = arg {
            if a.contains("&&") || a.contains("||") || a.contains(';') || a.contains('|')
                || a.contains('$') || a.contains('`') || a.contains('>') || a.contains('<')
            {
                return None;
            }
        }

        let home = || {
            std::env::var("HOME")
                .or_else(|_| std::env::var("USERPROFILE"))
                .unwrap_or_else(|_| session.cwd())
        };

        let target: PathBuf = match arg.as_deref() {
            None | Some("~") => PathBuf::from(home()),
            Some(rest) if rest.starts_with("~/") => Path::new(&home()).join(&rest[2..]),
            Some(path) if Path::new(path).is_absolute() => PathBuf::from(path),
            Some(path) => Path::new(&session.cwd()).join(path),
        };

        let result = if target.is_dir() {
            let resolved = target
                .canonicalize()
                .unwrap_or(target)
                .to_string_lossy()
                .into_owned();
            session.set_cwd(&resolved);
            CommandResult {
                session_id: session.id.0.clone(),
                exit_code: Some(0),
                stdout: resolved.clone(),
                stderr: String::new(),
                cwd: resolved,
                timed_out: false,
            }
        } else {
            CommandResult {
                session_id: session.id.0.clone(),
                exit_code: Some(1),
                stdout: String::new(),
                stderr: format!(
                    "cd: no such directory: {}",
                    arg.as_deref().unwrap_or("~")
                ),
                cwd: session.cwd(),
                timed_out: false,
            }
        };
        Some(result)
    }

    fn busy_result(&self, session: &Arc<ShellSession>) -> CommandResult {
        CommandResult {
            session_id: session.id.0.clone(),
            exit_code: None,
            stdout: String::new(),
            stderr: "session already has a command in flight; wait for it to finish \
                     or drive it with write_stdin"
                .to_string(),
            cwd: session.cwd(),
            timed_out: false,
        }
    }

    fn trim(&self, output: &str) -> String {
        trim_tail(output, self.config.max_output_chars)
    }
}

struct SentinelOutcome {
    exit_code: i32,
    cwd: String,
    stdout_full: String,
    stderr_full: String,
    stdout_delta: String,
    stderr_delta: String,
}

struct SentinelHit {
    /// Offset of the marker start, relative to the scanned window.
    rel_start: usize,
    /// Offset one past the sentinel line's newline, relative to the window.
    rel_end: usize,
    exit_code: i32,
    cwd: String,
}

/// Locate a complete sentinel line (`__SHRIMP_DONE_<token>:<exit>:<cwd>\n`)
/// in `window`. Returns `None` until the full line, newline included, has
/// arrived.
fn find_sentinel(window: &[u8], token: &str) -> Option<SentinelHit> {
    let marker = format!("__SHRIMP_DONE_{token}:");
    let marker_bytes = marker.as_bytes();
    let pos = window
        .windows(marker_bytes.len())
        .position(|w| w == marker_bytes)?;

    let after = &window[pos + marker_bytes.len()..];
    let newline = after.iter().position(|&b| b == b'\n')?;
    let line = &after[..newline];
    let line = line.strip_suffix(b"\r").unwrap_or(line);

    let text = std::str::from_utf8(line).ok()?;
    let (exit_str, cwd) = text.split_once(':')?;
    let exit_code = exit_str.trim().parse::<i32>().ok()?;

    Some(SentinelHit {
        rel_start: pos,
        rel_end: pos + marker_bytes.len() + newline + 1,
        exit_code,
        cwd: cwd.to_string(),
    })
}

/// Build the stdin script that runs `command` and then prints the sentinel.
///
/// On Windows the errorlevel is captured into a variable on its own line
/// before the echo, so pipelines report the code of the command rather than
/// whatever the parser saw.
fn command_script(platform: Platform, command: &str, token: &str) -> String {
    if platform.is_windows() {
        format!(
            "{command}\r\n@set __SHRIMP_EC=%errorlevel%\r\n@echo __SHRIMP_DONE_{token}:%__SHRIMP_EC%:%cd%\r\n"
        )
    } else {
        format!("{command}\nprintf '__SHRIMP_DONE_{token}:%s:%s\\n' \"$?\" \"$PWD\"\n")
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_requires_complete_line() {
        let token = "abc123";
        assert!(find_sentinel(b"partial output __SHRIMP_DONE_abc123:0:/tmp", token).is_none());
        let hit = find_sentinel(b"out\n__SHRIMP_DONE_abc123:0:/tmp\n", token).unwrap();
        assert_eq!(hit.exit_code, 0);
        assert_eq!(hit.cwd, "/tmp");
        assert_eq!(hit.rel_start, 4);
    }

    #[test]
    fn sentinel_parses_negative_exit_and_colon_cwd() {
        let token = "t";
        let hit = find_sentinel(b"__SHRIMP_DONE_t:-1:/a:b/c\n", token).unwrap();
        assert_eq!(hit.exit_code, -1);
        assert_eq!(hit.cwd, "/a:b/c");
    }

    #[test]
    fn sentinel_handles_crlf() {
        let token = "w";
        let hit = find_sentinel(b"__SHRIMP_DONE_w:2:C:\\Users\r\n", token).unwrap();
        assert_eq!(hit.exit_code, 2);
        assert_eq!(hit.cwd, "C:\\Users");
    }

    #[test]
    fn posix_script_embeds_token_and_pwd() {
        let script = command_script(Platform::Linux, "echo hi", "tok");
        assert!(script.starts_with("echo hi\n"));
        assert!(script.contains("__SHRIMP_DONE_tok:%s:%s"));
        assert!(script.contains("\"$?\" \"$PWD\""));
    }

    #[test]
    fn windows_script_captures_errorlevel_first() {
        let script = command_script(Platform::Windows, "dir", "tok");
        let set_pos = script.find("@set __SHRIMP_EC=").unwrap();
        let echo_pos = script.find("@echo __SHRIMP_DONE_tok:").unwrap();
        assert!(set_pos < echo_pos);
    }
}
