//! Shared data types for shrimp-shell.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier for a shell session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Inputs for a command run against a session.
#[derive(Debug, Clone, Default)]
pub struct CommandRequest {
    /// Target session. `None` creates a fresh session for this command.
    pub session_id: Option<String>,
    pub command: String,
    /// Working directory — used when a fresh session is created, and for the
    /// child of an interactive command.
    pub cwd: Option<String>,
    pub timeout_ms: Option<u64>,
    pub interactive: bool,
}

/// Result of a command run.
///
/// A timed-out command has `exit_code: None` and `timed_out: true`; the
/// session keeps the command in flight so `write_stdin` can drain it later.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub session_id: String,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub cwd: String,
    pub timed_out: bool,
}

/// Terminal block returned by `write_stdin` once the in-flight command ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedCommand {
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
}

/// Output produced since the previous `write_stdin` call, plus completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteStdinResult {
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<CompletedCommand>,
}

/// Snapshot of a live session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: SessionId,
    pub shell: String,
    pub os: String,
    pub cwd: String,
    /// Unix timestamp (milliseconds) of creation.
    pub created_at: u64,
    /// Unix timestamp (milliseconds) of last use.
    pub last_used_at: u64,
    pub alive: bool,
    /// Whether a command (pending or interactive) is in flight.
    pub busy: bool,
}
