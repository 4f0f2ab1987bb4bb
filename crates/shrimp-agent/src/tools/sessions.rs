//! Shell session lifecycle tools: create, close, and stdin injection.

use std::sync::Arc;

use async_trait::async_trait;

use shrimp_core::config::MAX_COMMAND_TIMEOUT_MS;
use shrimp_shell::ShellManager;

use super::{required_str, Tool, ToolResult};

pub struct CreateShellSessionTool {
    shell: Arc<ShellManager>,
}

impl CreateShellSessionTool {
    pub fn new(shell: Arc<ShellManager>) -> Self {
        Self { shell }
    }
}

#[async_trait]
impl Tool for CreateShellSessionTool {
    fn name(&self) -> &str {
        "create_shell_session"
    }

    fn description(&self) -> &str {
        "Start a persistent shell session and return its id. Use the id with \
         run_command so working directory and environment persist across calls."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "cwd": {
                    "type": "string",
                    "description": "Starting working directory. Defaults to the server's cwd."
                }
            }
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let cwd = input.get("cwd").and_then(|v| v.as_str());
        match self.shell.create_session(cwd) {
            Ok(session) => ToolResult::ok(serde_json::json!({
                "sessionId": session.id.0,
                "shell": session.shell,
                "os": session.platform.as_str(),
                "cwd": session.cwd(),
            })),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

pub struct CloseShellSessionTool {
    shell: Arc<ShellManager>,
}

impl CloseShellSessionTool {
    pub fn new(shell: Arc<ShellManager>) -> Self {
        Self { shell }
    }
}

#[async_trait]
impl Tool for CloseShellSessionTool {
    fn name(&self) -> &str {
        "close_shell_session"
    }

    fn description(&self) -> &str {
        "Kill a shell session and release its resources."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "sessionId": { "type": "string", "description": "Session to close." }
            },
            "required": ["sessionId"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let session_id = match required_str(&input, "sessionId") {
            Ok(id) => id,
            Err(e) => return e,
        };
        match self.shell.close_session(session_id) {
            Ok(()) => ToolResult::ok(serde_json::json!({ "closed": true })),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

pub struct WriteStdinTool {
    shell: Arc<ShellManager>,
}

impl WriteStdinTool {
    pub fn new(shell: Arc<ShellManager>) -> Self {
        Self { shell }
    }
}

#[async_trait]
impl Tool for WriteStdinTool {
    fn name(&self) -> &str {
        "write_stdin"
    }

    fn description(&self) -> &str {
        "Feed characters to the command in flight on a session (interactive \
         child or a timed-out command), wait yieldMs, and return the output \
         produced since the previous call. Includes a `completed` block once \
         the command finishes."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "sessionId": { "type": "string", "description": "Target session." },
                "chars": {
                    "type": "string",
                    "description": "Characters to write. Include a trailing \\n to submit a line. Defaults to empty (just read)."
                },
                "yieldMs": {
                    "type": "integer",
                    "description": "How long to wait before reading output (default 100, max 300000)."
                }
            },
            "required": ["sessionId"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let session_id = match required_str(&input, "sessionId") {
            Ok(id) => id.to_string(),
            Err(e) => return e,
        };
        let chars = input
            .get("chars")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let yield_ms = input
            .get("yieldMs")
            .and_then(|v| v.as_u64())
            .unwrap_or(100)
            .min(MAX_COMMAND_TIMEOUT_MS);

        match self.shell.write_stdin(&session_id, chars, yield_ms).await {
            Ok(result) => match serde_json::to_value(&result) {
                Ok(value) => ToolResult::ok(value),
                Err(e) => ToolResult::error(format!("result serialization failed: {e}")),
            },
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shrimp_shell::ShellManagerConfig;

    #[tokio::test]
    async fn close_unknown_session_is_an_error() {
        let shell = Arc::new(ShellManager::new(ShellManagerConfig::default()));
        let result = CloseShellSessionTool::new(shell)
            .execute(serde_json::json!({"sessionId": "missing"}))
            .await;
        assert!(result.is_error);
        assert!(result.value["error"]
            .as_str()
            .unwrap()
            .contains("Unknown session"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn create_then_close_round_trips() {
        let shell = Arc::new(ShellManager::new(ShellManagerConfig::default()));
        let created = CreateShellSessionTool::new(Arc::clone(&shell))
            .execute(serde_json::json!({}))
            .await;
        assert!(!created.is_error);
        let id = created.value["sessionId"].as_str().unwrap().to_string();
        assert_eq!(created.value["os"], std::env::consts::OS.replace("macos", "darwin"));

        let closed = CloseShellSessionTool::new(shell)
            .execute(serde_json::json!({"sessionId": id}))
            .await;
        assert_eq!(closed.value["closed"], true);
    }
}
