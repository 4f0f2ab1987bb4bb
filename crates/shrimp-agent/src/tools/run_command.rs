//! Tool: run_command — execute a command on a persistent shell session.

use std::sync::Arc;

use async_trait::async_trait;

use shrimp_core::config::MAX_COMMAND_TIMEOUT_MS;
use shrimp_shell::{CommandRequest, ShellManager};

use super::{required_str, Tool, ToolResult};

pub struct RunCommandTool {
    shell: Arc<ShellManager>,
}

impl RunCommandTool {
    pub fn new(shell: Arc<ShellManager>) -> Self {
        Self { shell }
    }
}

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Run a shell command. Reuses the given sessionId (environment and \
         working directory persist across calls) or starts a fresh session. \
         Set interactive=true for commands that read from stdin, then feed \
         them with write_stdin. A timed-out command stays in flight and can \
         be drained with write_stdin later."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Command or multi-line script to run."
                },
                "sessionId": {
                    "type": "string",
                    "description": "Existing session to run in. Omit to start a fresh one."
                },
                "cwd": {
                    "type": "string",
                    "description": "Working directory for a fresh session or interactive child."
                },
                "timeoutMs": {
                    "type": "integer",
                    "description": "Timeout in milliseconds (default 30000, max 300000)."
                },
                "interactive": {
                    "type": "boolean",
                    "description": "Run as a separate child whose stdin can be fed. Default false."
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let command = match required_str(&input, "command") {
            Ok(c) if !c.trim().is_empty() => c.to_string(),
            Ok(_) => return ToolResult::error("command must not be empty"),
            Err(e) => return e,
        };

        let timeout_ms = match input.get("timeoutMs") {
            None | Some(serde_json::Value::Null) => None,
            Some(v) => match v.as_u64() {
                Some(ms) if ms > 0 && ms <= MAX_COMMAND_TIMEOUT_MS => Some(ms),
                _ => {
                    return ToolResult::error(format!(
                        "timeoutMs must be a positive integer no greater than {MAX_COMMAND_TIMEOUT_MS}"
                    ))
                }
            },
        };

        let request = CommandRequest {
            session_id: input
                .get("sessionId")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            command,
            cwd: input.get("cwd").and_then(|v| v.as_str()).map(str::to_string),
            timeout_ms,
            interactive: input
                .get("interactive")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
        };

        match self.shell.run_command(request).await {
            Ok(result) => match serde_json::to_value(&result) {
                Ok(value) => ToolResult::ok(value),
                Err(e) => ToolResult::error(format!("result serialization failed: {e}")),
            },
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}
