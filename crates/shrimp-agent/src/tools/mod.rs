//! Tool system for the assistant's tool-calling loop.
//!
//! Defines the `Tool` trait all tools implement, plus the registry that
//! advertises them to the LLM and dispatches calls by name. Tools never
//! panic or propagate errors: every failure is a structured
//! `{"error": ...}` value that the orchestrator records and feeds back to
//! the model.

pub mod edit_file;
pub mod list_files;
pub mod memory_tools;
pub mod read_file;
pub mod run_command;
pub mod sessions;
pub mod write_file;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use shrimp_shell::ShellManager;

use crate::memory::PromptMemory;
use crate::provider::ToolDefinition;

/// Result of executing a tool.
#[derive(Debug, Clone)]
pub struct ToolResult {
    /// Structured value fed back to the LLM (and persisted on the record).
    pub value: serde_json::Value,
    /// Whether the tool execution failed.
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(value: serde_json::Value) -> Self {
        Self {
            value,
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            value: serde_json::json!({ "error": message.into() }),
            is_error: true,
        }
    }
}

/// Trait that all tools must implement.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name for this tool (e.g. "run_command").
    fn name(&self) -> &str;
    /// Human-readable description of what this tool does.
    fn description(&self) -> &str;
    /// JSON Schema for the tool's input parameters.
    fn input_schema(&self) -> serde_json::Value;
    /// Execute the tool with the given input.
    async fn execute(&self, input: serde_json::Value) -> ToolResult;
}

/// The fixed tool set, dispatched by name.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new(shell: Arc<ShellManager>, memory: Arc<PromptMemory>) -> Self {
        let tools: Vec<Box<dyn Tool>> = vec![
            Box::new(run_command::RunCommandTool::new(Arc::clone(&shell))),
            Box::new(sessions::CreateShellSessionTool::new(Arc::clone(&shell))),
            Box::new(sessions::CloseShellSessionTool::new(Arc::clone(&shell))),
            Box::new(sessions::WriteStdinTool::new(shell)),
            Box::new(read_file::ReadFileTool),
            Box::new(write_file::WriteFileTool),
            Box::new(edit_file::EditFileTool),
            Box::new(list_files::ListFilesTool),
            Box::new(memory_tools::UpdateMemoryTool::new(Arc::clone(&memory))),
            Box::new(memory_tools::ListMemoryTool::new(Arc::clone(&memory))),
            Box::new(memory_tools::ClearMemoryTool::new(memory)),
        ];
        Self { tools }
    }

    /// API-level tool definitions advertised to the LLM.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.input_schema(),
            })
            .collect()
    }

    /// Dispatch a call by name. Unknown names are an error result.
    pub async fn run(&self, name: &str, args: serde_json::Value) -> ToolResult {
        match self.tools.iter().find(|t| t.name() == name) {
            Some(tool) => {
                debug!(tool = %name, "executing tool");
                tool.execute(args).await
            }
            None => ToolResult::error(format!("unknown tool: {name}")),
        }
    }
}

/// Extract a required string parameter, or fail with a uniform message.
pub(crate) fn required_str<'a>(
    input: &'a serde_json::Value,
    key: &str,
) -> Result<&'a str, ToolResult> {
    input
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolResult::error(format!("missing required parameter: {key}")))
}
