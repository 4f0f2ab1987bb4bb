//! Persistent prompt-memory tools: update, list, clear.

use std::sync::Arc;

use async_trait::async_trait;

use crate::memory::PromptMemory;

use super::{required_str, Tool, ToolResult};

pub struct UpdateMemoryTool {
    memory: Arc<PromptMemory>,
}

impl UpdateMemoryTool {
    pub fn new(memory: Arc<PromptMemory>) -> Self {
        Self { memory }
    }
}

#[async_trait]
impl Tool for UpdateMemoryTool {
    fn name(&self) -> &str {
        "update_system_prompt_memory"
    }

    fn description(&self) -> &str {
        "Store a durable fact in the persistent memory block of the system \
         prompt. One short fact per call; duplicates are ignored."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "memory": {
                    "type": "string",
                    "description": "The fact to remember (trimmed to 400 characters)."
                }
            },
            "required": ["memory"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let memory = match required_str(&input, "memory") {
            Ok(m) => m,
            Err(e) => return e,
        };
        match self.memory.update(memory) {
            Ok(update) => ToolResult::ok(serde_json::json!({
                "added": update.added,
                "count": update.items.len(),
            })),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

pub struct ListMemoryTool {
    memory: Arc<PromptMemory>,
}

impl ListMemoryTool {
    pub fn new(memory: Arc<PromptMemory>) -> Self {
        Self { memory }
    }
}

#[async_trait]
impl Tool for ListMemoryTool {
    fn name(&self) -> &str {
        "list_system_prompt_memory"
    }

    fn description(&self) -> &str {
        "List all persistent memory items, oldest first."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _input: serde_json::Value) -> ToolResult {
        ToolResult::ok(serde_json::json!({ "items": self.memory.list() }))
    }
}

pub struct ClearMemoryTool {
    memory: Arc<PromptMemory>,
}

impl ClearMemoryTool {
    pub fn new(memory: Arc<PromptMemory>) -> Self {
        Self { memory }
    }
}

#[async_trait]
impl Tool for ClearMemoryTool {
    fn name(&self) -> &str {
        "clear_system_prompt_memory"
    }

    fn description(&self) -> &str {
        "Delete every persistent memory item."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _input: serde_json::Value) -> ToolResult {
        match self.memory.clear() {
            Ok(()) => ToolResult::ok(serde_json::json!({ "cleared": true })),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn update_list_clear_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let memory = Arc::new(PromptMemory::new(dir.path().join("memory.json")));

        let updated = UpdateMemoryTool::new(Arc::clone(&memory))
            .execute(serde_json::json!({"memory": "prefers dark mode"}))
            .await;
        assert_eq!(updated.value["added"], true);

        let listed = ListMemoryTool::new(Arc::clone(&memory))
            .execute(serde_json::json!({}))
            .await;
        assert_eq!(listed.value["items"][0], "prefers dark mode");

        let cleared = ClearMemoryTool::new(Arc::clone(&memory))
            .execute(serde_json::json!({}))
            .await;
        assert_eq!(cleared.value["cleared"], true);
        assert!(memory.list().is_empty());
    }
}
