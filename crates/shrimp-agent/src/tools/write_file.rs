//! Tool: write_file — write UTF-8 content, creating parent directories.

use async_trait::async_trait;

use super::{required_str, Tool, ToolResult};

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating parent directories as needed. \
         With createIfMissing=false the file must already exist."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute or relative path to write to."
                },
                "content": {
                    "type": "string",
                    "description": "Text content to write into the file."
                },
                "createIfMissing": {
                    "type": "boolean",
                    "description": "Allow creating a new file. Default true."
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let path = match required_str(&input, "path") {
            Ok(p) => p.to_string(),
            Err(e) => return e,
        };
        let content = match required_str(&input, "content") {
            Ok(c) => c.to_string(),
            Err(e) => return e,
        };
        let create_if_missing = input
            .get("createIfMissing")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);

        if !create_if_missing && !std::path::Path::new(&path).exists() {
            return ToolResult::error(format!("file not found: {path}"));
        }

        if let Some(parent) = std::path::Path::new(&path).parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    return ToolResult::error(format!(
                        "failed to create directories for '{path}': {e}"
                    ));
                }
            }
        }

        let byte_len = content.len();
        if let Err(e) = std::fs::write(&path, content) {
            return ToolResult::error(format!("failed to write '{path}': {e}"));
        }

        ToolResult::ok(serde_json::json!({
            "path": path,
            "bytesWritten": byte_len,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c.txt");

        let result = WriteFileTool
            .execute(serde_json::json!({
                "path": path.to_str().unwrap(),
                "content": "nested"
            }))
            .await;
        assert!(!result.is_error);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "nested");
    }

    #[tokio::test]
    async fn refuses_to_create_when_disallowed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.txt");

        let result = WriteFileTool
            .execute(serde_json::json!({
                "path": path.to_str().unwrap(),
                "content": "nope",
                "createIfMissing": false
            }))
            .await;
        assert!(result.is_error);
        assert!(result.value["error"].as_str().unwrap().contains("file not found"));
        assert!(!path.exists());
    }
}
