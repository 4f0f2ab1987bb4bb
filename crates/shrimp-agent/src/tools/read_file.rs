//! Tool: read_file — read a file's contents with a byte cap.

use async_trait::async_trait;

use super::{required_str, Tool, ToolResult};

/// Default byte cap when the caller does not specify one.
const DEFAULT_MAX_BYTES: u64 = 200_000;
/// Hard ceiling for the byte cap.
const MAX_MAX_BYTES: u64 = 2_000_000;

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a file from disk. Returns up to maxBytes bytes of lossy UTF-8 \
         content and flags whether the file was truncated."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute or relative path to the file."
                },
                "maxBytes": {
                    "type": "integer",
                    "description": "Byte cap (default 200000, max 2000000)."
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let path = match required_str(&input, "path") {
            Ok(p) => p.to_string(),
            Err(e) => return e,
        };
        let max_bytes = input
            .get("maxBytes")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_MAX_BYTES)
            .min(MAX_MAX_BYTES) as usize;

        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) => return ToolResult::error(format!("failed to read '{path}': {e}")),
        };

        let truncated = bytes.len() > max_bytes;
        let slice = if truncated { &bytes[..max_bytes] } else { &bytes[..] };
        let content = String::from_utf8_lossy(slice).into_owned();

        let absolute = std::fs::canonicalize(&path)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or(path);

        ToolResult::ok(serde_json::json!({
            "path": absolute,
            "content": content,
            "truncated": truncated,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_and_reports_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "hello").unwrap();

        let result = ReadFileTool
            .execute(serde_json::json!({"path": path.to_str().unwrap()}))
            .await;
        assert!(!result.is_error);
        assert_eq!(result.value["content"], "hello");
        assert_eq!(result.value["truncated"], false);
        assert!(result.value["path"].as_str().unwrap().starts_with('/'));
    }

    #[tokio::test]
    async fn caps_at_max_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.txt");
        std::fs::write(&path, "x".repeat(1_000)).unwrap();

        let result = ReadFileTool
            .execute(serde_json::json!({"path": path.to_str().unwrap(), "maxBytes": 100}))
            .await;
        assert_eq!(result.value["truncated"], true);
        assert_eq!(result.value["content"].as_str().unwrap().len(), 100);
    }

    #[tokio::test]
    async fn missing_file_is_an_error_value() {
        let result = ReadFileTool
            .execute(serde_json::json!({"path": "/no/such/file"}))
            .await;
        assert!(result.is_error);
        assert!(result.value["error"].as_str().unwrap().contains("failed to read"));
    }
}
