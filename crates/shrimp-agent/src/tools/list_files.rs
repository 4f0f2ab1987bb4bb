//! Tool: list_files — breadth-first directory listing.

use std::collections::VecDeque;
use std::path::PathBuf;

use async_trait::async_trait;

use super::{required_str, Tool, ToolResult};

const DEFAULT_MAX_ENTRIES: u64 = 500;
const MAX_MAX_ENTRIES: u64 = 5_000;

pub struct ListFilesTool;

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List directory contents. With recursive=true walks breadth-first \
         into subdirectories. Stops at maxEntries entries."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute or relative path to the directory."
                },
                "recursive": {
                    "type": "boolean",
                    "description": "Walk into subdirectories. Default false."
                },
                "maxEntries": {
                    "type": "integer",
                    "description": "Entry cap (default 500, max 5000)."
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
        let recursive = input
            .get("recursive")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let max_entries = input
            .get("maxEntries")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_MAX_ENTRIES)
            .min(MAX_MAX_ENTRIES) as usize;

        let root = PathBuf::from(&path);
        if !root.is_dir() {
            return ToolResult::error(format!("not a directory: {path}"));
        }

        let mut entries: Vec<serde_json::Value> = Vec::new();
        let mut queue: VecDeque<PathBuf> = VecDeque::new();
        queue.push_back(root);

        'walk: while let Some(dir) = queue.pop_front() {
            let read_dir = match std::fs::read_dir(&dir) {
                Ok(rd) => rd,
                Err(_) => continue,
            };
            let mut children: Vec<_> = read_dir.filter_map(|e| e.ok()).collect();
            children.sort_by_key(|e| e.file_name());

            for child in children {
                if entries.len() >= max_entries {
                    break 'walk;
                }
                let Ok(metadata) = child.metadata() else {
                    continue;
                };
                let child_path = child.path();
                let display = child_path.to_string_lossy().into_owned();
                if metadata.is_dir() {
                    entries.push(serde_json::json!({ "path": display, "type": "dir" }));
                    if recursive {
                        queue.push_back(child_path);
                    }
                } else {
                    entries.push(serde_json::json!({
                        "path": display,
                        "type": "file",
                        "size": metadata.len(),
                    }));
                }
            }
        }

        ToolResult::ok(serde_json::Value::Array(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flat_listing_includes_types_and_sizes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file.txt"), "12345").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/nested.txt"), "x").unwrap();

        let result = ListFilesTool
            .execute(serde_json::json!({"path": dir.path().to_str().unwrap()}))
            .await;
        let entries = result.value.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        let file = entries.iter().find(|e| e["type"] == "file").unwrap();
        assert_eq!(file["size"], 5);
    }

    #[tokio::test]
    async fn recursive_walk_is_breadth_first_and_capped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/deep")).unwrap();
        std::fs::write(dir.path().join("top.txt"), "t").unwrap();
        std::fs::write(dir.path().join("a/mid.txt"), "m").unwrap();
        std::fs::write(dir.path().join("a/deep/leaf.txt"), "l").unwrap();

        let result = ListFilesTool
            .execute(serde_json::json!({
                "path": dir.path().to_str().unwrap(),
                "recursive": true
            }))
            .await;
        let entries = result.value.as_array().unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e["path"].as_str().unwrap()).collect();
        // Top level first, then each deeper level.
        assert!(paths[0].ends_with("/a") || paths[0].ends_with("top.txt"));
        assert!(paths.last().unwrap().ends_with("leaf.txt"));
        assert_eq!(entries.len(), 5);

        let capped = ListFilesTool
            .execute(serde_json::json!({
                "path": dir.path().to_str().unwrap(),
                "recursive": true,
                "maxEntries": 3
            }))
            .await;
        assert_eq!(capped.value.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn non_directory_is_an_error() {
        let result = ListFilesTool
            .execute(serde_json::json!({"path": "/no/such/dir"}))
            .await;
        assert!(result.is_error);
    }
}
