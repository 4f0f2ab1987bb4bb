//! Tool: edit_file — replace line ranges in a file.
//!
//! Each patch replaces the 1-based inclusive line range
//! `[startLine, endLine]` with the lines of `newText`. Patches are applied
//! sorted by descending startLine so earlier line numbers stay valid while
//! later ranges are rewritten.

use async_trait::async_trait;
use serde::Deserialize;

use super::{required_str, Tool, ToolResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Patch {
    start_line: usize,
    end_line: usize,
    new_text: String,
}

pub struct EditFileTool;

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Apply line-range patches to a file. Each patch replaces the 1-based \
         inclusive range [startLine, endLine] with newText. Prefer this over \
         write_file when changing only part of a file."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute or relative path to the file to edit."
                },
                "patches": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "properties": {
                            "startLine": { "type": "integer", "minimum": 1 },
                            "endLine": { "type": "integer", "minimum": 1 },
                            "newText": { "type": "string" }
                        },
                        "required": ["startLine", "endLine", "newText"]
                    },
                    "description": "Patches to apply; line numbers refer to the original file."
                }
            },
            "required": ["path", "patches"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let path = match required_str(&input, "path") {
            Ok(p) => p.to_string(),
            Err(e) => return e,
        };
        let patches: Vec<Patch> = match input.get("patches") {
            Some(raw) => match serde_json::from_value(raw.clone()) {
                Ok(p) => p,
                Err(e) => return ToolResult::error(format!("invalid patches: {e}")),
            },
            None => return ToolResult::error("missing required parameter: patches"),
        };
        if patches.is_empty() {
            return ToolResult::error("patches must contain at least one entry");
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => return ToolResult::error(format!("failed to read '{path}': {e}")),
        };
        let had_trailing_newline = content.ends_with('\n');
        let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
        let line_count = lines.len();

        for patch in &patches {
            if patch.start_line == 0
                || patch.end_line < patch.start_line
                || patch.end_line > line_count
            {
                return ToolResult::error(format!(
                    "invalid range: lines {}..{} out of bounds for a {line_count}-line file",
                    patch.start_line, patch.end_line
                ));
            }
        }

        let mut sorted = patches;
        sorted.sort_by(|a, b| b.start_line.cmp(&a.start_line));
        let hunks_applied = sorted.len();

        for patch in sorted {
            let replacement: Vec<String> =
                patch.new_text.split('\n').map(str::to_string).collect();
            lines.splice(patch.start_line - 1..patch.end_line, replacement);
        }

        let mut updated = lines.join("\n");
        if had_trailing_newline {
            updated.push('\n');
        }

        // Write atomically: temp file + rename so a crash mid-write never
        // corrupts the original.
        let tmp_path = format!("{path}.shrimp_edit_tmp");
        if let Err(e) = std::fs::write(&tmp_path, &updated) {
            return ToolResult::error(format!("failed to write temp file '{tmp_path}': {e}"));
        }
        if let Err(e) = std::fs::rename(&tmp_path, &path) {
            let _ = std::fs::remove_file(&tmp_path);
            return ToolResult::error(format!("failed to rename temp file to '{path}': {e}"));
        }

        ToolResult::ok(serde_json::json!({
            "applied": true,
            "hunksApplied": hunks_applied,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn edit(path: &std::path::Path, patches: serde_json::Value) -> ToolResult {
        EditFileTool
            .execute(serde_json::json!({
                "path": path.to_str().unwrap(),
                "patches": patches
            }))
            .await
    }

    #[tokio::test]
    async fn replaces_a_single_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "a\nb\nc\n").unwrap();

        let result = edit(
            &path,
            serde_json::json!([{"startLine": 2, "endLine": 2, "newText": "B"}]),
        )
        .await;
        assert!(!result.is_error, "{:?}", result.value);
        assert_eq!(result.value["applied"], true);
        assert_eq!(result.value["hunksApplied"], 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nB\nc\n");
    }

    #[tokio::test]
    async fn multiple_patches_apply_against_original_line_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "one\ntwo\nthree\nfour\n").unwrap();

        let result = edit(
            &path,
            serde_json::json!([
                {"startLine": 1, "endLine": 1, "newText": "ONE"},
                {"startLine": 3, "endLine": 4, "newText": "THREE\nFOUR"}
            ]),
        )
        .await;
        assert_eq!(result.value["hunksApplied"], 2);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "ONE\ntwo\nTHREE\nFOUR\n"
        );
    }

    #[tokio::test]
    async fn multi_line_replacement_can_grow_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "a\nb\n").unwrap();

        edit(
            &path,
            serde_json::json!([{"startLine": 2, "endLine": 2, "newText": "b1\nb2\nb3"}]),
        )
        .await;
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nb1\nb2\nb3\n");
    }

    #[tokio::test]
    async fn out_of_bounds_range_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "a\nb\n").unwrap();

        let result = edit(
            &path,
            serde_json::json!([{"startLine": 2, "endLine": 5, "newText": "X"}]),
        )
        .await;
        assert!(result.is_error);
        assert!(result.value["error"].as_str().unwrap().contains("invalid range"));
        // File untouched on failure.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nb\n");
    }

    #[tokio::test]
    async fn empty_patch_list_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "a\n").unwrap();

        let result = edit(&path, serde_json::json!([])).await;
        assert!(result.is_error);
    }
}
