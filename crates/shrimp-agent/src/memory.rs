//! Persistent system-prompt memory.
//!
//! A small JSON file (`{"items": [...]}`) of durable facts the assistant has
//! chosen to remember. Items are whitespace-normalized, truncated to 400
//! characters, de-duplicated, and capped at 120 entries (oldest dropped).
//! The file is read-modify-written under a process-wide lock.

use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use shrimp_core::config::MAX_MEMORY_ITEMS;

/// Maximum characters kept per memory item.
const MAX_ITEM_CHARS: usize = 400;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MemoryError>;

#[derive(Debug, Default, Serialize, Deserialize)]
struct MemoryFile {
    #[serde(default)]
    items: Vec<String>,
}

/// Outcome of an update: the resulting items plus whether anything changed.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryUpdate {
    pub items: Vec<String>,
    pub added: bool,
}

pub struct PromptMemory {
    path: PathBuf,
    lock: Mutex<()>,
}

impl PromptMemory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Current items, oldest first. A missing or unreadable file is empty.
    pub fn list(&self) -> Vec<String> {
        let _guard = self.lock.lock().unwrap();
        self.read_items()
    }

    /// Append a normalized item if not already present.
    pub fn update(&self, memory: &str) -> Result<MemoryUpdate> {
        let _guard = self.lock.lock().unwrap();
        let item = normalize_item(memory);
        let mut items = self.read_items();

        if item.is_empty() || items.iter().any(|existing| existing == &item) {
            return Ok(MemoryUpdate {
                items,
                added: false,
            });
        }

        items.push(item);
        while items.len() > MAX_MEMORY_ITEMS {
            items.remove(0);
        }
        self.write_items(&items)?;
        debug!(count = items.len(), "prompt memory updated");
        Ok(MemoryUpdate { items, added: true })
    }

    pub fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().unwrap();
        self.write_items(&[])?;
        Ok(())
    }

    fn read_items(&self) -> Vec<String> {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|raw| serde_json::from_str::<MemoryFile>(&raw).ok())
            .map(|file| file.items)
            .unwrap_or_default()
    }

    /// Write atomically: temp file + rename so a crash mid-write never
    /// corrupts the memory file.
    fn write_items(&self, items: &[String]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&MemoryFile {
            items: items.to_vec(),
        })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Collapse whitespace and cap the item length on a char boundary.
fn normalize_item(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_ITEM_CHARS {
        collapsed
    } else {
        collapsed.chars().take(MAX_ITEM_CHARS).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_in(dir: &tempfile::TempDir) -> PromptMemory {
        PromptMemory::new(dir.path().join("system-prompt-memory.json"))
    }

    #[test]
    fn update_then_list_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let memory = memory_in(&dir);
        let update = memory.update("user prefers  tabs\nover spaces").unwrap();
        assert!(update.added);
        assert_eq!(memory.list(), vec!["user prefers tabs over spaces"]);
    }

    #[test]
    fn duplicates_are_dropped_after_normalization() {
        let dir = tempfile::tempdir().unwrap();
        let memory = memory_in(&dir);
        memory.update("likes shrimp").unwrap();
        let second = memory.update("  likes\tshrimp  ").unwrap();
        assert!(!second.added);
        assert_eq!(memory.list().len(), 1);
    }

    #[test]
    fn long_items_are_truncated_to_400_chars() {
        let dir = tempfile::tempdir().unwrap();
        let memory = memory_in(&dir);
        memory.update(&"x".repeat(1_000)).unwrap();
        assert_eq!(memory.list()[0].chars().count(), 400);
    }

    #[test]
    fn count_never_exceeds_cap_and_drops_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let memory = memory_in(&dir);
        for i in 0..130 {
            memory.update(&format!("fact {i}")).unwrap();
        }
        let items = memory.list();
        assert_eq!(items.len(), MAX_MEMORY_ITEMS);
        assert_eq!(items[0], "fact 10");
        assert_eq!(items.last().unwrap(), "fact 129");
    }

    #[test]
    fn clear_empties_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let memory = memory_in(&dir);
        memory.update("something").unwrap();
        memory.clear().unwrap();
        assert!(memory.list().is_empty());
    }
}
