//! Typed CRUD over the embedded store.
//!
//! `Store` wraps a single SQLite connection behind a mutex; the connection
//! serializes writes internally, so callers treat every operation as an
//! atomic point.

use std::str::FromStr;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;
use uuid::Uuid;

use crate::db::init_db;
use crate::error::{Result, StoreError};
use crate::types::*;

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Wrap an already-open connection. Runs the idempotent schema init.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open the database file, apply pragmas, and init the schema.
    pub fn open(path: &str) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::new(conn)
    }

    /// Cheap connectivity probe for the diagnostics endpoint.
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Conversations
    // -----------------------------------------------------------------------

    pub fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, title, model, created_at, updated_at
             FROM conversations ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map([], map_conversation)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn get_conversation(&self, id: &str) -> Result<Conversation> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, title, model, created_at, updated_at
             FROM conversations WHERE id = ?1",
            [id],
            map_conversation,
        )
        .optional()?
        .ok_or_else(|| StoreError::not_found("conversation", id))
    }

    pub fn create_conversation(&self, model: &str, title: Option<&str>) -> Result<Conversation> {
        let conn = self.conn.lock().unwrap();
        let id = Uuid::new_v4().to_string();
        let now = now();
        let title = title.unwrap_or(DEFAULT_TITLE);
        conn.execute(
            "INSERT INTO conversations (id, title, model, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![id, title, model, now],
        )?;
        debug!(conversation_id = %id, %model, "conversation created");
        Ok(Conversation {
            id,
            title: title.to_string(),
            model: model.to_string(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Resolve the conversation for a turn: reuse `id` when it names an
    /// existing conversation (bumping model and updated_at), otherwise create
    /// a fresh one with the default title.
    pub fn upsert_conversation(&self, id: Option<&str>, model: &str) -> Result<Conversation> {
        if let Some(id) = id {
            let existing = {
                let conn = self.conn.lock().unwrap();
                let now = now();
                let n = conn.execute(
                    "UPDATE conversations SET model = ?1, updated_at = ?2 WHERE id = ?3",
                    params![model, now, id],
                )?;
                n > 0
            };
            if existing {
                return self.get_conversation(id);
            }
        }
        self.create_conversation(model, None)
    }

    pub fn rename_conversation(&self, id: &str, title: &str) -> Result<Conversation> {
        {
            let conn = self.conn.lock().unwrap();
            let n = conn.execute(
                "UPDATE conversations SET title = ?1, updated_at = ?2 WHERE id = ?3",
                params![title, now(), id],
            )?;
            if n == 0 {
                return Err(StoreError::not_found("conversation", id));
            }
        }
        self.get_conversation(id)
    }

    /// Rename only while the title is still the default — used to derive a
    /// title from the first user message without clobbering user renames.
    pub fn set_conversation_title_if_default(&self, id: &str, title: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE conversations SET title = ?1, updated_at = ?2
             WHERE id = ?3 AND title = ?4",
            params![title, now(), id, DEFAULT_TITLE],
        )?;
        Ok(())
    }

    /// Delete a conversation and everything hanging off it, atomically.
    pub fn delete_conversation(&self, id: &str) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM messages WHERE conversation_id = ?1", [id])?;
        tx.execute("DELETE FROM tool_calls WHERE conversation_id = ?1", [id])?;
        tx.execute("DELETE FROM channel_links WHERE conversation_id = ?1", [id])?;
        let n = tx.execute("DELETE FROM conversations WHERE id = ?1", [id])?;
        tx.commit()?;
        if n == 0 {
            return Err(StoreError::not_found("conversation", id));
        }
        debug!(conversation_id = %id, "conversation deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Messages
    // -----------------------------------------------------------------------

    pub fn add_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
        opts: AddMessageOpts,
    ) -> Result<Message> {
        let conn = self.conn.lock().unwrap();
        let id = Uuid::new_v4().to_string();
        let now = now();
        let attachments_json = if opts.attachments.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&opts.attachments)?)
        };
        conn.execute(
            "INSERT INTO messages
             (id, conversation_id, role, content, reply_to_message_id,
              bubble_group_id, attachments, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                conversation_id,
                role.as_str(),
                content,
                opts.reply_to_message_id,
                opts.bubble_group_id,
                attachments_json,
                now
            ],
        )?;
        conn.execute(
            "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
            params![now, conversation_id],
        )?;
        Ok(Message {
            id,
            conversation_id: conversation_id.to_string(),
            role,
            content: content.to_string(),
            reply_to_message_id: opts.reply_to_message_id,
            bubble_group_id: opts.bubble_group_id,
            attachments: opts.attachments,
            created_at: now,
        })
    }

    /// Messages in append order (creation timestamp, rowid tiebreak).
    pub fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, role, content, reply_to_message_id,
                    bubble_group_id, attachments, created_at
             FROM messages WHERE conversation_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map([conversation_id], map_message)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn update_message_content(&self, id: &str, content: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "UPDATE messages SET content = ?1 WHERE id = ?2",
            params![content, id],
        )?;
        if n == 0 {
            return Err(StoreError::not_found("message", id));
        }
        Ok(())
    }

    pub fn delete_message(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute("DELETE FROM messages WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(StoreError::not_found("message", id));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Tool calls
    // -----------------------------------------------------------------------

    pub fn add_tool_call(
        &self,
        conversation_id: &str,
        tool_name: &str,
        arguments: &str,
    ) -> Result<ToolCallRecord> {
        let conn = self.conn.lock().unwrap();
        let id = Uuid::new_v4().to_string();
        let now = now();
        conn.execute(
            "INSERT INTO tool_calls
             (id, conversation_id, tool_name, arguments, status, created_at)
             VALUES (?1, ?2, ?3, ?4, 'running', ?5)",
            params![id, conversation_id, tool_name, arguments, now],
        )?;
        Ok(ToolCallRecord {
            id,
            conversation_id: conversation_id.to_string(),
            tool_name: tool_name.to_string(),
            arguments: arguments.to_string(),
            status: ToolCallStatus::Running,
            result: None,
            created_at: now,
        })
    }

    /// Move a tool call to its terminal status. A record transitions at most
    /// once; completing an already-terminal record is a no-op that returns the
    /// stored row.
    pub fn complete_tool_call(&self, id: &str, ok: bool, output: &str) -> Result<ToolCallRecord> {
        let status = if ok {
            ToolCallStatus::Success
        } else {
            ToolCallStatus::Error
        };
        {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "UPDATE tool_calls SET status = ?1, result = ?2
                 WHERE id = ?3 AND status = 'running'",
                params![status.as_str(), output, id],
            )?;
        }
        self.get_tool_call(id)
    }

    pub fn list_tool_calls(&self, conversation_id: &str) -> Result<Vec<ToolCallRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, tool_name, arguments, status, result, created_at
             FROM tool_calls WHERE conversation_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map([conversation_id], map_tool_call)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    fn get_tool_call(&self, id: &str) -> Result<ToolCallRecord> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, conversation_id, tool_name, arguments, status, result, created_at
             FROM tool_calls WHERE id = ?1",
            [id],
            map_tool_call,
        )
        .optional()?
        .ok_or_else(|| StoreError::not_found("tool call", id))
    }

    // -----------------------------------------------------------------------
    // Channel links
    // -----------------------------------------------------------------------

    /// Resolve the conversation bound to an external chat, creating the
    /// conversation and the link on first contact.
    pub fn get_or_create_channel_conversation(
        &self,
        channel: Channel,
        external_chat_id: &str,
        model: &str,
    ) -> Result<Conversation> {
        let linked: Option<String> = {
            let conn = self.conn.lock().unwrap();
            conn.query_row(
                "SELECT conversation_id FROM channel_links
                 WHERE channel = ?1 AND external_chat_id = ?2",
                params![channel.as_str(), external_chat_id],
                |row| row.get(0),
            )
            .optional()?
        };

        if let Some(conversation_id) = linked {
            return self.get_conversation(&conversation_id);
        }

        let conversation = self.create_conversation(model, None)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO channel_links
             (channel, external_chat_id, conversation_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                channel.as_str(),
                external_chat_id,
                conversation.id,
                now()
            ],
        )?;
        debug!(
            channel = channel.as_str(),
            external_chat_id, conversation_id = %conversation.id,
            "channel link created"
        );
        Ok(conversation)
    }

    // -----------------------------------------------------------------------
    // Trigger runs
    // -----------------------------------------------------------------------

    pub fn create_trigger_run(
        &self,
        trigger: TriggerKind,
        instruction: &str,
        model: Option<&str>,
        payload: Option<&str>,
    ) -> Result<TriggerRun> {
        let conn = self.conn.lock().unwrap();
        let id = Uuid::new_v4().to_string();
        let now = now();
        conn.execute(
            "INSERT INTO trigger_runs
             (id, trigger, instruction, model, payload, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'running', ?6)",
            params![id, trigger.as_str(), instruction, model, payload, now],
        )?;
        Ok(TriggerRun {
            id,
            trigger,
            instruction: instruction.to_string(),
            model: model.map(str::to_string),
            payload: payload.map(str::to_string),
            status: RunStatus::Running,
            output: None,
            final_result: None,
            error: None,
            conversation_id: None,
            created_at: now,
            finished_at: None,
        })
    }

    pub fn complete_trigger_run(
        &self,
        id: &str,
        ok: bool,
        output: Option<&str>,
        final_result: Option<&str>,
        error: Option<&str>,
    ) -> Result<TriggerRun> {
        let status = if ok { RunStatus::Success } else { RunStatus::Error };
        {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "UPDATE trigger_runs
                 SET status = ?1, output = ?2, final_result = ?3, error = ?4,
                     finished_at = ?5
                 WHERE id = ?6 AND status = 'running'",
                params![status.as_str(), output, final_result, error, now(), id],
            )?;
        }
        self.get_trigger_run(id)
    }

    pub fn set_trigger_run_conversation_id(&self, id: &str, conversation_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "UPDATE trigger_runs SET conversation_id = ?1 WHERE id = ?2",
            params![conversation_id, id],
        )?;
        if n == 0 {
            return Err(StoreError::not_found("trigger run", id));
        }
        Ok(())
    }

    pub fn list_trigger_runs(&self, limit: usize) -> Result<Vec<TriggerRun>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, trigger, instruction, model, payload, status, output,
                    final_result, error, conversation_id, created_at, finished_at
             FROM trigger_runs ORDER BY created_at DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit as i64], map_trigger_run)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn get_trigger_run(&self, id: &str) -> Result<TriggerRun> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, trigger, instruction, model, payload, status, output,
                    final_result, error, conversation_id, created_at, finished_at
             FROM trigger_runs WHERE id = ?1",
            [id],
            map_trigger_run,
        )
        .optional()?
        .ok_or_else(|| StoreError::not_found("trigger run", id))
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

// ---------------------------------------------------------------------------
// Row mappers
// ---------------------------------------------------------------------------

fn map_conversation(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        title: row.get(1)?,
        model: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn map_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    let role: String = row.get(2)?;
    let attachments_json: Option<String> = row.get(6)?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        role: Role::from_str(&role).unwrap_or(Role::User),
        content: row.get(3)?,
        reply_to_message_id: row.get(4)?,
        bubble_group_id: row.get(5)?,
        attachments: attachments_json
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default(),
        created_at: row.get(7)?,
    })
}

fn map_tool_call(row: &Row<'_>) -> rusqlite::Result<ToolCallRecord> {
    let status: String = row.get(4)?;
    Ok(ToolCallRecord {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        tool_name: row.get(2)?,
        arguments: row.get(3)?,
        status: ToolCallStatus::from_str(&status).unwrap_or(ToolCallStatus::Error),
        result: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn map_trigger_run(row: &Row<'_>) -> rusqlite::Result<TriggerRun> {
    let trigger: String = row.get(1)?;
    let status: String = row.get(5)?;
    Ok(TriggerRun {
        id: row.get(0)?,
        trigger: TriggerKind::from_str(&trigger).unwrap_or(TriggerKind::Api),
        instruction: row.get(2)?,
        model: row.get(3)?,
        payload: row.get(4)?,
        status: RunStatus::from_str(&status).unwrap_or(RunStatus::Error),
        output: row.get(6)?,
        final_result: row.get(7)?,
        error: row.get(8)?,
        conversation_id: row.get(9)?,
        created_at: row.get(10)?,
        finished_at: row.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_store() -> Store {
        Store::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn upsert_with_unknown_id_creates_fresh_conversation() {
        let store = memory_store();
        let conv = store
            .upsert_conversation(Some("no-such-id"), "gpt-4.1-mini")
            .unwrap();
        assert_ne!(conv.id, "no-such-id");
        assert_eq!(conv.title, DEFAULT_TITLE);
    }

    #[test]
    fn upsert_with_known_id_bumps_model() {
        let store = memory_store();
        let conv = store.create_conversation("gpt-4.1-mini", None).unwrap();
        let again = store
            .upsert_conversation(Some(&conv.id), "gpt-4o")
            .unwrap();
        assert_eq!(again.id, conv.id);
        assert_eq!(again.model, "gpt-4o");
    }

    #[test]
    fn messages_come_back_in_append_order() {
        let store = memory_store();
        let conv = store.create_conversation("gpt-4.1-mini", None).unwrap();
        for i in 0..5 {
            store
                .add_message(&conv.id, Role::User, &format!("m{i}"), AddMessageOpts::default())
                .unwrap();
        }
        let messages = store.list_messages(&conv.id).unwrap();
        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m0", "m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn title_set_only_while_default() {
        let store = memory_store();
        let conv = store.create_conversation("gpt-4.1-mini", None).unwrap();
        store
            .set_conversation_title_if_default(&conv.id, "first message")
            .unwrap();
        assert_eq!(store.get_conversation(&conv.id).unwrap().title, "first message");

        store
            .set_conversation_title_if_default(&conv.id, "second message")
            .unwrap();
        assert_eq!(store.get_conversation(&conv.id).unwrap().title, "first message");
    }

    #[test]
    fn tool_call_reaches_terminal_state_exactly_once() {
        let store = memory_store();
        let conv = store.create_conversation("gpt-4.1-mini", None).unwrap();
        let record = store.add_tool_call(&conv.id, "run_command", "{}").unwrap();
        assert_eq!(record.status, ToolCallStatus::Running);

        let done = store
            .complete_tool_call(&record.id, true, "{\"exitCode\":0}")
            .unwrap();
        assert_eq!(done.status, ToolCallStatus::Success);

        // A second completion must not overwrite the terminal state.
        let again = store
            .complete_tool_call(&record.id, false, "{\"error\":\"late\"}")
            .unwrap();
        assert_eq!(again.status, ToolCallStatus::Success);
        assert_eq!(again.result.as_deref(), Some("{\"exitCode\":0}"));
    }

    #[test]
    fn delete_conversation_cascades() {
        let store = memory_store();
        let conv = store.create_conversation("gpt-4.1-mini", None).unwrap();
        store
            .add_message(&conv.id, Role::User, "hello", AddMessageOpts::default())
            .unwrap();
        store.add_tool_call(&conv.id, "read_file", "{}").unwrap();

        store.delete_conversation(&conv.id).unwrap();
        assert!(store.get_conversation(&conv.id).is_err());
        assert!(store.list_messages(&conv.id).unwrap().is_empty());
        assert!(store.list_tool_calls(&conv.id).unwrap().is_empty());
    }

    #[test]
    fn channel_link_reused_on_second_message() {
        let store = memory_store();
        let first = store
            .get_or_create_channel_conversation(Channel::Telegram, "42", "gpt-4.1-mini")
            .unwrap();
        let second = store
            .get_or_create_channel_conversation(Channel::Telegram, "42", "gpt-4.1-mini")
            .unwrap();
        assert_eq!(first.id, second.id);

        let other = store
            .get_or_create_channel_conversation(Channel::Whatsapp, "42", "gpt-4.1-mini")
            .unwrap();
        assert_ne!(first.id, other.id);
    }

    #[test]
    fn trigger_run_lifecycle() {
        let store = memory_store();
        let run = store
            .create_trigger_run(TriggerKind::Manual, "find x", None, Some("{\"a\":1}"))
            .unwrap();
        assert_eq!(run.status, RunStatus::Running);

        let conv = store.create_conversation("gpt-4.1-mini", None).unwrap();
        store
            .set_trigger_run_conversation_id(&run.id, &conv.id)
            .unwrap();

        let done = store
            .complete_trigger_run(&run.id, true, Some("{}"), Some("/tmp/x.txt"), None)
            .unwrap();
        assert_eq!(done.status, RunStatus::Success);
        assert_eq!(done.final_result.as_deref(), Some("/tmp/x.txt"));
        assert_eq!(done.conversation_id.as_deref(), Some(conv.id.as_str()));
        assert!(done.finished_at.is_some());
    }

    #[test]
    fn attachments_round_trip_through_the_message_row() {
        let store = memory_store();
        let conv = store.create_conversation("gpt-4.1-mini", None).unwrap();
        let opts = AddMessageOpts {
            attachments: vec![Attachment {
                id: "a1".into(),
                name: "notes.txt".into(),
                mime: "text/plain".into(),
                size: 12,
                kind: AttachmentKind::Text,
                data_url: None,
                text_excerpt: Some("hello".into()),
            }],
            ..Default::default()
        };
        store
            .add_message(&conv.id, Role::User, "see attached", opts)
            .unwrap();
        let messages = store.list_messages(&conv.id).unwrap();
        assert_eq!(messages[0].attachments.len(), 1);
        assert_eq!(messages[0].attachments[0].name, "notes.txt");
    }
}
