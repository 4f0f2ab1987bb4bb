use rusqlite::Connection;

use crate::error::Result;

/// Initialise all tables and indexes.
///
/// Safe to call on every startup — uses `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS conversations (
            id          TEXT PRIMARY KEY,
            title       TEXT NOT NULL,
            model       TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            id                  TEXT PRIMARY KEY,
            conversation_id     TEXT NOT NULL
                                REFERENCES conversations(id) ON DELETE CASCADE,
            role                TEXT NOT NULL,
            content             TEXT NOT NULL,
            reply_to_message_id TEXT,
            bubble_group_id     TEXT,
            attachments         TEXT,
            created_at          TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at);

        CREATE TABLE IF NOT EXISTS tool_calls (
            id              TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL
                            REFERENCES conversations(id) ON DELETE CASCADE,
            tool_name       TEXT NOT NULL,
            arguments       TEXT NOT NULL,
            status          TEXT NOT NULL,
            result          TEXT,
            created_at      TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tool_calls_conversation
            ON tool_calls(conversation_id, created_at);

        CREATE TABLE IF NOT EXISTS channel_links (
            channel          TEXT NOT NULL,
            external_chat_id TEXT NOT NULL,
            conversation_id  TEXT NOT NULL
                             REFERENCES conversations(id) ON DELETE CASCADE,
            created_at       TEXT NOT NULL,
            UNIQUE(channel, external_chat_id)
        );

        CREATE TABLE IF NOT EXISTS trigger_runs (
            id              TEXT PRIMARY KEY,
            trigger         TEXT NOT NULL,
            instruction     TEXT NOT NULL,
            model           TEXT,
            payload         TEXT,
            status          TEXT NOT NULL,
            output          TEXT,
            final_result    TEXT,
            error           TEXT,
            conversation_id TEXT,
            created_at      TEXT NOT NULL,
            finished_at     TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_trigger_runs_created
            ON trigger_runs(created_at DESC);",
    )?;
    Ok(())
}
