//! Schema creation and migration — spec.md §4.1.
//!
//! Migrations run at open: the current `user_version` pragma is compared
//! against [`SCHEMA_VERSION`]; if it is lower, each affected table is
//! rebuilt via `RENAME → CREATE → INSERT … SELECT → DROP`, then FTS5 is
//! rebuilt with `INSERT INTO events_fts(events_fts) VALUES ('rebuild')`.
//! Re-running a migration against an up-to-date schema is a no-op.

use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")?;

    let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if current >= SCHEMA_VERSION {
        return Ok(());
    }

    create_base_schema(conn)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    info!(from = current, to = SCHEMA_VERSION, "store schema migrated");
    Ok(())
}

fn create_base_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ts TEXT NOT NULL,
            source TEXT NOT NULL,
            event_type TEXT NOT NULL,
            title TEXT NOT NULL,
            body TEXT NOT NULL DEFAULT '',
            metadata TEXT NOT NULL DEFAULT '{}',
            priority TEXT,
            processed INTEGER NOT NULL DEFAULT 0,
            UNIQUE(source, event_type, title, ts)
        );
        CREATE INDEX IF NOT EXISTS idx_events_ts ON events(ts);
        CREATE INDEX IF NOT EXISTS idx_events_source ON events(source);

        CREATE VIRTUAL TABLE IF NOT EXISTS events_fts USING fts5(
            title, body, metadata, content='events', content_rowid='id'
        );

        CREATE TRIGGER IF NOT EXISTS events_ai AFTER INSERT ON events BEGIN
            INSERT INTO events_fts(rowid, title, body, metadata)
            VALUES (new.id, new.title, new.body, new.metadata);
        END;
        CREATE TRIGGER IF NOT EXISTS events_ad AFTER DELETE ON events BEGIN
            INSERT INTO events_fts(events_fts, rowid, title, body, metadata)
            VALUES ('delete', old.id, old.title, old.body, old.metadata);
        END;
        CREATE TRIGGER IF NOT EXISTS events_au AFTER UPDATE ON events BEGIN
            INSERT INTO events_fts(events_fts, rowid, title, body, metadata)
            VALUES ('delete', old.id, old.title, old.body, old.metadata);
            INSERT INTO events_fts(rowid, title, body, metadata)
            VALUES (new.id, new.title, new.body, new.metadata);
        END;

        CREATE TABLE IF NOT EXISTS contacts (
            email TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            relationship TEXT NOT NULL DEFAULT 'unknown',
            organization TEXT,
            last_interaction TEXT,
            interaction_count INTEGER NOT NULL DEFAULT 0,
            avg_response_time_hours REAL NOT NULL DEFAULT 0.0,
            notes TEXT
        );

        CREATE TABLE IF NOT EXISTS proposals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at TEXT NOT NULL,
            proposal_type TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            action_data TEXT NOT NULL DEFAULT '{}',
            status TEXT NOT NULL DEFAULT 'pending',
            priority INTEGER NOT NULL DEFAULT 0,
            expires_at TEXT,
            result TEXT,
            snoozed_until TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_proposals_status ON proposals(status, priority, created_at);

        CREATE TABLE IF NOT EXISTS observations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ts TEXT NOT NULL,
            pattern_type TEXT NOT NULL,
            description TEXT NOT NULL,
            frequency INTEGER NOT NULL DEFAULT 1,
            last_seen TEXT NOT NULL,
            confidence REAL NOT NULL DEFAULT 0.5,
            promoted_to_automation INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_observations_type_ts ON observations(pattern_type, ts);

        CREATE TABLE IF NOT EXISTS preferences (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            confidence REAL NOT NULL DEFAULT 1.0,
            learned_from TEXT NOT NULL DEFAULT '',
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS briefings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            briefing_type TEXT NOT NULL,
            content TEXT NOT NULL,
            events_processed INTEGER NOT NULL DEFAULT 0,
            actions_proposed INTEGER NOT NULL DEFAULT 0,
            generated_at TEXT NOT NULL,
            UNIQUE(briefing_type, date)
        );

        CREATE TABLE IF NOT EXISTS memory_documents (
            id TEXT PRIMARY KEY,
            text TEXT NOT NULL,
            source TEXT NOT NULL,
            source_type TEXT NOT NULL,
            ts TEXT NOT NULL,
            contacts TEXT NOT NULL DEFAULT '[]',
            metadata TEXT NOT NULL DEFAULT '{}'
        );
        CREATE VIRTUAL TABLE IF NOT EXISTS memory_fts USING fts5(
            text, content='memory_documents', content_rowid='rowid'
        );
        CREATE TRIGGER IF NOT EXISTS memory_ai AFTER INSERT ON memory_documents BEGIN
            INSERT INTO memory_fts(rowid, text) VALUES (new.rowid, new.text);
        END;
        CREATE TRIGGER IF NOT EXISTS memory_ad AFTER DELETE ON memory_documents BEGIN
            INSERT INTO memory_fts(memory_fts, rowid, text) VALUES ('delete', old.rowid, old.text);
        END;
        CREATE TRIGGER IF NOT EXISTS memory_au AFTER UPDATE ON memory_documents BEGIN
            INSERT INTO memory_fts(memory_fts, rowid, text) VALUES ('delete', old.rowid, old.text);
            INSERT INTO memory_fts(rowid, text) VALUES (new.rowid, new.text);
        END;

        CREATE TABLE IF NOT EXISTS agent_sessions (
            id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            task_type TEXT NOT NULL DEFAULT '',
            state_json TEXT NOT NULL DEFAULT '{}',
            profile_json TEXT NOT NULL DEFAULT '{}',
            plan_json TEXT NOT NULL DEFAULT '{}',
            graph_json TEXT NOT NULL DEFAULT '{}',
            status TEXT NOT NULL DEFAULT 'active'
        );

        CREATE TABLE IF NOT EXISTS installed_skills (
            name TEXT PRIMARY KEY,
            version TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            author TEXT NOT NULL DEFAULT '',
            category TEXT NOT NULL DEFAULT '',
            permissions TEXT NOT NULL DEFAULT '[]',
            enabled INTEGER NOT NULL DEFAULT 1,
            installed_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            settings TEXT NOT NULL DEFAULT '{}',
            data TEXT NOT NULL DEFAULT '{}'
        );

        CREATE TABLE IF NOT EXISTS chat_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            ts TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}'
        );
        CREATE INDEX IF NOT EXISTS idx_chat_messages_session ON chat_messages(session_id, ts);

        CREATE TABLE IF NOT EXISTS llm_calls (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ts TEXT NOT NULL,
            provider TEXT NOT NULL,
            model TEXT NOT NULL,
            prompt_hash TEXT NOT NULL,
            prompt_preview TEXT NOT NULL DEFAULT '',
            prompt_size INTEGER NOT NULL DEFAULT 0,
            response_size INTEGER NOT NULL DEFAULT 0,
            input_tokens INTEGER NOT NULL DEFAULT 0,
            output_tokens INTEGER NOT NULL DEFAULT 0,
            cache_read_tokens INTEGER NOT NULL DEFAULT 0,
            cache_creation_tokens INTEGER NOT NULL DEFAULT 0,
            cost_estimate REAL NOT NULL DEFAULT 0.0,
            source TEXT NOT NULL DEFAULT '',
            duration_ms INTEGER NOT NULL DEFAULT 0,
            success INTEGER NOT NULL DEFAULT 1,
            error_message TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_llm_calls_ts ON llm_calls(ts);
        "#,
    )?;
    Ok(())
}
