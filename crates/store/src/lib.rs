//! Durable state store — spec.md §4.1.
//!
//! Backed by an embedded relational engine (SQLite) with FTS5 full-text
//! search and write-ahead logging. Each public operation runs in its own
//! transaction, implemented per-concern across submodules the way
//! `aigent_memory::manager` splits its operations across files.

pub mod briefings;
pub mod chat;
pub mod contacts;
pub mod error;
pub mod events;
pub mod llm_calls;
pub mod maintenance;
pub mod memory_documents;
pub mod migrations;
pub mod observations;
pub mod preferences;
pub mod schema;
pub mod sessions;
pub mod skills;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;

pub use error::{Result, StoreError};

/// Single connection per call (spec.md §5): no connection pool. Writes
/// serialize naturally at the engine level under WAL; reads do not block
/// writes.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        migrations::run(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}
