//! Database schema management.

use rusqlite::Connection;

/// Initialize the database schema and durability settings.
pub fn init_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    // In-memory databases answer "memory" here; either way the pragma succeeds.
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
    conn.pragma_update(None, "synchronous", "FULL")?;
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

const SCHEMA: &str = r#"
-- Pending operations, in durable FIFO order
CREATE TABLE IF NOT EXISTS operations (
    sequence INTEGER PRIMARY KEY AUTOINCREMENT,
    opcode INTEGER NOT NULL,
    payload TEXT,
    created_at TEXT NOT NULL
);
"#;
