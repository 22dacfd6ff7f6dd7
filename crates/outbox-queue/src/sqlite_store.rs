//! SQLite operation store.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::params;
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::error::QueueError;
use crate::operation::{decode_payload, encode_payload, Opcode, OperationRecord, Payload, Sequence};
use crate::schema::init_schema;
use crate::store::OperationStore;

#[cfg(test)]
#[path = "sqlite_store_tests.rs"]
mod tests;

/// SQLite-backed operation store.
///
/// Every insert and delete is its own committed transaction with
/// `synchronous=FULL`, so an acknowledged enqueue survives a crash.
pub struct SqliteOperationStore {
    conn: Connection,
}

impl SqliteOperationStore {
    /// Create a new in-memory database.
    pub async fn in_memory() -> Result<Self, QueueError> {
        let conn = Connection::open_in_memory().await?;
        conn.call(|conn| Ok(init_schema(conn)?)).await?;
        Ok(Self { conn })
    }

    /// Open (or create) a file-backed database.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, QueueError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                QueueError::Storage(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let conn = Connection::open(&path).await?;
        conn.call(|conn| Ok(init_schema(conn)?)).await?;

        debug!("SqliteOperationStore opened at {:?}", path);
        Ok(Self { conn })
    }
}

#[async_trait]
impl OperationStore for SqliteOperationStore {
    async fn insert(&self, opcode: Opcode, payload: Option<&Payload>) -> Result<Sequence, QueueError> {
        let payload = encode_payload(payload)?;
        let created_at = Utc::now().to_rfc3339();

        let sequence = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO operations (opcode, payload, created_at) VALUES (?1, ?2, ?3)",
                    params![opcode, payload, created_at],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        debug!("Stored operation {} (opcode {})", sequence, opcode);
        Ok(sequence)
    }

    async fn delete(&self, sequence: Sequence) -> Result<(), QueueError> {
        let removed = self
            .conn
            .call(move |conn| {
                Ok(conn.execute("DELETE FROM operations WHERE sequence = ?1", [sequence])?)
            })
            .await?;

        if removed == 0 {
            debug!("Operation {} was already deleted", sequence);
        }
        Ok(())
    }

    async fn list_all_ordered(&self) -> Result<Vec<OperationRecord>, QueueError> {
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT sequence, opcode, payload FROM operations ORDER BY sequence ASC",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, Option<String>>(2)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(sequence, opcode, payload)| {
                let payload = decode_payload(payload.as_deref()).map_err(|e| {
                    QueueError::Storage(format!("Corrupt payload for operation {}: {}", sequence, e))
                })?;
                Ok(OperationRecord::new(sequence, opcode, payload))
            })
            .collect()
    }

    async fn len(&self) -> Result<usize, QueueError> {
        let count = self
            .conn
            .call(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM operations", [], |row| row.get::<_, i64>(0))?)
            })
            .await?;
        Ok(count as usize)
    }
}
