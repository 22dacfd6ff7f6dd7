//! Durable store trait and the in-memory implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::QueueError;
use crate::operation::{Opcode, OperationRecord, Payload, Sequence};

/// Ordered append/delete log of pending operations.
#[async_trait]
pub trait OperationStore: Send + Sync {
    /// Append a record and return its sequence. The write is durable when this returns.
    async fn insert(&self, opcode: Opcode, payload: Option<&Payload>) -> Result<Sequence, QueueError>;

    /// Remove a record. Deleting an absent sequence is not an error.
    async fn delete(&self, sequence: Sequence) -> Result<(), QueueError>;

    /// All pending records in ascending sequence order.
    async fn list_all_ordered(&self) -> Result<Vec<OperationRecord>, QueueError>;

    /// Number of pending records.
    async fn len(&self) -> Result<usize, QueueError> {
        Ok(self.list_all_ordered().await?.len())
    }
}

/// In-memory operation store for testing and ephemeral queues.
pub struct MemoryOperationStore {
    inner: RwLock<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    next_sequence: Sequence,
    records: BTreeMap<Sequence, OperationRecord>,
}

impl MemoryOperationStore {
    /// Create a new memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryInner {
                next_sequence: 1,
                records: BTreeMap::new(),
            }),
        }
    }
}

impl Default for MemoryOperationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OperationStore for MemoryOperationStore {
    async fn insert(&self, opcode: Opcode, payload: Option<&Payload>) -> Result<Sequence, QueueError> {
        let mut inner = self.inner.write().await;
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner
            .records
            .insert(sequence, OperationRecord::new(sequence, opcode, payload.cloned()));
        Ok(sequence)
    }

    async fn delete(&self, sequence: Sequence) -> Result<(), QueueError> {
        self.inner.write().await.records.remove(&sequence);
        Ok(())
    }

    async fn list_all_ordered(&self) -> Result<Vec<OperationRecord>, QueueError> {
        let inner = self.inner.read().await;
        Ok(inner.records.values().cloned().collect())
    }

    async fn len(&self) -> Result<usize, QueueError> {
        Ok(self.inner.read().await.records.len())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
