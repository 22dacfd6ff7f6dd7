//! # Outbox Queue
//!
//! Durable, serial queue for operations that need the network.
//!
//! ## Features
//!
//! - Persist-before-ack enqueue into a durable store (SQLite or in-memory)
//! - Strictly serial execution on a single worker task
//! - In-memory high-priority overlay on top of the durable FIFO
//! - Pause on failure or lost reachability, head-first retry on resume
//! - Lifecycle hooks for launch, pause and resume decisions
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use outbox_queue::{ExecutionOutcome, FnHandler, OfflineQueue, SqliteOperationStore};
//!
//! # async fn run() -> Result<(), outbox_queue::QueueError> {
//! let store = SqliteOperationStore::open("/tmp/outbox.db").await?;
//! let queue = OfflineQueue::builder()
//!     .store(Arc::new(store))
//!     .handler(FnHandler::new(|opcode, _payload| {
//!         println!("uploading opcode {opcode}");
//!         ExecutionOutcome::Success
//!     }))
//!     .build()?;
//!
//! queue.start()?;
//! queue.enqueue(1, None).await?;
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod error;
pub mod handler;
pub mod operation;
pub mod reachability;
pub mod run_list;
pub mod schema;
pub mod sqlite_store;
pub mod stats;
pub mod store;

pub use engine::{OfflineQueue, OfflineQueueBuilder, QueueState};
pub use error::QueueError;
pub use handler::{ExecutionOutcome, FnHandler, OperationHandler};
pub use operation::{validate_payload, Opcode, OperationRecord, Payload, PayloadValue, Sequence};
pub use reachability::{
    LinkKind, ManualReachability, ProbeReachability, ReachabilityMonitor, ReachabilityState,
};
pub use run_list::RunList;
pub use sqlite_store::SqliteOperationStore;
pub use stats::{QueueStats, StatsSnapshot};
pub use store::{MemoryOperationStore, OperationStore};

pub use outbox_config::{OutboxConfig, QueueConfig, ReachabilityConfig, StorageConfig};
