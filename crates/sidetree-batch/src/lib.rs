//! Batching side of the Sidetree pipeline.
//!
//! Producers enqueue validated operations; a single writer per namespace
//! cuts them into batches, uploads the artifact graph to CAS, and anchors
//! the core index on the ledger.
//!
//! # Key Types
//!
//! - [`OperationQueue`] with [`InMemoryQueue`] and the durable [`WalQueue`]
//! - [`BatchCutter`] applying the cut policy over a queue
//! - [`ArtifactBuilder`] producing chunk, provisional index, and core index
//! - [`BatchWriter`] running the cut/upload/anchor loop as a tokio task

pub mod builder;
pub mod cutter;
pub mod error;
pub mod queue;
pub mod wal;
pub mod writer;

pub use builder::{ArtifactBuilder, BuiltBatch, Partitioned};
pub use cutter::{BatchCutter, CutResult};
pub use error::{BatchError, BatchResult};
pub use queue::{InMemoryQueue, OperationQueue, PendingOperation, QueuedOperation};
pub use wal::{WalQueue, WalSync};
pub use writer::{BatchReceipt, BatchWriter, Tick, WriterConfig, WriterState, WriterStats};
