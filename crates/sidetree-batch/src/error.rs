use std::io;

use sidetree_cas::CasError;
use sidetree_ledger::LedgerError;
use sidetree_protocol::ProtocolError;

/// Errors produced by queues, the cutter, and the batch writer.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// The writer is draining or stopped; new operations are refused.
    #[error("batch writer is shutting down")]
    Shutdown,

    /// `start` was called on a running writer.
    #[error("batch writer is already running")]
    AlreadyRunning,

    /// I/O error in a durable queue.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Queue record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Batch-level protocol failure (e.g. artifact over its size limit).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Cas(#[from] CasError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl BatchError {
    /// CAS uploads and anchor commits are retried indefinitely; everything
    /// else drops the batch.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Cas(_) | Self::Ledger(_) | Self::Io(_))
    }
}

pub type BatchResult<T> = Result<T, BatchError>;
