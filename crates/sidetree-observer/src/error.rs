use std::io;

use serde::{Deserialize, Serialize};
use sidetree_cas::CasError;
use sidetree_ledger::LedgerError;
use sidetree_protocol::ProtocolError;
use sidetree_store::StoreError;

/// Failure category recorded in observer metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    Unknown,
    NotFound,
    Blockchain,
    Db,
}

/// Errors produced by the observer, lease, metadata store, and monitor.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    #[error(transparent)]
    Cas(#[from] CasError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The anchor string or one of its artifacts does not parse.
    #[error("malformed anchor: {0}")]
    AnchorMalformed(String),

    /// Artifacts parse but disagree with each other or with the anchor.
    #[error("inconsistent batch: {0}")]
    BatchInconsistent(String),

    /// The lease for the block was lost mid-processing.
    #[error("lease for block {0} lost")]
    LeaseLost(u64),

    #[error("block {0} exceeded its processing deadline")]
    DeadlineExceeded(u64),

    /// I/O error in a file-backed metadata store.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("observer is already running")]
    AlreadyRunning,
}

impl ObserverError {
    /// Retried on the next tick, up to the configured attempt limit.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Cas(e) => e.is_transient() || matches!(e, CasError::NotFound(_)),
            Self::Ledger(e) => e.is_transient(),
            Self::Store(StoreError::Backend(_)) => true,
            Self::DeadlineExceeded(_) | Self::Io(_) => true,
            _ => false,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Cas(_) => ErrorCode::NotFound,
            Self::Ledger(_) => ErrorCode::Blockchain,
            Self::Store(_) | Self::Io(_) => ErrorCode::Db,
            _ => ErrorCode::Unknown,
        }
    }
}

pub type ObserverResult<T> = Result<T, ObserverError>;
