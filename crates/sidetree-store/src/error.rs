use sidetree_types::{TxnPosition, UniqueSuffix};

/// Errors from operation store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// An operation already exists at this position; nothing was written.
    #[error("duplicate operation for {suffix} at {position}")]
    Duplicate {
        suffix: UniqueSuffix,
        position: TxnPosition,
    },

    /// Backend failure.
    #[error("operation store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
