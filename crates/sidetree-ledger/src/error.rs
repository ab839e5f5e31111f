/// Errors produced by blockchain collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Retryable failure (endorsement timeout, peer unavailable).
    #[error("transient blockchain failure: {0}")]
    Transient(String),

    /// Non-retryable failure, e.g. signature rejection.
    #[error("blockchain failure: {0}")]
    Fatal(String),

    #[error("block {0} not found")]
    BlockNotFound(u64),

    #[error("block with hash {0} not found")]
    HashNotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl LedgerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
