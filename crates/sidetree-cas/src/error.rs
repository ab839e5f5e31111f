use sidetree_types::CasAddress;

/// Errors from CAS operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CasError {
    /// No replica holds the content.
    #[error("content not found: {0}")]
    NotFound(CasAddress),

    /// Retryable I/O failure.
    #[error("transient CAS failure: {0}")]
    Transient(String),

    /// Content read back does not hash to its address.
    #[error("content at {0} does not match its address")]
    HashMismatch(CasAddress),

    /// Non-retryable backend failure.
    #[error("CAS failure: {0}")]
    Fatal(String),
}

impl CasError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Result alias for CAS operations.
pub type CasResult<T> = Result<T, CasError>;
