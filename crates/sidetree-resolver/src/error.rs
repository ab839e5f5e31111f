use sidetree_protocol::ProtocolError;
use sidetree_store::StoreError;

/// Errors surfaced by resolution. Cloneable so cached loads can share them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// No operations are anchored for the identifier.
    #[error("document not found: {0}")]
    NotFound(String),

    /// The identifier or its suffix log cannot be resolved.
    #[error("malformed: {0}")]
    Malformed(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl ResolveError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type ResolveResult<T> = Result<T, ResolveError>;
