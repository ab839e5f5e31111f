use thiserror::Error;

/// Errors produced while parsing or validating foundation types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid namespace: {0:?}")]
    InvalidNamespace(String),

    #[error("invalid unique suffix: {0:?}")]
    InvalidSuffix(String),

    #[error("invalid CAS address: {0:?}")]
    InvalidAddress(String),

    #[error("malformed anchor string {input:?}: {reason}")]
    InvalidAnchor { input: String, reason: &'static str },

    #[error("invalid DID {input:?} for namespace {namespace}")]
    InvalidDid { input: String, namespace: String },

    #[error("unknown multihash code: {0:#x}")]
    UnknownHashCode(u64),

    #[error("unknown patch action: {0}")]
    UnknownPatchAction(String),
}
