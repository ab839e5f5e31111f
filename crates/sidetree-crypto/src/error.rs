use thiserror::Error;

/// Errors from hashing, encoding, and signature operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid base64url: {0}")]
    InvalidEncoding(String),

    #[error("invalid multihash: {0}")]
    InvalidMultihash(&'static str),

    #[error("unknown multihash code: {0:#x}")]
    UnknownHash(u64),

    #[error("digest length mismatch: expected {expected}, got {actual}")]
    DigestLength { expected: usize, actual: usize },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("malformed compact JWS: {0}")]
    MalformedJws(&'static str),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid key")]
    InvalidKey,
}

pub type CryptoResult<T> = Result<T, CryptoError>;
