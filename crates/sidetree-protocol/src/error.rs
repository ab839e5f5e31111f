/// Errors from protocol selection, artifact coding, and operation validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Every registered generation starts after the requested time.
    #[error("no protocol in effect at transaction time {0}")]
    NoProtocolAtTime(u64),

    #[error("invalid protocol parameters: {0}")]
    InvalidParameters(String),

    /// Input that does not parse.
    #[error("malformed: {0}")]
    Malformed(String),

    /// Input that parses but breaks a protocol rule.
    #[error("protocol violation: {0}")]
    Violation(String),

    /// Reveal, key, or signature does not authorize the operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("{what} is {size} bytes, limit is {limit}")]
    TooLarge {
        what: &'static str,
        size: usize,
        limit: usize,
    },

    #[error("compression error: {0}")]
    Compression(String),
}

/// Result alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
