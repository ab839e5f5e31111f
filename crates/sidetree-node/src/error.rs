use std::io;

use sidetree_batch::BatchError;
use sidetree_observer::{ObserverError, Role};
use sidetree_protocol::ProtocolError;
use sidetree_resolver::ResolveError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unknown namespace: {0}")]
    UnknownNamespace(String),

    /// No ledger collaborator was supplied for a configured channel.
    #[error("no ledger for channel {0}")]
    UnknownChannel(String),

    /// The operation needs a component this peer was built without.
    #[error("peer is not configured with the {0} role")]
    RoleNotConfigured(Role),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    Observer(#[from] ObserverError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl NodeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Resolve(e) if e.is_not_found())
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Resolve(ResolveError::Malformed(_)))
    }
}

pub type NodeResult<T> = Result<T, NodeError>;
