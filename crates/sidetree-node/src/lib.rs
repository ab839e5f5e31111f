//! Sidetree node assembly.
//!
//! [`SidetreeNode`] builds the components a peer's roles call for from a
//! [`ConfigSource`] and a set of [`Collaborators`] (CAS, ledger, operation
//! store, observer metadata, discovery), then exposes the core surface:
//! `submit_operation`, `resolve`, `invalidate`, `start`, and `stop`.

pub mod config;
pub mod context;
pub mod error;
pub mod node;
pub mod telemetry;

#[cfg(test)]
mod scenarios;

pub use config::{
    ConfigSource, MonitorConfig, NamespaceConfig, NodeConfig, ObserverConfig, PeerConfig,
    QueueConfig, SidetreeConfig, StaticConfigSource, TomlConfigSource,
};
pub use context::{NamespaceContext, Submission};
pub use error::{NodeError, NodeResult};
pub use node::{ChannelLedger, Collaborators, SidetreeNode};

pub use sidetree_observer::Role;
pub use sidetree_resolver::{DocumentType, ResolutionResult};
