use sidetree_types::Namespace;
use tracing::debug;

use crate::error::{ProtocolError, ProtocolResult};
use crate::params::ProtocolParameters;

/// Immutable, time-ordered set of protocol generations for one namespace.
///
/// Updates require building a new registry.
#[derive(Clone, Debug)]
pub struct ProtocolRegistry {
    namespace: Namespace,
    /// Sorted ascending by `generation_time`; never empty.
    protocols: Vec<ProtocolParameters>,
}

impl ProtocolRegistry {
    pub fn new(namespace: Namespace, mut protocols: Vec<ProtocolParameters>) -> ProtocolResult<Self> {
        if protocols.is_empty() {
            return Err(ProtocolError::InvalidParameters(format!(
                "no protocols registered for {namespace}"
            )));
        }
        for p in &protocols {
            p.validate()?;
        }
        protocols.sort_by_key(|p| p.generation_time);
        if let Some(dup) = protocols
            .windows(2)
            .find(|w| w[0].generation_time == w[1].generation_time)
        {
            return Err(ProtocolError::InvalidParameters(format!(
                "duplicate generation time {} for {namespace}",
                dup[0].generation_time
            )));
        }
        debug!(namespace = %namespace, generations = protocols.len(), "protocol registry built");
        Ok(Self {
            namespace,
            protocols,
        })
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// The generation with the largest `generation_time`.
    pub fn current(&self) -> &ProtocolParameters {
        // Non-empty by construction.
        &self.protocols[self.protocols.len() - 1]
    }

    /// The generation with the greatest `generation_time <= transaction_time`.
    pub fn at(&self, transaction_time: u64) -> ProtocolResult<&ProtocolParameters> {
        let idx = self
            .protocols
            .partition_point(|p| p.generation_time <= transaction_time);
        if idx == 0 {
            return Err(ProtocolError::NoProtocolAtTime(transaction_time));
        }
        Ok(&self.protocols[idx - 1])
    }

    pub fn generations(&self) -> impl Iterator<Item = &ProtocolParameters> {
        self.protocols.iter()
    }
}
