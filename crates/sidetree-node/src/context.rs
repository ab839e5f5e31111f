use std::sync::Arc;

use sidetree_batch::{BatchWriter, PendingOperation};
use sidetree_cache::DocumentCache;
use sidetree_observer::Role;
use sidetree_protocol::{OperationParser, ProtocolRegistry};
use sidetree_resolver::{ResolutionResult, ResolveError};
use sidetree_types::{ChannelId, Did, Namespace, UniqueSuffix};
use tracing::debug;

use crate::error::{NodeError, NodeResult};

/// Ingress verdict for a submitted operation.
///
/// Acceptance means the operation is queued, not that it is anchored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Submission {
    Accepted {
        unique_suffix: UniqueSuffix,
        /// Queue length after the operation was added.
        queued: usize,
    },
    Rejected(String),
}

impl Submission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Components serving one namespace. Absent components belong to roles the
/// peer was built without.
pub struct NamespaceContext {
    channel: ChannelId,
    protocols: Arc<ProtocolRegistry>,
    writer: Option<BatchWriter>,
    cache: Option<Arc<DocumentCache>>,
}

impl NamespaceContext {
    pub(crate) fn new(
        channel: ChannelId,
        protocols: Arc<ProtocolRegistry>,
        writer: Option<BatchWriter>,
        cache: Option<Arc<DocumentCache>>,
    ) -> Self {
        Self {
            channel,
            protocols,
            writer,
            cache,
        }
    }

    pub fn namespace(&self) -> &Namespace {
        self.protocols.namespace()
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn protocols(&self) -> &Arc<ProtocolRegistry> {
        &self.protocols
    }

    pub fn writer(&self) -> Option<&BatchWriter> {
        self.writer.as_ref()
    }

    pub fn cache(&self) -> Option<&Arc<DocumentCache>> {
        self.cache.as_ref()
    }

    /// Validate `bytes` under the current protocol and queue them.
    pub fn submit(&self, bytes: &[u8]) -> NodeResult<Submission> {
        let writer = self
            .writer
            .as_ref()
            .ok_or(NodeError::RoleNotConfigured(Role::BatchWriter))?;
        let parsed = match OperationParser::new(self.protocols.current()).parse(bytes) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(namespace = %self.namespace(), error = %e, "operation rejected");
                return Ok(Submission::Rejected(e.to_string()));
            }
        };
        let unique_suffix = parsed.unique_suffix.clone();
        let queued = writer
            .cutter()
            .add(PendingOperation::new(parsed.unique_suffix, parsed.request))?;
        Ok(Submission::Accepted {
            unique_suffix,
            queued,
        })
    }

    /// Short forms go through the cache; long forms are resolved directly.
    pub fn resolve(&self, input: &str) -> NodeResult<ResolutionResult> {
        let cache = self.resolving()?;
        let did = Did::parse(self.namespace(), input)
            .map_err(|e| ResolveError::Malformed(e.to_string()))?;
        let result = if did.is_long_form() {
            cache.resolver().resolve(input)?
        } else {
            cache.resolve(&did.suffix)?
        };
        Ok(result)
    }

    pub fn invalidate(&self, suffix: &UniqueSuffix) -> NodeResult<()> {
        self.resolving()?.invalidate(suffix);
        Ok(())
    }

    fn resolving(&self) -> NodeResult<&Arc<DocumentCache>> {
        self.cache
            .as_ref()
            .ok_or(NodeError::RoleNotConfigured(Role::Resolver))
    }
}
