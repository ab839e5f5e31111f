use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::sync::Arc;

use sidetree_batch::{BatchCutter, BatchWriter, InMemoryQueue, OperationQueue, WalQueue};
use sidetree_cache::DocumentCacheProvider;
use sidetree_cas::CasClient;
use sidetree_ledger::{AnchorWriter, BlockSource};
use sidetree_observer::{
    Discovery, LeaseProvider, MetadataStore, Monitor, Observer, Role,
};
use sidetree_protocol::ProtocolRegistry;
use sidetree_resolver::{ResolutionResult, Resolver};
use sidetree_store::{MutationListener, OperationStore};
use sidetree_types::{ChannelId, Endpoint, Namespace, UniqueSuffix};
use tracing::{info, warn};

use crate::config::{ConfigSource, PeerConfig, QueueConfig};
use crate::context::{NamespaceContext, Submission};
use crate::error::{NodeError, NodeResult};

/// Ledger access for one channel.
#[derive(Clone)]
pub struct ChannelLedger {
    pub blocks: Arc<dyn BlockSource>,
    pub anchors: Arc<dyn AnchorWriter>,
}

/// External systems a node is wired to.
#[derive(Clone)]
pub struct Collaborators {
    pub cas: Arc<dyn CasClient>,
    pub store: Arc<dyn OperationStore>,
    pub metadata: Arc<dyn MetadataStore>,
    pub discovery: Arc<dyn Discovery>,
    pub ledgers: HashMap<ChannelId, ChannelLedger>,
}

impl Collaborators {
    pub fn new(
        cas: Arc<dyn CasClient>,
        store: Arc<dyn OperationStore>,
        metadata: Arc<dyn MetadataStore>,
        discovery: Arc<dyn Discovery>,
    ) -> Self {
        Self {
            cas,
            store,
            metadata,
            discovery,
            ledgers: HashMap::new(),
        }
    }

    pub fn with_channel(
        mut self,
        channel: ChannelId,
        blocks: Arc<dyn BlockSource>,
        anchors: Arc<dyn AnchorWriter>,
    ) -> Self {
        self.ledgers.insert(channel, ChannelLedger { blocks, anchors });
        self
    }

    fn ledger(&self, channel: &ChannelId) -> NodeResult<&ChannelLedger> {
        self.ledgers
            .get(channel)
            .ok_or_else(|| NodeError::UnknownChannel(channel.to_string()))
    }
}

/// A Sidetree peer.
///
/// Roles decide what gets built: batch writers exist only on
/// `batch-writer` peers, observers on (standby) observer peers, and
/// document caches on `resolver` peers. Monitors watch the anchors of
/// batch-writer peers when a monitor period is configured.
pub struct SidetreeNode {
    peer: PeerConfig,
    namespaces: HashMap<Namespace, NamespaceContext>,
    observers: BTreeMap<ChannelId, Observer>,
    monitors: BTreeMap<ChannelId, Monitor>,
    caches: DocumentCacheProvider,
}

impl SidetreeNode {
    pub fn new(source: &dyn ConfigSource, collaborators: Collaborators) -> NodeResult<Self> {
        let sidetree = source.load_sidetree()?;
        let peer = source.load_peer()?;
        let queue = source.load_queue()?;
        let c = &collaborators;

        let caches = DocumentCacheProvider::new();
        let mut namespaces = HashMap::new();
        let mut by_channel: BTreeMap<ChannelId, Vec<Arc<ProtocolRegistry>>> = BTreeMap::new();

        for ns in source.load_namespaces()? {
            let namespace = ns.namespace()?;
            let channel = ns.channel();
            let protocols = Arc::new(ProtocolRegistry::new(
                namespace.clone(),
                source.load_protocols(&namespace)?,
            )?);

            let writer = if peer.has_role(Role::BatchWriter) {
                let cutter = BatchCutter::new(open_queue(&queue, &namespace)?, Arc::clone(&protocols));
                Some(BatchWriter::new(
                    Arc::new(cutter),
                    Arc::clone(&protocols),
                    Arc::clone(&c.cas),
                    Arc::clone(&c.ledger(&channel)?.anchors),
                    sidetree.writer_config(),
                ))
            } else {
                None
            };

            let cache = if peer.has_role(Role::Resolver) {
                let resolver = Resolver::new(Arc::clone(&protocols), Arc::clone(&c.store), ns.doc_type);
                let cache = caches.get_or_create(&channel, resolver, &ns.cache_config());
                c.store
                    .subscribe(&(Arc::clone(&cache) as Arc<dyn MutationListener>));
                Some(cache)
            } else {
                None
            };

            by_channel
                .entry(channel.clone())
                .or_default()
                .push(Arc::clone(&protocols));
            let context = NamespaceContext::new(channel, protocols, writer, cache);
            if namespaces.insert(namespace.clone(), context).is_some() {
                return Err(NodeError::Config(format!("namespace {namespace} configured twice")));
            }
        }

        let observer_config = source.load_observer()?;
        let monitor_config = source.load_monitor()?;
        let mut observers = BTreeMap::new();
        let mut monitors = BTreeMap::new();
        for (channel, registries) in by_channel {
            let ledger = c.ledger(&channel)?;
            if peer.observes() {
                let leases = LeaseProvider::new(Arc::clone(&c.discovery), peer.clustered);
                let observer = Observer::new(
                    channel.clone(),
                    Arc::clone(&ledger.blocks),
                    Arc::clone(&c.cas),
                    Arc::clone(&c.store),
                    Arc::clone(&c.metadata),
                    leases,
                    registries.clone(),
                    (&observer_config).into(),
                );
                observers.insert(channel.clone(), observer);
            }
            if peer.has_role(Role::BatchWriter) && monitor_config.enabled() {
                let monitor = Monitor::new(
                    channel.clone(),
                    Endpoint::new(peer.endpoint.as_str()),
                    Arc::clone(&ledger.blocks),
                    Arc::clone(&c.cas),
                    Arc::clone(&c.store),
                    Arc::clone(&c.metadata),
                    registries,
                    (&monitor_config).into(),
                );
                monitors.insert(channel, monitor);
            }
        }

        info!(
            endpoint = %peer.endpoint,
            roles = ?peer.roles,
            namespaces = namespaces.len(),
            observers = observers.len(),
            monitors = monitors.len(),
            "sidetree node built"
        );
        Ok(Self {
            peer,
            namespaces,
            observers,
            monitors,
            caches,
        })
    }

    pub fn peer(&self) -> &PeerConfig {
        &self.peer
    }

    pub fn namespace(&self, namespace: &Namespace) -> NodeResult<&NamespaceContext> {
        self.namespaces
            .get(namespace)
            .ok_or_else(|| NodeError::UnknownNamespace(namespace.to_string()))
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &Namespace> {
        self.namespaces.keys()
    }

    pub fn writer(&self, namespace: &Namespace) -> Option<&BatchWriter> {
        self.namespaces.get(namespace).and_then(|c| c.writer())
    }

    pub fn observer(&self, channel: &ChannelId) -> Option<&Observer> {
        self.observers.get(channel)
    }

    pub fn monitor(&self, channel: &ChannelId) -> Option<&Monitor> {
        self.monitors.get(channel)
    }

    pub fn caches(&self) -> &DocumentCacheProvider {
        &self.caches
    }

    /// Ingress-validate a JSON operation request and queue it for batching.
    pub fn submit_operation(&self, namespace: &Namespace, bytes: &[u8]) -> NodeResult<Submission> {
        self.namespace(namespace)?.submit(bytes)
    }

    /// Resolve a bare suffix, short-form DID, or long-form DID.
    pub fn resolve(&self, namespace: &Namespace, input: &str) -> NodeResult<ResolutionResult> {
        self.namespace(namespace)?.resolve(input)
    }

    pub fn invalidate(&self, namespace: &Namespace, suffix: &UniqueSuffix) -> NodeResult<()> {
        self.namespace(namespace)?.invalidate(suffix)
    }

    /// Start every worker. Must be called inside a tokio runtime.
    pub fn start(&self) -> NodeResult<()> {
        for ctx in self.namespaces.values() {
            if let Some(writer) = ctx.writer() {
                writer.start()?;
            }
        }
        for observer in self.observers.values() {
            observer.start()?;
        }
        for monitor in self.monitors.values() {
            monitor.start()?;
        }
        info!(endpoint = %self.peer.endpoint, "sidetree node started");
        Ok(())
    }

    /// Stop writers first so their final cut is anchored, then the
    /// observers and monitors.
    pub async fn stop(&self) {
        for ctx in self.namespaces.values() {
            if let Some(writer) = ctx.writer() {
                writer.stop().await;
            }
        }
        for observer in self.observers.values() {
            observer.stop().await;
        }
        for monitor in self.monitors.values() {
            monitor.stop().await;
        }
        info!(endpoint = %self.peer.endpoint, "sidetree node stopped");
    }
}

impl std::fmt::Debug for SidetreeNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SidetreeNode")
            .field("endpoint", &self.peer.endpoint)
            .field("namespaces", &self.namespaces.keys().collect::<Vec<_>>())
            .field("observers", &self.observers.keys().collect::<Vec<_>>())
            .field("monitors", &self.monitors.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn open_queue(config: &QueueConfig, namespace: &Namespace) -> NodeResult<Arc<dyn OperationQueue>> {
    match config.wal_path(namespace) {
        Some(path) => {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            let queue = WalQueue::open(&path, config.sync())?;
            if !queue.is_empty() {
                warn!(
                    namespace = %namespace,
                    pending = queue.len(),
                    "recovered unanchored operations"
                );
            }
            Ok(Arc::new(queue))
        }
        None => Ok(Arc::new(InMemoryQueue::new())),
    }
}
