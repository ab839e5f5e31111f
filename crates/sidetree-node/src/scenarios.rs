//! End-to-end runs through submit, batch, anchor, observe, and resolve.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use sidetree_batch::{BatchError, BatchReceipt, Tick};
use sidetree_cas::{CasClient, CasError, CasResult, InMemoryCas};
use sidetree_crypto::{commitment_for_key, SigningKey};
use sidetree_ledger::{BlockCutting, BlockSource, InMemoryBlockchain};
use sidetree_observer::{
    Discovery, InMemoryMetadataStore, LeaseProvider, MetadataStore, PassSummary, StaticDiscovery,
};
use sidetree_protocol::{
    DocumentKeys, InitialState, OperationParser, ProtocolParameters, RequestBuilder,
};
use sidetree_store::{InMemoryOperationStore, OperationStore};
use sidetree_types::{
    CasAddress, ChannelId, Endpoint, HashAlgorithm, Namespace, OperationRequest, OperationType,
    Patch, UniqueSuffix,
};

use crate::config::{MonitorConfig, NamespaceConfig, NodeConfig, PeerConfig, QueueConfig, StaticConfigSource};
use crate::context::Submission;
use crate::error::NodeError;
use crate::node::{Collaborators, SidetreeNode};
use crate::Role;

fn ns() -> Namespace {
    Namespace::new("did:sidetree").unwrap()
}

fn channel() -> ChannelId {
    ChannelId::new("mychannel")
}

fn patches(tag: &str) -> Vec<Patch> {
    vec![Patch::Replace {
        document: json!({
            "services": [{"id": tag, "type": "Tag", "serviceEndpoint": "https://example.com"}]
        }),
    }]
}

fn service_tag(result: &crate::ResolutionResult) -> &str {
    result.document["services"][0]["id"].as_str().unwrap()
}

/// CAS whose reads can be switched off.
#[derive(Default)]
struct FlakyCas {
    inner: InMemoryCas,
    offline: AtomicBool,
}

#[async_trait]
impl CasClient for FlakyCas {
    async fn put(&self, content: Bytes) -> CasResult<CasAddress> {
        self.inner.put(content).await
    }

    async fn get(&self, address: &CasAddress) -> CasResult<Bytes> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CasError::Transient("cas unreachable".into()));
        }
        self.inner.get(address).await
    }
}

/// Ledger, CAS, and stores shared by every peer of a test.
struct Network {
    chain: Arc<InMemoryBlockchain>,
    cas: Arc<FlakyCas>,
    store: Arc<InMemoryOperationStore>,
    metadata: Arc<InMemoryMetadataStore>,
}

impl Network {
    fn new() -> Self {
        Self {
            chain: InMemoryBlockchain::new(BlockCutting::PerWrite),
            cas: Arc::new(FlakyCas::default()),
            store: Arc::new(InMemoryOperationStore::new()),
            metadata: Arc::new(InMemoryMetadataStore::new()),
        }
    }

    fn node_with(&self, config: NodeConfig, discovery: Arc<StaticDiscovery>) -> SidetreeNode {
        let anchors = Arc::new(self.chain.writer(Endpoint::new(config.peer.endpoint.as_str())));
        let collaborators = Collaborators::new(
            Arc::clone(&self.cas) as Arc<dyn CasClient>,
            Arc::clone(&self.store) as Arc<dyn OperationStore>,
            Arc::clone(&self.metadata) as Arc<dyn MetadataStore>,
            discovery as Arc<dyn Discovery>,
        )
        .with_channel(channel(), Arc::clone(&self.chain) as Arc<dyn BlockSource>, anchors);
        SidetreeNode::new(&StaticConfigSource::new(config).unwrap(), collaborators).unwrap()
    }

    fn node(&self, config: NodeConfig) -> SidetreeNode {
        let discovery = Arc::new(StaticDiscovery::new(config.peer.member()));
        self.node_with(config, discovery)
    }

    fn solo(&self) -> SidetreeNode {
        self.node(config(PeerConfig::default()))
    }

    fn log_len(&self, suffix: &UniqueSuffix) -> usize {
        self.store.get(&ns(), suffix).unwrap().len()
    }

    fn log_types(&self, suffix: &UniqueSuffix) -> Vec<OperationType> {
        self.store
            .get(&ns(), suffix)
            .unwrap()
            .iter()
            .map(|o| o.operation_type())
            .collect()
    }
}

fn config(peer: PeerConfig) -> NodeConfig {
    NodeConfig {
        peer,
        namespaces: vec![NamespaceConfig::default()],
        ..NodeConfig::default()
    }
}

/// Document owner holding the current keys.
struct Client {
    keys: DocumentKeys,
    create: OperationRequest,
    suffix: UniqueSuffix,
    /// Update keys already revealed, oldest first.
    retired: Vec<SigningKey>,
}

impl Client {
    fn new() -> Self {
        let keys = DocumentKeys::generate();
        let create = RequestBuilder::default()
            .create(&keys, patches("create"))
            .unwrap();
        let suffix = OperationParser::new(&ProtocolParameters::default())
            .validate(create.clone())
            .unwrap()
            .unique_suffix;
        Self {
            keys,
            create,
            suffix,
            retired: Vec::new(),
        }
    }

    fn did(&self) -> String {
        ns().did(&self.suffix)
    }

    fn create(&self) -> Vec<u8> {
        serde_json::to_vec(&self.create).unwrap()
    }

    fn update(&mut self, tag: &str) -> Vec<u8> {
        let next = SigningKey::generate();
        let request = RequestBuilder::default()
            .update(&self.suffix, &self.keys.update, &next, patches(tag))
            .unwrap();
        self.retired.push(std::mem::replace(&mut self.keys.update, next));
        serde_json::to_vec(&request).unwrap()
    }

    /// A well-formed update revealing an already used key.
    fn stale_update(&self, tag: &str) -> Vec<u8> {
        let request = RequestBuilder::default()
            .update(&self.suffix, &self.retired[0], &SigningKey::generate(), patches(tag))
            .unwrap();
        serde_json::to_vec(&request).unwrap()
    }

    fn deactivate(&self) -> Vec<u8> {
        let request = RequestBuilder::default()
            .deactivate(&self.suffix, &self.keys.recovery)
            .unwrap();
        serde_json::to_vec(&request).unwrap()
    }

    /// Deactivate signed by a key the document never committed to.
    fn forged_deactivate(&self) -> Vec<u8> {
        let request = RequestBuilder::default()
            .deactivate(&self.suffix, &SigningKey::generate())
            .unwrap();
        serde_json::to_vec(&request).unwrap()
    }

    fn recover(&mut self, tag: &str) -> Vec<u8> {
        let next = DocumentKeys::generate();
        let request = RequestBuilder::default()
            .recover(&self.suffix, &self.keys.recovery, &next, patches(tag))
            .unwrap();
        self.keys = next;
        serde_json::to_vec(&request).unwrap()
    }

    fn update_commitment(&self) -> String {
        commitment_for_key(HashAlgorithm::Sha2_256, &self.keys.update.public_jwk()).unwrap()
    }
}

fn submit(node: &SidetreeNode, bytes: &[u8]) {
    let verdict = node.submit_operation(&ns(), bytes).unwrap();
    assert!(verdict.is_accepted(), "{verdict:?}");
}

async fn anchor(node: &SidetreeNode) -> BatchReceipt {
    match node.writer(&ns()).unwrap().tick(true).await.unwrap() {
        Tick::Written(receipt) => receipt,
        other => panic!("expected an anchored batch, got {other:?}"),
    }
}

async fn observe(node: &SidetreeNode) -> PassSummary {
    node.observer(&channel()).unwrap().process().await.unwrap()
}

// ---------------------------------------------------------------------------
// Single document lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn single_create_resolves() {
    let net = Network::new();
    let node = net.solo();
    let client = Client::new();

    let verdict = node.submit_operation(&ns(), &client.create()).unwrap();
    assert_eq!(
        verdict,
        Submission::Accepted {
            unique_suffix: client.suffix.clone(),
            queued: 1
        }
    );
    assert!(node.resolve(&ns(), &client.did()).unwrap_err().is_not_found());

    anchor(&node).await;
    let pass = observe(&node).await;
    assert_eq!(pass.operations, 1);

    let result = node.resolve(&ns(), &client.did()).unwrap();
    assert_eq!(service_tag(&result), "create");
    assert_eq!(result.document["id"], json!(client.did()));
    assert!(!result.is_deactivated());
    assert!(result.is_published());
    assert_eq!(result.document_metadata.created, Some(1));
}

#[tokio::test]
async fn update_chain_of_three() {
    let net = Network::new();
    let node = net.solo();
    let mut client = Client::new();

    submit(&node, &client.create());
    for tag in ["u1", "u2", "u3"] {
        let bytes = client.update(tag);
        submit(&node, &bytes);
    }
    assert_eq!(anchor(&node).await.operations, 4);
    observe(&node).await;

    let result = node.resolve(&ns(), &client.did()).unwrap();
    assert_eq!(service_tag(&result), "u3");
    assert_eq!(
        result.did_document_metadata.update_commitment,
        Some(client.update_commitment())
    );
    assert_eq!(net.log_len(&client.suffix), 4);
}

#[tokio::test]
async fn invalid_reveal_is_stored_but_ignored() {
    let net = Network::new();
    let node = net.solo();
    let mut client = Client::new();

    submit(&node, &client.create());
    let u1 = client.update("u1");
    let u2 = client.update("u2");
    submit(&node, &u1);
    submit(&node, &u2);
    submit(&node, &client.stale_update("forged"));
    assert_eq!(anchor(&node).await.operations, 4);
    observe(&node).await;

    assert_eq!(net.log_len(&client.suffix), 4);
    let result = node.resolve(&ns(), &client.did()).unwrap();
    assert_eq!(service_tag(&result), "u2");
    assert_eq!(
        result.did_document_metadata.update_commitment,
        Some(client.update_commitment())
    );
}

#[tokio::test]
async fn deactivate_freezes_document() {
    let net = Network::new();
    let node = net.solo();
    let mut client = Client::new();

    submit(&node, &client.create());
    anchor(&node).await;
    observe(&node).await;
    let before = node.resolve(&ns(), &client.did()).unwrap();
    assert!(!before.is_deactivated());

    submit(&node, &client.deactivate());
    let late = client.update("late");
    submit(&node, &late);
    anchor(&node).await;
    observe(&node).await;

    // The cached resolution was invalidated by the store append.
    let after = node.resolve(&ns(), &client.did()).unwrap();
    assert!(after.is_deactivated());
    assert_eq!(after.document, before.document);
    assert_eq!(after.document_metadata.created, Some(1));
    assert_eq!(after.did_document_metadata.update_commitment, None);
    assert_eq!(after.did_document_metadata.recovery_commitment, None);
    assert_eq!(net.log_len(&client.suffix), 3);
}

#[tokio::test]
async fn forged_deactivate_does_not_freeze_owner() {
    let net = Network::new();
    let node = net.solo();
    let mut client = Client::new();

    submit(&node, &client.create());
    anchor(&node).await;
    observe(&node).await;

    submit(&node, &client.forged_deactivate());
    anchor(&node).await;
    observe(&node).await;
    assert!(!node.resolve(&ns(), &client.did()).unwrap().is_deactivated());
    assert_eq!(net.log_len(&client.suffix), 2);

    let legit = client.update("legit");
    submit(&node, &legit);
    anchor(&node).await;
    observe(&node).await;

    assert_eq!(net.log_len(&client.suffix), 3);
    let result = node.resolve(&ns(), &client.did()).unwrap();
    assert_eq!(service_tag(&result), "legit");
    assert!(!result.is_deactivated());
}

#[tokio::test]
async fn update_queued_before_recover_is_anchored_first() {
    let net = Network::new();
    let node = net.solo();
    let mut client = Client::new();

    submit(&node, &client.create());
    anchor(&node).await;
    observe(&node).await;

    let u1 = client.update("u1");
    let recover = client.recover("recovered");
    submit(&node, &u1);
    submit(&node, &recover);

    // The recover waits for the next cut so the update is numbered first.
    assert_eq!(anchor(&node).await.operations, 1);
    observe(&node).await;
    assert_eq!(service_tag(&node.resolve(&ns(), &client.did()).unwrap()), "u1");

    assert_eq!(anchor(&node).await.operations, 1);
    observe(&node).await;
    assert_eq!(
        net.log_types(&client.suffix),
        vec![OperationType::Create, OperationType::Update, OperationType::Recover]
    );
    let result = node.resolve(&ns(), &client.did()).unwrap();
    assert_eq!(service_tag(&result), "recovered");
    assert_eq!(
        result.did_document_metadata.update_commitment,
        Some(client.update_commitment())
    );
}

#[tokio::test]
async fn long_form_resolves_before_anchoring() {
    let net = Network::new();
    let node = net.solo();
    let client = Client::new();
    let long_form = InitialState::from_request(&client.create)
        .unwrap()
        .long_form_did(&ProtocolParameters::default(), &ns())
        .unwrap();

    let unpublished = node.resolve(&ns(), &long_form).unwrap();
    assert!(!unpublished.is_published());
    assert_eq!(service_tag(&unpublished), "create");

    submit(&node, &client.create());
    anchor(&node).await;
    observe(&node).await;
    let published = node.resolve(&ns(), &long_form).unwrap();
    assert!(published.is_published());
    assert_eq!(
        published.document_metadata.method.canonical_id,
        Some(client.did())
    );
}

// ---------------------------------------------------------------------------
// Ingress and roles
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ingress_rejects_bad_requests() {
    let net = Network::new();
    let node = net.solo();

    for bytes in [b"{not json".to_vec(), vec![b' '; 4096], br#"{"type":"launch"}"#.to_vec()] {
        let verdict = node.submit_operation(&ns(), &bytes).unwrap();
        assert!(matches!(verdict, Submission::Rejected(_)), "{verdict:?}");
    }
    assert!(node.writer(&ns()).unwrap().cutter().is_empty());

    let other = Namespace::new("did:other").unwrap();
    assert!(matches!(
        node.submit_operation(&other, &Client::new().create()),
        Err(NodeError::UnknownNamespace(_))
    ));
    assert!(node
        .resolve(&ns(), "did:sidetree:not a suffix")
        .unwrap_err()
        .is_malformed());
}

#[tokio::test]
async fn resolver_only_peer_builds_no_workers() {
    let net = Network::new();
    let peer = PeerConfig {
        roles: [Role::Resolver].into_iter().collect(),
        ..PeerConfig::default()
    };
    let node = net.node(config(peer));

    assert!(node.writer(&ns()).is_none());
    assert!(node.observer(&channel()).is_none());
    assert!(node.monitor(&channel()).is_none());
    assert!(matches!(
        node.submit_operation(&ns(), &Client::new().create()),
        Err(NodeError::RoleNotConfigured(Role::BatchWriter))
    ));
    assert_eq!(node.caches().len(), 1);
}

#[tokio::test]
async fn writer_only_peer_cannot_resolve() {
    let net = Network::new();
    let peer = PeerConfig {
        roles: [Role::BatchWriter].into_iter().collect(),
        ..PeerConfig::default()
    };
    let node = net.node(config(peer));
    let client = Client::new();

    submit(&node, &client.create());
    assert!(node.observer(&channel()).is_none());
    assert!(matches!(
        node.resolve(&ns(), &client.did()),
        Err(NodeError::RoleNotConfigured(Role::Resolver))
    ));
    assert!(matches!(
        node.invalidate(&ns(), &client.suffix),
        Err(NodeError::RoleNotConfigured(Role::Resolver))
    ));
}

#[test]
fn missing_channel_ledger_is_rejected() {
    let net = Network::new();
    let peer = PeerConfig::default();
    let collaborators = Collaborators::new(
        Arc::clone(&net.cas) as Arc<dyn CasClient>,
        Arc::clone(&net.store) as Arc<dyn OperationStore>,
        Arc::clone(&net.metadata) as Arc<dyn MetadataStore>,
        Arc::new(StaticDiscovery::new(peer.member())) as Arc<dyn Discovery>,
    );
    let source = StaticConfigSource::new(config(peer)).unwrap();
    assert!(matches!(
        SidetreeNode::new(&source, collaborators),
        Err(NodeError::UnknownChannel(_))
    ));
}

// ---------------------------------------------------------------------------
// Observer failover and outages
// ---------------------------------------------------------------------------

fn clustered(endpoint: &str) -> PeerConfig {
    PeerConfig {
        endpoint: endpoint.into(),
        clustered: true,
        ..PeerConfig::default()
    }
}

#[tokio::test]
async fn observer_failover_to_surviving_peer() {
    let net = Network::new();
    let a = clustered("peer0.org1.example.com:7051");
    let b = clustered("peer1.org1.example.com:7051");
    let a_endpoint = Endpoint::new(a.endpoint.as_str());
    let b_endpoint = Endpoint::new(b.endpoint.as_str());
    let disc_a = Arc::new(StaticDiscovery::new(a.member()).with_peer(b.member()));
    let disc_b = Arc::new(StaticDiscovery::new(b.member()).with_peer(a.member()));
    let node_a = net.node_with(config(a), Arc::clone(&disc_a));
    let node_b = net.node_with(config(b), Arc::clone(&disc_b));

    // A alone catches up to block 999.
    assert_eq!(net.chain.advance(999).unwrap(), 1000);
    disc_a.set_alive(&b_endpoint, false);
    assert_eq!(observe(&node_a).await.last_block_processed, 999);
    disc_a.set_alive(&b_endpoint, true);

    let mut client = Client::new();
    submit(&node_a, &client.create());
    anchor(&node_a).await;
    assert_eq!(net.chain.height(), 1001);

    // sorted({A, B})[1000 % 2] is A.
    let lease = LeaseProvider::new(Arc::clone(&disc_b) as Arc<dyn Discovery>, true).create_lease(1000);
    assert_eq!(lease.owner(), &a_endpoint);
    let pass = observe(&node_b).await;
    assert_eq!(pass.blocks, 0);
    assert_eq!(pass.deferred_to, Some(a_endpoint.clone()));

    let pass = observe(&node_a).await;
    assert_eq!(pass.blocks, 1);
    assert_eq!(pass.last_block_processed, 1000);
    let handed_to = node_a.observer(&channel()).unwrap().metadata().unwrap().lease_owner;
    assert_eq!(handed_to, Some(b_endpoint.clone()));

    // A dies; B takes every later block, including A's share.
    disc_b.set_alive(&a_endpoint, false);
    for tag in ["u1", "u2"] {
        let bytes = client.update(tag);
        submit(&node_b, &bytes);
        anchor(&node_b).await;
    }
    let pass = observe(&node_b).await;
    assert_eq!(pass.blocks, 2);
    assert_eq!(pass.last_block_processed, 1002);
    assert_eq!(observe(&node_b).await.blocks, 0);

    assert_eq!(net.log_len(&client.suffix), 3);
    assert_eq!(net.store.len(), 3);
    let result = node_b.resolve(&ns(), &client.did()).unwrap();
    assert_eq!(service_tag(&result), "u2");
}

#[tokio::test]
async fn cas_outage_delays_but_does_not_lose_operations() {
    let net = Network::new();
    let node = net.solo();
    let client = Client::new();
    submit(&node, &client.create());
    anchor(&node).await;

    let observer = node.observer(&channel()).unwrap();
    net.cas.offline.store(true, Ordering::SeqCst);
    for _ in 0..3 {
        let err = observer.process().await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(observer.metadata().unwrap().last_block_processed, 0);
    }
    assert_eq!(net.log_len(&client.suffix), 0);

    net.cas.offline.store(false, Ordering::SeqCst);
    let pass = observer.process().await.unwrap();
    assert!(pass.last_block_processed >= 1);
    assert_eq!(pass.operations, 1);
    observer.process().await.unwrap();
    assert_eq!(net.log_len(&client.suffix), 1);
    assert!(node.resolve(&ns(), &client.did()).is_ok());
}

// ---------------------------------------------------------------------------
// Monitor, durability, and lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn monitor_sees_nothing_missing_after_observation() {
    let net = Network::new();
    let node = net.node(NodeConfig {
        monitor: MonitorConfig {
            period_ms: 60_000,
            ..MonitorConfig::default()
        },
        ..config(PeerConfig::default())
    });
    let client = Client::new();
    submit(&node, &client.create());
    anchor(&node).await;
    observe(&node).await;

    let monitor = node.monitor(&channel()).unwrap();
    assert!(monitor.check().await.unwrap().is_empty());
}

#[tokio::test]
async fn queued_operations_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let net = Network::new();
    let durable = NodeConfig {
        queue: QueueConfig {
            dir: Some(dir.path().to_path_buf()),
            fsync: false,
        },
        ..config(PeerConfig::default())
    };
    let client = Client::new();

    {
        let node = net.node(durable.clone());
        submit(&node, &client.create());
    }

    let node = net.node(durable);
    assert_eq!(node.writer(&ns()).unwrap().cutter().len(), 1);
    anchor(&node).await;
    observe(&node).await;
    assert!(node.resolve(&ns(), &client.did()).is_ok());
}

#[tokio::test]
async fn started_node_anchors_and_observes_on_its_own() {
    let net = Network::new();
    let mut cfg = config(PeerConfig::default());
    cfg.sidetree.batch_writer_timeout_ms = 50;
    cfg.observer.period_ms = 20;
    let node = net.node(cfg);

    node.start().unwrap();
    assert!(matches!(
        node.start(),
        Err(NodeError::Batch(BatchError::AlreadyRunning))
    ));

    let client = Client::new();
    submit(&node, &client.create());
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while node.resolve(&ns(), &client.did()).is_err() {
        assert!(tokio::time::Instant::now() < deadline, "document never resolved");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    node.stop().await;

    assert!(matches!(
        node.submit_operation(&ns(), &Client::new().create()),
        Err(NodeError::Batch(BatchError::Shutdown))
    ));
}
