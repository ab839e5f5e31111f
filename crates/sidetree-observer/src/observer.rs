use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sidetree_cas::CasClient;
use sidetree_ledger::BlockSource;
use sidetree_protocol::ProtocolRegistry;
use sidetree_store::OperationStore;
use sidetree_types::{ChannelId, Endpoint, Namespace};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{ObserverError, ObserverResult};
use crate::fetcher::{AnchorFetcher, AnchorLocation};
use crate::filter::OperationFilter;
use crate::lease::{Lease, LeaseProvider};
use crate::metadata::{Metadata, MetadataStore, SkippedAnchor};

/// Configuration for an [`Observer`].
#[derive(Clone, Debug)]
pub struct ObserverConfig {
    /// Interval between passes when no block arrives.
    pub period: Duration,
    /// Retries after a transient failure on one anchor. The anchor is tried
    /// `max_attempts + 1` times in all and skipped when the last try fails.
    pub max_attempts: u32,
    /// Upper bound on processing one block.
    pub block_deadline: Duration,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(10),
            max_attempts: 3,
            block_deadline: Duration::from_secs(30),
        }
    }
}

/// What one pass over the committed blocks did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub blocks: u64,
    pub anchors: u32,
    pub operations: usize,
    pub skipped: u32,
    pub last_block_processed: u64,
    /// Set when the pass stopped at a block leased to another peer.
    pub deferred_to: Option<Endpoint>,
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Inner {
    channel: ChannelId,
    blocks: Arc<dyn BlockSource>,
    fetcher: AnchorFetcher,
    store: Arc<dyn OperationStore>,
    metadata: Arc<dyn MetadataStore>,
    leases: LeaseProvider,
    namespaces: HashMap<Namespace, Arc<ProtocolRegistry>>,
    config: ObserverConfig,
    /// Passes never overlap.
    pass_lock: tokio::sync::Mutex<()>,
}

/// Per-channel worker that moves anchored operations into the store.
pub struct Observer {
    inner: Arc<Inner>,
    worker: Mutex<Option<Worker>>,
}

impl Observer {
    pub fn new(
        channel: ChannelId,
        blocks: Arc<dyn BlockSource>,
        cas: Arc<dyn CasClient>,
        store: Arc<dyn OperationStore>,
        metadata: Arc<dyn MetadataStore>,
        leases: LeaseProvider,
        namespaces: Vec<Arc<ProtocolRegistry>>,
        config: ObserverConfig,
    ) -> Self {
        let namespaces = namespaces
            .into_iter()
            .map(|r| (r.namespace().clone(), r))
            .collect();
        Self {
            inner: Arc::new(Inner {
                channel,
                blocks,
                fetcher: AnchorFetcher::new(cas),
                store,
                metadata,
                leases,
                namespaces,
                config,
                pass_lock: tokio::sync::Mutex::new(()),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn channel(&self) -> &ChannelId {
        &self.inner.channel
    }

    pub fn metadata(&self) -> ObserverResult<Metadata> {
        self.inner.metadata.get(&self.inner.channel)
    }

    /// Run one pass on the caller's task.
    pub async fn process(&self) -> ObserverResult<PassSummary> {
        self.inner.pass().await
    }

    /// Spawn the worker: a pass per tick and per committed block.
    pub fn start(&self) -> ObserverResult<()> {
        let mut worker = self.worker.lock().expect("lock poisoned");
        if worker.is_some() {
            return Err(ObserverError::AlreadyRunning);
        }
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(&self.inner).run(cancel.clone()));
        *worker = Some(Worker { cancel, handle });
        info!(
            channel = %self.inner.channel,
            namespaces = self.inner.namespaces.len(),
            "observer started"
        );
        Ok(())
    }

    pub async fn stop(&self) {
        let worker = self.worker.lock().expect("lock poisoned").take();
        if let Some(worker) = worker {
            worker.cancel.cancel();
            if let Err(e) = worker.handle.await {
                warn!(channel = %self.inner.channel, error = %e, "observer task failed");
            }
            info!(channel = %self.inner.channel, "observer stopped");
        }
    }
}

impl Inner {
    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = interval(self.config.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut blocks = self.blocks.subscribe();
        let mut subscribed = true;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
                r = blocks.recv(), if subscribed => match r {
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => {
                        warn!(channel = %self.channel, "block subscription closed; polling only");
                        subscribed = false;
                        continue;
                    }
                },
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                r = self.pass() => r,
            };
            match result {
                Ok(s) if s.blocks > 0 || s.skipped > 0 => info!(
                    channel = %self.channel,
                    blocks = s.blocks,
                    ops = s.operations,
                    skipped = s.skipped,
                    block = s.last_block_processed,
                    "observer pass complete"
                ),
                Ok(_) => {}
                Err(e) => warn!(channel = %self.channel, error = %e, "observer pass interrupted"),
            }
        }
    }

    async fn pass(&self) -> ObserverResult<PassSummary> {
        let _guard = self.pass_lock.lock().await;
        let mut md = self.metadata.get(&self.channel)?;
        let height = self.blocks.info().await?.height;
        let mut summary = PassSummary::default();

        let mut number = md.last_block_processed + 1;
        while number < height {
            let lease = self.leases.create_lease(number);
            if !lease.is_local_owner() {
                debug!(block = number, owner = %lease.owner(), "block leased to another peer");
                summary.deferred_to = Some(lease.owner().clone());
                break;
            }
            let work = self.process_block(number, &lease, &mut md, &mut summary);
            match tokio::time::timeout(self.config.block_deadline, work).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(block = number, "block deadline exceeded; releasing lease");
                    return Err(ObserverError::DeadlineExceeded(number));
                }
            }
            number += 1;
        }

        md.lease_owner = Some(self.leases.create_lease(number).owner().clone());
        self.metadata.put(&self.channel, &md)?;
        summary.last_block_processed = md.last_block_processed;
        Ok(summary)
    }

    async fn process_block(
        &self,
        number: u64,
        lease: &Lease,
        md: &mut Metadata,
        summary: &mut PassSummary,
    ) -> ObserverResult<()> {
        let block = self.blocks.block_by_number(number).await?;
        let start = md.resume_anchor(number);

        for (index, record) in block.anchors.iter().enumerate().skip(start) {
            if !lease.valid() {
                warn!(block = number, "lease lost mid-block");
                return Err(ObserverError::LeaseLost(number));
            }
            let location = AnchorLocation {
                block: number,
                anchor_index: index as u32,
            };
            let outcome = match self.namespaces.get(&record.namespace) {
                Some(registry) => self.process_anchor(registry, location, &record.anchor_string).await,
                None => {
                    debug!(block = number, namespace = %record.namespace, "anchor for unserved namespace");
                    Ok(0)
                }
            };

            match outcome {
                Ok(stored) => {
                    summary.anchors += 1;
                    summary.operations += stored;
                    md.failed_attempts = 0;
                    md.last_error_code = None;
                }
                Err(e) if e.is_transient() && md.failed_attempts < self.config.max_attempts => {
                    md.failed_attempts += 1;
                    md.last_error_code = Some(e.code());
                    warn!(
                        block = number,
                        anchor = index,
                        attempt = md.failed_attempts,
                        error = %e,
                        "anchor deferred"
                    );
                    self.metadata.put(&self.channel, md)?;
                    return Err(e);
                }
                Err(e) => {
                    error!(
                        block = number,
                        anchor = index,
                        anchor_string = %record.anchor_string,
                        error = %e,
                        "anchor skipped"
                    );
                    md.skipped.push(SkippedAnchor {
                        block: number,
                        anchor_index: index as u32,
                        anchor_string: record.anchor_string.clone(),
                        code: e.code(),
                        reason: e.to_string(),
                    });
                    md.failed_attempts = 0;
                    md.last_error_code = Some(e.code());
                    summary.skipped += 1;
                }
            }
            md.last_anchor_processed = Some(index as u32);
            self.metadata.put(&self.channel, md)?;
        }

        md.last_block_processed = number;
        md.last_anchor_processed = None;
        self.metadata.put(&self.channel, md)?;
        summary.blocks += 1;
        Ok(())
    }

    async fn process_anchor(
        &self,
        registry: &ProtocolRegistry,
        location: AnchorLocation,
        anchor_string: &str,
    ) -> ObserverResult<usize> {
        let ops = self.fetcher.fetch(registry, location, anchor_string).await?;
        let total = ops.len();
        let kept = OperationFilter::new(self.store.as_ref(), registry).filter(ops)?;
        if !kept.is_empty() {
            self.store.put(&kept)?;
        }
        debug!(
            block = location.block,
            anchor = location.anchor_index,
            ops = kept.len(),
            filtered = total - kept.len(),
            "anchor stored"
        );
        Ok(kept.len())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;
    use sidetree_cas::{CasError, CasResult, InMemoryCas};
    use sidetree_ledger::{AnchorWriter, BlockCutting, InMemoryBlockchain};
    use sidetree_store::InMemoryOperationStore;
    use sidetree_types::{AnchorString, CasAddress};

    use super::*;
    use crate::discovery::{Discovery, Member, Role, StaticDiscovery};
    use crate::error::ErrorCode;
    use crate::metadata::InMemoryMetadataStore;
    use crate::testing::{anchor_batch, ns, registry, Doc};

    /// CAS whose reads can be switched off.
    #[derive(Default)]
    struct SwitchableCas {
        inner: InMemoryCas,
        offline: AtomicBool,
    }

    #[async_trait]
    impl CasClient for SwitchableCas {
        async fn put(&self, content: Bytes) -> CasResult<CasAddress> {
            self.inner.put(content).await
        }

        async fn get(&self, address: &CasAddress) -> CasResult<Bytes> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(CasError::Transient("cas offline".into()));
            }
            self.inner.get(address).await
        }
    }

    struct Harness {
        chain: Arc<InMemoryBlockchain>,
        cas: Arc<SwitchableCas>,
        store: Arc<InMemoryOperationStore>,
        metadata: Arc<InMemoryMetadataStore>,
    }

    impl Harness {
        fn new(cutting: BlockCutting) -> Self {
            Self {
                chain: InMemoryBlockchain::new(cutting),
                cas: Arc::new(SwitchableCas::default()),
                store: Arc::new(InMemoryOperationStore::new()),
                metadata: Arc::new(InMemoryMetadataStore::new()),
            }
        }

        fn observer_for(&self, leases: LeaseProvider) -> Observer {
            Observer::new(
                ChannelId::new("mychannel"),
                Arc::clone(&self.chain) as Arc<dyn BlockSource>,
                Arc::clone(&self.cas) as Arc<dyn CasClient>,
                Arc::clone(&self.store) as Arc<dyn OperationStore>,
                Arc::clone(&self.metadata) as Arc<dyn MetadataStore>,
                leases,
                vec![Arc::new(registry())],
                ObserverConfig {
                    period: Duration::from_millis(20),
                    ..ObserverConfig::default()
                },
            )
        }

        fn observer(&self) -> Observer {
            let local = Member::new("peer0.org1:7051", "Org1MSP", &[Role::Observer]);
            self.observer_for(LeaseProvider::new(Arc::new(StaticDiscovery::new(local)), false))
        }

        async fn anchor(&self, docs: Vec<sidetree_batch::PendingOperation>) -> AnchorString {
            let anchor = anchor_batch(self.cas.as_ref(), docs).await;
            self.chain
                .writer(Endpoint::new("peer0.org1:7051"))
                .write_anchor(&ns(), &anchor)
                .await
                .unwrap();
            anchor
        }

        fn stored(&self) -> usize {
            self.store.len()
        }
    }

    // -----------------------------------------------------------------------
    // Passes
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn pass_stores_anchored_operations() {
        let h = Harness::new(BlockCutting::PerWrite);
        let mut doc = Doc::new();
        h.anchor(vec![doc.create.clone()]).await;
        h.anchor(vec![doc.update()]).await;

        let summary = h.observer().process().await.unwrap();
        assert_eq!(summary.blocks, 2);
        assert_eq!(summary.operations, 2);
        assert_eq!(summary.last_block_processed, 2);
        assert_eq!(h.store.get(&ns(), &doc.suffix).unwrap().len(), 2);

        let md = h.metadata.get(&ChannelId::new("mychannel")).unwrap();
        assert_eq!(md.last_block_processed, 2);
        assert_eq!(md.last_anchor_processed, None);
        assert_eq!(md.lease_owner, Some(Endpoint::new("peer0.org1:7051")));
    }

    #[tokio::test]
    async fn idle_pass_is_a_no_op() {
        let h = Harness::new(BlockCutting::PerWrite);
        let summary = h.observer().process().await.unwrap();
        assert_eq!(summary.blocks, 0);
        assert_eq!(summary.last_block_processed, 0);
    }

    #[tokio::test]
    async fn reprocessing_from_genesis_stores_nothing_twice() {
        let h = Harness::new(BlockCutting::PerWrite);
        let doc = Doc::new();
        h.anchor(vec![doc.create.clone()]).await;
        let observer = h.observer();
        observer.process().await.unwrap();

        h.metadata
            .put(&ChannelId::new("mychannel"), &Metadata::default())
            .unwrap();
        let summary = observer.process().await.unwrap();
        assert_eq!(summary.blocks, 1);
        assert_eq!(summary.operations, 0);
        assert_eq!(h.stored(), 1);
    }

    #[tokio::test]
    async fn unserved_namespace_is_passed_over() {
        let h = Harness::new(BlockCutting::PerWrite);
        let doc = Doc::new();
        let anchor = anchor_batch(h.cas.as_ref(), vec![doc.create.clone()]).await;
        h.chain
            .writer(Endpoint::new("peer9.org9:7051"))
            .write_anchor(&Namespace::new("did:other").unwrap(), &anchor)
            .await
            .unwrap();

        let summary = h.observer().process().await.unwrap();
        assert_eq!(summary.blocks, 1);
        assert_eq!(h.stored(), 0);
    }

    // -----------------------------------------------------------------------
    // Failures
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn cas_outage_defers_then_recovers() {
        let h = Harness::new(BlockCutting::PerWrite);
        let doc = Doc::new();
        h.anchor(vec![doc.create.clone()]).await;
        let observer = h.observer();

        h.cas.offline.store(true, Ordering::SeqCst);
        for attempt in 1..=3 {
            let err = observer.process().await.unwrap_err();
            assert!(err.is_transient());
            let md = observer.metadata().unwrap();
            assert_eq!(md.failed_attempts, attempt);
            assert_eq!(md.last_error_code, Some(ErrorCode::NotFound));
            assert_eq!(md.last_block_processed, 0);
        }
        assert_eq!(h.stored(), 0);

        h.cas.offline.store(false, Ordering::SeqCst);
        let summary = observer.process().await.unwrap();
        assert_eq!(summary.operations, 1);
        let md = observer.metadata().unwrap();
        assert_eq!(md.failed_attempts, 0);
        assert!(md.skipped.is_empty());
        assert_eq!(md.last_block_processed, 1);
    }

    #[tokio::test]
    async fn anchor_is_skipped_after_max_attempts() {
        let h = Harness::new(BlockCutting::PerWrite);
        let lost = Doc::new();
        let lost_anchor = h.anchor(vec![lost.create.clone()]).await;
        assert!(h.cas.inner.remove(&lost_anchor.core_index));
        let kept = Doc::new();
        h.anchor(vec![kept.create.clone()]).await;
        let observer = h.observer();

        for _ in 0..3 {
            assert!(observer.process().await.is_err());
        }
        let summary = observer.process().await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.blocks, 2);

        let md = observer.metadata().unwrap();
        assert_eq!(md.skipped.len(), 1);
        assert_eq!(md.skipped[0].block, 1);
        assert_eq!(md.skipped[0].code, ErrorCode::NotFound);
        assert!(md.is_skipped(1, 0));
        assert_eq!(md.failed_attempts, 0);
        assert_eq!(h.store.get(&ns(), &kept.suffix).unwrap().len(), 1);
        assert!(h.store.get(&ns(), &lost.suffix).unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_batch_is_skipped_at_once() {
        let h = Harness::new(BlockCutting::Manual);
        let writer = h.chain.writer(Endpoint::new("peer0.org1:7051"));
        let garbage = h
            .cas
            .put(Bytes::from_static(b"not a core index"))
            .await
            .unwrap();
        writer
            .write_anchor(&ns(), &AnchorString::new(garbage, 1))
            .await
            .unwrap();
        let doc = Doc::new();
        let good = anchor_batch(h.cas.as_ref(), vec![doc.create.clone()]).await;
        writer.write_anchor(&ns(), &good).await.unwrap();
        h.chain.commit_block().unwrap();

        let summary = h.observer().process().await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.operations, 1);
        let md = h.metadata.get(&ChannelId::new("mychannel")).unwrap();
        assert_eq!(md.skipped[0].anchor_index, 0);
        assert_eq!(md.skipped[0].code, ErrorCode::Unknown);
        assert_eq!(md.failed_attempts, 0);
    }

    #[tokio::test]
    async fn resumes_inside_a_partially_processed_block() {
        let h = Harness::new(BlockCutting::Manual);
        let writer = h.chain.writer(Endpoint::new("peer0.org1:7051"));
        let first = Doc::new();
        let second = Doc::new();
        let a = anchor_batch(h.cas.as_ref(), vec![first.create.clone()]).await;
        let b = anchor_batch(h.cas.as_ref(), vec![second.create.clone()]).await;
        writer.write_anchor(&ns(), &a).await.unwrap();
        writer.write_anchor(&ns(), &b).await.unwrap();
        h.chain.commit_block().unwrap();

        // Second anchor's core index is unavailable for now.
        let core = h.cas.inner.get(&b.core_index).await.unwrap();
        h.cas.inner.remove(&b.core_index);

        let observer = h.observer();
        assert!(observer.process().await.is_err());
        let md = observer.metadata().unwrap();
        assert_eq!(md.last_block_processed, 0);
        assert_eq!(md.last_anchor_processed, Some(0));
        assert_eq!(h.stored(), 1);

        h.cas.inner.put(core).await.unwrap();
        let summary = observer.process().await.unwrap();
        assert_eq!(summary.anchors, 1);
        assert_eq!(summary.operations, 1);
        assert_eq!(h.stored(), 2);
    }

    // -----------------------------------------------------------------------
    // Leases
    // -----------------------------------------------------------------------

    fn clustered(discovery: &Arc<StaticDiscovery>) -> LeaseProvider {
        LeaseProvider::new(Arc::clone(discovery) as Arc<dyn Discovery>, true)
    }

    fn org1(endpoint: &str) -> Member {
        Member::new(endpoint, "Org1MSP", &[Role::Observer])
    }

    #[tokio::test]
    async fn peers_alternate_blocks_by_lease() {
        let h = Harness::new(BlockCutting::PerWrite);
        let docs: Vec<Doc> = (0..3).map(|_| Doc::new()).collect();
        for doc in &docs {
            h.anchor(vec![doc.create.clone()]).await;
        }

        let d0 = Arc::new(StaticDiscovery::new(org1("peer0.org1:7051")).with_peer(org1("peer1.org1:7051")));
        let d1 = Arc::new(StaticDiscovery::new(org1("peer1.org1:7051")).with_peer(org1("peer0.org1:7051")));
        let p0 = h.observer_for(clustered(&d0));
        let p1 = h.observer_for(clustered(&d1));

        // Block 1 belongs to peer1.
        let s = p0.process().await.unwrap();
        assert_eq!(s.blocks, 0);
        assert_eq!(s.deferred_to, Some(Endpoint::new("peer1.org1:7051")));

        let s = p1.process().await.unwrap();
        assert_eq!(s.blocks, 1);
        assert_eq!(s.deferred_to, Some(Endpoint::new("peer0.org1:7051")));
        assert_eq!(
            p1.metadata().unwrap().lease_owner,
            Some(Endpoint::new("peer0.org1:7051"))
        );

        let s = p0.process().await.unwrap();
        assert_eq!(s.blocks, 1);
        let s = p1.process().await.unwrap();
        assert_eq!(s.blocks, 1);
        assert_eq!(s.last_block_processed, 3);
        assert_eq!(h.stored(), 3);
    }

    #[tokio::test]
    async fn dead_peer_lease_moves_to_survivor() {
        let h = Harness::new(BlockCutting::PerWrite);
        let doc = Doc::new();
        h.anchor(vec![doc.create.clone()]).await;

        let d0 = Arc::new(StaticDiscovery::new(org1("peer0.org1:7051")).with_peer(org1("peer1.org1:7051")));
        let p0 = h.observer_for(clustered(&d0));
        assert_eq!(p0.process().await.unwrap().blocks, 0);

        d0.set_alive(&Endpoint::new("peer1.org1:7051"), false);
        let s = p0.process().await.unwrap();
        assert_eq!(s.blocks, 1);
        assert_eq!(h.stored(), 1);
    }

    // -----------------------------------------------------------------------
    // Worker
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn worker_follows_new_blocks() {
        let h = Harness::new(BlockCutting::PerWrite);
        let observer = h.observer();
        observer.start().unwrap();
        assert!(matches!(observer.start(), Err(ObserverError::AlreadyRunning)));

        let doc = Doc::new();
        h.anchor(vec![doc.create.clone()]).await;

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while h.stored() == 0 {
            assert!(tokio::time::Instant::now() < deadline, "observer never caught up");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        observer.stop().await;
        observer.stop().await;
        assert_eq!(observer.metadata().unwrap().last_block_processed, 1);
    }
}
