use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use sidetree_cas::CasClient;
use sidetree_ledger::{AnchorWriter, TxnId};
use sidetree_protocol::ProtocolRegistry;
use sidetree_types::{AnchorString, Namespace};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::builder::{ArtifactBuilder, BuiltBatch, Partitioned};
use crate::cutter::{BatchCutter, CutResult};
use crate::error::{BatchError, BatchResult};
use crate::queue::QueuedOperation;

/// Configuration for a [`BatchWriter`].
#[derive(Clone, Debug)]
pub struct WriterConfig {
    /// Longest an operation waits before a forced cut; also bounds backoff.
    pub batch_timeout: Duration,
    /// Time allowed for the final forced cut on `stop`.
    pub stop_grace: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            batch_timeout: Duration::from_millis(1000),
            stop_grace: Duration::from_secs(5),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriterState {
    Stopped,
    Running,
    Draining,
}

/// A batch anchored on the ledger.
#[derive(Clone, Debug)]
pub struct BatchReceipt {
    pub batch_id: Uuid,
    pub anchor: AnchorString,
    pub txn: TxnId,
    pub operations: usize,
    pub dropped: usize,
}

/// Outcome of one cut-and-write step.
#[derive(Clone, Debug)]
pub enum Tick {
    Empty,
    Pending { size: usize },
    Written(BatchReceipt),
    /// Every cut operation failed revalidation; nothing was anchored.
    Dropped { count: usize },
}

/// Counters since construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub batches: u64,
    pub operations: u64,
    pub dropped: u64,
    pub failures: u64,
}

#[derive(Default)]
struct Counters {
    batches: AtomicU64,
    operations: AtomicU64,
    dropped: AtomicU64,
    failures: AtomicU64,
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Inner {
    namespace: Namespace,
    cutter: Arc<BatchCutter>,
    protocols: Arc<ProtocolRegistry>,
    cas: Arc<dyn CasClient>,
    anchors: Arc<dyn AnchorWriter>,
    config: WriterConfig,
    state: RwLock<WriterState>,
    counters: Counters,
}

/// Per-namespace worker that drains the cutter into anchored batches.
///
/// State machine: `Stopped -> Running -> Draining -> Stopped`. Failed
/// uploads or anchor writes return the batch to the head of the queue and
/// are retried with backoff bounded by the batch timeout.
pub struct BatchWriter {
    inner: Arc<Inner>,
    worker: Mutex<Option<Worker>>,
}

impl BatchWriter {
    pub fn new(
        cutter: Arc<BatchCutter>,
        protocols: Arc<ProtocolRegistry>,
        cas: Arc<dyn CasClient>,
        anchors: Arc<dyn AnchorWriter>,
        config: WriterConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                namespace: cutter.namespace().clone(),
                cutter,
                protocols,
                cas,
                anchors,
                config,
                state: RwLock::new(WriterState::Stopped),
                counters: Counters::default(),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.inner.namespace
    }

    pub fn cutter(&self) -> &Arc<BatchCutter> {
        &self.inner.cutter
    }

    pub fn state(&self) -> WriterState {
        *self.inner.state.read().expect("lock poisoned")
    }

    pub fn stats(&self) -> WriterStats {
        let c = &self.inner.counters;
        WriterStats {
            batches: c.batches.load(Ordering::Relaxed),
            operations: c.operations.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
        }
    }

    /// Spawn the worker loop. Must be called inside a tokio runtime.
    pub fn start(&self) -> BatchResult<()> {
        let mut worker = self.worker.lock().expect("lock poisoned");
        if worker.is_some() {
            return Err(BatchError::AlreadyRunning);
        }
        self.inner.cutter.reopen();
        self.inner.set_state(WriterState::Running);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(&self.inner).run(cancel.clone()));
        *worker = Some(Worker { cancel, handle });

        info!(
            namespace = %self.inner.namespace,
            timeout_ms = self.inner.config.batch_timeout.as_millis() as u64,
            "batch writer started"
        );
        Ok(())
    }

    /// Stop accepting operations, cancel the loop, and make one final forced
    /// cut within the grace period. Idempotent.
    pub async fn stop(&self) {
        let worker = self.worker.lock().expect("lock poisoned").take();
        let Some(worker) = worker else {
            return;
        };
        self.inner.set_state(WriterState::Draining);
        self.inner.cutter.close();
        worker.cancel.cancel();
        if let Err(e) = worker.handle.await {
            warn!(namespace = %self.inner.namespace, error = %e, "batch writer task failed");
        }

        self.inner.drain().await;
        self.inner.set_state(WriterState::Stopped);
        info!(
            namespace = %self.inner.namespace,
            remaining = self.inner.cutter.len(),
            "batch writer stopped"
        );
    }

    /// Run one cut-and-write step on the caller's task.
    pub async fn tick(&self, force: bool) -> BatchResult<Tick> {
        self.inner.write_once(force, &CancellationToken::new()).await
    }
}

impl Inner {
    fn set_state(&self, state: WriterState) {
        *self.state.write().expect("lock poisoned") = state;
    }

    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let timeout = self.config.batch_timeout;
        // Start of the current batching window; `None` while the queue is idle.
        let mut window: Option<Instant> = None;
        let mut backoff: Option<Duration> = None;

        loop {
            let wait = backoff.unwrap_or_else(|| match window {
                Some(opened) => timeout.saturating_sub(opened.elapsed()),
                None => timeout,
            });
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
                _ = self.cutter.added(), if backoff.is_none() => {}
            }

            let opened = *window.get_or_insert_with(Instant::now);
            let force = backoff.is_some() || opened.elapsed() >= timeout;
            match self.write_once(force, &cancel).await {
                Ok(Tick::Pending { .. }) => {}
                Ok(Tick::Empty) => {
                    window = None;
                    backoff = None;
                }
                Ok(_) => {
                    window = Some(Instant::now());
                    backoff = None;
                }
                Err(BatchError::Shutdown) => break,
                Err(e) if e.is_retryable() => {
                    let next = next_backoff(backoff, timeout);
                    warn!(
                        namespace = %self.namespace,
                        error = %e,
                        retry_ms = next.as_millis() as u64,
                        "batch write failed; requeued"
                    );
                    backoff = Some(next);
                }
                Err(e) => {
                    error!(namespace = %self.namespace, error = %e, "batch dropped");
                    window = Some(Instant::now());
                    backoff = None;
                }
            }
        }
        debug!(namespace = %self.namespace, "batch writer loop exited");
    }

    async fn drain(&self) {
        let token = CancellationToken::new();
        let timer = {
            let token = token.clone();
            let grace = self.config.stop_grace;
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                token.cancel();
            })
        };
        match self.write_once(true, &token).await {
            Ok(Tick::Written(receipt)) => {
                debug!(namespace = %self.namespace, ops = receipt.operations, "final batch written")
            }
            Ok(_) => {}
            Err(e) => warn!(namespace = %self.namespace, error = %e, "final batch not written"),
        }
        timer.abort();
    }

    async fn write_once(&self, force: bool, cancel: &CancellationToken) -> BatchResult<Tick> {
        if cancel.is_cancelled() {
            return Err(BatchError::Shutdown);
        }
        let ops = match self.cutter.cut(force)? {
            CutResult::Empty => return Ok(Tick::Empty),
            CutResult::Pending { size } => return Ok(Tick::Pending { size }),
            CutResult::Ready(ops) => ops,
        };

        let params = self.protocols.current();
        let builder = ArtifactBuilder::new(params, self.cas.as_ref());
        let mut parts = builder.partition(ops);
        let deferred = std::mem::take(&mut parts.deferred);
        let dropped = parts.dropped.len();
        if dropped > 0 {
            self.cutter.ack(&parts.dropped)?;
            self.counters
                .dropped
                .fetch_add(dropped as u64, Ordering::Relaxed);
        }
        if parts.is_empty() {
            self.requeue_deferred(deferred)?;
            return Ok(Tick::Dropped { count: dropped });
        }

        let batch_id = Uuid::now_v7();
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(BatchError::Shutdown),
            r = self.publish(&builder, &parts) => r,
        };

        match result {
            Ok((built, txn)) => {
                let operations = parts.len();
                self.cutter.ack(&parts.into_included())?;
                self.requeue_deferred(deferred)?;
                self.counters.batches.fetch_add(1, Ordering::Relaxed);
                self.counters
                    .operations
                    .fetch_add(operations as u64, Ordering::Relaxed);
                info!(
                    namespace = %self.namespace,
                    %batch_id,
                    anchor = %built.anchor,
                    ops = operations,
                    dropped,
                    "batch anchored"
                );
                Ok(Tick::Written(BatchReceipt {
                    batch_id,
                    anchor: built.anchor,
                    txn,
                    operations,
                    dropped,
                }))
            }
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                let included = parts.into_included();
                if e.is_retryable() || matches!(e, BatchError::Shutdown) {
                    let mut all = included;
                    all.extend(deferred);
                    self.cutter.requeue(in_enqueue_order(all))?;
                } else {
                    self.cutter.ack(&included)?;
                    self.requeue_deferred(deferred)?;
                    self.counters
                        .dropped
                        .fetch_add(included.len() as u64, Ordering::Relaxed);
                }
                debug!(namespace = %self.namespace, %batch_id, error = %e, "batch not anchored");
                Err(e)
            }
        }
    }

    /// Return operations held back by partitioning to the queue head.
    fn requeue_deferred(&self, deferred: Vec<QueuedOperation>) -> BatchResult<()> {
        if deferred.is_empty() {
            return Ok(());
        }
        debug!(namespace = %self.namespace, ops = deferred.len(), "operations deferred to next cut");
        self.cutter.requeue(deferred)
    }

    async fn publish(
        &self,
        builder: &ArtifactBuilder<'_>,
        parts: &Partitioned,
    ) -> BatchResult<(BuiltBatch, TxnId)> {
        let built = builder.upload(parts).await?;
        let txn = self
            .anchors
            .write_anchor(&self.namespace, &built.anchor)
            .await?;
        Ok((built, txn))
    }
}

fn in_enqueue_order(mut ops: Vec<QueuedOperation>) -> Vec<QueuedOperation> {
    ops.sort_by_key(|q| q.seq);
    ops
}

fn next_backoff(current: Option<Duration>, cap: Duration) -> Duration {
    let floor = (cap / 8).max(Duration::from_millis(10));
    match current {
        None => floor.min(cap),
        Some(d) => (d * 2).min(cap),
    }
}
