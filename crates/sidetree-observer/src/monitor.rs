use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sidetree_cas::CasClient;
use sidetree_ledger::BlockSource;
use sidetree_protocol::ProtocolRegistry;
use sidetree_store::OperationStore;
use sidetree_types::{ChannelId, Endpoint, Namespace};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{ObserverError, ObserverResult};
use crate::fetcher::{AnchorFetcher, AnchorLocation};
use crate::filter::OperationFilter;
use crate::metadata::MetadataStore;

#[derive(Clone, Debug)]
pub struct MonitorConfig {
    /// Zero disables the monitor.
    pub period: Duration,
    /// Blocks an unprocessed local anchor may trail the chain head.
    pub lag_threshold_blocks: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(60),
            lag_threshold_blocks: 10,
        }
    }
}

/// Something an operator should look at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Alert {
    /// A processed local anchor whose operations never reached the store.
    MissingOperations {
        block: u64,
        anchor_index: u32,
        anchor_string: String,
        missing: usize,
    },
    /// A local anchor the observer has not reached after `lag` blocks.
    ObserverLagging {
        block: u64,
        anchor_index: u32,
        lag: u64,
    },
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Inner {
    channel: ChannelId,
    local: Endpoint,
    blocks: Arc<dyn BlockSource>,
    fetcher: AnchorFetcher,
    store: Arc<dyn OperationStore>,
    metadata: Arc<dyn MetadataStore>,
    namespaces: HashMap<Namespace, Arc<ProtocolRegistry>>,
    config: MonitorConfig,
    /// Next block to verify.
    cursor: tokio::sync::Mutex<u64>,
    alerts: broadcast::Sender<Alert>,
}

/// Read-only checker for anchors this peer wrote.
///
/// Never mutates the store or the observer checkpoint. Blocks the observer
/// has finished are verified once; the first unfinished block is rechecked
/// for lag on every run.
pub struct Monitor {
    inner: Arc<Inner>,
    worker: Mutex<Option<Worker>>,
}

impl Monitor {
    pub fn new(
        channel: ChannelId,
        local: Endpoint,
        blocks: Arc<dyn BlockSource>,
        cas: Arc<dyn CasClient>,
        store: Arc<dyn OperationStore>,
        metadata: Arc<dyn MetadataStore>,
        namespaces: Vec<Arc<ProtocolRegistry>>,
        config: MonitorConfig,
    ) -> Self {
        let (alerts, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Inner {
                channel,
                local,
                blocks,
                fetcher: AnchorFetcher::new(cas),
                store,
                metadata,
                namespaces: namespaces
                    .into_iter()
                    .map(|r| (r.namespace().clone(), r))
                    .collect(),
                config,
                cursor: tokio::sync::Mutex::new(1),
                alerts,
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.inner.alerts.subscribe()
    }

    pub async fn check(&self) -> ObserverResult<Vec<Alert>> {
        self.inner.check().await
    }

    pub fn start(&self) -> ObserverResult<()> {
        if self.inner.config.period.is_zero() {
            info!(channel = %self.inner.channel, "monitor disabled");
            return Ok(());
        }
        let mut worker = self.worker.lock().expect("lock poisoned");
        if worker.is_some() {
            return Err(ObserverError::AlreadyRunning);
        }
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(&self.inner).run(cancel.clone()));
        *worker = Some(Worker { cancel, handle });
        Ok(())
    }

    pub async fn stop(&self) {
        let worker = self.worker.lock().expect("lock poisoned").take();
        if let Some(worker) = worker {
            worker.cancel.cancel();
            if let Err(e) = worker.handle.await {
                warn!(channel = %self.inner.channel, error = %e, "monitor task failed");
            }
        }
    }
}

impl Inner {
    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = interval(self.config.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                r = self.check() => r,
            };
            if let Err(e) = result {
                warn!(channel = %self.channel, error = %e, "monitor check failed");
            }
        }
    }

    async fn check(&self) -> ObserverResult<Vec<Alert>> {
        let mut cursor = self.cursor.lock().await;
        let md = self.metadata.get(&self.channel)?;
        let height = self.blocks.info().await?.height;
        let mut alerts = Vec::new();

        while *cursor < height {
            let number = *cursor;
            let block = self.blocks.block_by_number(number).await?;
            let processed = number <= md.last_block_processed;

            for (index, record) in block.anchors_from(&self.local) {
                let Some(registry) = self.namespaces.get(&record.namespace) else {
                    continue;
                };
                if !processed {
                    let lag = height - 1 - number;
                    if lag > self.config.lag_threshold_blocks {
                        alerts.push(Alert::ObserverLagging {
                            block: number,
                            anchor_index: index,
                            lag,
                        });
                    }
                    continue;
                }
                if md.is_skipped(number, index) {
                    continue;
                }
                let location = AnchorLocation {
                    block: number,
                    anchor_index: index,
                };
                let ops = self
                    .fetcher
                    .fetch(registry, location, &record.anchor_string)
                    .await?;
                // Whatever the filter still admits was never stored.
                let missing = OperationFilter::new(self.store.as_ref(), registry)
                    .filter(ops)?
                    .len();
                if missing > 0 {
                    alerts.push(Alert::MissingOperations {
                        block: number,
                        anchor_index: index,
                        anchor_string: record.anchor_string.clone(),
                        missing,
                    });
                }
            }

            if !processed {
                break;
            }
            *cursor += 1;
        }

        for alert in &alerts {
            match alert {
                Alert::MissingOperations { block, anchor_index, missing, .. } => error!(
                    channel = %self.channel,
                    block,
                    anchor = anchor_index,
                    missing,
                    "anchored operations missing from store"
                ),
                Alert::ObserverLagging { block, anchor_index, lag } => warn!(
                    channel = %self.channel,
                    block,
                    anchor = anchor_index,
                    lag,
                    "observer lagging behind local anchor"
                ),
            }
            // No subscribers is fine.
            let _ = self.alerts.send(alert.clone());
        }
        Ok(alerts)
    }
}
