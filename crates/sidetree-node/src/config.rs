//! Node configuration.
//!
//! Every section has defaults, so a TOML file only names what differs:
//!
//! ```toml
//! [peer]
//! endpoint = "peer0.org1.example.com:7051"
//! roles = ["batch-writer", "observer", "resolver"]
//!
//! [[namespaces]]
//! namespace = "did:sidetree"
//! channel = "mychannel"
//!
//! [[namespaces.protocols]]
//! generation_time = 0
//! max_operations_per_batch = 100
//! ```

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sidetree_batch::{WalSync, WriterConfig};
use sidetree_cache::CacheConfig;
use sidetree_observer::{Member, Role};
use sidetree_protocol::ProtocolParameters;
use sidetree_resolver::DocumentType;
use sidetree_types::{ChannelId, Namespace};

use crate::error::{NodeError, NodeResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SidetreeConfig {
    /// Longest an operation waits in the queue before a forced cut.
    pub batch_writer_timeout_ms: u64,
}

impl Default for SidetreeConfig {
    fn default() -> Self {
        Self {
            batch_writer_timeout_ms: 1000,
        }
    }
}

impl SidetreeConfig {
    pub fn writer_config(&self) -> WriterConfig {
        WriterConfig {
            batch_timeout: Duration::from_millis(self.batch_writer_timeout_ms),
            ..WriterConfig::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    pub endpoint: String,
    pub msp_id: String,
    pub roles: BTreeSet<Role>,
    /// Share block processing with the other observers of this MSP.
    pub clustered: bool,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            endpoint: "localhost:7051".into(),
            msp_id: "Org1MSP".into(),
            roles: [Role::BatchWriter, Role::Observer, Role::Resolver]
                .into_iter()
                .collect(),
            clustered: false,
        }
    }
}

impl PeerConfig {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Active and standby observers both run the observer worker.
    pub fn observes(&self) -> bool {
        self.has_role(Role::Observer) || self.has_role(Role::ObserverStandby)
    }

    /// This peer as discovery describes it.
    pub fn member(&self) -> Member {
        let roles: Vec<Role> = self.roles.iter().copied().collect();
        Member::new(&self.endpoint, &self.msp_id, &roles)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    pub period_ms: u64,
    pub max_attempts: u32,
    pub block_deadline_ms: u64,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            period_ms: 10_000,
            max_attempts: 3,
            block_deadline_ms: 30_000,
        }
    }
}

impl From<&ObserverConfig> for sidetree_observer::ObserverConfig {
    fn from(c: &ObserverConfig) -> Self {
        Self {
            period: Duration::from_millis(c.period_ms),
            max_attempts: c.max_attempts,
            block_deadline: Duration::from_millis(c.block_deadline_ms),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Zero leaves the monitor out.
    pub period_ms: u64,
    pub lag_threshold_blocks: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            period_ms: 0,
            lag_threshold_blocks: 10,
        }
    }
}

impl MonitorConfig {
    pub fn enabled(&self) -> bool {
        self.period_ms > 0
    }
}

impl From<&MonitorConfig> for sidetree_observer::MonitorConfig {
    fn from(c: &MonitorConfig) -> Self {
        Self {
            period: Duration::from_millis(c.period_ms),
            lag_threshold_blocks: c.lag_threshold_blocks,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Directory for per-namespace queue WALs; in-memory queues when unset.
    pub dir: Option<PathBuf>,
    /// `fsync` every queue record.
    pub fsync: bool,
}

impl QueueConfig {
    pub fn sync(&self) -> WalSync {
        if self.fsync {
            WalSync::EveryWrite
        } else {
            WalSync::OsDefault
        }
    }

    /// WAL file for `namespace` under `dir`.
    pub fn wal_path(&self, namespace: &Namespace) -> Option<PathBuf> {
        let name: String = namespace
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.as_ref().map(|d| d.join(format!("{name}.wal")))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceConfig {
    pub namespace: String,
    pub channel: String,
    pub doc_type: DocumentType,
    /// Path the REST handlers for this namespace are mounted under.
    pub base_path: String,
    /// Zero means the cache default.
    pub document_cache_size: usize,
    pub document_expiry_ms: Option<u64>,
    pub protocols: Vec<ProtocolParameters>,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            namespace: "did:sidetree".into(),
            channel: "mychannel".into(),
            doc_type: DocumentType::Did,
            base_path: "/sidetree/0.0.1".into(),
            document_cache_size: 0,
            document_expiry_ms: None,
            protocols: vec![ProtocolParameters::default()],
        }
    }
}

impl NamespaceConfig {
    pub fn namespace(&self) -> NodeResult<Namespace> {
        Namespace::new(self.namespace.as_str()).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn channel(&self) -> ChannelId {
        ChannelId::new(self.channel.as_str())
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            size: self.document_cache_size,
            expiry: self.document_expiry_ms.map(Duration::from_millis),
        }
    }
}

/// Whole-node configuration as stored in one TOML file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub sidetree: SidetreeConfig,
    pub peer: PeerConfig,
    pub observer: ObserverConfig,
    pub monitor: MonitorConfig,
    pub queue: QueueConfig,
    pub namespaces: Vec<NamespaceConfig>,
}

impl NodeConfig {
    pub fn from_toml_str(s: &str) -> NodeResult<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> NodeResult<()> {
        if self.sidetree.batch_writer_timeout_ms == 0 {
            return Err(NodeError::Config(
                "batch_writer_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.peer.endpoint.is_empty() {
            return Err(NodeError::Config("peer endpoint is empty".into()));
        }
        if self.observer.max_attempts == 0 {
            return Err(NodeError::Config("observer max_attempts must be at least 1".into()));
        }
        let mut seen = HashSet::new();
        for ns in &self.namespaces {
            let namespace = ns.namespace()?;
            if !seen.insert(namespace) {
                return Err(NodeError::Config(format!(
                    "namespace {} configured twice",
                    ns.namespace
                )));
            }
            if ns.protocols.is_empty() {
                return Err(NodeError::Config(format!(
                    "namespace {} has no protocol parameters",
                    ns.namespace
                )));
            }
        }
        Ok(())
    }

    fn namespace(&self, namespace: &Namespace) -> NodeResult<&NamespaceConfig> {
        self.namespaces
            .iter()
            .find(|n| n.namespace == namespace.as_str())
            .ok_or_else(|| NodeError::UnknownNamespace(namespace.to_string()))
    }
}

/// Where a node reads its configuration from.
pub trait ConfigSource: Send + Sync {
    fn load_sidetree(&self) -> NodeResult<SidetreeConfig>;

    fn load_peer(&self) -> NodeResult<PeerConfig>;

    fn load_observer(&self) -> NodeResult<ObserverConfig>;

    fn load_monitor(&self) -> NodeResult<MonitorConfig>;

    fn load_queue(&self) -> NodeResult<QueueConfig>;

    fn load_namespaces(&self) -> NodeResult<Vec<NamespaceConfig>>;

    /// Protocol generations for `namespace`, in any order.
    fn load_protocols(&self, namespace: &Namespace) -> NodeResult<Vec<ProtocolParameters>>;
}

/// Configuration held in memory.
#[derive(Clone, Debug, Default)]
pub struct StaticConfigSource {
    config: NodeConfig,
}

impl StaticConfigSource {
    pub fn new(config: NodeConfig) -> NodeResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }
}

impl ConfigSource for StaticConfigSource {
    fn load_sidetree(&self) -> NodeResult<SidetreeConfig> {
        Ok(self.config.sidetree.clone())
    }

    fn load_peer(&self) -> NodeResult<PeerConfig> {
        Ok(self.config.peer.clone())
    }

    fn load_observer(&self) -> NodeResult<ObserverConfig> {
        Ok(self.config.observer.clone())
    }

    fn load_monitor(&self) -> NodeResult<MonitorConfig> {
        Ok(self.config.monitor.clone())
    }

    fn load_queue(&self) -> NodeResult<QueueConfig> {
        Ok(self.config.queue.clone())
    }

    fn load_namespaces(&self) -> NodeResult<Vec<NamespaceConfig>> {
        Ok(self.config.namespaces.clone())
    }

    fn load_protocols(&self, namespace: &Namespace) -> NodeResult<Vec<ProtocolParameters>> {
        Ok(self.config.namespace(namespace)?.protocols.clone())
    }
}

/// Configuration read once from a TOML file.
#[derive(Clone, Debug)]
pub struct TomlConfigSource {
    path: PathBuf,
    inner: StaticConfigSource,
}

impl TomlConfigSource {
    pub fn open(path: &Path) -> NodeResult<Self> {
        let text = fs::read_to_string(path)?;
        let config = NodeConfig::from_toml_str(&text)?;
        tracing::info!(
            path = %path.display(),
            namespaces = config.namespaces.len(),
            "configuration loaded"
        );
        Ok(Self {
            path: path.to_path_buf(),
            inner: StaticConfigSource { config },
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for TomlConfigSource {
    fn load_sidetree(&self) -> NodeResult<SidetreeConfig> {
        self.inner.load_sidetree()
    }

    fn load_peer(&self) -> NodeResult<PeerConfig> {
        self.inner.load_peer()
    }

    fn load_observer(&self) -> NodeResult<ObserverConfig> {
        self.inner.load_observer()
    }

    fn load_monitor(&self) -> NodeResult<MonitorConfig> {
        self.inner.load_monitor()
    }

    fn load_queue(&self) -> NodeResult<QueueConfig> {
        self.inner.load_queue()
    }

    fn load_namespaces(&self) -> NodeResult<Vec<NamespaceConfig>> {
        self.inner.load_namespaces()
    }

    fn load_protocols(&self, namespace: &Namespace) -> NodeResult<Vec<ProtocolParameters>> {
        self.inner.load_protocols(namespace)
    }
}
