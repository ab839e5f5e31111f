use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use serde::{Deserialize, Serialize};
use sidetree_types::{ChannelId, Endpoint};
use tracing::debug;

use crate::error::{ErrorCode, ObserverError, ObserverResult};

/// An anchor the observer gave up on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedAnchor {
    pub block: u64,
    pub anchor_index: u32,
    pub anchor_string: String,
    pub code: ErrorCode,
    pub reason: String,
}

/// Per-channel observer checkpoint.
///
/// `last_block_processed` is the last block whose anchors were all handled.
/// `last_anchor_processed` is progress inside the following block.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub last_block_processed: u64,
    pub last_anchor_processed: Option<u32>,
    pub lease_owner: Option<Endpoint>,
    pub failed_attempts: u32,
    pub last_error_code: Option<ErrorCode>,
    pub skipped: Vec<SkippedAnchor>,
}

impl Metadata {
    /// First anchor index still to handle in `block`.
    pub fn resume_anchor(&self, block: u64) -> usize {
        if block == self.last_block_processed + 1 {
            self.last_anchor_processed.map_or(0, |a| a as usize + 1)
        } else {
            0
        }
    }

    pub fn is_skipped(&self, block: u64, anchor_index: u32) -> bool {
        self.skipped
            .iter()
            .any(|s| s.block == block && s.anchor_index == anchor_index)
    }
}

/// Durable home for [`Metadata`]. Shared by the peers of one organization.
pub trait MetadataStore: Send + Sync {
    /// The stored metadata, or the default (genesis processed) if none.
    fn get(&self, channel: &ChannelId) -> ObserverResult<Metadata>;

    fn put(&self, channel: &ChannelId, metadata: &Metadata) -> ObserverResult<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    entries: RwLock<HashMap<ChannelId, Metadata>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn get(&self, channel: &ChannelId) -> ObserverResult<Metadata> {
        Ok(self
            .entries
            .read()
            .expect("lock poisoned")
            .get(channel)
            .cloned()
            .unwrap_or_default())
    }

    fn put(&self, channel: &ChannelId, metadata: &Metadata) -> ObserverResult<()> {
        self.entries
            .write()
            .expect("lock poisoned")
            .insert(channel.clone(), metadata.clone());
        Ok(())
    }
}

/// One JSON file per channel, replaced atomically via rename.
#[derive(Debug)]
pub struct FileMetadataStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileMetadataStore {
    pub fn open(dir: &Path) -> ObserverResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    fn path(&self, channel: &ChannelId) -> PathBuf {
        let name: String = channel
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.observer.json"))
    }
}

impl MetadataStore for FileMetadataStore {
    fn get(&self, channel: &ChannelId) -> ObserverResult<Metadata> {
        let path = self.path(channel);
        if !path.exists() {
            return Ok(Metadata::default());
        }
        let bytes = fs::read(&path)?;
        serde_json::from_slice(&bytes).map_err(|e| ObserverError::Serialization(e.to_string()))
    }

    fn put(&self, channel: &ChannelId, metadata: &Metadata) -> ObserverResult<()> {
        let json = serde_json::to_vec_pretty(metadata)
            .map_err(|e| ObserverError::Serialization(e.to_string()))?;
        let path = self.path(channel);
        let tmp = path.with_extension("json.tmp");

        let _guard = self.write_lock.lock().expect("lock poisoned");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        debug!(
            %channel,
            block = metadata.last_block_processed,
            "observer metadata saved"
        );
        Ok(())
    }
}
