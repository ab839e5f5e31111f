use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use sidetree_types::{CasAddress, HashAlgorithm};
use tracing::debug;

use crate::error::{CasError, CasResult};
use crate::traits::{content_address, CasClient};

/// In-memory, HashMap-based CAS.
///
/// Intended for tests and embedding. Content is held behind a `RwLock`;
/// `Bytes` clones are reference-counted so reads do not copy.
pub struct InMemoryCas {
    algorithm: HashAlgorithm,
    objects: RwLock<HashMap<CasAddress, Bytes>>,
}

impl InMemoryCas {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            objects: RwLock::new(HashMap::new()),
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    pub fn contains(&self, address: &CasAddress) -> bool {
        self.objects
            .read()
            .expect("lock poisoned")
            .contains_key(address)
    }

    /// Drop an object; used to simulate lost replicas.
    pub fn remove(&self, address: &CasAddress) -> bool {
        self.objects
            .write()
            .expect("lock poisoned")
            .remove(address)
            .is_some()
    }
}

impl Default for InMemoryCas {
    fn default() -> Self {
        Self::new(HashAlgorithm::Sha2_256)
    }
}

#[async_trait]
impl CasClient for InMemoryCas {
    async fn put(&self, content: Bytes) -> CasResult<CasAddress> {
        let address = content_address(self.algorithm, &content);
        let mut map = self.objects.write().expect("lock poisoned");
        map.entry(address.clone()).or_insert(content);
        debug!(address = %address.short(), "cas put");
        Ok(address)
    }

    async fn get(&self, address: &CasAddress) -> CasResult<Bytes> {
        let map = self.objects.read().expect("lock poisoned");
        map.get(address)
            .cloned()
            .ok_or_else(|| CasError::NotFound(address.clone()))
    }
}

impl std::fmt::Debug for InMemoryCas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCas")
            .field("algorithm", &self.algorithm)
            .field("object_count", &self.len())
            .finish()
    }
}
