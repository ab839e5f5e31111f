use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use sidetree_resolver::Resolver;
use sidetree_types::{ChannelId, Namespace};
use tracing::info;

use crate::document::{CacheConfig, DocumentCache};

/// One [`DocumentCache`] per `(channel, namespace)`, created on first use.
#[derive(Default)]
pub struct DocumentCacheProvider {
    caches: RwLock<HashMap<(ChannelId, Namespace), Arc<DocumentCache>>>,
}

impl DocumentCacheProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, channel: &ChannelId, namespace: &Namespace) -> Option<Arc<DocumentCache>> {
        self.caches
            .read()
            .get(&(channel.clone(), namespace.clone()))
            .cloned()
    }

    /// Return the existing cache for the resolver's namespace, or build one.
    ///
    /// `config` only applies when the cache is created.
    pub fn get_or_create(
        &self,
        channel: &ChannelId,
        resolver: Resolver,
        config: &CacheConfig,
    ) -> Arc<DocumentCache> {
        let key = (channel.clone(), resolver.namespace().clone());
        if let Some(cache) = self.caches.read().get(&key) {
            return Arc::clone(cache);
        }
        let mut caches = self.caches.write();
        Arc::clone(caches.entry(key).or_insert_with(|| {
            info!(
                channel = %channel,
                namespace = %resolver.namespace(),
                size = config.effective_size(),
                "document cache created"
            );
            Arc::new(DocumentCache::new(resolver, config))
        }))
    }

    pub fn len(&self) -> usize {
        self.caches.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for DocumentCacheProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentCacheProvider")
            .field("caches", &self.len())
            .finish()
    }
}
