use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use sidetree_resolver::{ResolutionResult, ResolveError, ResolveResult, Resolver};
use sidetree_store::MutationListener;
use sidetree_types::{Namespace, UniqueSuffix};
use tracing::{debug, trace};

use crate::arc::ArcCache;

/// Entries held when the configured size is zero.
pub const DEFAULT_CACHE_SIZE: usize = 10_000;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum resident documents; zero means [`DEFAULT_CACHE_SIZE`].
    pub size: usize,
    /// Entries older than this are reloaded.
    pub expiry: Option<Duration>,
}

impl CacheConfig {
    pub fn effective_size(&self) -> usize {
        if self.size == 0 {
            DEFAULT_CACHE_SIZE
        } else {
            self.size
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Resolver runs; concurrent misses on one suffix count once.
    pub loads: u64,
    pub invalidations: u64,
}

struct Entry {
    bytes: Arc<[u8]>,
    stored_at: Instant,
}

type Loaded = ResolveResult<Arc<[u8]>>;

/// One in-progress load that concurrent callers wait on.
#[derive(Default)]
struct Flight {
    result: Mutex<Option<Loaded>>,
    ready: Condvar,
    /// Set by `invalidate`; the result is handed to waiters but not cached.
    stale: AtomicBool,
}

impl Flight {
    fn complete(&self, result: Loaded) {
        *self.result.lock() = Some(result);
        self.ready.notify_all();
    }

    fn wait(&self) -> Loaded {
        let mut result = self.result.lock();
        loop {
            if let Some(r) = result.as_ref() {
                return r.clone();
            }
            self.ready.wait(&mut result);
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    invalidations: AtomicU64,
}

/// Resolution cache for one namespace.
///
/// Lock order is `inflight` then `entries`.
pub struct DocumentCache {
    resolver: Resolver,
    expiry: Option<Duration>,
    entries: Mutex<ArcCache<UniqueSuffix, Entry>>,
    inflight: Mutex<HashMap<UniqueSuffix, Arc<Flight>>>,
    counters: Counters,
}

impl DocumentCache {
    pub fn new(resolver: Resolver, config: &CacheConfig) -> Self {
        Self {
            resolver,
            expiry: config.expiry,
            entries: Mutex::new(ArcCache::new(config.effective_size())),
            inflight: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    pub fn namespace(&self) -> &Namespace {
        self.resolver.namespace()
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            loads: self.counters.loads.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
        }
    }

    /// Resolve `suffix`, returning a copy the caller owns.
    pub fn resolve(&self, suffix: &UniqueSuffix) -> ResolveResult<ResolutionResult> {
        if let Some(bytes) = self.lookup(suffix) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return decode(&bytes);
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let (flight, leader) = {
            let mut inflight = self.inflight.lock();
            if let Some(bytes) = self.lookup(suffix) {
                return decode(&bytes);
            }
            match inflight.get(suffix) {
                Some(flight) => (Arc::clone(flight), false),
                None => {
                    let flight = Arc::new(Flight::default());
                    inflight.insert(suffix.clone(), Arc::clone(&flight));
                    (flight, true)
                }
            }
        };

        if !leader {
            trace!(suffix = %suffix, "joining in-flight resolve");
            return flight.wait().and_then(|bytes| decode(&bytes));
        }

        let mut guard = LeaderGuard {
            cache: self,
            suffix,
            flight: &flight,
            done: false,
        };
        self.counters.loads.fetch_add(1, Ordering::Relaxed);
        let loaded = self
            .resolver
            .resolve_suffix(suffix)
            .and_then(|result| encode(&result));
        guard.finish(loaded.clone());
        loaded.and_then(|bytes| decode(&bytes))
    }

    /// Drop the cached entry; the next resolve reruns the resolver.
    pub fn invalidate(&self, suffix: &UniqueSuffix) {
        let mut inflight = self.inflight.lock();
        if let Some(flight) = inflight.remove(suffix) {
            flight.stale.store(true, Ordering::SeqCst);
        }
        let removed = self.entries.lock().remove(suffix).is_some();
        drop(inflight);
        self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
        debug!(namespace = %self.namespace(), suffix = %suffix, removed, "document invalidated");
    }

    pub fn clear(&self) {
        let mut inflight = self.inflight.lock();
        for (_, flight) in inflight.drain() {
            flight.stale.store(true, Ordering::SeqCst);
        }
        self.entries.lock().clear();
    }

    fn lookup(&self, suffix: &UniqueSuffix) -> Option<Arc<[u8]>> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(suffix) {
            None => return None,
            Some(entry) => self
                .expiry
                .is_some_and(|ttl| entry.stored_at.elapsed() >= ttl),
        };
        if expired {
            entries.remove(suffix);
            trace!(suffix = %suffix, "cache entry expired");
            return None;
        }
        entries.peek(suffix).map(|e| Arc::clone(&e.bytes))
    }

    /// Publish a finished load: cache it unless invalidated meanwhile.
    fn settle(&self, suffix: &UniqueSuffix, flight: &Flight, loaded: &Loaded) {
        let mut inflight = self.inflight.lock();
        if flight.stale.load(Ordering::SeqCst) {
            return;
        }
        inflight.remove(suffix);
        if let Ok(bytes) = loaded {
            self.entries.lock().insert(
                suffix.clone(),
                Entry {
                    bytes: Arc::clone(bytes),
                    stored_at: Instant::now(),
                },
            );
        }
    }
}

/// Releases waiters even if the resolver unwinds.
struct LeaderGuard<'a> {
    cache: &'a DocumentCache,
    suffix: &'a UniqueSuffix,
    flight: &'a Flight,
    done: bool,
}

impl LeaderGuard<'_> {
    fn finish(&mut self, loaded: Loaded) {
        self.cache.settle(self.suffix, self.flight, &loaded);
        self.flight.complete(loaded);
        self.done = true;
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.finish(Err(ResolveError::Malformed("resolve aborted".into())));
        }
    }
}

impl MutationListener for DocumentCache {
    fn on_suffix_mutated(&self, namespace: &Namespace, suffix: &UniqueSuffix) {
        if namespace == self.namespace() {
            self.invalidate(suffix);
        }
    }
}

impl std::fmt::Debug for DocumentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentCache")
            .field("namespace", self.namespace())
            .field("entries", &self.len())
            .field("expiry", &self.expiry)
            .finish()
    }
}

fn encode(result: &ResolutionResult) -> Loaded {
    serde_json::to_vec(result)
        .map(Arc::from)
        .map_err(|e| ResolveError::Malformed(format!("encode resolution: {e}")))
}

fn decode(bytes: &[u8]) -> ResolveResult<ResolutionResult> {
    serde_json::from_slice(bytes)
        .map_err(|e| ResolveError::Malformed(format!("decode resolution: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sidetree_protocol::{
        DocumentKeys, OperationParser, ProtocolParameters, ProtocolRegistry, RequestBuilder,
    };
    use sidetree_crypto::SigningKey;
    use sidetree_resolver::DocumentType;
    use sidetree_store::{InMemoryOperationStore, OperationStore, StoreResult};
    use sidetree_types::{CasAddress, Operation, OperationRequest, Patch, TxnPosition};
    use std::sync::Barrier;
    use std::thread;

    fn ns() -> Namespace {
        Namespace::new("did:sidetree").unwrap()
    }

    fn anchored(request: OperationRequest, t: u64) -> Operation {
        let params = ProtocolParameters::default();
        let parsed = OperationParser::new(&params).validate(request).unwrap();
        Operation {
            namespace: ns(),
            unique_suffix: parsed.unique_suffix,
            position: TxnPosition::new(t, 0, 0),
            protocol_generation: 0,
            anchor_origin: CasAddress::new("EiAanchor").unwrap(),
            request: parsed.request,
        }
    }

    fn replace(tag: &str) -> Vec<Patch> {
        vec![Patch::Replace {
            document: json!({"services": [{"id": tag, "type": "Tag", "serviceEndpoint": "x"}]}),
        }]
    }

    /// Store wrapper that counts reads and can hold them at a barrier.
    struct SlowStore {
        inner: InMemoryOperationStore,
        reads: AtomicU64,
        delay: Duration,
    }

    impl OperationStore for SlowStore {
        fn put(&self, ops: &[Operation]) -> StoreResult<()> {
            self.inner.put(ops)
        }

        fn get(&self, namespace: &Namespace, suffix: &UniqueSuffix) -> StoreResult<Vec<Operation>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            self.inner.get(namespace, suffix)
        }

        fn subscribe(&self, listener: &Arc<dyn MutationListener>) {
            self.inner.subscribe(listener)
        }
    }

    struct Fixture {
        store: Arc<SlowStore>,
        cache: Arc<DocumentCache>,
        keys: DocumentKeys,
        suffix: UniqueSuffix,
    }

    fn fixture(config: CacheConfig, delay: Duration) -> Fixture {
        let store = Arc::new(SlowStore {
            inner: InMemoryOperationStore::new(),
            reads: AtomicU64::new(0),
            delay,
        });
        let keys = DocumentKeys::generate();
        let create = anchored(RequestBuilder::default().create(&keys, replace("v0")).unwrap(), 1);
        let suffix = create.unique_suffix.clone();
        store.put(&[create]).unwrap();

        let protocols =
            Arc::new(ProtocolRegistry::new(ns(), vec![ProtocolParameters::default()]).unwrap());
        let resolver = Resolver::new(
            protocols,
            Arc::clone(&store) as Arc<dyn OperationStore>,
            DocumentType::Did,
        );
        let cache = Arc::new(DocumentCache::new(resolver, &config));
        store.subscribe(&(Arc::clone(&cache) as Arc<dyn MutationListener>));
        Fixture {
            store,
            cache,
            keys,
            suffix,
        }
    }

    impl Fixture {
        fn update(&mut self, tag: &str, t: u64) {
            let next = SigningKey::generate();
            let request = RequestBuilder::default()
                .update(&self.suffix, &self.keys.update, &next, replace(tag))
                .unwrap();
            self.keys.update = next;
            self.store.put(&[anchored(request, t)]).unwrap();
        }

        fn reads(&self) -> u64 {
            self.store.reads.load(Ordering::SeqCst)
        }
    }

    fn service_id(result: &ResolutionResult) -> &str {
        result.document["services"][0]["id"].as_str().unwrap()
    }

    // ---- hits and copies ----

    #[test]
    fn second_resolve_is_a_hit() {
        let f = fixture(CacheConfig::default(), Duration::ZERO);
        let a = f.cache.resolve(&f.suffix).unwrap();
        let b = f.cache.resolve(&f.suffix).unwrap();
        assert_eq!(a, b);
        assert_eq!(f.reads(), 1);
        assert_eq!(
            f.cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                loads: 1,
                invalidations: 0
            }
        );
    }

    #[test]
    fn callers_get_independent_copies() {
        let f = fixture(CacheConfig::default(), Duration::ZERO);
        let mut first = f.cache.resolve(&f.suffix).unwrap();
        first.document["services"] = json!([]);
        let second = f.cache.resolve(&f.suffix).unwrap();
        assert_eq!(service_id(&second), "v0");
    }

    #[test]
    fn errors_are_not_cached() {
        let f = fixture(CacheConfig::default(), Duration::ZERO);
        let missing = UniqueSuffix::new("EiAmissing").unwrap();
        assert!(f.cache.resolve(&missing).unwrap_err().is_not_found());
        assert!(f.cache.resolve(&missing).unwrap_err().is_not_found());
        assert_eq!(f.reads(), 2);
        assert!(f.cache.is_empty());
    }

    // ---- invalidation ----

    #[test]
    fn store_append_invalidates_synchronously() {
        let mut f = fixture(CacheConfig::default(), Duration::ZERO);
        assert_eq!(service_id(&f.cache.resolve(&f.suffix).unwrap()), "v0");
        f.update("v1", 2);
        assert_eq!(f.cache.len(), 0);
        assert_eq!(service_id(&f.cache.resolve(&f.suffix).unwrap()), "v1");
        assert_eq!(f.cache.stats().invalidations, 1);
    }

    #[test]
    fn other_namespace_mutations_are_ignored() {
        let f = fixture(CacheConfig::default(), Duration::ZERO);
        f.cache.resolve(&f.suffix).unwrap();
        f.cache
            .on_suffix_mutated(&Namespace::new("did:other").unwrap(), &f.suffix);
        assert_eq!(f.cache.len(), 1);
    }

    #[test]
    fn expired_entries_reload() {
        let f = fixture(
            CacheConfig {
                size: 0,
                expiry: Some(Duration::from_millis(20)),
            },
            Duration::ZERO,
        );
        f.cache.resolve(&f.suffix).unwrap();
        f.cache.resolve(&f.suffix).unwrap();
        assert_eq!(f.reads(), 1);
        thread::sleep(Duration::from_millis(40));
        f.cache.resolve(&f.suffix).unwrap();
        assert_eq!(f.reads(), 2);
    }

    #[test]
    fn zero_size_means_default() {
        assert_eq!(CacheConfig::default().effective_size(), DEFAULT_CACHE_SIZE);
        assert_eq!(
            CacheConfig {
                size: 5,
                expiry: None
            }
            .effective_size(),
            5
        );
    }

    // ---- single flight ----

    #[test]
    fn concurrent_misses_share_one_load() {
        let f = fixture(CacheConfig::default(), Duration::from_millis(100));
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&f.cache);
                let suffix = f.suffix.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.resolve(&suffix).unwrap()
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(f.reads(), 1);
        assert_eq!(f.cache.stats().loads, 1);
    }

    #[test]
    fn invalidation_during_load_is_not_cached() {
        let f = fixture(CacheConfig::default(), Duration::from_millis(100));
        let cache = Arc::clone(&f.cache);
        let suffix = f.suffix.clone();
        let loader = thread::spawn(move || cache.resolve(&suffix).unwrap());
        thread::sleep(Duration::from_millis(30));
        f.cache.invalidate(&f.suffix);
        loader.join().unwrap();
        assert!(f.cache.is_empty());
    }
}
