//! Per-namespace document resolution cache.
//!
//! [`DocumentCache`] memoizes the marshalled bytes of each resolution and
//! hands every caller a freshly decoded copy. Concurrent misses on one
//! suffix share a single resolver run. Entries are evicted by an
//! [`ArcCache`] policy, by optional expiry, and synchronously when the
//! operation store reports a mutation of the suffix.

pub mod arc;
pub mod document;
pub mod provider;

pub use arc::ArcCache;
pub use document::{CacheConfig, CacheStats, DocumentCache, DEFAULT_CACHE_SIZE};
pub use provider::DocumentCacheProvider;
