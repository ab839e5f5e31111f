use std::hash::Hash;

use schnellru::{ByLength, LruMap, Unlimited};

/// Adaptive replacement cache.
///
/// `t1` holds entries seen once recently, `t2` entries seen at least twice.
/// The ghost lists `b1`/`b2` remember keys recently evicted from each side
/// and steer the target size `p` of `t1`. Resident entries never exceed
/// `size`; each ghost list is capped at `size` keys.
pub struct ArcCache<K: Hash + Eq + Clone, V> {
    size: usize,
    p: usize,
    t1: LruMap<K, V, Unlimited>,
    t2: LruMap<K, V, Unlimited>,
    b1: LruMap<K, (), ByLength>,
    b2: LruMap<K, (), ByLength>,
}

impl<K: Hash + Eq + Clone, V> ArcCache<K, V> {
    /// `size` must be non-zero; zero is raised to one.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let ghost = u32::try_from(size).unwrap_or(u32::MAX);
        Self {
            size,
            p: 0,
            t1: LruMap::new(Unlimited),
            t2: LruMap::new(Unlimited),
            b1: LruMap::new(ByLength::new(ghost)),
            b2: LruMap::new(ByLength::new(ghost)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.t1.len() + self.t2.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current target size of the recency side.
    pub fn target(&self) -> usize {
        self.p
    }

    pub fn contains(&self, key: &K) -> bool {
        self.t1.peek(key).is_some() || self.t2.peek(key).is_some()
    }

    /// Look up `key`, promoting it to the frequency side.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        if let Some(value) = self.t1.remove(key) {
            self.t2.insert(key.clone(), value);
            return self.t2.peek(key);
        }
        self.t2.get(key).map(|v| &*v)
    }

    /// Look up `key` without touching recency.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.t1.peek(key).or_else(|| self.t2.peek(key))
    }

    pub fn insert(&mut self, key: K, value: V) {
        if self.t1.remove(&key).is_some() || self.t2.peek(&key).is_some() {
            self.t2.insert(key, value);
            return;
        }

        if self.b1.peek(&key).is_some() {
            let delta = (self.b2.len() / self.b1.len().max(1)).max(1);
            self.p = (self.p + delta).min(self.size);
            if self.len() >= self.size {
                self.replace(false);
            }
            self.b1.remove(&key);
            self.t2.insert(key, value);
            return;
        }

        if self.b2.peek(&key).is_some() {
            let delta = (self.b1.len() / self.b2.len().max(1)).max(1);
            self.p = self.p.saturating_sub(delta);
            if self.len() >= self.size {
                self.replace(true);
            }
            self.b2.remove(&key);
            self.t2.insert(key, value);
            return;
        }

        if self.len() >= self.size {
            self.replace(false);
        }
        if self.b1.len() > self.size - self.p {
            self.b1.pop_oldest();
        }
        if self.b2.len() > self.p {
            self.b2.pop_oldest();
        }
        self.t1.insert(key, value);
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.b1.remove(key);
        self.b2.remove(key);
        self.t1.remove(key).or_else(|| self.t2.remove(key))
    }

    pub fn clear(&mut self) {
        self.t1.clear();
        self.t2.clear();
        self.b1.clear();
        self.b2.clear();
        self.p = 0;
    }

    /// Evict one resident entry into its ghost list.
    fn replace(&mut self, hit_in_b2: bool) {
        let t1 = self.t1.len();
        if t1 > 0 && (t1 > self.p || (t1 == self.p && hit_in_b2)) {
            if let Some((k, _)) = self.t1.pop_oldest() {
                self.b1.insert(k, ());
            }
        } else if let Some((k, _)) = self.t2.pop_oldest() {
            self.b2.insert(k, ());
        } else if let Some((k, _)) = self.t1.pop_oldest() {
            self.b1.insert(k, ());
        }
    }
}

impl<K: Hash + Eq + Clone, V> std::fmt::Debug for ArcCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArcCache")
            .field("size", &self.size)
            .field("p", &self.p)
            .field("t1", &self.t1.len())
            .field("t2", &self.t2.len())
            .field("b1", &self.b1.len())
            .field("b2", &self.b2.len())
            .finish()
    }
}
