//! Generic LRU cache with per-entry TTL, hot-key tracking, and a cancellable
//! background reaper.
//!
//! Grounded on the original project's `Astra::datastructures::LRUCache<Key, Value>`
//! template (capacity + hot-key threshold + default TTL, access-ordered eviction,
//! batch operations, a periodic cleanup thread) but expressed as a safe,
//! dependency-injected Rust type: no process-wide singleton, a `tokio` task in
//! place of the source's `std::thread` + condition-variable reaper, and
//! `parking_lot::Mutex` in place of the source's single `cache_mutex_`.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{CacheError, CacheResult};

/// A single cache slot. Slots live in a slab (`Vec<Option<Node<K, V>>>`) and
/// are linked into a doubly-linked list by index, most-recently-used at `head`.
struct Node<K, V> {
    key: K,
    value: V,
    expires_at: Option<Instant>,
    access_count: u64,
    prev: Option<usize>,
    next: Option<usize>,
}

struct Inner<K, V> {
    capacity: usize,
    hot_threshold: u64,
    default_ttl: Option<Duration>,
    index: HashMap<K, usize>,
    slab: Vec<Option<Node<K, V>>>,
    free_slots: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    hot_keys: HashMap<K, ()>,
}

impl<K: Eq + Hash + Clone, V: Clone> Inner<K, V> {
    fn new(capacity: usize, hot_threshold: u64, default_ttl: Option<Duration>) -> Self {
        Self {
            capacity,
            hot_threshold,
            default_ttl,
            index: HashMap::new(),
            slab: Vec::new(),
            free_slots: Vec::new(),
            head: None,
            tail: None,
            hot_keys: HashMap::new(),
        }
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.slab[idx].as_ref().expect("detach of freed slot");
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.slab[p].as_mut().unwrap().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slab[n].as_mut().unwrap().prev = prev,
            None => self.tail = prev,
        }
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let node = self.slab[idx].as_mut().unwrap();
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            self.slab[h].as_mut().unwrap().prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn touch(&mut self, idx: usize) {
        self.detach(idx);
        self.push_front(idx);
    }

    fn remove_slot(&mut self, idx: usize) -> Node<K, V> {
        self.detach(idx);
        let node = self.slab[idx].take().expect("remove of freed slot");
        self.free_slots.push(idx);
        self.hot_keys.remove(&node.key);
        node
    }

    fn remove_key(&mut self, key: &K) -> Option<Node<K, V>> {
        let idx = self.index.remove(key)?;
        Some(self.remove_slot(idx))
    }

    fn evict_lru(&mut self) {
        if let Some(idx) = self.tail {
            let key = self.slab[idx].as_ref().unwrap().key.clone();
            self.index.remove(&key);
            self.remove_slot(idx);
        }
    }

    fn ensure_capacity(&mut self, incoming: usize) {
        if self.capacity == 0 {
            while self.tail.is_some() {
                self.evict_lru();
            }
            return;
        }
        while self.index.len() + incoming > self.capacity && self.tail.is_some() {
            self.evict_lru();
        }
    }

    fn resolve_ttl(&self, ttl: Option<Duration>) -> Option<Duration> {
        match ttl {
            Some(d) if d.is_zero() => self.default_ttl,
            Some(d) => Some(d),
            None => self.default_ttl,
        }
    }

    fn insert_one(&mut self, key: K, value: V, ttl: Option<Duration>) {
        let expires_at = self.resolve_ttl(ttl).map(|d| Instant::now() + d);

        if let Some(&idx) = self.index.get(&key) {
            {
                let node = self.slab[idx].as_mut().unwrap();
                node.value = value;
                node.expires_at = expires_at;
            }
            self.touch(idx);
            return;
        }

        self.ensure_capacity(1);
        if self.capacity == 0 {
            return;
        }

        let node = Node {
            key: key.clone(),
            value,
            expires_at,
            access_count: 0,
            prev: None,
            next: None,
        };
        let idx = if let Some(free) = self.free_slots.pop() {
            self.slab[free] = Some(node);
            free
        } else {
            self.slab.push(Some(node));
            self.slab.len() - 1
        };
        self.index.insert(key, idx);
        self.push_front(idx);
    }

    fn get(&mut self, key: &K) -> Option<V> {
        let idx = *self.index.get(key)?;
        let now = Instant::now();
        let expired = {
            let node = self.slab[idx].as_ref().unwrap();
            matches!(node.expires_at, Some(exp) if now > exp)
        };
        if expired {
            self.index.remove(key);
            self.remove_slot(idx);
            return None;
        }
        self.touch(idx);
        let node = self.slab[idx].as_mut().unwrap();
        node.access_count += 1;
        let count = node.access_count;
        let value = node.value.clone();
        if count >= self.hot_threshold && self.hot_threshold > 0 {
            self.hot_keys.insert(key.clone(), ());
        }
        Some(value)
    }

    fn cleanup_expired(&mut self) {
        let now = Instant::now();
        let expired: Vec<K> = self
            .slab
            .iter()
            .filter_map(|n| n.as_ref())
            .filter(|n| matches!(n.expires_at, Some(exp) if now > exp))
            .map(|n| n.key.clone())
            .collect();
        for key in expired {
            self.remove_key(&key);
        }
    }
}

/// A bounded, TTL-aware, LRU-evicted cache shared across tasks via an internal
/// lock. Cheap to clone — clones share the same underlying storage.
///
/// See §4.1 of the specification for the full operation contract.
#[derive(Clone)]
pub struct LruTtlCache<K, V> {
    inner: std::sync::Arc<Mutex<Inner<K, V>>>,
}

impl<K, V> LruTtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache with the given capacity, hot-key access threshold, and
    /// default TTL (`None` means entries never expire unless a per-call TTL is
    /// given).
    #[must_use]
    pub fn new(capacity: usize, hot_threshold: u64, default_ttl: Option<Duration>) -> Self {
        Self {
            inner: std::sync::Arc::new(Mutex::new(Inner::new(capacity, hot_threshold, default_ttl))),
        }
    }

    /// Look up `key`. Moves the entry to most-recently-used and bumps its
    /// access counter. Silently returns `None` if absent or expired (expired
    /// entries are dropped as a side effect).
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().get(key)
    }

    /// Insert or overwrite `key`. `ttl = Some(Duration::ZERO)` uses the cache's
    /// default TTL; `ttl = None` also uses the default. A capacity of zero
    /// makes every `put` a no-op relative to subsequent `get`s.
    pub fn put(&self, key: K, value: V, ttl: Option<Duration>) {
        self.inner.lock().insert_one(key, value, ttl);
    }

    /// Apply `get` to each key in order, returning only the hits.
    pub fn batch_get(&self, keys: &[K]) -> Vec<(K, V)> {
        let mut guard = self.inner.lock();
        keys.iter()
            .filter_map(|k| guard.get(k).map(|v| (k.clone(), v)))
            .collect()
    }

    /// Insert every `(key, value)` pair, computing the total eviction
    /// requirement up front and evicting in a single pass. Fails with
    /// [`CacheError::BatchLengthMismatch`] (and leaves the cache untouched) if
    /// `keys.len() != values.len()`.
    pub fn batch_put(&self, keys: &[K], values: &[V], ttl: Option<Duration>) -> CacheResult<()> {
        if keys.len() != values.len() {
            return Err(CacheError::BatchLengthMismatch {
                keys: keys.len(),
                values: values.len(),
            });
        }
        let mut guard = self.inner.lock();
        let new_keys = keys.iter().filter(|k| !guard.index.contains_key(k)).count();
        guard.ensure_capacity(new_keys);
        for (k, v) in keys.iter().zip(values.iter()) {
            guard.insert_one(k.clone(), v.clone(), ttl);
        }
        Ok(())
    }

    /// Remove every key in `keys`, idempotently.
    pub fn batch_remove(&self, keys: &[K]) {
        let mut guard = self.inner.lock();
        for k in keys {
            guard.remove_key(k);
        }
    }

    /// Drop `key`. A no-op if absent.
    pub fn remove(&self, key: &K) {
        self.inner.lock().remove_key(key);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut guard = self.inner.lock();
        guard.index.clear();
        guard.slab.clear();
        guard.free_slots.clear();
        guard.hot_keys.clear();
        guard.head = None;
        guard.tail = None;
    }

    /// Number of live (not-yet-reaped) entries. Note an entry past its TTL but
    /// not yet touched or reaped still counts until the next access or sweep.
    pub fn size(&self) -> usize {
        self.inner.lock().index.len()
    }

    /// Whether `key` is present, ignoring expiry (mirrors the source's
    /// `Contains`, distinct from [`Self::has_key`]).
    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().index.contains_key(key)
    }

    /// Whether `key` is present *and* not expired.
    pub fn has_key(&self, key: &K) -> bool {
        let mut guard = self.inner.lock();
        guard.get(key).is_some()
    }

    /// Remaining time-to-live for `key`, or `None` if absent or set to never
    /// expire.
    pub fn get_expiry(&self, key: &K) -> Option<Duration> {
        let guard = self.inner.lock();
        let idx = *guard.index.get(key)?;
        let node = guard.slab[idx].as_ref()?;
        node.expires_at.map(|exp| exp.saturating_duration_since(Instant::now()))
    }

    /// Scan the expiry index and drop everything past due.
    pub fn cleanup_expired(&self) {
        self.inner.lock().cleanup_expired();
    }

    /// Keys that have crossed the hot-access threshold.
    pub fn hot_keys(&self) -> Vec<K> {
        self.inner.lock().hot_keys.keys().cloned().collect()
    }

    /// Start a background task that calls [`Self::cleanup_expired`] on
    /// `interval`, cancellable via the returned token. Mirrors the source's
    /// `StartCleanupThread`/`StopCleanupThread` pair, but as a cooperatively
    /// cancelled `tokio` task instead of a `std::thread` + condvar.
    pub fn start_reaper(&self, interval: Duration) -> ReaperHandle {
        let token = CancellationToken::new();
        let cache = self.clone();
        let child = token.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = tokio::time::sleep(interval) => cache.cleanup_expired(),
                }
            }
        });
        ReaperHandle { token, handle }
    }
}

/// Handle returned by [`LruTtlCache::start_reaper`]; dropping it does not stop
/// the reaper — call [`Self::stop`] explicitly, matching the explicit
/// start/stop contract in §4.1.
pub struct ReaperHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ReaperHandle {
    /// Signal the reaper to stop and wait for it to exit.
    pub async fn stop(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_roundtrip() {
        let cache: LruTtlCache<String, i32> = LruTtlCache::new(4, 100, None);
        cache.put("a".into(), 1, None);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
    }

    #[test]
    fn capacity_zero_is_always_empty() {
        let cache: LruTtlCache<String, i32> = LruTtlCache::new(0, 100, None);
        cache.put("a".into(), 1, None);
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.get(&"a".to_string()), None);
    }

    #[test]
    fn eviction_drops_least_recently_used() {
        let cache: LruTtlCache<String, i32> = LruTtlCache::new(2, 100, None);
        cache.put("a".into(), 1, None);
        cache.put("b".into(), 2, None);
        // touch "a" so "b" becomes LRU
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        cache.put("c".into(), 3, None);
        assert_eq!(cache.size(), 2);
        assert_eq!(cache.get(&"b".to_string()), None);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        assert_eq!(cache.get(&"c".to_string()), Some(3));
    }

    #[test]
    fn ttl_expiry_on_access() {
        let cache: LruTtlCache<String, i32> = LruTtlCache::new(4, 100, None);
        cache.put("a".into(), 1, Some(Duration::from_millis(1)));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get(&"a".to_string()), None);
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn batch_put_rejects_length_mismatch() {
        let cache: LruTtlCache<String, i32> = LruTtlCache::new(4, 100, None);
        let err = cache
            .batch_put(&["a".into(), "b".into()], &[1], None)
            .unwrap_err();
        assert!(matches!(err, CacheError::BatchLengthMismatch { keys: 2, values: 1 }));
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn hot_key_tracking() {
        let cache: LruTtlCache<String, i32> = LruTtlCache::new(4, 3, None);
        cache.put("a".into(), 1, None);
        for _ in 0..3 {
            cache.get(&"a".to_string());
        }
        assert_eq!(cache.hot_keys(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn reaper_removes_expired_entries_on_interval() {
        let cache: LruTtlCache<String, i32> = LruTtlCache::new(4, 100, None);
        cache.put("a".into(), 1, Some(Duration::from_millis(5)));
        let reaper = cache.start_reaper(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.size(), 0);
        reaper.stop().await;
    }
}
