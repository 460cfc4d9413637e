//! Bounded cache of revocable media handles (the audio "blob" store).
//! Caps the number of live handles per cache, evicting the oldest-created
//! entry. Revocation goes through a `HandleAllocator` so the host primitive
//! is called exactly once per handle.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

/// Host-environment primitive that turns raw bytes into a playable handle
/// (a URL) and reclaims it on revoke. The cache is the sole owner of
/// allocated handles; callers only ever see the URL string.
pub trait HandleAllocator: Send + Sync {
    fn allocate(&self, bytes: Vec<u8>) -> String;
    fn revoke(&self, url: &str);
}

/// In-process allocator: keeps payloads in a registry keyed by a
/// `media://<uuid>` URL that playback code resolves back into bytes.
#[derive(Default)]
pub struct MediaUrlAllocator {
    registry: Mutex<HashMap<String, Arc<[u8]>>>,
}

impl MediaUrlAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a URL handed out by `allocate` back to its payload.
    /// Returns None once the handle has been revoked.
    pub fn resolve(&self, url: &str) -> Option<Arc<[u8]>> {
        self.registry.lock().get(url).cloned()
    }
}

impl HandleAllocator for MediaUrlAllocator {
    fn allocate(&self, bytes: Vec<u8>) -> String {
        let url = format!("media://{}", uuid::Uuid::new_v4());
        self.registry.lock().insert(url.clone(), bytes.into());
        url
    }

    fn revoke(&self, url: &str) {
        self.registry.lock().remove(url);
    }
}

struct Entry {
    url: String,
    created_seq: u64,
}

struct Inner {
    entries: HashMap<String, Entry>,
    next_seq: u64,
}

/// Fixed-capacity keyed store of revocable handles. Eviction is strictly
/// least-recently-created, not least-recently-used: entries are rarely
/// re-created once fetched in a session, so creation order is enough.
pub struct ResourceHandleCache {
    inner: Mutex<Inner>,
    allocator: Arc<dyn HandleAllocator>,
    max_entries: usize,
}

impl ResourceHandleCache {
    pub fn new(max_entries: usize, allocator: Arc<dyn HandleAllocator>) -> Self {
        assert!(max_entries > 0, "handle cache capacity must be > 0");
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                next_seq: 0,
            }),
            allocator,
            max_entries,
        }
    }

    /// Allocate a handle for `bytes` and cache it under `key`, returning the
    /// URL. Overwriting an existing key releases the old handle first; at
    /// capacity the oldest-created entry is evicted before inserting.
    pub fn create(&self, bytes: Vec<u8>, key: &str) -> String {
        let mut stale: Vec<String> = Vec::new();
        let url = {
            let mut inner = self.inner.lock();
            if let Some(old) = inner.entries.remove(key) {
                stale.push(old.url);
            }
            if inner.entries.len() >= self.max_entries {
                if let Some(oldest) = inner
                    .entries
                    .iter()
                    .min_by_key(|(_, e)| e.created_seq)
                    .map(|(k, _)| k.clone())
                {
                    debug!(key = %oldest, "handle cache full, evicting oldest");
                    if let Some(evicted) = inner.entries.remove(&oldest) {
                        stale.push(evicted.url);
                    }
                }
            }
            let url = self.allocator.allocate(bytes);
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.entries.insert(
                key.to_string(),
                Entry {
                    url: url.clone(),
                    created_seq: seq,
                },
            );
            url
        };
        // Revoke outside the lock; entries were already removed, so each
        // handle is revoked at most once.
        for old in stale {
            self.allocator.revoke(&old);
        }
        url
    }

    /// Borrowed view of a cached handle (cloned URL string).
    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().entries.get(key).map(|e| e.url.clone())
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    /// Revoke the handle under `key` and drop the entry. No-op if absent.
    pub fn release(&self, key: &str) {
        let removed = self.inner.lock().entries.remove(key);
        if let Some(entry) = removed {
            self.allocator.revoke(&entry.url);
        }
    }

    /// Revoke every handle and clear the store. Used when the word list
    /// changes or on forced reload.
    pub fn release_all(&self) {
        let drained: Vec<Entry> = {
            let mut inner = self.inner.lock();
            inner.entries.drain().map(|(_, e)| e).collect()
        };
        for entry in &drained {
            self.allocator.revoke(&entry.url);
        }
        if !drained.is_empty() {
            debug!(released = drained.len(), "handle cache cleared");
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for ResourceHandleCache {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Counts allocations and per-URL revocations.
    #[derive(Default)]
    struct CountingAllocator {
        allocated: Mutex<u64>,
        revoked: Mutex<HashMap<String, u32>>,
    }

    impl CountingAllocator {
        fn revoke_count(&self, url: &str) -> u32 {
            self.revoked.lock().get(url).copied().unwrap_or(0)
        }
        fn total_revoked(&self) -> u32 {
            self.revoked.lock().values().sum()
        }
    }

    impl HandleAllocator for CountingAllocator {
        fn allocate(&self, _bytes: Vec<u8>) -> String {
            let mut n = self.allocated.lock();
            *n += 1;
            format!("fake://{n}")
        }
        fn revoke(&self, url: &str) {
            *self.revoked.lock().entry(url.to_string()).or_insert(0) += 1;
        }
    }

    fn cache_with(max: usize) -> (ResourceHandleCache, Arc<CountingAllocator>) {
        let alloc = Arc::new(CountingAllocator::default());
        let cache = ResourceHandleCache::new(max, Arc::clone(&alloc) as Arc<dyn HandleAllocator>);
        (cache, alloc)
    }

    #[test]
    fn capacity_never_exceeded_and_oldest_evicted() {
        let (cache, _alloc) = cache_with(3);
        for i in 0..10 {
            cache.create(vec![i], &format!("k{i}"));
            assert!(cache.len() <= 3);
        }
        // Entries 7, 8, 9 survive; everything older was evicted in order.
        assert!(!cache.has("k6"));
        assert!(cache.has("k7"));
        assert!(cache.has("k8"));
        assert!(cache.has("k9"));
    }

    #[test]
    fn overwrite_releases_old_handle_once() {
        let (cache, alloc) = cache_with(5);
        let first = cache.create(vec![1], "apple");
        let second = cache.create(vec![2], "apple");
        assert_ne!(first, second);
        assert_eq!(cache.len(), 1);
        assert_eq!(alloc.revoke_count(&first), 1);
        assert_eq!(alloc.revoke_count(&second), 0);
    }

    #[test]
    fn double_release_revokes_at_most_once() {
        let (cache, alloc) = cache_with(5);
        let url = cache.create(vec![1], "apple");
        cache.release("apple");
        cache.release("apple");
        assert_eq!(alloc.revoke_count(&url), 1);
        assert!(cache.get("apple").is_none());
    }

    #[test]
    fn release_all_revokes_every_handle_exactly_once() {
        let (cache, alloc) = cache_with(10);
        let urls: Vec<String> = (0..4)
            .map(|i| cache.create(vec![i], &format!("k{i}")))
            .collect();
        cache.release_all();
        cache.release_all();
        assert!(cache.is_empty());
        for url in &urls {
            assert_eq!(alloc.revoke_count(url), 1);
        }
        assert_eq!(alloc.total_revoked(), 4);
    }

    #[test]
    fn drop_revokes_outstanding_handles() {
        let alloc = Arc::new(CountingAllocator::default());
        {
            let cache =
                ResourceHandleCache::new(5, Arc::clone(&alloc) as Arc<dyn HandleAllocator>);
            cache.create(vec![1], "a");
            cache.create(vec![2], "b");
        }
        assert_eq!(alloc.total_revoked(), 2);
    }

    #[test]
    fn media_url_allocator_round_trip() {
        let alloc = MediaUrlAllocator::new();
        let url = alloc.allocate(vec![1, 2, 3]);
        assert!(url.starts_with("media://"));
        assert_eq!(alloc.resolve(&url).as_deref(), Some(&[1u8, 2, 3][..]));
        alloc.revoke(&url);
        assert!(alloc.resolve(&url).is_none());
    }
}
