//! Cross-load memo of dictionary lookups.
//! Key: blake3 hash of (word | target_lang | native_lang).
//! Capacity: 512, TTL: 10 minutes. Consulted before scheduling a batch so
//! re-loading a tweaked word list does not re-query unchanged words;
//! bypassed and refreshed on force reload.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

use crate::api::WordInfo;

struct MemoEntry {
    info: WordInfo,
    inserted_at: Instant,
}

pub struct LookupMemo {
    inner: Mutex<LruCache<[u8; 32], MemoEntry>>,
    ttl: Duration,
}

impl LookupMemo {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            ttl,
        }
    }

    fn compute_key(word: &str, target_lang: &str, native_lang: &str) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(word.as_bytes());
        hasher.update(b"|");
        hasher.update(target_lang.as_bytes());
        hasher.update(b"|");
        hasher.update(native_lang.as_bytes());
        *hasher.finalize().as_bytes()
    }

    /// Look up a memoized record. Returns None if absent or expired.
    pub fn get(&self, word: &str, target_lang: &str, native_lang: &str) -> Option<WordInfo> {
        let key = Self::compute_key(word, target_lang, native_lang);
        let mut cache = self.inner.lock();
        if let Some(entry) = cache.get(&key) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.info.clone());
            }
            cache.pop(&key);
        }
        None
    }

    pub fn insert(&self, word: &str, target_lang: &str, native_lang: &str, info: WordInfo) {
        let key = Self::compute_key(word, target_lang, native_lang);
        self.inner.lock().put(
            key,
            MemoEntry {
                info,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}
