//! lexiload: preload pipeline for a vocabulary drilling client.
//!
//! Given a word list, the pipeline concurrently fetches translations,
//! dictionary metadata, example sentences, lemma families and TTS audio from
//! a remote service, caches audio as bounded revocable handles, and safely
//! cancels in-flight work when the list changes mid-load. Correctness rests
//! on one mechanism: every async step captures a load generation and
//! re-checks it under the cache lock before any shared-state write.

pub mod api;
pub mod cancellation;
pub mod detect;
pub mod handle_cache;
pub mod metrics;
pub mod pool;
pub mod preload;

use std::sync::Arc;

use tracing::info;

use cancellation::TaskGeneration;
use handle_cache::{HandleAllocator, MediaUrlAllocator, ResourceHandleCache};
use metrics::MetricsRegistry;
use preload::{EventSink, LookupMemo, NullSink, PreloadCache, WordValidator};

pub use api::{ApiError, DictApi, ExampleSentence, HttpDictApi, RelatedWord, WordInfo};
pub use preload::{
    audio_key, ChannelSink, Counter, LoadOutcome, PreloadConfig, PreloadEvent, PreloadRequest,
    ProgressSnapshot, WordEntry,
};

/// Owns every service of one preload session: generation tracker, shared
/// cache, the three audio handle caches, lookup memo, metrics and the
/// injected collaborators. Constructor-injected, no globals; drop or
/// `dispose()` releases every handle.
pub struct PreloadContext {
    pub(crate) config: PreloadConfig,
    pub(crate) generation: TaskGeneration,
    pub(crate) cache: PreloadCache,
    pub(crate) audio: ResourceHandleCache,
    pub(crate) slow_audio: ResourceHandleCache,
    pub(crate) sentence_audio: ResourceHandleCache,
    pub(crate) memo: LookupMemo,
    pub(crate) api: Arc<dyn DictApi>,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) metrics: Arc<MetricsRegistry>,
    pub(crate) validator: WordValidator,
    media: Option<Arc<MediaUrlAllocator>>,
}

impl PreloadContext {
    /// Context with default config, no event sink, in-process media URLs.
    pub fn new(api: Arc<dyn DictApi>) -> Self {
        Self::with_parts(api, Arc::new(NullSink), PreloadConfig::default())
    }

    pub fn with_parts(
        api: Arc<dyn DictApi>,
        events: Arc<dyn EventSink>,
        config: PreloadConfig,
    ) -> Self {
        let media = Arc::new(MediaUrlAllocator::new());
        let mut ctx = Self::with_allocator(
            api,
            events,
            config,
            Arc::clone(&media) as Arc<dyn HandleAllocator>,
        );
        ctx.media = Some(media);
        ctx
    }

    /// Context with a caller-supplied handle allocator (tests inject
    /// counting fakes here).
    pub fn with_allocator(
        api: Arc<dyn DictApi>,
        events: Arc<dyn EventSink>,
        config: PreloadConfig,
        allocator: Arc<dyn HandleAllocator>,
    ) -> Self {
        Self {
            generation: TaskGeneration::new(),
            cache: PreloadCache::new(),
            audio: ResourceHandleCache::new(config.word_audio_capacity, Arc::clone(&allocator)),
            slow_audio: ResourceHandleCache::new(
                config.slow_audio_capacity,
                Arc::clone(&allocator),
            ),
            sentence_audio: ResourceHandleCache::new(
                config.sentence_audio_capacity,
                Arc::clone(&allocator),
            ),
            memo: LookupMemo::new(config.memo_capacity, config.memo_ttl),
            validator: WordValidator::new(config.max_word_length),
            metrics: Arc::new(MetricsRegistry::new()),
            api,
            events,
            config,
            media: None,
        }
    }

    /// Progress snapshot, valid at any point during a load.
    pub fn progress(&self) -> ProgressSnapshot {
        self.cache.snapshot()
    }

    pub fn cache(&self) -> &PreloadCache {
        &self.cache
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.current_generation()
    }

    /// Cached word-audio URL for `(text, accent, lang)`, if preloaded.
    pub fn audio_url(&self, text: &str, accent: &str, lang: &str) -> Option<String> {
        self.audio.get(&audio_key(text, accent, lang))
    }

    pub fn slow_audio_url(&self, text: &str, accent: &str, lang: &str) -> Option<String> {
        self.slow_audio.get(&audio_key(text, accent, lang))
    }

    pub fn sentence_audio_url(&self, text: &str, lang: &str) -> Option<String> {
        self.sentence_audio.get(&audio_key(text, "us", lang))
    }

    /// Resolve a `media://` URL back to its audio payload. Only available
    /// when the context owns the default in-process allocator.
    pub fn resolve_audio(&self, url: &str) -> Option<Arc<[u8]>> {
        self.media.as_ref()?.resolve(url)
    }

    /// Cancel all in-flight work and release every cached handle.
    pub fn dispose(&self) {
        info!("preload context disposing");
        self.generation.cancel_all();
        self.audio.release_all();
        self.slow_audio.release_all();
        self.sentence_audio.release_all();
        self.memo.clear();
        self.cache.write(|state| {
            *state = Default::default();
        });
    }
}
