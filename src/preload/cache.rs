//! Session-scoped shared preload state. Written only by the orchestrator
//! through generation-checked helpers; read freely by UI and playback.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::api::{ExampleSentence, RelatedWord, WordInfo};
use crate::cancellation::GenerationGuard;

use super::progress::{Counter, ProgressSnapshot};
use super::WordEntry;

/// The maps and counters one load populates.
#[derive(Default)]
pub struct PreloadState {
    pub entries: Vec<WordEntry>,
    pub translations: HashMap<String, String>,
    pub word_info: HashMap<String, WordInfo>,
    pub examples: HashMap<String, Vec<ExampleSentence>>,
    pub lemma_family: HashMap<String, Vec<RelatedWord>>,
    pub translation: Counter,
    pub audio: Counter,
    pub example_counter: Counter,
    pub lemma: Counter,
    pub loading: bool,
}

impl PreloadState {
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            translation: self.translation,
            audio: self.audio,
            examples: self.example_counter,
            lemma: self.lemma,
            word_count: self.entries.len(),
            loading: self.loading,
        }
    }
}

/// Mutex wrapper enforcing the generation discipline: every write path
/// re-checks the caller's guard *under the lock*, immediately before
/// mutating, so a superseded load can never interleave a stale write with
/// the new load's reset.
#[derive(Default)]
pub struct PreloadCache {
    inner: Mutex<PreloadState>,
}

impl PreloadCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the state if and only if `guard` is still current and
    /// uncancelled. Returns None (silently) for stale guards.
    pub fn with_current<R>(
        &self,
        guard: &GenerationGuard,
        f: impl FnOnce(&mut PreloadState) -> R,
    ) -> Option<R> {
        let mut state = self.inner.lock();
        if !guard.should_continue() {
            return None;
        }
        Some(f(&mut state))
    }

    /// Unconditional write access. Only disposal uses this, to drop the
    /// whole state regardless of generation.
    pub fn write<R>(&self, f: impl FnOnce(&mut PreloadState) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Read-only access, valid at any time.
    pub fn read<R>(&self, f: impl FnOnce(&PreloadState) -> R) -> R {
        f(&self.inner.lock())
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.read(|s| s.snapshot())
    }

    pub fn translation_of(&self, word: &str) -> Option<String> {
        self.read(|s| s.translations.get(word).cloned())
    }

    pub fn word_info_of(&self, word: &str) -> Option<WordInfo> {
        self.read(|s| s.word_info.get(word).cloned())
    }

    pub fn examples_of(&self, word: &str) -> Option<Vec<ExampleSentence>> {
        self.read(|s| s.examples.get(word).cloned())
    }

    pub fn lemma_family_of(&self, word: &str) -> Option<Vec<RelatedWord>> {
        self.read(|s| s.lemma_family.get(word).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::TaskGeneration;

    #[test]
    fn stale_guard_writes_are_rejected() {
        let cache = PreloadCache::new();
        let tg = TaskGeneration::new();

        let stale = tg.cancel_and_advance();
        let _fresh = tg.cancel_and_advance();

        let res = cache.with_current(&stale, |state| {
            state.translations.insert("apple".into(), "苹果".into());
        });
        assert!(res.is_none());
        assert!(cache.translation_of("apple").is_none());
    }

    #[test]
    fn current_guard_writes_land() {
        let cache = PreloadCache::new();
        let tg = TaskGeneration::new();
        let guard = tg.cancel_and_advance();

        let res = cache.with_current(&guard, |state| {
            state.translations.insert("apple".into(), "苹果".into());
            state.translation.loaded += 1;
        });
        assert!(res.is_some());
        assert_eq!(cache.translation_of("apple").as_deref(), Some("苹果"));
        assert_eq!(cache.snapshot().translation.loaded, 1);
    }

    #[test]
    fn cancelled_guard_is_rejected_even_if_generation_matches() {
        let cache = PreloadCache::new();
        let tg = TaskGeneration::new();
        let guard = tg.cancel_and_advance();
        tg.cancel_all();

        let res = cache.with_current(&guard, |_| ());
        assert!(res.is_none());
    }
}
