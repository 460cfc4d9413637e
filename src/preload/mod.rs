//! Preload pipeline: request/config types, shared cache, classification,
//! events, progress and the orchestrator itself.

pub mod cache;
pub mod classify;
pub mod events;
pub mod memo;
pub mod orchestrator;
pub mod progress;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use cache::PreloadCache;
pub use classify::WordValidator;
pub use events::{ChannelSink, EventSink, NullSink, PreloadEvent};
pub use memo::LookupMemo;
pub use orchestrator::LoadOutcome;
pub use progress::{Counter, ProgressSnapshot};

/// One line of the user's word list: the word plus an optional custom
/// definition that overrides any dictionary lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordEntry {
    pub word: String,
    pub definition: Option<String>,
}

impl WordEntry {
    pub fn new(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            definition: None,
        }
    }

    pub fn with_definition(word: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            definition: Some(definition.into()),
        }
    }
}

/// Inputs for one preload run.
#[derive(Debug, Clone)]
pub struct PreloadRequest {
    pub entries: Vec<WordEntry>,
    /// None = auto-detect from the word list (falls back to "en").
    pub target_lang: Option<String>,
    /// Language translations are rendered in.
    pub translation_lang: String,
    /// TTS accent; only honored for English, others pin "us".
    pub accent: String,
    /// Bypass every cache layer and refetch everything.
    pub force_reload: bool,
}

impl PreloadRequest {
    pub fn new(entries: Vec<WordEntry>) -> Self {
        Self {
            entries,
            target_lang: None,
            translation_lang: "zh".to_string(),
            accent: "us".to_string(),
            force_reload: false,
        }
    }
}

/// Tuning knobs for the pipeline. Defaults follow the production service
/// limits (batch of 5 words per dictionary request, 6 concurrent fetches,
/// 15 s TTS timeout).
#[derive(Debug, Clone)]
pub struct PreloadConfig {
    pub batch_size: usize,
    pub fanout_limit: usize,
    pub tts_timeout: Duration,
    pub word_audio_capacity: usize,
    pub slow_audio_capacity: usize,
    pub sentence_audio_capacity: usize,
    pub memo_capacity: usize,
    pub memo_ttl: Duration,
    pub max_word_length: usize,
    pub examples_limit: usize,
    pub lemma_limit: usize,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            fanout_limit: 6,
            tts_timeout: Duration::from_secs(15),
            word_audio_capacity: 200,
            slow_audio_capacity: 200,
            sentence_audio_capacity: 100,
            memo_capacity: 512,
            memo_ttl: Duration::from_secs(600),
            max_word_length: 100,
            examples_limit: 10,
            lemma_limit: 50,
        }
    }
}

/// Cache key for one TTS payload: `text:accent:lang`. Deterministic, shared
/// between the handle cache and fetch de-duplication.
pub fn audio_key(text: &str, accent: &str, lang: &str) -> String {
    format!("{text}:{accent}:{lang}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_key_is_deterministic() {
        assert_eq!(audio_key("apple", "us", "en"), "apple:us:en");
        assert_eq!(
            audio_key("apple", "us", "en"),
            audio_key("apple", "us", "en")
        );
        assert_ne!(audio_key("apple", "uk", "en"), audio_key("apple", "us", "en"));
    }
}
