//! Remote dictionary / TTS / example service contract.
//! The pipeline only ever talks to the backend through the `DictApi` trait;
//! the reqwest implementation lives in `http`, tests plug in fakes.

pub mod http;

use std::collections::HashMap;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

pub use http::HttpDictApi;

/// Backend marker for a word the dictionary could not verify. A per-word
/// value inside an otherwise successful batch response, not a transport
/// failure.
pub const WORD_NOT_FOUND: &str = "word_not_found";

/// One dictionary record as returned by `POST /api/dict/batch`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WordInfo {
    pub word: String,
    pub translation: String,
    pub phonetic: String,
    pub target_definitions: Vec<Definition>,
    pub word_forms: HashMap<String, String>,
    pub lemma: String,
    /// `Some(WORD_NOT_FOUND)` when the backend could not verify the word.
    pub error: Option<String>,
}

impl WordInfo {
    pub fn is_not_found(&self) -> bool {
        self.error.as_deref() == Some(WORD_NOT_FOUND)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Definition {
    pub pos: String,
    pub meanings: Vec<String>,
}

/// One example sentence from `GET /api/examples/{word}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExampleSentence {
    pub text: String,
    pub translation: String,
}

/// One member of a lemma family from `GET /api/lemma/{word}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelatedWord {
    pub word: String,
    pub pos: String,
    pub translation: String,
    pub frequency: u64,
}

/// Errors surfaced by the remote client. The pipeline treats `Cancelled` as
/// silence, everything else as a soft per-item failure.
#[derive(Debug)]
pub enum ApiError {
    /// Non-2xx response.
    Status(u16),
    Timeout,
    Cancelled,
    Network(String),
    Decode(String),
}

impl ApiError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Status(code) => write!(f, "unexpected status {code}"),
            ApiError::Timeout => write!(f, "request timeout"),
            ApiError::Cancelled => write!(f, "request cancelled"),
            ApiError::Network(msg) => write!(f, "network error: {msg}"),
            ApiError::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Collaborator contract for the remote dictionary/TTS service.
/// All calls observe the load's cancellation token and must return
/// `ApiError::Cancelled` promptly once it fires.
pub trait DictApi: Send + Sync {
    /// Batched dictionary lookup. Results are keyed by the exact input word;
    /// a missing key or a `word_not_found` error value are both expected
    /// outcomes.
    fn dict_batch<'a>(
        &'a self,
        words: &'a [String],
        target_lang: &'a str,
        native_lang: &'a str,
        token: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<HashMap<String, WordInfo>, ApiError>>;

    /// Fetch the TTS audio payload for `text`.
    fn fetch_tts<'a>(
        &'a self,
        text: &'a str,
        accent: &'a str,
        lang: &'a str,
        slow: bool,
        token: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Vec<u8>, ApiError>>;

    /// Fetch example sentences for a looked-up word.
    fn fetch_examples<'a>(
        &'a self,
        word: &'a str,
        lang: &'a str,
        limit: usize,
        token: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Vec<ExampleSentence>, ApiError>>;

    /// Fetch the lemma family of a word (English only upstream).
    fn fetch_lemma_family<'a>(
        &'a self,
        word: &'a str,
        limit: usize,
        token: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Vec<RelatedWord>, ApiError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_info_deserializes_camel_case_with_defaults() {
        let raw = r#"{
            "word": "apple",
            "translation": "苹果",
            "targetDefinitions": [{"pos": "n.", "meanings": ["a fruit"]}],
            "wordForms": {"plural": "apples"},
            "lemma": "apple"
        }"#;
        let info: WordInfo = serde_json::from_str(raw).unwrap();
        assert_eq!(info.word, "apple");
        assert_eq!(info.target_definitions.len(), 1);
        assert_eq!(info.word_forms.get("plural").unwrap(), "apples");
        assert!(info.phonetic.is_empty());
        assert!(!info.is_not_found());
    }

    #[test]
    fn not_found_marker_is_detected() {
        let raw = r#"{"word": "asdfgh", "error": "word_not_found"}"#;
        let info: WordInfo = serde_json::from_str(raw).unwrap();
        assert!(info.is_not_found());
    }
}
