//! reqwest implementation of the dictionary/TTS service client.
//! Connection pooling and per-endpoint timeouts; every request races the
//! load's cancellation token so a superseded preload aborts promptly.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use futures_util::future::BoxFuture;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{ApiError, DictApi, ExampleSentence, RelatedWord, WordInfo};

/// Path-segment encode set: everything except the RFC 3986 unreserved
/// characters.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Default timeout for dictionary / example / lemma requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// TTS payloads are larger and the upstream synthesizer is slower.
const TTS_TIMEOUT: Duration = Duration::from_secs(15);

pub struct HttpDictApi {
    http: reqwest::Client,
    base_url: String,
    tts_timeout: Duration,
}

impl HttpDictApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_tts_timeout(base_url, TTS_TIMEOUT)
    }

    pub fn with_tts_timeout(
        base_url: impl Into<String>,
        tts_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tts_timeout,
        })
    }

    /// Race a request future against the cancellation token and an overall
    /// deadline. Cancellation wins over every other outcome.
    async fn guarded<T, F>(
        fut: F,
        token: &CancellationToken,
        deadline: Duration,
    ) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        tokio::select! {
            _ = token.cancelled() => Err(ApiError::Cancelled),
            res = tokio::time::timeout(deadline, fut) => match res {
                Ok(inner) => inner,
                Err(_) => Err(ApiError::Timeout),
            },
        }
    }

    fn map_send_error(e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(e.to_string())
        }
    }

    fn check_status(resp: &reqwest::Response) -> Result<(), ApiError> {
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ApiError::Status(status.as_u16()))
        }
    }
}

#[derive(Deserialize)]
struct BatchEnvelope {
    results: HashMap<String, WordInfo>,
}

#[derive(Deserialize)]
struct ExamplesEnvelope {
    examples: Vec<ExampleSentence>,
}

#[derive(Deserialize)]
struct LemmaEnvelope {
    words: Vec<RelatedWord>,
}

impl DictApi for HttpDictApi {
    fn dict_batch<'a>(
        &'a self,
        words: &'a [String],
        target_lang: &'a str,
        native_lang: &'a str,
        token: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<HashMap<String, WordInfo>, ApiError>> {
        Box::pin(Self::guarded(
            async move {
                let body = serde_json::json!({
                    "words": words,
                    "targetLang": target_lang,
                    "nativeLang": native_lang,
                });
                let resp = self
                    .http
                    .post(format!("{}/api/dict/batch", self.base_url))
                    .json(&body)
                    .send()
                    .await
                    .map_err(Self::map_send_error)?;
                Self::check_status(&resp)?;
                let envelope: BatchEnvelope = resp
                    .json()
                    .await
                    .map_err(|e| ApiError::Decode(e.to_string()))?;
                Ok(envelope.results)
            },
            token,
            DEFAULT_TIMEOUT,
        ))
    }

    fn fetch_tts<'a>(
        &'a self,
        text: &'a str,
        accent: &'a str,
        lang: &'a str,
        slow: bool,
        token: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Vec<u8>, ApiError>> {
        Box::pin(Self::guarded(
            async move {
                let resp = self
                    .http
                    .get(format!("{}/api/tts", self.base_url))
                    .query(&[
                        ("word", text),
                        ("accent", accent),
                        ("lang", lang),
                        ("slow", if slow { "1" } else { "0" }),
                    ])
                    .timeout(self.tts_timeout)
                    .send()
                    .await
                    .map_err(Self::map_send_error)?;
                Self::check_status(&resp)?;
                let bytes = resp
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Network(e.to_string()))?;
                Ok(bytes.to_vec())
            },
            token,
            self.tts_timeout,
        ))
    }

    fn fetch_examples<'a>(
        &'a self,
        word: &'a str,
        lang: &'a str,
        limit: usize,
        token: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Vec<ExampleSentence>, ApiError>> {
        Box::pin(Self::guarded(
            async move {
                let limit = limit.to_string();
                let resp = self
                    .http
                    .get(format!(
                        "{}/api/examples/{}",
                        self.base_url,
                        utf8_percent_encode(word, PATH_SEGMENT)
                    ))
                    .query(&[("lang", lang), ("limit", limit.as_str())])
                    .send()
                    .await
                    .map_err(Self::map_send_error)?;
                Self::check_status(&resp)?;
                let envelope: ExamplesEnvelope = resp
                    .json()
                    .await
                    .map_err(|e| ApiError::Decode(e.to_string()))?;
                Ok(envelope.examples)
            },
            token,
            DEFAULT_TIMEOUT,
        ))
    }

    fn fetch_lemma_family<'a>(
        &'a self,
        word: &'a str,
        limit: usize,
        token: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Vec<RelatedWord>, ApiError>> {
        Box::pin(Self::guarded(
            async move {
                let resp = self
                    .http
                    .get(format!(
                        "{}/api/lemma/{}",
                        self.base_url,
                        utf8_percent_encode(word, PATH_SEGMENT)
                    ))
                    .query(&[("limit", limit.to_string())])
                    .send()
                    .await
                    .map_err(Self::map_send_error)?;
                Self::check_status(&resp)?;
                let envelope: LemmaEnvelope = resp
                    .json()
                    .await
                    .map_err(|e| ApiError::Decode(e.to_string()))?;
                Ok(envelope.words)
            },
            token,
            DEFAULT_TIMEOUT,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_segment_encoding_escapes_non_unreserved_bytes() {
        let enc = |s: &str| utf8_percent_encode(s, PATH_SEGMENT).to_string();
        assert_eq!(enc("apple"), "apple");
        assert_eq!(enc("mother-in-law"), "mother-in-law");
        assert_eq!(enc("猫"), "%E7%8C%AB");
        assert_eq!(enc("a b"), "a%20b");
    }

    #[tokio::test]
    async fn guarded_returns_cancelled_when_token_fires() {
        let token = CancellationToken::new();
        token.cancel();
        let res: Result<(), ApiError> = HttpDictApi::guarded(
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
            &token,
            Duration::from_secs(10),
        )
        .await;
        assert!(matches!(res, Err(ApiError::Cancelled)));
    }

    #[tokio::test]
    async fn guarded_times_out() {
        let token = CancellationToken::new();
        let res: Result<(), ApiError> = HttpDictApi::guarded(
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
            &token,
            Duration::from_millis(10),
        )
        .await;
        assert!(matches!(res, Err(ApiError::Timeout)));
    }
}
