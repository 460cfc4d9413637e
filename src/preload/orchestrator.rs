//! End-to-end preload for one word list: supersede the previous load,
//! reset state, classify entries, batch dictionary lookups, then fan out
//! audio / example / lemma fetches under a concurrency bound. Every write
//! into the shared cache re-checks the load generation first; a superseded
//! run stops updating and is discarded, never failed.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::detect;
use crate::metrics::metric_names;
use crate::pool;
use crate::PreloadContext;

use super::classify::{INVALID_WORD_TEXT, NOT_FOUND_TEXT};
use super::progress::Counter;
use super::{audio_key, PreloadEvent, PreloadRequest, WordEntry};

/// How one `start_preload` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Identical entries, nothing in flight, no force: nothing to do.
    Unchanged,
    /// A newer load took over; this one stopped silently.
    Superseded,
    /// Ran to completion as the current generation.
    Completed { generation: u64 },
}

impl PreloadContext {
    /// Load translations, dictionary metadata, audio, examples and lemma
    /// families for `request.entries`. Idempotent against identical
    /// re-invocation; safe to call again mid-load (the newer call wins).
    ///
    /// Per-item network failures are soft: logged, counters left
    /// under-incremented, never propagated. Only a later explicit call
    /// (typically with `force_reload`) retries them.
    pub async fn start_preload(&self, request: PreloadRequest) -> LoadOutcome {
        let entries = normalize_entries(request.entries);

        let target_lang = match request.target_lang {
            Some(lang) => lang,
            None => {
                let words: Vec<&str> = entries.iter().map(|e| e.word.as_str()).collect();
                detect::detect_target_lang(&words).unwrap_or("en").to_string()
            }
        };
        let native_lang = request.translation_lang;
        // Accent selection only exists for English TTS voices.
        let accent = if target_lang == "en" {
            request.accent
        } else {
            "us".to_string()
        };

        let (changed, loading) = self
            .cache
            .read(|state| (state.entries != entries, state.loading));
        if !changed && !loading && !request.force_reload {
            debug!("preload no-op: entries unchanged and nothing in flight");
            return LoadOutcome::Unchanged;
        }

        let guard = self.generation.cancel_and_advance();
        let load_id = uuid::Uuid::new_v4();
        let started = Instant::now();
        info!(
            generation = guard.my_generation(),
            load_id = %load_id,
            words = entries.len(),
            target_lang = %target_lang,
            changed,
            force = request.force_reload,
            "preload starting"
        );

        if request.force_reload {
            self.memo.clear();
        }

        // Reset under the cache lock, generation-checked like every other
        // write: a loser preempted between its cancel_and_advance and this
        // point must not clobber the winner's reset. Releasing handles under
        // the same lock serializes against any stale task that already
        // passed its check and is about to insert a handle.
        let reset = self.cache.with_current(&guard, |state| {
            if changed || request.force_reload {
                self.audio.release_all();
                self.slow_audio.release_all();
                self.sentence_audio.release_all();
                let custom: HashSet<&str> = entries
                    .iter()
                    .filter(|e| e.definition.is_some())
                    .map(|e| e.word.as_str())
                    .collect();
                state.translations.retain(|w, _| custom.contains(w.as_str()));
                state.word_info.retain(|w, _| custom.contains(w.as_str()));
                state.examples.clear();
                state.lemma_family.clear();
            }
            state.entries = entries.clone();
            state.translation = Counter {
                loaded: 0,
                total: entries.len(),
            };
            state.audio = Counter::default();
            state.example_counter = Counter::default();
            state.lemma = Counter::default();
            state.loading = true;
        });
        if reset.is_none() {
            debug!(generation = guard.my_generation(), "preload superseded before reset");
            return LoadOutcome::Superseded;
        }

        // --- Classification -------------------------------------------------
        // Per entry: custom definition / invalid characters / already cached
        // / memoized / needs a dictionary lookup.
        let mut lookup_words: Vec<String> = Vec::new();
        let mut occurrences: HashMap<String, usize> = HashMap::new();
        let mut valid_words: Vec<String> = Vec::new();
        let mut seen_valid: HashSet<String> = HashSet::new();
        let mut invalid_words: Vec<String> = Vec::new();

        let classified = self.cache.with_current(&guard, |state| {
            for entry in &entries {
                let word = &entry.word;
                if let Some(def) = &entry.definition {
                    state.translations.insert(word.clone(), def.clone());
                    state.translation.loaded += 1;
                    continue;
                }
                if !self.validator.is_valid(word, &target_lang) {
                    state
                        .translations
                        .insert(word.clone(), INVALID_WORD_TEXT.to_string());
                    state.translation.loaded += 1;
                    invalid_words.push(word.clone());
                    continue;
                }
                if seen_valid.insert(word.clone()) {
                    valid_words.push(word.clone());
                }
                if state.translations.contains_key(word) {
                    state.translation.loaded += 1;
                    continue;
                }
                if !request.force_reload {
                    if let Some(info) = self.memo.get(word, &target_lang, &native_lang) {
                        state
                            .translations
                            .insert(word.clone(), info.translation.clone());
                        state.word_info.insert(word.clone(), info);
                        state.translation.loaded += 1;
                        continue;
                    }
                }
                let occ = occurrences.entry(word.clone()).or_insert(0);
                *occ += 1;
                if *occ == 1 {
                    lookup_words.push(word.clone());
                }
            }
        });
        if classified.is_none() {
            return LoadOutcome::Superseded;
        }
        for word in invalid_words {
            warn!(word = %word, lang = %target_lang, "word failed language pattern");
            self.events.emit(PreloadEvent::InvalidWord {
                word,
                reason: INVALID_WORD_TEXT.to_string(),
            });
        }
        self.emit_progress();

        // --- Dictionary batches, strictly sequential ------------------------
        for batch in lookup_words.chunks(self.config.batch_size) {
            if !guard.should_continue() {
                debug!("preload superseded before dictionary batch");
                return LoadOutcome::Superseded;
            }
            let t0 = Instant::now();
            match self
                .api
                .dict_batch(batch, &target_lang, &native_lang, guard.token())
                .await
            {
                Ok(results) => {
                    self.metrics
                        .record(metric_names::DICT_BATCH, elapsed_ms(t0));
                    let mut not_found: Vec<String> = Vec::new();
                    let wrote = self.cache.with_current(&guard, |state| {
                        for word in batch {
                            let occ = occurrences.get(word).copied().unwrap_or(1);
                            match results.get(word) {
                                Some(info) if !info.is_not_found() => {
                                    state
                                        .translations
                                        .insert(word.clone(), info.translation.clone());
                                    state.word_info.insert(word.clone(), info.clone());
                                    self.memo.insert(
                                        word,
                                        &target_lang,
                                        &native_lang,
                                        info.clone(),
                                    );
                                }
                                // Missing key and an explicit not-found
                                // marker mean the same thing to the user.
                                _ => {
                                    state
                                        .translations
                                        .insert(word.clone(), NOT_FOUND_TEXT.to_string());
                                    not_found.push(word.clone());
                                }
                            }
                            state.translation.loaded += occ;
                        }
                    });
                    if wrote.is_none() {
                        return LoadOutcome::Superseded;
                    }
                    if !not_found.is_empty() {
                        info!(words = ?not_found, "dictionary reported words as not found");
                        self.events
                            .emit(PreloadEvent::WordsNotFound { words: not_found });
                    }
                    self.emit_progress();
                }
                Err(e) if e.is_cancelled() => {
                    debug!("dictionary batch cancelled");
                    return LoadOutcome::Superseded;
                }
                Err(e) => {
                    // Soft failure: these words stay untranslated and the
                    // counter stays under-incremented until a forced reload.
                    warn!(error = %e, batch_len = batch.len(), "dictionary batch failed");
                }
            }
        }

        // --- Plan the fan-outs ----------------------------------------------
        let mut audio_texts: Vec<String> = Vec::new();
        let mut seen_audio: HashSet<&str> = HashSet::new();
        for entry in &entries {
            if seen_audio.insert(entry.word.as_str()) {
                audio_texts.push(entry.word.clone());
            }
            if let Some(def) = &entry.definition {
                if seen_audio.insert(def.as_str()) {
                    audio_texts.push(def.clone());
                }
            }
        }

        let mut audio_jobs: Vec<(String, String)> = Vec::new();
        let mut example_jobs: Vec<String> = Vec::new();
        let mut lemma_jobs: Vec<String> = Vec::new();
        let planned = self.cache.with_current(&guard, |state| {
            state.audio.total = audio_texts.len();
            for text in &audio_texts {
                let key = audio_key(text, &accent, &target_lang);
                if self.audio.has(&key) {
                    state.audio.loaded += 1;
                } else {
                    audio_jobs.push((text.clone(), key));
                }
            }
            state.example_counter.total = valid_words.len();
            for word in &valid_words {
                if state.examples.contains_key(word) {
                    state.example_counter.loaded += 1;
                } else {
                    example_jobs.push(word.clone());
                }
            }
            if target_lang == "en" {
                state.lemma.total = valid_words.len();
                for word in &valid_words {
                    if state.lemma_family.contains_key(word) {
                        state.lemma.loaded += 1;
                    } else {
                        lemma_jobs.push(word.clone());
                    }
                }
            }
        });
        if planned.is_none() {
            return LoadOutcome::Superseded;
        }
        self.emit_progress();

        // --- Audio / examples / lemma fan-outs, concurrent with each other --
        let audio_tasks: Vec<_> = audio_jobs
            .into_iter()
            .map(|(text, key)| {
                let guard = guard.clone();
                let accent = accent.clone();
                let target_lang = target_lang.clone();
                move || async move {
                    if !guard.should_continue() {
                        return;
                    }
                    let t0 = Instant::now();
                    // The timeout holds for any DictApi impl, so a hung
                    // fetch cannot pin a pool slot.
                    let fetched = tokio::time::timeout(
                        self.config.tts_timeout,
                        self.api
                            .fetch_tts(&text, &accent, &target_lang, false, guard.token()),
                    )
                    .await
                    .unwrap_or(Err(ApiError::Timeout));
                    match fetched {
                        Ok(bytes) => {
                            self.metrics.record(metric_names::TTS_FETCH, elapsed_ms(t0));
                            let wrote = self.cache.with_current(&guard, |state| {
                                self.audio.create(bytes, &key);
                                state.audio.loaded += 1;
                            });
                            if wrote.is_some() {
                                self.emit_progress();
                            }
                        }
                        Err(e) if e.is_cancelled() => debug!(text = %text, "tts cancelled"),
                        Err(e) => warn!(text = %text, error = %e, "tts fetch failed"),
                    }
                }
            })
            .collect();

        let example_tasks: Vec<_> = example_jobs
            .into_iter()
            .map(|word| {
                let guard = guard.clone();
                let target_lang = target_lang.clone();
                move || async move {
                    if !guard.should_continue() {
                        return;
                    }
                    let t0 = Instant::now();
                    match self
                        .api
                        .fetch_examples(&word, &target_lang, self.config.examples_limit, guard.token())
                        .await
                    {
                        Ok(examples) => {
                            self.metrics
                                .record(metric_names::EXAMPLES_FETCH, elapsed_ms(t0));
                            let wrote = self.cache.with_current(&guard, |state| {
                                state.examples.insert(word.clone(), examples);
                                state.example_counter.loaded += 1;
                            });
                            if wrote.is_some() {
                                self.emit_progress();
                            }
                        }
                        Err(e) if e.is_cancelled() => debug!(word = %word, "examples cancelled"),
                        Err(e) => warn!(word = %word, error = %e, "examples fetch failed"),
                    }
                }
            })
            .collect();

        let lemma_tasks: Vec<_> = lemma_jobs
            .into_iter()
            .map(|word| {
                let guard = guard.clone();
                move || async move {
                    if !guard.should_continue() {
                        return;
                    }
                    let t0 = Instant::now();
                    match self
                        .api
                        .fetch_lemma_family(&word, self.config.lemma_limit, guard.token())
                        .await
                    {
                        Ok(family) => {
                            self.metrics
                                .record(metric_names::LEMMA_FETCH, elapsed_ms(t0));
                            let wrote = self.cache.with_current(&guard, |state| {
                                state.lemma_family.insert(word.clone(), family);
                                state.lemma.loaded += 1;
                            });
                            if wrote.is_some() {
                                self.emit_progress();
                            }
                        }
                        Err(e) if e.is_cancelled() => debug!(word = %word, "lemma cancelled"),
                        Err(e) => warn!(word = %word, error = %e, "lemma fetch failed"),
                    }
                }
            })
            .collect();

        let limit = self.config.fanout_limit;
        tokio::join!(
            pool::run_limited(audio_tasks, limit),
            pool::run_limited(example_tasks, limit),
            pool::run_limited(lemma_tasks, limit),
        );

        // --- Completion ------------------------------------------------------
        let finished = self.cache.with_current(&guard, |state| {
            state.loading = false;
        });
        match finished {
            Some(()) => {
                let elapsed = elapsed_ms(started);
                self.metrics.record(metric_names::PRELOAD_TOTAL, elapsed);
                info!(
                    generation = guard.my_generation(),
                    load_id = %load_id,
                    elapsed_ms = elapsed,
                    "preload complete"
                );
                self.emit_progress();
                self.events.emit(PreloadEvent::Finished {
                    generation: guard.my_generation(),
                });
                LoadOutcome::Completed {
                    generation: guard.my_generation(),
                }
            }
            None => {
                debug!(generation = guard.my_generation(), "preload superseded");
                LoadOutcome::Superseded
            }
        }
    }

    /// On-demand word audio (normal or slow speed), cache-first.
    pub async fn fetch_word_audio(
        &self,
        text: &str,
        accent: &str,
        lang: &str,
        slow: bool,
    ) -> Result<String, ApiError> {
        let cache = if slow { &self.slow_audio } else { &self.audio };
        let key = audio_key(text, accent, lang);
        if let Some(url) = cache.get(&key) {
            return Ok(url);
        }
        let guard = self.generation.current_guard();
        let bytes = tokio::time::timeout(
            self.config.tts_timeout,
            self.api.fetch_tts(text, accent, lang, slow, guard.token()),
        )
        .await
        .unwrap_or(Err(ApiError::Timeout))?;
        Ok(cache.create(bytes, &key))
    }

    /// On-demand example-sentence audio, cache-first.
    pub async fn fetch_sentence_audio(&self, text: &str, lang: &str) -> Result<String, ApiError> {
        let key = audio_key(text, "us", lang);
        if let Some(url) = self.sentence_audio.get(&key) {
            return Ok(url);
        }
        let guard = self.generation.current_guard();
        let bytes = tokio::time::timeout(
            self.config.tts_timeout,
            self.api.fetch_tts(text, "us", lang, false, guard.token()),
        )
        .await
        .unwrap_or(Err(ApiError::Timeout))?;
        Ok(self.sentence_audio.create(bytes, &key))
    }

    fn emit_progress(&self) {
        self.events
            .emit(PreloadEvent::Progress(self.cache.snapshot()));
    }
}

/// Trim words and definitions, drop empty lines, map empty definitions to
/// None.
fn normalize_entries(entries: Vec<WordEntry>) -> Vec<WordEntry> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let word = entry.word.trim().to_string();
            if word.is_empty() {
                return None;
            }
            let definition = entry
                .definition
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty());
            Some(WordEntry { word, definition })
        })
        .collect()
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
