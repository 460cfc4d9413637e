//! Timing histograms for the pipeline's network stages.
//! Samples are kept in fixed-size rings; summaries report p50/p95/p99.

use std::collections::HashMap;

use parking_lot::Mutex;

const RING_CAPACITY: usize = 1024;

/// Fixed-capacity ring of samples for one metric.
struct SampleRing {
    samples: Vec<f64>,
    pos: usize,
    count: usize,
}

impl SampleRing {
    fn new() -> Self {
        Self {
            samples: vec![0.0; RING_CAPACITY],
            pos: 0,
            count: 0,
        }
    }

    fn push(&mut self, value: f64) {
        self.samples[self.pos] = value;
        self.pos = (self.pos + 1) % RING_CAPACITY;
        if self.count < RING_CAPACITY {
            self.count += 1;
        }
    }

    fn percentile(&self, p: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let mut sorted: Vec<f64> = self.samples[..self.count].to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let idx = ((p / 100.0) * (self.count as f64 - 1.0)).round() as usize;
        sorted[idx.min(self.count - 1)]
    }
}

/// Histogram store for all named metrics. Values are milliseconds.
#[derive(Default)]
pub struct MetricsRegistry {
    histograms: Mutex<HashMap<&'static str, SampleRing>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &'static str, value_ms: f64) {
        self.histograms
            .lock()
            .entry(name)
            .or_insert_with(SampleRing::new)
            .push(value_ms);
    }

    pub fn percentile(&self, name: &str, p: f64) -> f64 {
        self.histograms
            .lock()
            .get(name)
            .map(|ring| ring.percentile(p))
            .unwrap_or(0.0)
    }

    pub fn summary(&self) -> HashMap<String, MetricSummary> {
        let hists = self.histograms.lock();
        hists
            .iter()
            .map(|(&name, ring)| {
                (
                    name.to_string(),
                    MetricSummary {
                        p50_ms: ring.percentile(50.0),
                        p95_ms: ring.percentile(95.0),
                        p99_ms: ring.percentile(99.0),
                        count: ring.count,
                    },
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricSummary {
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub count: usize,
}

/// Well-known metric names.
pub mod metric_names {
    pub const DICT_BATCH: &str = "t_dict_batch";
    pub const TTS_FETCH: &str = "t_tts_fetch";
    pub const EXAMPLES_FETCH: &str = "t_examples_fetch";
    pub const LEMMA_FETCH: &str = "t_lemma_fetch";
    pub const PRELOAD_TOTAL: &str = "t_preload_total";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentiles_over_known_samples() {
        let reg = MetricsRegistry::new();
        for v in 1..=100 {
            reg.record(metric_names::TTS_FETCH, v as f64);
        }
        assert_eq!(reg.percentile(metric_names::TTS_FETCH, 50.0), 51.0);
        assert_eq!(reg.percentile(metric_names::TTS_FETCH, 99.0), 99.0);
        assert_eq!(reg.percentile("unknown", 50.0), 0.0);
    }

    #[test]
    fn summary_lists_recorded_metrics() {
        let reg = MetricsRegistry::new();
        reg.record(metric_names::DICT_BATCH, 12.0);
        let summary = reg.summary();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary["t_dict_batch"].count, 1);
    }
}
