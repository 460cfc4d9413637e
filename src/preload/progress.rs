//! UI-facing progress derived from the orchestrator's counters.
//! Purely observational; safe to read at any point during a load.

use serde::Serialize;

/// Loaded/total for one fetch category. `loaded < total` can persist after
/// a load finishes: soft per-item failures leave the counter
/// under-incremented until a forced reload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counter {
    pub loaded: usize,
    pub total: usize,
}

impl Counter {
    pub fn is_complete(&self) -> bool {
        self.loaded >= self.total
    }
}

/// Snapshot of the whole load's progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub translation: Counter,
    pub audio: Counter,
    pub examples: Counter,
    pub lemma: Counter,
    pub word_count: usize,
    pub loading: bool,
}

impl ProgressSnapshot {
    /// Aggregate loaded/total across every category.
    pub fn overall(&self) -> Counter {
        Counter {
            loaded: self.translation.loaded
                + self.audio.loaded
                + self.examples.loaded
                + self.lemma.loaded,
            total: self.translation.total
                + self.audio.total
                + self.examples.total
                + self.lemma.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_sums_categories() {
        let snap = ProgressSnapshot {
            translation: Counter { loaded: 2, total: 3 },
            audio: Counter { loaded: 1, total: 3 },
            examples: Counter { loaded: 0, total: 2 },
            lemma: Counter { loaded: 2, total: 2 },
            word_count: 3,
            loading: true,
        };
        assert_eq!(snap.overall(), Counter { loaded: 5, total: 10 });
        assert!(!snap.overall().is_complete());
    }
}
