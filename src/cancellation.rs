//! Cancellation framework: CancellationToken + load-generation guard.
//! Ensures a superseded preload cannot write results into the shared cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

/// Tracks the current load generation. Each new preload advances the
/// generation, cancels all tasks of the prior load, and issues a fresh
/// CancellationToken.
pub struct TaskGeneration {
    current_token: RwLock<CancellationToken>,
    generation: Arc<AtomicU64>,
}

impl TaskGeneration {
    pub fn new() -> Self {
        Self {
            current_token: RwLock::new(CancellationToken::new()),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Cancel all tasks of the previous load, advance the generation, and
    /// return a guard for the new load.
    pub fn cancel_and_advance(&self) -> GenerationGuard {
        let mut token_guard = self.current_token.write();
        token_guard.cancel();
        let new_root = CancellationToken::new();
        let child = new_root.child_token();
        *token_guard = new_root;
        let gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        GenerationGuard {
            generation: Arc::clone(&self.generation),
            my_generation: gen,
            token: child,
        }
    }

    /// Guard for the current generation, without cancelling anything.
    pub fn current_guard(&self) -> GenerationGuard {
        let token_guard = self.current_token.read();
        GenerationGuard {
            generation: Arc::clone(&self.generation),
            my_generation: self.generation.load(Ordering::SeqCst),
            token: token_guard.child_token(),
        }
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Cancel all in-flight tasks without advancing the generation.
    /// Used on context disposal.
    pub fn cancel_all(&self) {
        let token_guard = self.current_token.read();
        token_guard.cancel();
    }
}

impl Default for TaskGeneration {
    fn default() -> Self {
        Self::new()
    }
}

/// Captured by every async unit of work at its start. The task re-checks the
/// guard before any shared-state mutation or before scheduling follow-up
/// work; a stale guard means the task returns early, silently.
#[derive(Clone)]
pub struct GenerationGuard {
    generation: Arc<AtomicU64>,
    my_generation: u64,
    token: CancellationToken,
}

impl GenerationGuard {
    /// True if this task still belongs to the current generation.
    #[inline]
    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.my_generation
    }

    /// True if cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// True if the task should keep going: not cancelled and still current.
    #[inline]
    pub fn should_continue(&self) -> bool {
        !self.is_cancelled() && self.is_current()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn my_generation(&self) -> u64 {
        self.my_generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_increments_by_one() {
        let tg = TaskGeneration::new();
        assert_eq!(tg.current_generation(), 0);
        let g1 = tg.cancel_and_advance();
        let g2 = tg.cancel_and_advance();
        let g3 = tg.cancel_and_advance();
        assert_eq!(g1.my_generation(), 1);
        assert_eq!(g2.my_generation(), 2);
        assert_eq!(g3.my_generation(), 3);
        assert_eq!(tg.current_generation(), 3);
    }

    #[test]
    fn advancing_cancels_prior_token_only() {
        let tg = TaskGeneration::new();
        let g1 = tg.cancel_and_advance();
        assert!(!g1.is_cancelled());
        let g2 = tg.cancel_and_advance();
        assert!(g1.is_cancelled());
        assert!(!g2.is_cancelled());
        assert!(!g1.should_continue());
        assert!(g2.should_continue());
    }

    #[test]
    fn stale_guard_detected_without_cancellation() {
        let tg = TaskGeneration::new();
        let g1 = tg.current_guard();
        assert!(g1.is_current());
        let _g2 = tg.cancel_and_advance();
        assert!(!g1.is_current());
    }

    #[test]
    fn cancel_all_does_not_advance() {
        let tg = TaskGeneration::new();
        let g1 = tg.cancel_and_advance();
        tg.cancel_all();
        assert!(g1.is_cancelled());
        assert_eq!(tg.current_generation(), 1);
        // Still "current" by generation; only the token is dead.
        assert!(g1.is_current());
        assert!(!g1.should_continue());
    }
}
