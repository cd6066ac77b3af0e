//! Per-search session context
//!
//! Carries what would otherwise be global: the randomization policy with
//! its RNG and the cancellation flag. One context belongs to exactly one
//! explorer.

use crate::domain::choice::ChoiceGenerator;
use crate::domain::config::Randomization;
use crate::infrastructure::random::rng_for;
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag
///
/// Clones observe the same flag, so a token handed to another thread can
/// stop a running search.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// RNG, policy and cancellation of one search
#[derive(Debug)]
pub struct SearchContext {
    randomization: Randomization,
    seed: Option<u64>,
    rng: Option<ChaCha8Rng>,
    cancel: CancelToken,
}

impl SearchContext {
    /// Context for `randomization` with a fresh token
    pub fn new(randomization: Randomization) -> Self {
        Self::with_cancel_token(randomization, CancelToken::new())
    }

    /// Context observing an existing token
    pub fn with_cancel_token(randomization: Randomization, cancel: CancelToken) -> Self {
        let (rng, seed) = match rng_for(randomization) {
            Some((rng, seed)) => (Some(rng), Some(seed)),
            None => (None, None),
        };
        Self {
            randomization,
            seed,
            rng,
            cancel,
        }
    }

    /// Configured policy
    pub fn randomization(&self) -> Randomization {
        self.randomization
    }

    /// Effective seed (resolved for time seeds)
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Cancellation token
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Whether the search should stop
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Apply the policy to a freshly created generator
    pub fn randomize(&mut self, cg: &mut ChoiceGenerator) {
        if let Some(rng) = self.rng.as_mut() {
            cg.randomize(rng);
        }
    }
}

impl Default for SearchContext {
    fn default() -> Self {
        Self::new(Randomization::Disabled)
    }
}
