//! ## meshload-core::sampling
//! **Per-request skip decisions**
//!
//! Every executor owns its random source instead of sharing a process-wide
//! one, so a fixed seed reproduces the exact sequence of sent and skipped
//! requests.

use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::model::Probability;

/// Decides whether a request command is skipped on this invocation.
pub struct RequestSampler {
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl RequestSampler {
    /// Deterministic sampler.
    pub fn from_seed(seed: u64) -> Self {
        Self::with_rng(SmallRng::seed_from_u64(seed))
    }

    /// Sampler seeded from the thread-local generator.
    pub fn from_entropy() -> Self {
        Self::with_rng(SmallRng::from_rng(&mut rand::rng()))
    }

    pub fn with_rng(rng: impl RngCore + Send + 'static) -> Self {
        Self {
            rng: Mutex::new(Box::new(rng)),
        }
    }

    /// `true` when the request must not be sent.
    ///
    /// [`Probability::ALWAYS`] never skips. Otherwise a draw in `[0, 100)`
    /// below `100 - p` skips, which sends roughly `p` requests out of 100.
    pub fn should_skip(&self, probability: Probability) -> bool {
        if probability.is_always() {
            return false;
        }
        let draw: u32 = self.rng.lock().random_range(0..100);
        draw < 100 - u32::from(probability.percent())
    }
}

impl Default for RequestSampler {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl std::fmt::Debug for RequestSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSampler").finish_non_exhaustive()
    }
}
