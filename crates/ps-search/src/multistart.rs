//! Multi-start driver for local backends.
//!
//! Generates seeded random starting points, runs the backend from each in
//! parallel, and collects feasible candidates until the target count is
//! reached or the attempt budget runs out.  Starting points and acceptance
//! are indexed by attempt number, never by completion order, so a fixed
//! seed reproduces the same candidate set at any thread count.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

use ps_backends::{Objective, SearchBackend};
use ps_types::{Candidate, SearchConfig};

/// Derive an independent seed for one stream of the search.  splitmix64
/// finalizer, so neighboring stream ids decorrelate.
pub(crate) fn derive_seed(seed: u64, stream: u64) -> u64 {
    let mut z = seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

// Attempt `i` owns two streams: an even one for its starting point and an
// odd one for the backend run itself.
fn start_stream(attempt: usize) -> u64 {
    (attempt as u64) << 1
}

fn run_stream(attempt: usize) -> u64 {
    ((attempt as u64) << 1) | 1
}

/// What one multi-start round produced.
#[derive(Debug, Clone)]
pub struct MultiStartOutcome {
    /// Feasible candidates in attempt order, at most the requested target.
    pub candidates: Vec<Candidate>,
    /// Starting points actually dispatched.
    pub attempted: usize,
}

/// Drives a local backend from many independent starting points.
pub struct MultiStartScheduler<'a> {
    backend: &'a dyn SearchBackend,
}

impl<'a> MultiStartScheduler<'a> {
    pub fn new(backend: &'a dyn SearchBackend) -> Self {
        Self { backend }
    }

    /// Collect up to `target` feasible candidates.  Runs on the ambient
    /// rayon pool; callers that want a dedicated pool wrap this call in
    /// `ThreadPool::install`.
    pub fn run(
        &self,
        objective: &dyn Objective,
        scan: f64,
        config: &SearchConfig,
        target: usize,
    ) -> MultiStartOutcome {
        if target == 0 {
            return MultiStartOutcome {
                candidates: Vec::new(),
                attempted: 0,
            };
        }

        let feasible_found = AtomicUsize::new(0);
        let mut candidates: Vec<Candidate> = Vec::with_capacity(target);
        let mut attempted = 0usize;

        loop {
            let found = feasible_found.load(Ordering::Relaxed);
            if found >= target || attempted >= config.max_attempts {
                break;
            }
            // Dispatch only as many starts as could still be needed, so a
            // round that succeeds everywhere never overshoots the target.
            let chunk = config
                .thread_count
                .min(target - found)
                .min(config.max_attempts - attempted);

            let batch: Vec<Candidate> = (attempted..attempted + chunk)
                .into_par_iter()
                .map(|attempt| {
                    let start = start_point(objective.dim(), config, attempt);
                    let candidate = self.backend.run(
                        objective,
                        scan,
                        config,
                        derive_seed(config.seed, run_stream(attempt)),
                        Some(&start),
                    );
                    if candidate.feasible {
                        feasible_found.fetch_add(1, Ordering::Relaxed);
                    }
                    candidate
                })
                .collect();

            attempted += chunk;
            candidates.extend(batch.into_iter().filter(|c| c.feasible));
        }

        candidates.truncate(target);
        debug!(
            backend = %self.backend.id(),
            found = candidates.len(),
            attempted,
            "multi-start round finished"
        );
        MultiStartOutcome {
            candidates,
            attempted,
        }
    }
}

/// Uniform sample from the search box, reproducible per attempt index.
fn start_point(dim: usize, config: &SearchConfig, attempt: usize) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(derive_seed(config.seed, start_stream(attempt)));
    let bound = config.search_bound;
    (0..dim).map(|_| rng.random_range(-bound..=bound)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ps_backends::{FnObjective, SimplexBackend};

    fn bowl() -> FnObjective<impl Fn(&[f64], f64) -> f64 + Send + Sync> {
        FnObjective::new(2, |p, _| (p[0] - 1.0).powi(2) + (p[1] + 1.0).powi(2))
    }

    #[test]
    fn zero_target_returns_immediately() {
        let objective = bowl();
        let config = SearchConfig::default();
        let outcome = MultiStartScheduler::new(&SimplexBackend).run(&objective, 0.0, &config, 0);
        assert!(outcome.candidates.is_empty());
        assert_eq!(outcome.attempted, 0);
    }

    #[test]
    fn converging_objective_hits_target_exactly() {
        let objective = bowl();
        let config = SearchConfig::default().with_search_bound(10.0);
        let outcome = MultiStartScheduler::new(&SimplexBackend).run(&objective, 0.0, &config, 5);
        assert_eq!(outcome.candidates.len(), 5);
        // Every start converges, so nothing beyond the fifth success is
        // ever dispatched.
        assert_eq!(outcome.attempted, 5);
        for c in &outcome.candidates {
            assert!(c.feasible);
            assert!((c.point[0] - 1.0).abs() < 1e-2);
        }
    }

    #[test]
    fn exhausts_attempt_budget_when_nothing_converges() {
        let objective = FnObjective::new(2, |_, _| f64::NAN);
        let config = SearchConfig::default().with_max_attempts(12);
        let outcome = MultiStartScheduler::new(&SimplexBackend).run(&objective, 0.0, &config, 3);
        assert!(outcome.candidates.is_empty());
        assert_eq!(outcome.attempted, 12);
    }

    #[test]
    fn candidate_set_is_invariant_to_chunking() {
        let objective = bowl();
        let narrow = SearchConfig::default()
            .with_search_bound(10.0)
            .with_thread_count(1);
        let wide = SearchConfig::default()
            .with_search_bound(10.0)
            .with_thread_count(8);
        let scheduler = MultiStartScheduler::new(&SimplexBackend);
        let a = scheduler.run(&objective, 0.0, &narrow, 6);
        let b = scheduler.run(&objective, 0.0, &wide, 6);
        assert_eq!(a.candidates.len(), b.candidates.len());
        for (x, y) in a.candidates.iter().zip(&b.candidates) {
            assert_eq!(x.point, y.point);
            assert_eq!(x.cost, y.cost);
        }
    }

    #[test]
    fn start_points_depend_only_on_seed_and_index() {
        let config = SearchConfig::default().with_seed(9);
        let a = start_point(3, &config, 17);
        let b = start_point(3, &config, 17);
        assert_eq!(a, b);
        let c = start_point(3, &config, 18);
        assert_ne!(a, c);
        for v in &a {
            assert!(v.abs() <= config.search_bound);
        }
    }
}
