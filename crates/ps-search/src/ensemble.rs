//! Concurrent backend ensembles and consensus reduction.
//!
//! One probe runs every enabled backend at a single scan-parameter value,
//! always evaluates the degenerate all-zero point as a synthetic entry, and
//! reduces the candidates to a single winner.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::debug;

use ps_backends::{backend_for, Objective, SearchBackend};
use ps_types::{BackendId, Candidate, EnsembleResult, PsError, PsResult, SearchConfig};

use crate::multistart::{derive_seed, MultiStartScheduler};

// Stream tag keeping single-shot backend seeds away from the multi-start
// attempt streams.
const GLOBAL_RUN_STREAM: u64 = 1 << 62;

/// Sample target for the simplex backend when it is the only strategy in
/// the ensemble and has to stand in for the global backends on its own.
const LONE_LOCAL_SAMPLES: usize = 50;

/// Build the worker pool shared by backends and multi-start restarts.
pub fn build_pool(config: &SearchConfig) -> PsResult<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(config.thread_count)
        .build()
        .map_err(|e| PsError::Internal(format!("failed to build worker pool: {e}")))
}

/// Pure reduction from a candidate list to the winning index.
pub struct ConsensusSelector {
    /// Costs closer than this relative spread count as a tie, which the
    /// earlier (higher-priority) entry wins.
    pub relative_epsilon: f64,
}

impl Default for ConsensusSelector {
    fn default() -> Self {
        Self {
            relative_epsilon: 1e-12,
        }
    }
}

impl ConsensusSelector {
    /// Index of the lowest-cost feasible candidate, ties resolved in favor
    /// of the earliest index.  `None` iff the input is empty or entirely
    /// infeasible.
    pub fn select(&self, candidates: &[Candidate]) -> Option<usize> {
        let mut winner: Option<usize> = None;
        for (index, candidate) in candidates.iter().enumerate() {
            if !candidate.feasible {
                continue;
            }
            match winner {
                None => winner = Some(index),
                Some(current) => {
                    let best = &candidates[current];
                    if candidate.cost < best.cost && !self.ties(candidate.cost, best.cost) {
                        winner = Some(index);
                    }
                }
            }
        }
        winner
    }

    fn ties(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.relative_epsilon * a.abs().max(b.abs()).max(1.0)
    }
}

/// Runs all enabled backends at one scan-parameter value and reduces their
/// candidates to a consensus winner.
pub struct EnsembleRunner<'a> {
    objective: &'a dyn Objective,
    config: &'a SearchConfig,
    pool: &'a rayon::ThreadPool,
    selector: ConsensusSelector,
}

impl<'a> EnsembleRunner<'a> {
    pub fn new(
        objective: &'a dyn Objective,
        config: &'a SearchConfig,
        pool: &'a rayon::ThreadPool,
    ) -> Self {
        Self {
            objective,
            config,
            pool,
            selector: ConsensusSelector::default(),
        }
    }

    /// One ensemble evaluation.  `hint` is the warm-start point threaded
    /// down from the previous bisection step, if any.
    pub fn probe(&self, scan: f64, hint: Option<&[f64]>) -> EnsembleResult {
        let dim = self.objective.dim();
        let backends = self.active_backends();
        let local_target = self.local_sample_target(&backends);

        let runs: Vec<(BackendId, Candidate, usize)> = self.pool.install(|| {
            backends
                .par_iter()
                .map(|backend| {
                    if backend.is_global() {
                        let seed = derive_seed(
                            self.config.seed,
                            GLOBAL_RUN_STREAM | backend.id() as u64,
                        );
                        let candidate =
                            backend.run(self.objective, scan, self.config, seed, hint);
                        (backend.id(), candidate, 1)
                    } else {
                        let outcome = MultiStartScheduler::new(backend.as_ref()).run(
                            self.objective,
                            scan,
                            self.config,
                            local_target,
                        );
                        let candidate = self
                            .selector
                            .select(&outcome.candidates)
                            .map(|i| outcome.candidates[i].clone())
                            .unwrap_or_else(|| Candidate::failed(dim));
                        (backend.id(), candidate, outcome.attempted)
                    }
                })
                .collect()
        });

        let origin = self.origin_candidate(scan);
        let mut attempted = 1usize;
        let mut per_backend = BTreeMap::from([(BackendId::Origin, origin.clone())]);
        for (id, candidate, runs_used) in runs {
            attempted += runs_used;
            per_backend.insert(id, candidate);
        }

        // BTreeMap iterates in BackendId order, which is exactly the
        // tie-break priority the selector expects.
        let entries: Vec<Candidate> = per_backend.values().cloned().collect();
        let mut best = self
            .selector
            .select(&entries)
            .map(|i| entries[i].clone())
            .unwrap_or_else(|| Candidate::failed(dim));

        // An optimum indistinguishable from the origin is reported as the
        // origin itself, so its magnitude is exactly zero downstream.
        if best.feasible
            && origin.feasible
            && best.magnitude() <= self.config.degeneracy_threshold
        {
            best = origin;
        }

        debug!(
            scan,
            cost = best.cost,
            magnitude = best.magnitude(),
            attempted,
            "ensemble probe finished"
        );
        EnsembleResult {
            best,
            per_backend,
            attempted,
        }
    }

    /// Enabled backends, instantiated in priority order.  Searches in one
    /// or two dimensions drop the evolutionary backend and rely on simplex
    /// restarts instead, which are cheaper and just as thorough there.
    fn active_backends(&self) -> Vec<Box<dyn SearchBackend>> {
        let mut ids: Vec<BackendId> = self.config.enabled_backends.iter().copied().collect();
        if self.objective.dim() <= 2 {
            ids.retain(|id| *id != BackendId::Evolution);
            if !ids.contains(&BackendId::Simplex) {
                ids.push(BackendId::Simplex);
                ids.sort();
            }
        }
        ids.into_iter().filter_map(backend_for).collect()
    }

    /// A lone local backend compensates for the missing global strategies
    /// with a larger sample target.
    fn local_sample_target(&self, backends: &[Box<dyn SearchBackend>]) -> usize {
        if backends.iter().any(|b| b.is_global()) {
            self.config.target_samples
        } else {
            self.config.target_samples.max(LONE_LOCAL_SAMPLES)
        }
    }

    fn origin_candidate(&self, scan: f64) -> Candidate {
        let zero = vec![0.0; self.objective.dim()];
        let cost = self.objective.cost(&zero, scan);
        Candidate::new(zero, cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ps_backends::FnObjective;

    fn runner_probe(
        objective: &dyn Objective,
        config: &SearchConfig,
        scan: f64,
    ) -> EnsembleResult {
        let pool = build_pool(config).unwrap();
        EnsembleRunner::new(objective, config, &pool).probe(scan, None)
    }

    // --- ConsensusSelector ---

    #[test]
    fn selector_picks_minimum_feasible() {
        let candidates = vec![
            Candidate::new(vec![1.0], 5.0),
            Candidate::new(vec![2.0], f64::NAN),
            Candidate::new(vec![3.0], -2.0),
            Candidate::new(vec![4.0], 0.5),
        ];
        assert_eq!(ConsensusSelector::default().select(&candidates), Some(2));
    }

    #[test]
    fn selector_rejects_all_infeasible() {
        let selector = ConsensusSelector::default();
        assert_eq!(selector.select(&[]), None);
        let candidates = vec![
            Candidate::new(vec![1.0], f64::NAN),
            Candidate::new(vec![2.0], f64::INFINITY),
        ];
        assert_eq!(selector.select(&candidates), None);
    }

    #[test]
    fn selector_breaks_ties_toward_earlier_entries() {
        let candidates = vec![
            Candidate::new(vec![1.0], 3.0),
            Candidate::new(vec![2.0], 3.0 - 1e-15),
        ];
        assert_eq!(ConsensusSelector::default().select(&candidates), Some(0));
    }

    // --- EnsembleRunner ---

    fn shifted_bowl(center: f64) -> FnObjective<impl Fn(&[f64], f64) -> f64 + Send + Sync> {
        FnObjective::new(3, move |p, _| {
            p.iter().map(|x| (x - center).powi(2)).sum::<f64>() - center
        })
    }

    fn small_config() -> SearchConfig {
        let mut config = SearchConfig::default()
            .with_search_bound(20.0)
            .with_target_samples(4)
            .with_max_attempts(40);
        config.max_iterations = 300;
        config
    }

    #[test]
    fn origin_entry_always_present() {
        let objective = shifted_bowl(5.0);
        let config = small_config();
        let result = runner_probe(&objective, &config, 0.0);
        let origin = result.per_backend.get(&BackendId::Origin).unwrap();
        assert_eq!(origin.point, vec![0.0; 3]);
        assert!(result.attempted >= result.per_backend.len());
    }

    #[test]
    fn best_is_no_worse_than_any_entry() {
        let objective = shifted_bowl(5.0);
        let config = small_config();
        let result = runner_probe(&objective, &config, 0.0);
        assert!(result.best.feasible);
        for candidate in result.per_backend.values() {
            if candidate.feasible {
                assert!(result.best.cost <= candidate.cost + 1e-9);
            }
        }
        assert!((result.magnitude() - (3.0_f64 * 25.0).sqrt()).abs() < 0.1);
    }

    #[test]
    fn near_degenerate_optimum_snaps_to_origin() {
        // Global minimum at 0.1 per axis, inside the degeneracy threshold.
        let objective = shifted_bowl(0.1);
        let config = small_config();
        let result = runner_probe(&objective, &config, 0.0);
        assert_eq!(result.best.point, vec![0.0; 3]);
        assert_eq!(result.magnitude(), 0.0);
    }

    #[test]
    fn low_dimension_drops_evolution_backend() {
        let objective = FnObjective::new(1, |p, _| (p[0] - 3.0).powi(2));
        let config = small_config().with_backends([BackendId::Evolution]);
        let result = runner_probe(&objective, &config, 0.0);
        assert!(!result.per_backend.contains_key(&BackendId::Evolution));
        assert!(result.per_backend.contains_key(&BackendId::Simplex));
    }

    #[test]
    fn probes_are_idempotent() {
        let objective = shifted_bowl(7.0);
        let config = small_config();
        let pool = build_pool(&config).unwrap();
        let runner = EnsembleRunner::new(&objective, &config, &pool);
        let a = runner.probe(10.0, None);
        let b = runner.probe(10.0, None);
        assert!((a.best.cost - b.best.cost).abs() <= 1e-9);
        assert_eq!(a.best.point, b.best.point);
        assert_eq!(a.attempted, b.attempted);
    }

    #[test]
    fn all_infeasible_probe_reports_failed_best() {
        let objective = FnObjective::new(3, |_, _| f64::NAN);
        let config = small_config();
        let result = runner_probe(&objective, &config, 0.0);
        assert!(!result.best.feasible);
        assert!(result.per_backend.values().all(|c| !c.feasible));
    }
}
