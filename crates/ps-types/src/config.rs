//! Search configuration and backend selection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{config_error, PsResult};

/// Identifies one optimization strategy in the ensemble.
///
/// The derived ordering is the deterministic tie-break priority used when
/// two candidates have equal cost: the synthetic origin entry wins against
/// every real backend, then the real backends in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BackendId {
    /// Synthetic entry: the objective evaluated at the all-zero point.
    Origin,
    /// Derivative-free simplex descent, local, driven by multi-start.
    Simplex,
    /// Differential evolution, semi-global, one run per probe.
    Evolution,
    /// Deterministic space-partitioning global search with local polish.
    Partition,
}

impl std::fmt::Display for BackendId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Origin => "origin",
            Self::Simplex => "simplex",
            Self::Evolution => "evolution",
            Self::Partition => "partition",
        };
        write!(f, "{name}")
    }
}

/// Top-level configuration for a threshold search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Which real backends participate in each probe.  The origin entry is
    /// always present and is not listed here.
    pub enabled_backends: BTreeSet<BackendId>,

    /// Base seed for every randomized component.
    pub seed: u64,

    /// Iteration budget for a single local or global backend run.
    pub max_iterations: usize,

    /// Convergence tolerance for the backend algorithms.
    pub tolerance: f64,

    /// Number of feasible multi-start candidates to collect per probe.
    pub target_samples: usize,

    /// Starting points to try before the scheduler gives up.
    pub max_attempts: usize,

    /// Half-width of the uniform box starting points are drawn from.
    pub search_bound: f64,

    /// Optimum magnitudes at or below this value count as the degenerate
    /// (all-zero) optimum.
    pub degeneracy_threshold: f64,

    /// Minimum accepted `magnitude / scan_parameter` ratio during the
    /// bisection.  Zero disables the check.
    pub significance_ratio: f64,

    /// Magnitudes at or above this value are treated as a numerical
    /// instability rather than a physical optimum.
    pub instability_bound: f64,

    /// Bracket width at which the bisection stops.
    pub scan_tolerance: f64,

    /// Worker pool size shared by backends and multi-start restarts.
    pub thread_count: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled_backends: [BackendId::Simplex, BackendId::Evolution, BackendId::Partition]
                .into_iter()
                .collect(),
            seed: 1,
            max_iterations: 600,
            tolerance: 1e-4,
            target_samples: 20,
            max_attempts: 600,
            search_bound: 500.0,
            degeneracy_threshold: 0.5,
            significance_ratio: 0.0,
            instability_bound: 255.0,
            scan_tolerance: 1e-2,
            thread_count: std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1),
        }
    }
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backends(mut self, backends: impl IntoIterator<Item = BackendId>) -> Self {
        self.enabled_backends = backends.into_iter().collect();
        self.enabled_backends.remove(&BackendId::Origin);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_target_samples(mut self, n: usize) -> Self {
        self.target_samples = n;
        self
    }

    pub fn with_max_attempts(mut self, n: usize) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn with_thread_count(mut self, n: usize) -> Self {
        self.thread_count = n;
        self
    }

    pub fn with_search_bound(mut self, bound: f64) -> Self {
        self.search_bound = bound;
        self
    }

    pub fn with_thresholds(
        mut self,
        degeneracy_threshold: f64,
        significance_ratio: f64,
        instability_bound: f64,
    ) -> Self {
        self.degeneracy_threshold = degeneracy_threshold;
        self.significance_ratio = significance_ratio;
        self.instability_bound = instability_bound;
        self
    }

    pub fn with_scan_tolerance(mut self, tol: f64) -> Self {
        self.scan_tolerance = tol;
        self
    }

    /// Reject configurations no search should start from.
    pub fn validate(&self) -> PsResult<()> {
        if self.enabled_backends.is_empty() {
            return Err(config_error!("no backends enabled"));
        }
        if self.enabled_backends.contains(&BackendId::Origin) {
            return Err(config_error!(
                "the origin entry is implicit and cannot be enabled as a backend"
            ));
        }
        if !(self.tolerance > 0.0) {
            return Err(config_error!(
                "tolerance must be positive, got {}",
                self.tolerance
            ));
        }
        if !(self.scan_tolerance > 0.0) {
            return Err(config_error!(
                "scan tolerance must be positive, got {}",
                self.scan_tolerance
            ));
        }
        if self.thread_count == 0 {
            return Err(config_error!("thread count must be at least 1"));
        }
        if !(self.search_bound > 0.0) {
            return Err(config_error!(
                "search bound must be positive, got {}",
                self.search_bound
            ));
        }
        if !(self.instability_bound > self.degeneracy_threshold) {
            return Err(config_error!(
                "instability bound {} must exceed degeneracy threshold {}",
                self.instability_bound,
                self.degeneracy_threshold
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SearchConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_backend_set_rejected() {
        let config = SearchConfig::default().with_backends([]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn origin_cannot_be_enabled() {
        let mut config = SearchConfig::default();
        config.enabled_backends.insert(BackendId::Origin);
        assert!(config.validate().is_err());

        // The builder silently drops it instead.
        let config = SearchConfig::default().with_backends([BackendId::Origin, BackendId::Simplex]);
        assert_eq!(config.enabled_backends.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn non_positive_tolerance_rejected() {
        let mut config = SearchConfig::default();
        config.tolerance = 0.0;
        assert!(config.validate().is_err());
        config.tolerance = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn backend_priority_order() {
        assert!(BackendId::Origin < BackendId::Simplex);
        assert!(BackendId::Simplex < BackendId::Evolution);
        assert!(BackendId::Evolution < BackendId::Partition);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = SearchConfig::default()
            .with_seed(42)
            .with_backends([BackendId::Simplex]);
        let json = serde_json::to_string(&config).unwrap();
        let back: SearchConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
