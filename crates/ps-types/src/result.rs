//! Per-probe and whole-search result types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{BackendId, Candidate, Point};

/// Outcome of one ensemble probe at a single scan-parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleResult {
    /// Lowest-cost feasible candidate across all entries, or an infeasible
    /// placeholder when every entry failed.
    pub best: Candidate,

    /// Every accepted per-backend candidate, kept for diagnostics.  The
    /// origin entry is always present.
    pub per_backend: BTreeMap<BackendId, Candidate>,

    /// Total number of backend runs dispatched for this probe, counting
    /// each multi-start restart.
    pub attempted: usize,
}

impl EnsembleResult {
    /// Magnitude of the winning optimum.
    pub fn magnitude(&self) -> f64 {
        self.best.magnitude()
    }
}

/// Terminal outcome of a threshold search.  Every variant except the
/// configuration-error path of `locate` is returned as data, never thrown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdStatus {
    /// The bracket converged onto the transition.
    Success,
    /// The optimum is already nontrivial at the upper end of the scan
    /// range, so no bracket exists.
    NontrivialAtUpperBound,
    /// The optimum is degenerate already at the lower end: no transition
    /// inside the scan range.
    DegenerateAtLowerBound,
    /// An optimum magnitude exceeded the instability bound.
    NumericallyUnstable,
    /// The magnitude-to-parameter ratio fell below the significance cut.
    BelowSignificance,
    /// Every candidate at some probe was infeasible.
    InfeasibleBracket,
}

impl std::fmt::Display for ThresholdStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::NontrivialAtUpperBound => "nontrivial-at-upper-bound",
            Self::DegenerateAtLowerBound => "degenerate-at-lower-bound",
            Self::NumericallyUnstable => "numerically-unstable",
            Self::BelowSignificance => "below-significance",
            Self::InfeasibleBracket => "infeasible-bracket",
        };
        write!(f, "{name}")
    }
}

/// Final answer of `ThresholdLocator::locate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdResult {
    pub status: ThresholdStatus,
    /// The located critical parameter on `Success`; for the other statuses
    /// the parameter value identified in the status documentation.
    pub parameter: f64,
    /// The optimum point backing the returned parameter.
    pub optimum: Point,
    /// Magnitude of that optimum.
    pub magnitude: f64,
}

/// Diagnostic record emitted after every ensemble probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeEvent {
    pub parameter: f64,
    pub magnitude: f64,
    pub cost: f64,
    pub attempted: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display_names() {
        assert_eq!(ThresholdStatus::Success.to_string(), "success");
        assert_eq!(
            ThresholdStatus::DegenerateAtLowerBound.to_string(),
            "degenerate-at-lower-bound"
        );
    }

    #[test]
    fn ensemble_result_magnitude_follows_best() {
        let best = Candidate::new(vec![3.0, 4.0], -1.0);
        let result = EnsembleResult {
            best: best.clone(),
            per_backend: BTreeMap::from([(BackendId::Origin, best)]),
            attempted: 1,
        };
        assert!((result.magnitude() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn threshold_result_round_trips_through_json() {
        let result = ThresholdResult {
            status: ThresholdStatus::Success,
            parameter: 123.25,
            optimum: vec![1.0, -2.0],
            magnitude: 5.0_f64.sqrt(),
        };
        let json = serde_json::to_string(&result).unwrap();
        let back: ThresholdResult = serde_json::from_str(&json).unwrap();
        assert_eq!(result, back);
    }
}
