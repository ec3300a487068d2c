//! Candidate minima and their cost ordering.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A location in the search space.  Fixed length for a given objective,
/// immutable once produced by a backend.
pub type Point = Vec<f64>;

/// One proposed optimum with its cost and feasibility flag, produced by a
/// single backend invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub point: Point,
    pub cost: f64,
    pub feasible: bool,
}

impl Candidate {
    /// A candidate is feasible exactly when its cost is finite.
    pub fn new(point: Point, cost: f64) -> Self {
        let feasible = cost.is_finite();
        Self {
            point,
            cost,
            feasible,
        }
    }

    /// Infeasible placeholder for a backend run that broke down.
    pub fn failed(dim: usize) -> Self {
        Self {
            point: vec![0.0; dim],
            cost: f64::NAN,
            feasible: false,
        }
    }

    /// Euclidean norm of the candidate's point.  This is the "magnitude"
    /// the threshold search classifies against: zero (within threshold)
    /// means the degenerate optimum.
    pub fn magnitude(&self) -> f64 {
        self.point.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Total order by cost.  Feasible candidates sort before infeasible
    /// ones; infeasible candidates (NaN or otherwise non-finite cost)
    /// compare equal among themselves.
    pub fn compare_cost(&self, other: &Self) -> Ordering {
        match (self.feasible, other.feasible) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => Ordering::Equal,
            // Feasible implies finite cost, so partial_cmp cannot fail here.
            (true, true) => self
                .cost
                .partial_cmp(&other.cost)
                .unwrap_or(Ordering::Equal),
        }
    }
}
