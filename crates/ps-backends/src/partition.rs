//! Deterministic space-partitioning global search.
//!
//! A DIRECT-style rectangle subdivision over the search box: each round
//! splits both the lowest-cost cell and the largest remaining cell, so the
//! search keeps refining the incumbent while still covering the box.  A
//! final simplex polish sharpens the best center.  Uses no randomness, so
//! two runs with the same inputs are identical.

use ps_types::{BackendId, Candidate, SearchConfig};

use crate::{Objective, SearchBackend, SimplexBackend};

struct Cell {
    center: Vec<f64>,
    half: Vec<f64>,
    cost: f64,
}

impl Cell {
    fn diameter(&self) -> f64 {
        self.half.iter().copied().fold(0.0, f64::max)
    }
}

pub struct PartitionBackend {
    /// Run a local simplex descent from the best center before returning.
    pub polish: bool,
}

impl Default for PartitionBackend {
    fn default() -> Self {
        Self { polish: true }
    }
}

impl SearchBackend for PartitionBackend {
    fn id(&self) -> BackendId {
        BackendId::Partition
    }

    fn is_global(&self) -> bool {
        true
    }

    fn run(
        &self,
        objective: &dyn Objective,
        scan: f64,
        config: &SearchConfig,
        seed: u64,
        hint: Option<&[f64]>,
    ) -> Candidate {
        let dim = objective.dim();
        if dim == 0 {
            return Candidate::failed(0);
        }

        let root_center = vec![0.0; dim];
        let root_cost = objective.cost(&root_center, scan);
        let mut cells = vec![Cell {
            center: root_center,
            half: vec![config.search_bound; dim],
            cost: root_cost,
        }];

        // Each split costs two evaluations; budget them against the same
        // iteration limit the other backends use.
        let mut evaluations = 1usize;
        while evaluations < config.max_iterations {
            let best = cells
                .iter()
                .enumerate()
                .filter(|(_, cell)| cell.cost.is_finite())
                .min_by(|(_, a), (_, b)| {
                    a.cost
                        .partial_cmp(&b.cost)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(i, _)| i);
            let widest = cells
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| {
                    a.diameter()
                        .partial_cmp(&b.diameter())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(i, _)| i);

            let mut targets: Vec<usize> = best.into_iter().collect();
            if let Some(w) = widest {
                if !targets.contains(&w) {
                    targets.push(w);
                }
            }
            if targets.is_empty() {
                break;
            }

            let mut progressed = false;
            for index in targets {
                if evaluations >= config.max_iterations {
                    break;
                }
                if let Some((left, right)) = trisect(&mut cells[index], objective, scan) {
                    evaluations += 2;
                    progressed = true;
                    cells.push(left);
                    cells.push(right);
                }
            }
            if !progressed {
                break;
            }
        }

        let incumbent = cells
            .into_iter()
            .filter(|cell| cell.cost.is_finite())
            .min_by(|a, b| {
                a.cost
                    .partial_cmp(&b.cost)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        let mut result = match incumbent {
            Some(cell) => Candidate::new(cell.center, cell.cost),
            None => return Candidate::failed(dim),
        };

        // A caller-provided warm start competes with the partition's own
        // incumbent for the polish starting point.
        if self.polish {
            let start = match hint {
                Some(h) if h.len() == dim && objective.cost(h, scan) < result.cost => h.to_vec(),
                _ => result.point.clone(),
            };
            let polished = SimplexBackend.run(objective, scan, config, seed, Some(&start));
            if polished.feasible && polished.compare_cost(&result) == std::cmp::Ordering::Less {
                result = polished;
            }
        }
        result
    }
}

/// Shrink `cell` to the middle third of its longest axis and return the two
/// outer thirds as new cells.  `None` when the cell is already degenerate.
fn trisect(cell: &mut Cell, objective: &dyn Objective, scan: f64) -> Option<(Cell, Cell)> {
    let axis = cell
        .half
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)?;
    let width = cell.half[axis];
    if width <= 0.0 || !width.is_finite() {
        return None;
    }

    let third = width / 3.0 * 2.0;
    cell.half[axis] = width / 3.0;

    let mut make = |direction: f64| {
        let mut center = cell.center.clone();
        center[axis] += direction * third;
        let cost = objective.cost(&center, scan);
        Cell {
            center,
            half: cell.half.clone(),
            cost,
        }
    };
    Some((make(-1.0), make(1.0)))
}
