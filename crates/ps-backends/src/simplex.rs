//! Derivative-free simplex descent (Nelder–Mead).
//!
//! Local only: a single run walks downhill from its starting point, so the
//! orchestration layer restarts it from many random starts to approximate
//! the global optimum.

use ps_types::{BackendId, Candidate, SearchConfig};

use crate::{Objective, SearchBackend};

/// Initial edge length of the starting simplex.
const INITIAL_STEP: f64 = 1.0;

pub struct SimplexBackend;

impl SearchBackend for SimplexBackend {
    fn id(&self) -> BackendId {
        BackendId::Simplex
    }

    fn is_global(&self) -> bool {
        false
    }

    fn run(
        &self,
        objective: &dyn Objective,
        scan: f64,
        config: &SearchConfig,
        _seed: u64,
        hint: Option<&[f64]>,
    ) -> Candidate {
        let dim = objective.dim();
        let start = match hint {
            Some(h) => h.to_vec(),
            None => vec![0.0; dim],
        };
        match nelder_mead(objective, scan, &start, config.max_iterations, config.tolerance) {
            Some((point, cost)) => Candidate::new(point, cost),
            None => Candidate::failed(dim),
        }
    }
}

fn compare_nan_last(a: f64, b: f64) -> std::cmp::Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal),
    }
}

/// Classic Nelder–Mead with reflection, expansion, contraction and shrink.
/// Returns `None` on non-convergence within `max_iter` or when the best
/// vertex value is not finite.
fn nelder_mead(
    objective: &dyn Objective,
    scan: f64,
    start: &[f64],
    max_iter: usize,
    tolerance: f64,
) -> Option<(Vec<f64>, f64)> {
    let n = start.len();
    if n == 0 {
        return None;
    }

    let alpha = 1.0; // reflection
    let gamma = 2.0; // expansion
    let rho = 0.5; // contraction
    let sigma = 0.5; // shrink

    // Start vertex plus one unit step along each axis.
    let mut vertices: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    vertices.push(start.to_vec());
    for i in 0..n {
        let mut v = start.to_vec();
        v[i] += INITIAL_STEP;
        vertices.push(v);
    }
    let mut values: Vec<f64> = vertices
        .iter()
        .map(|v| objective.cost(v, scan))
        .collect();

    for _ in 0..max_iter {
        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&a, &b| compare_nan_last(values[a], values[b]));
        let best = order[0];
        let worst = order[n];
        let second_worst = order[n - 1];

        if !values[best].is_finite() {
            return None;
        }

        // Converged when the simplex has collapsed both in value spread and
        // in extent around the best vertex.
        let value_spread = if values[worst].is_finite() {
            values[worst] - values[best]
        } else {
            f64::INFINITY
        };
        let extent = vertices
            .iter()
            .map(|v| {
                v.iter()
                    .zip(&vertices[best])
                    .map(|(a, b)| (a - b).abs())
                    .fold(0.0_f64, f64::max)
            })
            .fold(0.0_f64, f64::max);
        if value_spread <= tolerance * (1.0 + values[best].abs()) && extent <= tolerance {
            return Some((vertices[best].clone(), values[best]));
        }

        // Centroid of all vertices except the worst.
        let mut centroid = vec![0.0; n];
        for &i in &order[..n] {
            for (c, v) in centroid.iter_mut().zip(&vertices[i]) {
                *c += v / n as f64;
            }
        }

        let reflect = |from: &[f64], coeff: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(from)
                .map(|(c, w)| c + coeff * (c - w))
                .collect()
        };

        let reflected = reflect(&vertices[worst], alpha);
        let f_reflected = objective.cost(&reflected, scan);

        if compare_nan_last(f_reflected, values[best]) == std::cmp::Ordering::Less {
            // Try to expand further along the same direction.
            let expanded = reflect(&vertices[worst], gamma);
            let f_expanded = objective.cost(&expanded, scan);
            if compare_nan_last(f_expanded, f_reflected) == std::cmp::Ordering::Less {
                vertices[worst] = expanded;
                values[worst] = f_expanded;
            } else {
                vertices[worst] = reflected;
                values[worst] = f_reflected;
            }
        } else if compare_nan_last(f_reflected, values[second_worst]) == std::cmp::Ordering::Less {
            vertices[worst] = reflected;
            values[worst] = f_reflected;
        } else {
            // Contract toward the centroid.
            let contracted: Vec<f64> = centroid
                .iter()
                .zip(&vertices[worst])
                .map(|(c, w)| c + rho * (w - c))
                .collect();
            let f_contracted = objective.cost(&contracted, scan);
            if compare_nan_last(f_contracted, values[worst]) == std::cmp::Ordering::Less {
                vertices[worst] = contracted;
                values[worst] = f_contracted;
            } else {
                // Shrink everything toward the best vertex.
                let best_vertex = vertices[best].clone();
                for i in 0..=n {
                    if i == best {
                        continue;
                    }
                    for (v, b) in vertices[i].iter_mut().zip(&best_vertex) {
                        *v = b + sigma * (*v - b);
                    }
                    values[i] = objective.cost(&vertices[i], scan);
                }
            }
        }
    }

    // Iteration budget exhausted without meeting the tolerance.
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FnObjective;

    fn bowl(center: f64) -> FnObjective<impl Fn(&[f64], f64) -> f64 + Send + Sync> {
        FnObjective::new(2, move |p, _| {
            (p[0] - center).powi(2) + (p[1] + center).powi(2)
        })
    }

    #[test]
    fn descends_to_nearby_minimum() {
        let objective = bowl(3.0);
        let config = SearchConfig::default();
        let candidate = SimplexBackend.run(&objective, 0.0, &config, 0, Some(&[2.0, -2.0]));
        assert!(candidate.feasible);
        assert!((candidate.point[0] - 3.0).abs() < 1e-2);
        assert!((candidate.point[1] + 3.0).abs() < 1e-2);
        assert!(candidate.cost < 1e-3);
    }

    #[test]
    fn defaults_to_origin_start() {
        let objective = bowl(0.0);
        let config = SearchConfig::default();
        let candidate = SimplexBackend.run(&objective, 0.0, &config, 0, None);
        assert!(candidate.feasible);
        assert!(candidate.magnitude() < 1e-2);
    }

    #[test]
    fn fails_closed_on_nan_surface() {
        let objective = FnObjective::new(2, |_, _| f64::NAN);
        let config = SearchConfig::default();
        let candidate = SimplexBackend.run(&objective, 0.0, &config, 0, Some(&[1.0, 1.0]));
        assert!(!candidate.feasible);
        assert!(candidate.cost.is_nan());
    }

    #[test]
    fn fails_closed_when_budget_too_small() {
        let objective = bowl(100.0);
        let mut config = SearchConfig::default();
        config.max_iterations = 3;
        let candidate = SimplexBackend.run(&objective, 0.0, &config, 0, Some(&[0.0, 0.0]));
        assert!(!candidate.feasible);
    }
}
