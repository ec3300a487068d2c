//! Population-based evolutionary search (differential evolution).
//!
//! Semi-global: one seeded run per probe explores the whole search box, so
//! no multi-start driver is needed on top.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ps_types::{BackendId, Candidate, SearchConfig};

use crate::{Objective, SearchBackend};

/// rand/1/bin control parameters.
const DIFFERENTIAL_WEIGHT: f64 = 0.8;
const CROSSOVER_RATE: f64 = 0.9;

pub struct EvolutionBackend;

impl SearchBackend for EvolutionBackend {
    fn id(&self) -> BackendId {
        BackendId::Evolution
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
        let bound = config.search_bound;
        let population_size = (10 * dim).clamp(20, 100);
        let mut rng = StdRng::seed_from_u64(seed);

        let mut population: Vec<Vec<f64>> = (0..population_size)
            .map(|_| (0..dim).map(|_| rng.random_range(-bound..=bound)).collect())
            .collect();
        // Warm start: the previous bracket's minimum replaces one member.
        if let Some(h) = hint {
            if h.len() == dim {
                population[0] = h.to_vec();
            }
        }
        let mut costs: Vec<f64> = population
            .iter()
            .map(|m| objective.cost(m, scan))
            .collect();

        for _ in 0..config.max_iterations {
            for i in 0..population_size {
                // Three distinct donors, all different from i.
                let (a, b, c) = {
                    let mut pick = || loop {
                        let j = rng.random_range(0..population_size);
                        if j != i {
                            return j;
                        }
                    };
                    (pick(), pick(), pick())
                };
                let forced = rng.random_range(0..dim);

                let trial: Vec<f64> = (0..dim)
                    .map(|d| {
                        if d == forced || rng.random::<f64>() < CROSSOVER_RATE {
                            let v = population[a][d]
                                + DIFFERENTIAL_WEIGHT * (population[b][d] - population[c][d]);
                            v.clamp(-bound, bound)
                        } else {
                            population[i][d]
                        }
                    })
                    .collect();

                let trial_cost = objective.cost(&trial, scan);
                let keep_trial = match (trial_cost.is_finite(), costs[i].is_finite()) {
                    (true, true) => trial_cost <= costs[i],
                    (true, false) => true,
                    _ => false,
                };
                if keep_trial {
                    population[i] = trial;
                    costs[i] = trial_cost;
                }
            }

            let finite: Vec<f64> = costs.iter().copied().filter(|c| c.is_finite()).collect();
            if let (Some(lo), Some(hi)) = (
                finite.iter().copied().reduce(f64::min),
                finite.iter().copied().reduce(f64::max),
            ) {
                if finite.len() == population_size
                    && hi - lo <= config.tolerance * (1.0 + lo.abs())
                {
                    break;
                }
            }
        }

        let best = costs
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_finite())
            .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        match best {
            Some((i, &cost)) => Candidate::new(population[i].clone(), cost),
            None => Candidate::failed(dim),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FnObjective;

    #[test]
    fn finds_global_well_of_asymmetric_double_well() {
        // Two wells, degenerate without the tilt; the +x term makes the
        // well near -2 the global one.
        let objective = FnObjective::new(1, |p, _| {
            let x = p[0];
            (x + 2.0).powi(2) * (x - 3.0).powi(2) + x
        });
        let config = SearchConfig::default().with_search_bound(10.0);
        let candidate = EvolutionBackend.run(&objective, 0.0, &config, 7, None);
        assert!(candidate.feasible);
        assert!(
            (candidate.point[0] + 2.0).abs() < 0.1,
            "expected the deeper well near -2, got {}",
            candidate.point[0]
        );
    }

    #[test]
    fn deterministic_for_fixed_seed() {
        let objective = FnObjective::new(2, |p, _| p[0].powi(2) + p[1].powi(2));
        let config = SearchConfig::default().with_search_bound(50.0);
        let a = EvolutionBackend.run(&objective, 0.0, &config, 11, None);
        let b = EvolutionBackend.run(&objective, 0.0, &config, 11, None);
        assert_eq!(a.point, b.point);
        assert_eq!(a.cost, b.cost);
    }

    #[test]
    fn fails_closed_on_nan_surface() {
        let objective = FnObjective::new(2, |_, _| f64::NAN);
        let config = SearchConfig::default();
        let candidate = EvolutionBackend.run(&objective, 0.0, &config, 3, None);
        assert!(!candidate.feasible);
    }
}
