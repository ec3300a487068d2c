//! Bisection driver locating the critical scan-parameter value.
//!
//! Narrows a bracket `[lo, hi]` over the scan parameter until the width
//! drops below the scan tolerance, classifying the optimum returned by an
//! ensemble probe at each midpoint.  The nontrivial regime sits at the low
//! end of the bracket and the degenerate regime at the high end; each probe
//! decides which side the midpoint belongs to.  Every failure mode is
//! surfaced as a [`ThresholdStatus`] value, never silently bisected over.

use crossbeam_channel::Sender;
use tracing::{info, warn};

use ps_backends::Objective;
use ps_types::{
    config_error, EnsembleResult, ProbeEvent, PsResult, SearchConfig, ThresholdResult,
    ThresholdStatus,
};

use crate::ensemble::{build_pool, EnsembleRunner};

/// Working state of one bisection: the bracket and the retained results at
/// both ends.  `lo < hi` throughout; `lo_result` is always the tightest
/// known nontrivial sample.
struct ScanState {
    lo: f64,
    hi: f64,
    lo_result: EnsembleResult,
    #[allow(dead_code)]
    hi_result: EnsembleResult,
    tolerance: f64,
}

/// Locates the parameter value at which the global optimum switches between
/// the nontrivial and the degenerate regime.
pub struct ThresholdLocator<'a> {
    objective: &'a dyn Objective,
    config: &'a SearchConfig,
    events: Option<Sender<ProbeEvent>>,
}

/// Convenience entry point with the default locator.
pub fn locate(
    objective: &dyn Objective,
    lo: f64,
    hi: f64,
    config: &SearchConfig,
) -> PsResult<ThresholdResult> {
    ThresholdLocator::new(objective, config).run(lo, hi)
}

impl<'a> ThresholdLocator<'a> {
    pub fn new(objective: &'a dyn Objective, config: &'a SearchConfig) -> Self {
        Self {
            objective,
            config,
            events: None,
        }
    }

    /// Stream a [`ProbeEvent`] after every ensemble probe.  A disconnected
    /// receiver is ignored.
    pub fn with_events(mut self, sender: Sender<ProbeEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Run the full search over the bracket `[lo, hi]`.
    ///
    /// Configuration problems (invalid bracket, no backends, bad
    /// tolerances) fail fast with an error; every domain outcome is
    /// returned as a [`ThresholdResult`].
    pub fn run(&self, lo: f64, hi: f64) -> PsResult<ThresholdResult> {
        self.config.validate()?;
        if !lo.is_finite() || !hi.is_finite() || lo >= hi {
            return Err(config_error!("invalid bracket: lo={lo}, hi={hi}"));
        }
        if self.objective.dim() == 0 {
            return Err(config_error!("objective has zero dimensions"));
        }

        let pool = build_pool(self.config)?;
        let runner = EnsembleRunner::new(self.objective, self.config, &pool);

        // The degenerate optimum must hold at the upper end, otherwise
        // there is no transition to bracket.
        let hi_result = self.probe(&runner, hi, None);
        if !hi_result.best.feasible {
            return Ok(self.infeasible_at(hi));
        }
        let hi_magnitude = hi_result.magnitude();
        if hi_magnitude > self.config.degeneracy_threshold {
            info!(hi, magnitude = hi_magnitude, "optimum already nontrivial at upper bound");
            return Ok(ThresholdResult {
                status: ThresholdStatus::NontrivialAtUpperBound,
                parameter: hi,
                optimum: hi_result.best.point.clone(),
                magnitude: hi_magnitude,
            });
        }

        // And a nontrivial optimum must hold at the lower end.
        let lo_result = self.probe(&runner, lo, None);
        if !lo_result.best.feasible {
            return Ok(self.infeasible_at(lo));
        }
        let lo_magnitude = lo_result.magnitude();
        if lo_magnitude >= self.config.instability_bound {
            warn!(lo, magnitude = lo_magnitude, "unstable optimum magnitude at lower bound");
            return Ok(ThresholdResult {
                status: ThresholdStatus::NumericallyUnstable,
                parameter: lo,
                optimum: lo_result.best.point.clone(),
                magnitude: lo_magnitude,
            });
        }
        if lo_magnitude <= self.config.degeneracy_threshold {
            // No transition inside the range.  The parameter reports the
            // upper end so callers can tell this apart from a located
            // threshold.
            info!(lo, hi, "optimum degenerate across the whole bracket");
            return Ok(ThresholdResult {
                status: ThresholdStatus::DegenerateAtLowerBound,
                parameter: hi,
                optimum: vec![0.0; self.objective.dim()],
                magnitude: 0.0,
            });
        }

        let mut state = ScanState {
            lo,
            hi,
            lo_result,
            hi_result,
            tolerance: self.config.scan_tolerance,
        };

        while state.hi - state.lo > state.tolerance {
            let mid = 0.5 * (state.lo + state.hi);
            // Warm-start every backend from the tightest nontrivial
            // minimum found so far.
            let hint = state.lo_result.best.point.clone();
            let result = self.probe(&runner, mid, Some(&hint));
            if !result.best.feasible {
                return Ok(self.infeasible_at(mid));
            }
            let magnitude = result.magnitude();

            if magnitude >= self.config.instability_bound {
                warn!(mid, magnitude, "unstable optimum magnitude during bisection");
                return Ok(ThresholdResult {
                    status: ThresholdStatus::NumericallyUnstable,
                    parameter: mid,
                    optimum: result.best.point.clone(),
                    magnitude,
                });
            }
            if magnitude > 0.0 && mid > 0.0 && magnitude / mid < self.config.significance_ratio {
                info!(mid, magnitude, "optimum below the significance ratio");
                return Ok(ThresholdResult {
                    status: ThresholdStatus::BelowSignificance,
                    parameter: mid,
                    optimum: result.best.point.clone(),
                    magnitude,
                });
            }

            if magnitude > self.config.degeneracy_threshold {
                // Nontrivial regime reaches up to at least `mid`.
                state.lo = mid;
                state.lo_result = result;
            } else {
                state.hi = mid;
                state.hi_result = result;
            }
        }

        let magnitude = state.lo_result.magnitude();
        info!(
            parameter = state.lo,
            magnitude, "threshold search converged"
        );
        Ok(ThresholdResult {
            status: ThresholdStatus::Success,
            parameter: state.lo,
            optimum: state.lo_result.best.point.clone(),
            magnitude,
        })
    }

    fn probe(&self, runner: &EnsembleRunner<'_>, scan: f64, hint: Option<&[f64]>) -> EnsembleResult {
        let result = runner.probe(scan, hint);
        if let Some(sender) = &self.events {
            let _ = sender.send(ProbeEvent {
                parameter: scan,
                magnitude: result.magnitude(),
                cost: result.best.cost,
                attempted: result.attempted,
            });
        }
        result
    }

    fn infeasible_at(&self, parameter: f64) -> ThresholdResult {
        warn!(parameter, "every ensemble candidate infeasible");
        ThresholdResult {
            status: ThresholdStatus::InfeasibleBracket,
            parameter,
            optimum: vec![0.0; self.objective.dim()],
            magnitude: 0.0,
        }
    }
}
