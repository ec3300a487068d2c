//! The objective-function boundary.

/// A cost surface over the search space, parameterized by the scan value.
///
/// For a fixed scan parameter the cost must be a deterministic, repeatable
/// function of the point.  The core never interprets the physical meaning
/// of either argument.
pub trait Objective: Send + Sync {
    /// Dimensionality of the search space.
    fn dim(&self) -> usize;

    /// Cost of `point` at the given scan-parameter value.  Non-finite
    /// returns are treated as evaluation failures by the callers.
    fn cost(&self, point: &[f64], scan: f64) -> f64;

    /// Optional analytic gradient.  Backends that cannot exploit it ignore
    /// it; the default reports none.
    fn gradient(&self, _point: &[f64], _scan: f64) -> Option<Vec<f64>> {
        None
    }
}

/// Adapter turning a plain closure into an [`Objective`].
pub struct FnObjective<F> {
    dim: usize,
    f: F,
}

impl<F> FnObjective<F>
where
    F: Fn(&[f64], f64) -> f64 + Send + Sync,
{
    pub fn new(dim: usize, f: F) -> Self {
        Self { dim, f }
    }
}

impl<F> Objective for FnObjective<F>
where
    F: Fn(&[f64], f64) -> f64 + Send + Sync,
{
    fn dim(&self) -> usize {
        self.dim
    }

    fn cost(&self, point: &[f64], scan: f64) -> f64 {
        (self.f)(point, scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_adapter_evaluates() {
        let obj = FnObjective::new(2, |p, scan| p[0] * p[0] + p[1] * p[1] + scan);
        assert_eq!(obj.dim(), 2);
        assert_eq!(obj.cost(&[1.0, 2.0], 10.0), 15.0);
        assert!(obj.gradient(&[1.0, 2.0], 10.0).is_none());
    }
}
