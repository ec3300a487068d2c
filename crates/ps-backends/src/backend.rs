//! The backend interface shared by all minimization strategies.

use ps_types::{BackendId, Candidate, SearchConfig};

use crate::{EvolutionBackend, Objective, PartitionBackend, SimplexBackend};

/// One interchangeable minimization strategy.
///
/// Implementations fail closed: numerical breakdown (NaN, non-convergence
/// within the iteration budget) yields an infeasible candidate rather than
/// an error.  Internal restarts, if any, are hidden behind `run`.
pub trait SearchBackend: Send + Sync {
    fn id(&self) -> BackendId;

    /// True when a single invocation already approximates the global
    /// optimum.  Local backends return false and are driven through the
    /// multi-start scheduler instead.
    fn is_global(&self) -> bool;

    /// Run one minimization.  `hint` is a warm-start point: local backends
    /// use it as the starting point, global backends may seed their search
    /// with it.
    fn run(
        &self,
        objective: &dyn Objective,
        scan: f64,
        config: &SearchConfig,
        seed: u64,
        hint: Option<&[f64]>,
    ) -> Candidate;
}

/// Construct the backend for an id.  The origin entry is synthetic and has
/// no backend.
pub fn backend_for(id: BackendId) -> Option<Box<dyn SearchBackend>> {
    match id {
        BackendId::Origin => None,
        BackendId::Simplex => Some(Box::new(SimplexBackend)),
        BackendId::Evolution => Some(Box::new(EvolutionBackend)),
        BackendId::Partition => Some(Box::new(PartitionBackend::default())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_covers_all_real_backends() {
        assert!(backend_for(BackendId::Origin).is_none());
        for id in [BackendId::Simplex, BackendId::Evolution, BackendId::Partition] {
            let backend = backend_for(id).unwrap();
            assert_eq!(backend.id(), id);
        }
    }

    #[test]
    fn globality_flags() {
        assert!(!backend_for(BackendId::Simplex).unwrap().is_global());
        assert!(backend_for(BackendId::Evolution).unwrap().is_global());
        assert!(backend_for(BackendId::Partition).unwrap().is_global());
    }
}
