//! # ps-search
//!
//! Search orchestration for PhaseScan: multi-start scheduling for local
//! backends, concurrent backend ensembles with consensus reduction, and the
//! bisection driver that locates the critical scan-parameter value.

mod ensemble;
mod locator;
mod multistart;

pub use ensemble::{build_pool, ConsensusSelector, EnsembleRunner};
pub use locator::{locate, ThresholdLocator};
pub use multistart::{MultiStartOutcome, MultiStartScheduler};
