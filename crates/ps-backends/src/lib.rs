//! # ps-backends
//!
//! Interchangeable minimization strategies for PhaseScan.
//!
//! Provides the [`Objective`] boundary trait, the [`SearchBackend`]
//! interface, and three concrete backends: derivative-free simplex descent
//! (local), differential evolution (semi-global), and a deterministic
//! space-partitioning global search with an optional simplex polish.

mod backend;
mod evolution;
mod objective;
mod partition;
mod simplex;

pub use backend::{backend_for, SearchBackend};
pub use evolution::EvolutionBackend;
pub use objective::{FnObjective, Objective};
pub use partition::PartitionBackend;
pub use simplex::SimplexBackend;
