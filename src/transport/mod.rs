//! Steady linear transport on a pore network.
//!
//! # Architecture
//!
//! ```text
//! throat conductance ──┐
//! BoundaryConditions ──┼──► PressureSolver::solve() ──► pore pressures
//! rhs perturbation ────┘
//! ```
//!
//! The solver sees only pores, throats and conductances; the physics that
//! produce the conductances and the right-hand side live with the caller.

pub mod boundary;
pub mod solver_sparse;

pub use boundary::{BcMode, BoundaryCondition, BoundaryConditions, FlowGroup};
pub use solver_sparse::{PressureSolver, SparseSolverConfig};
