//! Time-resolved viscous drainage with meniscus tracking.
//!
//! # Architecture
//!
//! ```text
//!                ┌──────────── one step ────────────┐
//! ThroatState ──►│ update_conductance  (rayon)      │
//!                │ capillary_rhs                    │
//!                │ PressureSolver::solve ──► p      │
//!                │ estimate_dt ──► dt, StepFlows    │
//!                │ outflow_rates                    │
//!                │ advance_interfaces               │──► PoreState / ThroatState
//!                └──────────────────────────────────┘
//!                                 │
//!                  SimulationContext, StepLog, snapshots
//! ```
//!
//! Flow through a throat is signed positive towards its lower indexed pore.
//! Meniscus positions are measured from that pore, and each throat stores the
//! phase at that end (its supply); the phase at the other end follows from the
//! meniscus count parity.

pub mod advance;
pub mod capillary;
pub mod conductance;
pub mod config;
pub mod error;
pub mod menisci;
pub mod outflow;
pub mod recorder;
pub mod results;
pub mod simulation;
pub mod state;
pub mod timestep;

pub use config::{DrainageConfig, SnapshotConfig, StepLimits};
pub use error::ConfigError;
pub use menisci::MeniscusStore;
pub use outflow::OutflowRates;
pub use recorder::{StepLog, StepRecord};
pub use results::NetworkState;
pub use simulation::{LabelMode, RunSummary, StepStatus, StopReason, ViscousDrainage};
pub use state::{Breakthrough, PoreState, Supply, ThroatState};
