//! Two-phase viscous drainage through pore networks.
//!
//! An invading fluid is injected at a fixed rate into the inlet pores of a
//! [`network::PoreNetwork`] and displaces a defending fluid towards the
//! outlets. Phase boundaries inside throats are tracked as menisci with a
//! position-dependent capillary pressure; see [`drainage`] for the solver.

pub mod drainage;
pub mod io;
pub mod network;
pub mod phase;
pub mod transport;
pub mod uid;

// Prelude
pub use drainage::{DrainageConfig, LabelMode, RunSummary, ViscousDrainage};
pub use network::{PoreNetwork, ThroatFilter, ThroatSpec};
pub use phase::{Phase, PhaseProperty};
pub use uid::RunId;
