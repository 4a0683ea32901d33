use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::phase::PhaseProperty;
use crate::transport::SparseSolverConfig;

/// Per-step travel limits used by the adaptive time-step estimator.
///
/// All values are fractions: of throat length for meniscus travel, of pore
/// volume for saturation change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepLimits {
    /// Default meniscus travel per step.
    pub throat_travel: f64,
    /// Meniscus travel allowed once it is past the throat midpoint and heading
    /// out of the throat.
    pub throat_travel_fast: f64,
    /// Pore saturation change per step.
    pub pore_fill: f64,
}

impl Default for StepLimits {
    fn default() -> Self {
        Self {
            throat_travel: 0.03,
            throat_travel_fast: 0.30,
            pore_fill: 0.25,
        }
    }
}

/// Periodic snapshot export.
///
/// Snapshots are written only when `dir` is set. Every `full_every` steps a
/// full snapshot is written, otherwise every `frequent_every` steps a
/// lightweight one. A cadence of zero disables that kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub dir: Option<PathBuf>,
    pub frequent_every: usize,
    pub full_every: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            dir: None,
            frequent_every: 2000,
            full_every: 10000,
        }
    }
}

/// Configuration for [`crate::drainage::ViscousDrainage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrainageConfig {
    /// Bulk injection rate of the invading phase through the inlets in m^3/s.
    /// Required.
    pub injection_rate: Option<f64>,
    /// Throat conductance array on the defending phase.
    pub conductance: PhaseProperty,
    /// Throat capillary entry pressure array on the invading phase.
    pub entry_pressure: PhaseProperty,
    /// Conductance between inlet pores and a virtual super pore carrying the
    /// injection. `None` splits the injection evenly over the inlets.
    pub super_pore_conductance: Option<f64>,
    /// Saturations within this distance of 0 or 1 are rounded.
    pub sat_tol: f64,
    /// Throat and pore flows within this fraction of the injection rate are
    /// treated as zero.
    pub flow_noise: f64,
    /// Hard cap on the step counter.
    pub max_steps: usize,
    /// Relative mismatch between invading outflow and injection below which
    /// the run is at steady state.
    pub steady_state_tol: f64,
    /// Fraction of the total void volume injected by the default time step.
    pub initial_fill_fraction: f64,
    pub limits: StepLimits,
    pub solver: SparseSolverConfig,
    /// Human-readable step log. Truncated by `run`, appended by restarts.
    pub log_path: Option<PathBuf>,
    pub snapshots: SnapshotConfig,
    /// Keep one [`crate::drainage::StepRecord`] per step in memory.
    pub record_history: bool,
}

impl Default for DrainageConfig {
    fn default() -> Self {
        Self {
            injection_rate: None,
            conductance: PhaseProperty::ThroatHydraulicConductance,
            entry_pressure: PhaseProperty::ThroatCapillaryPressure,
            super_pore_conductance: None,
            sat_tol: 1.0e-6,
            flow_noise: 1.0e-12,
            max_steps: 100_000,
            steady_state_tol: 1.0e-9,
            initial_fill_fraction: 0.01,
            limits: StepLimits::default(),
            solver: SparseSolverConfig::default(),
            log_path: None,
            snapshots: SnapshotConfig::default(),
            record_history: true,
        }
    }
}

impl DrainageConfig {
    /// Default configuration with the given injection rate.
    pub fn with_injection_rate(rate: f64) -> Self {
        Self {
            injection_rate: Some(rate),
            ..Self::default()
        }
    }
}
