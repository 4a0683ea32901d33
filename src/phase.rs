//! Fluid phase properties.
//!
//! A [`Phase`] holds per-pore and per-throat property arrays for one fluid.
//! The standard properties are typed fields; anything else lives in a named
//! map and is addressed with [`PhaseProperty::Named`].

use std::collections::HashMap;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::network::PoreNetwork;

/// Key selecting a property array on a [`Phase`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseProperty {
    PoreViscosity,
    ThroatHydraulicConductance,
    ThroatCapillaryPressure,
    /// Custom array stored with [`Phase::set_named`].
    Named(String),
}

impl std::fmt::Display for PhaseProperty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseProperty::PoreViscosity => write!(f, "pore.viscosity"),
            PhaseProperty::ThroatHydraulicConductance => {
                write!(f, "throat.hydraulic_conductance")
            }
            PhaseProperty::ThroatCapillaryPressure => write!(f, "throat.capillary_pressure"),
            PhaseProperty::Named(name) => write!(f, "{name}"),
        }
    }
}

/// Property arrays of one fluid on a given network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    /// Dynamic viscosity per pore in Pa*s.
    pub pore_viscosity: Vec<f64>,
    /// Single-phase hydraulic conductance per throat in m^3/(Pa*s).
    pub throat_hydraulic_conductance: Vec<f64>,
    /// Capillary entry pressure per throat in Pa.
    pub throat_capillary_pressure: Vec<f64>,
    /// Written back by the drainage solver.
    pub pore_volume_fraction: Vec<f64>,
    /// Written back by the drainage solver.
    pub throat_volume_fraction: Vec<f64>,
    /// Written back by the drainage solver (defending phase only).
    pub pore_pressure: Vec<f64>,
    #[serde(default)]
    named: HashMap<String, Vec<f64>>,
}

impl Phase {
    /// Zero-initialized phase sized for `network`.
    pub fn new(name: &str, network: &PoreNetwork) -> Self {
        let np = network.num_pores();
        let nt = network.num_throats();
        Self {
            name: name.to_string(),
            pore_viscosity: vec![0.0; np],
            throat_hydraulic_conductance: vec![0.0; nt],
            throat_capillary_pressure: vec![0.0; nt],
            pore_volume_fraction: vec![0.0; np],
            throat_volume_fraction: vec![0.0; nt],
            pore_pressure: vec![0.0; np],
            named: HashMap::new(),
        }
    }

    /// Sets a uniform viscosity on every pore.
    pub fn with_viscosity(mut self, viscosity: f64) -> Self {
        self.pore_viscosity.fill(viscosity);
        self
    }

    /// Sets a uniform capillary entry pressure on every throat.
    pub fn with_capillary_pressure(mut self, pressure: f64) -> Self {
        self.throat_capillary_pressure.fill(pressure);
        self
    }

    /// Sets a uniform hydraulic conductance on every throat.
    pub fn with_hydraulic_conductance(mut self, conductance: f64) -> Self {
        self.throat_hydraulic_conductance.fill(conductance);
        self
    }

    /// Fills the hydraulic conductance from throat geometry with the
    /// Hagen-Poiseuille law for a circular tube, `g = A^2 / (8 pi mu L)`,
    /// using the mean viscosity of the two connected pores.
    pub fn with_poiseuille_conductance(mut self, network: &PoreNetwork) -> Self {
        for t in 0..network.num_throats() {
            let [a, b] = network.conns(t);
            let mu = 0.5 * (self.pore_viscosity[a] + self.pore_viscosity[b]);
            let area = network.throat_area(t);
            let length = network.throat_length(t);
            self.throat_hydraulic_conductance[t] = if mu > 0.0 {
                area * area / (8.0 * PI * mu * length)
            } else {
                0.0
            };
        }
        self
    }

    /// Stores a custom property array.
    pub fn set_named(&mut self, name: &str, values: Vec<f64>) {
        self.named.insert(name.to_string(), values);
    }

    /// Looks up a property array.
    pub fn get(&self, key: &PhaseProperty) -> Option<&[f64]> {
        match key {
            PhaseProperty::PoreViscosity => Some(&self.pore_viscosity),
            PhaseProperty::ThroatHydraulicConductance => Some(&self.throat_hydraulic_conductance),
            PhaseProperty::ThroatCapillaryPressure => Some(&self.throat_capillary_pressure),
            PhaseProperty::Named(name) => self.named.get(name).map(|v| v.as_slice()),
        }
    }
}
