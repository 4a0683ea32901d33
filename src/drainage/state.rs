use serde::{Deserialize, Serialize};

use crate::network::PoreNetwork;

use super::menisci::MeniscusStore;

/// Phase present at one end of a throat.
///
/// A throat stores the phase at its lower indexed end (its supply factor);
/// the phase at the other end follows from the meniscus count parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Supply {
    Invading,
    Defending,
}

impl Supply {
    /// +1 for the invading phase, -1 for the defending phase.
    pub fn sign(self) -> f64 {
        match self {
            Supply::Invading => 1.0,
            Supply::Defending => -1.0,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Supply::Invading => Supply::Defending,
            Supply::Defending => Supply::Invading,
        }
    }

    pub fn from_invaded(invaded: bool) -> Self {
        if invaded {
            Supply::Invading
        } else {
            Supply::Defending
        }
    }
}

/// Mutable per-pore state, one entry per pore.
#[derive(Debug, Clone)]
pub struct PoreState {
    /// Fraction of the pore volume held by the invading phase.
    pub inv_frac: Vec<f64>,
    /// Invading phase is the majority phase.
    pub invaded: Vec<bool>,
    /// Pore has mixed supply and its fraction is being tracked.
    pub contested: Vec<bool>,
    pub inlet: Vec<bool>,
    pub outlet: Vec<bool>,
}

impl PoreState {
    pub fn new(num_pores: usize) -> Self {
        Self {
            inv_frac: vec![0.0; num_pores],
            invaded: vec![false; num_pores],
            contested: vec![false; num_pores],
            inlet: vec![false; num_pores],
            outlet: vec![false; num_pores],
        }
    }

    pub fn inlets(&self) -> Vec<usize> {
        indices_of(&self.inlet)
    }

    pub fn outlets(&self) -> Vec<usize> {
        indices_of(&self.outlet)
    }

    pub fn contested_pores(&self) -> Vec<usize> {
        indices_of(&self.contested)
    }
}

/// Mutable per-throat state, one entry per throat.
#[derive(Debug, Clone)]
pub struct ThroatState {
    /// Fraction of the throat volume held by the invading phase.
    pub inv_frac: Vec<f64>,
    /// Throat holds at least one meniscus.
    pub contested: Vec<bool>,
    /// Phase at the lower indexed end.
    pub supply: Vec<Supply>,
    /// Effective conductance, recomputed every step.
    pub conductance: Vec<f64>,
    /// Defending-phase conductance captured at setup.
    pub base_conductance: Vec<f64>,
    /// Capillary entry pressure scale.
    pub max_pc: Vec<f64>,
    pub menisci: MeniscusStore,
}

impl ThroatState {
    pub fn new(base_conductance: Vec<f64>, max_pc: Vec<f64>) -> Self {
        let nt = base_conductance.len();
        Self {
            inv_frac: vec![0.0; nt],
            contested: vec![false; nt],
            supply: vec![Supply::Defending; nt],
            conductance: base_conductance.clone(),
            base_conductance,
            max_pc,
            menisci: MeniscusStore::new(nt),
        }
    }

    pub fn contested_throats(&self) -> Vec<usize> {
        indices_of(&self.contested)
    }

    /// Phase at the end of `throat` that touches `pore`.
    pub fn supply_at(&self, network: &PoreNetwork, throat: usize, pore: usize) -> Supply {
        let sf = self.supply[throat];
        if pore == network.conns(throat)[1] && self.menisci.count(throat) % 2 == 1 {
            sf.flipped()
        } else {
            sf
        }
    }
}

/// Flows computed by the time-step estimator and consumed by the advancer.
#[derive(Debug, Clone)]
pub struct StepFlows {
    /// Volumetric flow per throat in m^3/s, positive towards the lower
    /// indexed pore. Only filled for throats the estimator visited.
    pub throat_q: Vec<f64>,
    /// Net invading-phase inflow per contested pore in m^3/s.
    pub pore_qsum: Vec<f64>,
}

impl StepFlows {
    pub fn new(num_pores: usize, num_throats: usize) -> Self {
        Self {
            throat_q: vec![0.0; num_throats],
            pore_qsum: vec![0.0; num_pores],
        }
    }

    pub fn reset(&mut self) {
        self.throat_q.fill(0.0);
        self.pore_qsum.fill(0.0);
    }
}

/// First arrival of the invading phase at an outlet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Breakthrough {
    pub time: f64,
    pub step: usize,
}

/// Run-wide counters. Only the outer loop mutates these.
#[derive(Debug, Clone, Default)]
pub struct SimulationContext {
    /// Simulated time in s.
    pub time: f64,
    /// Completed steps.
    pub step: usize,
    /// Steps with dt = 0 in the current loop invocation.
    pub zero_dt_steps: usize,
    pub total_inv_out: f64,
    pub total_def_out: f64,
    pub inv_out_rate: f64,
    pub def_out_rate: f64,
    pub breakthrough: Option<Breakthrough>,
}

fn indices_of(flags: &[bool]) -> Vec<usize> {
    flags
        .iter()
        .enumerate()
        .filter_map(|(i, &f)| f.then_some(i))
        .collect()
}
