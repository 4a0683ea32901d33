use serde::{Deserialize, Serialize};

use crate::network::PoreNetwork;

use super::state::ThroatState;
use super::timestep::{inflow_to, throat_flow};

/// Flow leaving the network through the outlets in m^3/s, split by phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OutflowRates {
    pub invading: f64,
    pub defending: f64,
}

/// Sums the flow reaching each outlet pore.
///
/// A pore flagged invaded in `invaded` passes invading phase on, any other
/// pore defending phase. Pass the flags as they were before the step's advance.
pub fn outflow_rates(
    network: &PoreNetwork,
    throats: &ThroatState,
    pressures: &[f64],
    invaded: &[bool],
    outlets: &[usize],
) -> OutflowRates {
    let mut rates = OutflowRates::default();
    for &p in outlets {
        let q: f64 = network
            .neighbor_throats(p)
            .iter()
            .map(|&t| inflow_to(network, t, p, throat_flow(network, throats, pressures, t)))
            .sum();
        if invaded[p] {
            rates.invading += q;
        } else {
            rates.defending += q;
        }
    }
    rates
}
