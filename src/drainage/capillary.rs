use std::f64::consts::PI;

use crate::network::PoreNetwork;

use super::state::ThroatState;

/// Position-dependent capillary force scale of a meniscus at `x` along the
/// throat: zero at both ends, maximum at the midpoint.
pub fn pc_func(x: f64) -> f64 {
    (PI * x).sin()
}

/// Sum of signed capillary pressures of all menisci in `throat`, seen from
/// `ref_pore`.
///
/// Menisci are walked outward from `ref_pore`. The first one counts against
/// the phase supplied at that end, and the sign alternates with every
/// meniscus. The result from the other end is the exact negation.
pub fn sum_fpcap(network: &PoreNetwork, throats: &ThroatState, throat: usize, ref_pore: usize) -> f64 {
    let menisci = throats.menisci.get(throat);
    let max_pc = throats.max_pc[throat];
    let mut sign = -throats.supply_at(network, throat, ref_pore).sign();
    let mut fpc = 0.0;

    let from_far_end = ref_pore == network.conns(throat)[1];
    let mut add = |x: f64| {
        fpc += sign * pc_func(x) * max_pc;
        sign = -sign;
    };
    if from_far_end {
        menisci.iter().rev().for_each(|&x| add(x));
    } else {
        menisci.iter().for_each(|&x| add(x));
    }
    fpc
}

/// Capillary contribution to the pressure system right-hand side.
///
/// The outflow of pore `i` through throat `t` is `g (p_i - p_j + fpc(t, i))`,
/// so every contested throat moves `-g * fpc(t, i)` to the source side of
/// both of its pores.
pub fn capillary_rhs(network: &PoreNetwork, throats: &ThroatState) -> Vec<f64> {
    let mut rhs = vec![0.0; network.num_pores()];
    for t in throats.contested_throats() {
        let g = throats.conductance[t];
        for pore in network.conns(t) {
            rhs[pore] -= g * sum_fpcap(network, throats, t, pore);
        }
    }
    rhs
}
