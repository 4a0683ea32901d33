//! Adaptive time step.
//!
//! The step is the largest `dt` that keeps every meniscus within its travel
//! limit and every contested pore within its saturation-change limit. Any
//! contested zero-volume element forces `dt = 0`, since it cannot buffer the
//! volume a finite step would move through it.
//!
//! Flows at or below the flow floor are recorded as zero, so solver round-off
//! neither steers new menisci nor drives a settled pore.

use crate::network::PoreNetwork;

use super::advance::fill_pending;
use super::capillary::sum_fpcap;
use super::config::StepLimits;
use super::state::{PoreState, StepFlows, Supply, ThroatState};

/// Volumetric flow through `throat` in m^3/s, positive towards the lower
/// indexed pore.
pub fn throat_flow(network: &PoreNetwork, throats: &ThroatState, pressures: &[f64], throat: usize) -> f64 {
    let [p1, p2] = network.conns(throat);
    let g = throats.conductance[throat];
    let fpc = sum_fpcap(network, throats, throat, p1);
    -g * (pressures[p1] - pressures[p2] + fpc)
}

/// `q`, or zero when its magnitude is within `floor`.
pub fn snap_flow(q: f64, floor: f64) -> f64 {
    if q.abs() <= floor { 0.0 } else { q }
}

/// Flow into `pore` through `throat`, given the throat flow `q`.
pub fn inflow_to(network: &PoreNetwork, throat: usize, pore: usize, q: f64) -> f64 {
    if pore == network.conns(throat)[0] { q } else { -q }
}

/// Allowed meniscus travel this step, as a fraction of throat length.
///
/// `q < 0` moves menisci away from the lower indexed pore. The leading
/// meniscus may take the fast limit once it is past the midpoint, provided
/// the trailing one is too; travel never exceeds the distance left to the
/// boundary it is heading for.
pub fn dx_max(menisci: &[f64], q: f64, limits: &StepLimits) -> f64 {
    let (Some(&first), Some(&last)) = (menisci.first(), menisci.last()) else {
        return limits.throat_travel;
    };

    if q < 0.0 {
        let fast = last > 0.5 && first >= 0.5;
        let dx = if fast { limits.throat_travel_fast } else { limits.throat_travel };
        dx.min(1.0 - last).max(0.0)
    } else if q > 0.0 {
        let fast = first < 0.5 && last <= 0.5;
        let dx = if fast { limits.throat_travel_fast } else { limits.throat_travel };
        dx.min(first).max(0.0)
    } else {
        limits.throat_travel
    }
}

/// Allowed change of a pore's invasion fraction this step.
///
/// Filling is capped by the remaining headroom, emptying by what is left.
pub fn dv_max(inv_frac: f64, qsum: f64, limits: &StepLimits) -> f64 {
    let mut dv = limits.pore_fill;
    if qsum > 0.0 && 1.0 - inv_frac < dv {
        dv = 1.0 - inv_frac;
    } else if qsum < 0.0 && inv_frac < dv {
        dv = inv_frac;
    }
    dv.max(0.0)
}

/// Estimates the step size and records the flows the advancer will use.
///
/// `default_dt` is the upper bound when nothing constrains the step. A pore
/// already within `sat_tol` of the bound it is heading for does not limit the
/// step unless filling it would still spawn menisci.
#[allow(clippy::too_many_arguments)]
pub fn estimate_dt(
    network: &PoreNetwork,
    pores: &PoreState,
    throats: &ThroatState,
    pressures: &[f64],
    limits: &StepLimits,
    sat_tol: f64,
    flow_floor: f64,
    default_dt: f64,
    flows: &mut StepFlows,
) -> f64 {
    let mut dt = default_dt;
    flows.reset();

    let contested_throats = throats.contested_throats();
    for &t in &contested_throats {
        if network.throat_volume(t) == 0.0 {
            dt = 0.0;
        }
        flows.throat_q[t] = snap_flow(throat_flow(network, throats, pressures, t), flow_floor);
    }

    for &t in &contested_throats {
        let q = flows.throat_q[t];
        let v = q / network.throat_area(t);
        if v == 0.0 {
            continue;
        }
        let dx = dx_max(throats.menisci.get(t), q, limits);
        dt = dt.min(dx * network.throat_length(t) / v.abs());
    }

    for p in pores.contested_pores() {
        let volume = network.pore_volume(p);
        if volume == 0.0 {
            dt = 0.0;
        }

        let mut qsum = 0.0;
        for &t in network.neighbor_throats(p) {
            let q = snap_flow(throat_flow(network, throats, pressures, t), flow_floor);
            flows.throat_q[t] = q;
            if throats.supply_at(network, t, p) == Supply::Invading {
                qsum += inflow_to(network, t, p, q);
            }
        }
        let qsum = snap_flow(qsum, flow_floor);
        flows.pore_qsum[p] = qsum;

        if qsum == 0.0 {
            continue;
        }
        let f = pores.inv_frac[p];
        let filling = qsum > 0.0;
        let at_bound = if filling { 1.0 - f <= sat_tol } else { f <= sat_tol };
        if at_bound && !fill_pending(network, throats, &flows.throat_q, p, filling) {
            continue;
        }
        let dv = dv_max(pores.inv_frac[p], qsum, limits);
        dt = dt.min(dv * volume / qsum.abs());
    }

    dt
}
