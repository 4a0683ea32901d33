//! Interface advancer.
//!
//! Moves menisci and pore saturations by one time step using the flows the
//! estimator recorded. The contested pore and throat sets are captured before
//! anything moves; elements that become contested during the step are only
//! advanced from the next step on.

use crate::network::PoreNetwork;

use super::state::{PoreState, StepFlows, Supply, ThroatState};

/// Whether flow `q` in `throat` lets the phase held by `base_pore` enter it,
/// i.e. the flow does not run into `base_pore`. Zero flow counts as entering.
pub fn enters_throat(network: &PoreNetwork, throat: usize, base_pore: usize, q: f64) -> bool {
    if base_pore == network.conns(throat)[1] { q >= 0.0 } else { q <= 0.0 }
}

/// Creates a meniscus at the `base_pore` end of each throat in `throats_at`.
///
/// A throat whose current flow runs into `base_pore` is skipped, since the
/// phase now held by the pore cannot enter it. `throat_q` holds the flow of
/// each throat, positive towards the lower indexed pore.
pub fn set_menisci(
    network: &PoreNetwork,
    throats: &mut ThroatState,
    throat_q: &[f64],
    base_pore: usize,
    throats_at: &[usize],
) {
    for &t in throats_at {
        if !enters_throat(network, t, base_pore, throat_q[t]) {
            continue;
        }
        if base_pore == network.conns(t)[1] {
            throats.menisci.push_far(t);
        } else {
            throats.menisci.push_near(t);
            throats.supply[t] = throats.supply[t].flipped();
        }
        throats.contested[t] = true;
    }
}

/// Throats at `pore` whose end there still holds `phase`.
fn throats_holding(network: &PoreNetwork, throats: &ThroatState, pore: usize, phase: Supply) -> Vec<usize> {
    network
        .neighbor_throats(pore)
        .iter()
        .copied()
        .filter(|&t| throats.supply_at(network, t, pore) == phase)
        .collect()
}

/// Whether filling (or emptying) `pore` now would spawn at least one
/// meniscus.
pub fn fill_pending(
    network: &PoreNetwork,
    throats: &ThroatState,
    throat_q: &[f64],
    pore: usize,
    filled: bool,
) -> bool {
    throats_holding(network, throats, pore, Supply::from_invaded(!filled))
        .into_iter()
        .any(|t| enters_throat(network, t, pore, throat_q[t]))
}

/// Rounds the fraction of a pore that just filled or emptied and spawns menisci
/// in the throats still carrying the phase it held before.
pub fn fill_pore(
    network: &PoreNetwork,
    pores: &mut PoreState,
    throats: &mut ThroatState,
    throat_q: &[f64],
    pore: usize,
) {
    let filled = pores.inv_frac[pore] >= 0.5;
    pores.inv_frac[pore] = if filled { 1.0 } else { 0.0 };
    pores.invaded[pore] = filled;

    let stale = throats_holding(network, throats, pore, Supply::from_invaded(!filled));
    set_menisci(network, throats, throat_q, pore, &stale);

    let mut supplies = network
        .neighbor_throats(pore)
        .iter()
        .map(|&t| throats.supply_at(network, t, pore));
    pores.contested[pore] = match supplies.next() {
        Some(first) => !supplies.all(|s| s == first),
        None => false,
    };
}

/// Advances every contested throat and pore by `dt`.
pub fn advance_interfaces(
    network: &PoreNetwork,
    pores: &mut PoreState,
    throats: &mut ThroatState,
    flows: &StepFlows,
    dt: f64,
    sat_tol: f64,
) {
    let contested_pores = pores.contested_pores();
    let contested_throats = throats.contested_throats();

    for t in contested_throats {
        if network.throat_volume(t) == 0.0 {
            collapse_zero_volume(network, pores, throats, flows.throat_q[t], t);
        } else {
            advance_throat(network, pores, throats, flows.throat_q[t], t, dt, sat_tol);
        }
        if throats.menisci.is_empty(t) {
            throats.contested[t] = false;
        }
    }

    for p in contested_pores {
        let qsum = flows.pore_qsum[p];
        let volume = network.pore_volume(p);
        if volume == 0.0 {
            pores.inv_frac[p] = if qsum > 0.0 { 1.0 } else { 0.0 };
        } else {
            pores.inv_frac[p] += dt * qsum / volume;
        }

        let f = pores.inv_frac[p];
        if (f > 1.0 - sat_tol && qsum >= 0.0) || (f < sat_tol && qsum <= 0.0) {
            fill_pore(network, pores, throats, &flows.throat_q, p);
        }
    }
}

fn advance_throat(
    network: &PoreNetwork,
    pores: &mut PoreState,
    throats: &mut ThroatState,
    q: f64,
    t: usize,
    dt: f64,
    sat_tol: f64,
) {
    let [p1, p2] = network.conns(t);
    let dx = -(q / network.throat_area(t)) * dt / network.throat_length(t);
    throats.menisci.shift(t, dx);
    if throats.menisci.count(t) % 2 == 1 {
        throats.inv_frac[t] += dx * throats.supply[t].sign();
    }

    if q < 0.0
        && let Some(last) = throats.menisci.last(t)
        && last > 1.0 - sat_tol
    {
        let sat_adj = (last - 1.0) * throats.supply_at(network, t, p2).sign();
        throats.menisci.pop_far(t);
        transfer_overshoot(pores, throats, t, p2, sat_adj);
    } else if q > 0.0
        && let Some(first) = throats.menisci.first(t)
        && first < sat_tol
    {
        let sat_adj = -first * throats.supply_at(network, t, p1).sign();
        throats.menisci.pop_near(t);
        throats.supply[t] = throats.supply[t].flipped();
        transfer_overshoot(pores, throats, t, p1, sat_adj);
    }
}

/// The part of the step a meniscus travelled past the throat end belongs to
/// the pore it crossed into.
fn transfer_overshoot(pores: &mut PoreState, throats: &mut ThroatState, t: usize, pore: usize, sat_adj: f64) {
    throats.inv_frac[t] += sat_adj;
    pores.inv_frac[pore] -= sat_adj;
    pores.contested[pore] = true;
}

/// A throat without volume takes on the phase of its upstream pore at once
/// and passes its meniscus on to the downstream pore.
fn collapse_zero_volume(
    network: &PoreNetwork,
    pores: &mut PoreState,
    throats: &mut ThroatState,
    q: f64,
    t: usize,
) {
    let [p1, p2] = network.conns(t);
    if q < 0.0 {
        let phase = Supply::from_invaded(pores.invaded[p1]);
        throats.menisci.collapse_to(t, 1.0);
        throats.supply[t] = phase;
        throats.inv_frac[t] = if phase == Supply::Invading { 1.0 } else { 0.0 };
        throats.menisci.pop_far(t);
        pores.contested[p2] = true;
    } else {
        let phase = Supply::from_invaded(pores.invaded[p2]);
        throats.menisci.collapse_to(t, 0.0);
        throats.supply[t] = phase;
        throats.inv_frac[t] = if phase == Supply::Invading { 1.0 } else { 0.0 };
        throats.menisci.pop_near(t);
        pores.contested[p1] = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{ThroatSpec, build_chain};

    const TOL: f64 = 1e-6;

    #[test]
    fn test_set_menisci_respects_flow_direction() {
        let net = build_chain(2, 1.0, 1.0, 1.0).unwrap();
        let mut throats = ThroatState::new(vec![1.0], vec![0.0]);

        // Flow into pore 1: no new interface from that side.
        set_menisci(&net, &mut throats, &[-1.0], 1, &[0]);
        assert!(throats.menisci.is_empty(0));
        assert!(!throats.contested[0]);

        set_menisci(&net, &mut throats, &[0.0], 0, &[0]);
        assert_eq!(throats.menisci.get(0), &[0.0]);
        assert_eq!(throats.supply[0], Supply::Invading);
        assert!(throats.contested[0]);

        set_menisci(&net, &mut throats, &[0.0], 1, &[0]);
        assert_eq!(throats.menisci.get(0), &[0.0, 1.0]);
        assert_eq!(throats.supply[0], Supply::Invading);
    }

    #[test]
    fn test_meniscus_moves_and_fills_throat() {
        let net = build_chain(2, 1.0, 2.0, 0.5).unwrap();
        let mut pores = PoreState::new(2);
        let mut throats = ThroatState::new(vec![1.0], vec![0.0]);
        set_menisci(&net, &mut throats, &[0.0], 0, &[0]);

        let mut flows = StepFlows::new(2, 1);
        flows.throat_q[0] = -0.25;
        advance_interfaces(&net, &mut pores, &mut throats, &flows, 1.0, TOL);
        // Velocity 0.5 over length 2.
        assert!((throats.menisci.get(0)[0] - 0.25).abs() < 1e-12);
        assert!((throats.inv_frac[0] - 0.25).abs() < 1e-12);
        assert!(throats.contested[0]);
    }

    #[test]
    fn test_far_crossing_moves_overshoot_into_pore() {
        let net = build_chain(2, 1.0, 1.0, 1.0).unwrap();
        let mut pores = PoreState::new(2);
        let mut throats = ThroatState::new(vec![1.0], vec![0.0]);
        set_menisci(&net, &mut throats, &[0.0], 0, &[0]);
        throats.menisci.shift(0, 0.9);
        throats.inv_frac[0] = 0.9;

        let mut flows = StepFlows::new(2, 1);
        flows.throat_q[0] = -0.15;
        advance_interfaces(&net, &mut pores, &mut throats, &flows, 1.0, TOL);

        assert!(throats.menisci.is_empty(0));
        assert!(!throats.contested[0]);
        assert!((throats.inv_frac[0] - 1.0).abs() < 1e-12);
        assert!((pores.inv_frac[1] - 0.05).abs() < 1e-12);
        assert!(pores.contested[1]);
        assert_eq!(throats.supply_at(&net, 0, 1), Supply::Invading);
    }

    #[test]
    fn test_near_crossing_flips_supply() {
        let net = build_chain(2, 1.0, 1.0, 1.0).unwrap();
        let mut pores = PoreState::new(2);
        pores.invaded[1] = true;
        pores.inv_frac[1] = 1.0;
        let mut throats = ThroatState::new(vec![1.0], vec![0.0]);
        // Invading phase enters from pore 1.
        set_menisci(&net, &mut throats, &[0.0], 1, &[0]);
        throats.menisci.shift(0, -0.95);
        throats.inv_frac[0] = 0.95;

        let mut flows = StepFlows::new(2, 1);
        flows.throat_q[0] = 0.1;
        advance_interfaces(&net, &mut pores, &mut throats, &flows, 1.0, TOL);

        assert!(throats.menisci.is_empty(0));
        assert!((throats.inv_frac[0] - 1.0).abs() < 1e-12);
        assert!((pores.inv_frac[0] - 0.05).abs() < 1e-12);
        assert!(pores.contested[0]);
        assert_eq!(throats.supply[0], Supply::Invading);
    }

    #[test]
    fn test_pore_fill_spawns_meniscus_downstream() {
        let net = build_chain(3, 1.0, 1.0, 1.0).unwrap();
        let mut pores = PoreState::new(3);
        pores.contested[1] = true;
        pores.inv_frac[1] = 0.9;
        let mut throats = ThroatState::new(vec![1.0, 1.0], vec![0.0, 0.0]);
        throats.supply[0] = Supply::Invading;

        let mut flows = StepFlows::new(3, 2);
        flows.throat_q = vec![-1.0, -1.0];
        flows.pore_qsum[1] = 1.0;
        advance_interfaces(&net, &mut pores, &mut throats, &flows, 0.1, TOL);

        assert_eq!(pores.inv_frac[1], 1.0);
        assert!(pores.invaded[1]);
        assert!(!pores.contested[1]);
        assert_eq!(throats.menisci.get(1), &[0.0]);
        assert!(throats.contested[1]);
        assert!(throats.menisci.is_empty(0));
    }

    #[test]
    fn test_fill_pore_keeps_mixed_supply_contested() {
        // Pore 1 fills while throat 1 flows into it: no meniscus there.
        let net = build_chain(3, 1.0, 1.0, 1.0).unwrap();
        let mut pores = PoreState::new(3);
        pores.inv_frac[1] = 1.0;
        let mut throats = ThroatState::new(vec![1.0, 1.0], vec![0.0, 0.0]);
        throats.supply[0] = Supply::Invading;

        fill_pore(&net, &mut pores, &mut throats, &[-1.0, 1.0], 1);
        assert!(throats.menisci.is_empty(1));
        assert!(pores.contested[1]);
    }

    #[test]
    fn test_zero_volume_throat_takes_upstream_phase() {
        let net = crate::network::PoreNetwork::new(
            "zero",
            vec![1.0, 1.0],
            vec![ThroatSpec {
                conns: [0, 1],
                length: 1.0,
                area: 1.0,
                volume: 0.0,
            }],
        )
        .unwrap();

        for invaded in [true, false] {
            let mut pores = PoreState::new(2);
            pores.invaded[0] = invaded;
            let mut throats = ThroatState::new(vec![1.0], vec![0.0]);
            throats.menisci.push_near(0);
            throats.menisci.shift(0, 0.4);
            throats.contested[0] = true;

            let mut flows = StepFlows::new(2, 1);
            flows.throat_q[0] = -1.0;
            advance_interfaces(&net, &mut pores, &mut throats, &flows, 0.0, TOL);

            let expected = if invaded { 1.0 } else { 0.0 };
            assert_eq!(throats.inv_frac[0], expected);
            assert!(throats.menisci.is_empty(0));
            assert!(!throats.contested[0]);
            assert!(pores.contested[1]);
            assert_eq!(throats.supply_at(&net, 0, 1), Supply::from_invaded(invaded));
        }
    }

    #[test]
    fn test_zero_volume_throat_from_higher_pore() {
        let net = crate::network::PoreNetwork::new(
            "zero",
            vec![1.0, 1.0],
            vec![ThroatSpec {
                conns: [0, 1],
                length: 1.0,
                area: 1.0,
                volume: 0.0,
            }],
        )
        .unwrap();
        let mut pores = PoreState::new(2);
        pores.invaded[1] = true;
        let mut throats = ThroatState::new(vec![1.0], vec![0.0]);
        throats.menisci.push_far(0);
        throats.contested[0] = true;

        let mut flows = StepFlows::new(2, 1);
        flows.throat_q[0] = 1.0;
        advance_interfaces(&net, &mut pores, &mut throats, &flows, 0.0, TOL);

        assert_eq!(throats.inv_frac[0], 1.0);
        assert_eq!(throats.supply[0], Supply::Invading);
        assert!(pores.contested[0]);
    }

    #[test]
    fn test_menisci_stay_sorted() {
        let net = build_chain(2, 1.0, 1.0, 1.0).unwrap();
        let mut pores = PoreState::new(2);
        let mut throats = ThroatState::new(vec![1.0], vec![0.0]);
        set_menisci(&net, &mut throats, &[0.0], 0, &[0]);
        throats.menisci.shift(0, 0.3);
        set_menisci(&net, &mut throats, &[0.0], 0, &[0]);

        let mut flows = StepFlows::new(2, 1);
        flows.throat_q[0] = -0.1;
        for _ in 0..5 {
            advance_interfaces(&net, &mut pores, &mut throats, &flows, 1.0, TOL);
            assert!(throats.menisci.is_sorted(0));
        }
        assert_eq!(throats.menisci.count(0), 2);
        assert!((throats.menisci.get(0)[1] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_zero_volume_throat_from_higher_pore_keeps_defending_supply() {
        let net = crate::network::PoreNetwork::new(
            "zero",
            vec![1.0, 1.0],
            vec![ThroatSpec {
                conns: [0, 1],
                length: 1.0,
                area: 1.0,
                volume: 0.0,
            }],
        )
        .unwrap();
        let mut pores = PoreState::new(2);
        pores.invaded[0] = true;
        let mut throats = ThroatState::new(vec![1.0], vec![0.0]);
        throats.supply[0] = Supply::Invading;
        throats.menisci.push_far(0);
        throats.contested[0] = true;

        let mut flows = StepFlows::new(2, 1);
        flows.throat_q[0] = 1.0;
        advance_interfaces(&net, &mut pores, &mut throats, &flows, 0.0, TOL);

        assert_eq!(throats.inv_frac[0], 0.0);
        assert_eq!(throats.supply[0], Supply::Defending);
        assert_eq!(throats.supply_at(&net, 0, 1), Supply::Defending);
        assert!(throats.menisci.is_empty(0));
        assert!(pores.contested[0]);
    }

    #[test]
    fn test_enters_throat_and_fill_pending() {
        // 0 - 1 - 2 with pore 1 invaded from throat 0.
        let net = build_chain(3, 1.0, 1.0, 1.0).unwrap();
        let mut throats = ThroatState::new(vec![1.0, 1.0], vec![0.0, 0.0]);
        throats.supply[0] = Supply::Invading;

        assert!(enters_throat(&net, 1, 1, -1.0));
        assert!(enters_throat(&net, 1, 1, 0.0));
        assert!(!enters_throat(&net, 1, 1, 1.0));
        assert!(enters_throat(&net, 0, 1, 1.0));
        assert!(!enters_throat(&net, 0, 1, -1.0));

        assert!(fill_pending(&net, &throats, &[-1.0, -1.0], 1, true));
        assert!(fill_pending(&net, &throats, &[-1.0, 0.0], 1, true));
        assert!(!fill_pending(&net, &throats, &[-1.0, 1.0], 1, true));

        set_menisci(&net, &mut throats, &[-1.0, 0.0], 1, &[1]);
        assert!(!fill_pending(&net, &throats, &[-1.0, 0.0], 1, true));
    }

    #[test]
    fn test_full_pore_with_still_throat_settles() {
        // Pore 1 is full but throat 1 has carried no flow, so it still holds
        // defending phase at pore 1.
        let net = build_chain(3, 1.0, 1.0, 1.0).unwrap();
        let mut pores = PoreState::new(3);
        pores.inv_frac[1] = 1.0;
        pores.invaded[1] = true;
        pores.contested[1] = true;
        let mut throats = ThroatState::new(vec![1.0, 1.0], vec![0.0, 0.0]);
        throats.supply[0] = Supply::Invading;

        let flows = StepFlows::new(3, 2);
        advance_interfaces(&net, &mut pores, &mut throats, &flows, 1.0, TOL);

        assert_eq!(pores.inv_frac[1], 1.0);
        assert!(!pores.contested[1]);
        assert_eq!(throats.menisci.get(1), &[0.0]);
        assert!(throats.contested[1]);
    }
}
