use rayon::prelude::*;

use crate::network::PoreNetwork;

use super::state::ThroatState;

/// Linear mixing between pure-defending (`frac = 0`) and pure-invading
/// (`frac = 1`) conductance for viscosity ratio `m = mu_def / mu_inv`.
pub fn mixed_conductance(base: f64, frac: f64, m: f64) -> f64 {
    base * (1.0 - frac + frac * m)
}

/// Recomputes the effective conductance of every throat from its current
/// invasion fraction.
///
/// The viscosities of each phase are averaged over the two connected pores.
pub fn update_conductance(
    network: &PoreNetwork,
    invading_viscosity: &[f64],
    defending_viscosity: &[f64],
    throats: &mut ThroatState,
) {
    let ThroatState {
        conductance,
        base_conductance,
        inv_frac,
        ..
    } = throats;

    conductance
        .par_iter_mut()
        .zip(base_conductance.par_iter())
        .zip(inv_frac.par_iter())
        .enumerate()
        .for_each(|(t, ((g, &base), &frac))| {
            let [a, b] = network.conns(t);
            let mu_def = 0.5 * (defending_viscosity[a] + defending_viscosity[b]);
            let mu_inv = 0.5 * (invading_viscosity[a] + invading_viscosity[b]);
            *g = mixed_conductance(base, frac, mu_def / mu_inv);
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::build_chain;

    #[test]
    fn test_pure_phases() {
        assert_eq!(mixed_conductance(2.0, 0.0, 5.0), 2.0);
        assert_eq!(mixed_conductance(2.0, 1.0, 5.0), 10.0);
        assert!((mixed_conductance(2.0, 0.5, 3.0) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_update_uses_pore_averaged_viscosity() {
        let net = build_chain(3, 1.0, 1.0, 1.0).unwrap();
        let mut throats = ThroatState::new(vec![1.0, 4.0], vec![0.0, 0.0]);
        throats.inv_frac = vec![1.0, 0.0];

        let mu_inv = [1.0, 3.0, 1.0];
        let mu_def = [4.0, 4.0, 4.0];
        update_conductance(&net, &mu_inv, &mu_def, &mut throats);

        // Throat 0: M = 4 / 2.
        assert!((throats.conductance[0] - 2.0).abs() < 1e-12);
        // Throat 1 holds no invading phase: base conductance exactly.
        assert_eq!(throats.conductance[1], 4.0);
    }
}
