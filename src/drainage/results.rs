use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::phase::Phase;

use super::simulation::ViscousDrainage;

/// Per-element flags published next to the phase fractions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkState {
    pub pore_invaded: Vec<bool>,
    pub pore_contested: Vec<bool>,
    pub throat_contested: Vec<bool>,
    pub throat_menisci: Vec<usize>,
}

impl ViscousDrainage<'_> {
    /// Writes the current phase distribution into the two phases.
    ///
    /// The invading phase receives the invasion fractions, the defending phase
    /// their complement and the pore pressures from the last solve.
    pub fn return_results(&self, invading: &mut Phase, defending: &mut Phase) -> Result<NetworkState> {
        let network = self.network();
        let np = network.num_pores();
        let nt = network.num_throats();
        for phase in [&*invading, &*defending] {
            anyhow::ensure!(
                phase.pore_volume_fraction.len() == np && phase.throat_volume_fraction.len() == nt,
                "Phase '{}' is not sized for network '{}'",
                phase.name,
                network.name
            );
        }

        invading.pore_volume_fraction.copy_from_slice(&self.pores.inv_frac);
        invading.throat_volume_fraction.copy_from_slice(&self.throats.inv_frac);
        for (d, &f) in defending.pore_volume_fraction.iter_mut().zip(&self.pores.inv_frac) {
            *d = 1.0 - f;
        }
        for (d, &f) in defending.throat_volume_fraction.iter_mut().zip(&self.throats.inv_frac) {
            *d = 1.0 - f;
        }

        let pressures = self.solver.pressures(np);
        if pressures.len() == np {
            defending.pore_pressure = pressures.to_vec();
        }

        Ok(NetworkState {
            pore_invaded: self.pores.invaded.clone(),
            pore_contested: self.pores.contested.clone(),
            throat_contested: self.throats.contested.clone(),
            throat_menisci: self.throats.menisci.counts(),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::drainage::{DrainageConfig, LabelMode, ViscousDrainage};
    use crate::network::build_chain;
    use crate::phase::Phase;

    #[test]
    fn test_fractions_are_complementary() {
        let net = build_chain(3, 1.0, 1.0, 1.0).unwrap();
        let mut water = Phase::new("water", &net)
            .with_viscosity(1.0)
            .with_hydraulic_conductance(1.0);
        let mut air = Phase::new("air", &net).with_viscosity(1.0);

        let mut sim =
            ViscousDrainage::setup(&net, &water, Some(&air), DrainageConfig::with_injection_rate(1.0)).unwrap();
        sim.set_inlets(&[0], LabelMode::Overwrite).unwrap();
        sim.set_outlets(&[2], LabelMode::Overwrite).unwrap();
        sim.step_once().unwrap();

        let state = sim.return_results(&mut air, &mut water).unwrap();
        assert_eq!(air.pore_volume_fraction, vec![1.0, 0.0, 0.0]);
        assert_eq!(water.pore_volume_fraction, vec![0.0, 1.0, 1.0]);
        for t in 0..2 {
            let sum = air.throat_volume_fraction[t] + water.throat_volume_fraction[t];
            assert!((sum - 1.0).abs() < 1e-15);
        }
        assert!((water.pore_pressure[0] - 2.0).abs() < 1e-9);
        assert_eq!(state.throat_menisci, vec![1, 0]);
        assert_eq!(state.pore_invaded, vec![true, false, false]);
    }
}
