use anyhow::Result;
use porenet::drainage::{DrainageConfig, LabelMode, ViscousDrainage};
use porenet::network::{PoreNetwork, cubic_face_pores, lattice_throats};
use porenet::phase::Phase;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 8 x 4 x 1 lattice with 20 um spacing and scattered pore sizes
    let shape = [8, 4, 1];
    let spacing = 20.0e-6;
    let mut rng = StdRng::seed_from_u64(42);
    let pore_volume: Vec<f64> = (0..shape.iter().product::<usize>())
        .map(|_| rng.gen_range(2.0e-15..6.0e-15))
        .collect();
    let net = PoreNetwork::new("lattice", pore_volume, lattice_throats(shape, spacing, 2.0e-11))?;

    let water = Phase::new("water", &net)
        .with_viscosity(1.0e-3)
        .with_poiseuille_conductance(&net);
    let oil = Phase::new("oil", &net)
        .with_viscosity(2.0e-4)
        .with_capillary_pressure(500.0);

    let mut config = DrainageConfig::with_injection_rate(1.0e-14);
    config.max_steps = 20_000;
    let mut sim = ViscousDrainage::setup(&net, &water, Some(&oil), config)?;
    sim.set_inlets(&cubic_face_pores(shape, 0, false), LabelMode::Overwrite)?;
    sim.set_outlets(&cubic_face_pores(shape, 0, true), LabelMode::Overwrite)?;

    let summary = sim.run()?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
