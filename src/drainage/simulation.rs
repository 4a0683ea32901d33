use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::io::snapshot::{FullFields, JsonSnapshotExporter, Snapshot, SnapshotExporter, SnapshotKind};
use crate::network::{PoreNetwork, ThroatFilter};
use crate::phase::{Phase, PhaseProperty};
use crate::transport::{BcMode, BoundaryCondition, BoundaryConditions, PressureSolver};
use crate::uid::RunId;

use super::advance::{advance_interfaces, set_menisci};
use super::capillary::capillary_rhs;
use super::conductance::update_conductance;
use super::config::DrainageConfig;
use super::error::ConfigError;
use super::outflow::{OutflowRates, outflow_rates};
use super::recorder::{StepLog, StepRecord};
use super::state::{Breakthrough, PoreState, SimulationContext, StepFlows, Supply, ThroatState};
use super::timestep::estimate_dt;

/// How a call to [`ViscousDrainage::set_inlets`] or
/// [`ViscousDrainage::set_outlets`] combines with the current labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelMode {
    /// Label the given pores in addition to the current ones.
    Add,
    /// Label exactly the given pores.
    Overwrite,
    /// Remove the label from the given pores.
    Remove,
}

/// Outcome of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Continue,
    /// The invading phase reached an outlet during this step. Not terminal.
    Breakthrough,
    SteadyState,
    MaxSteps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    SteadyState,
    MaxSteps,
}

/// Totals reported when a run or restart stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub stop_reason: StopReason,
    pub steps: usize,
    /// Simulated time in s.
    pub time: f64,
    pub breakthrough: Option<Breakthrough>,
    pub stored_invading_volume: f64,
    pub total_invading_out: f64,
    pub total_defending_out: f64,
    pub invading_saturation: f64,
    pub injected_volume: f64,
    /// Normalized by total void volume. Should be close to zero.
    pub mass_balance_residual: f64,
    /// Steps with dt = 0 during this run or restart.
    pub zero_dt_steps: usize,
}

/// Time-resolved drainage of a defending phase by an invading phase injected
/// at a fixed rate.
///
/// Phase boundaries inside throats are tracked as menisci; the pressure field
/// is re-solved every step with the phase-weighted conductances and the
/// capillary pressure of every meniscus.
///
/// # Example
/// ```no_run
/// use porenet::drainage::{DrainageConfig, LabelMode, ViscousDrainage};
/// use porenet::network::build_chain;
/// use porenet::phase::Phase;
///
/// let net = build_chain(10, 1.0e-15, 1.0e-5, 1.0e-10).unwrap();
/// let water = Phase::new("water", &net).with_viscosity(1.0e-3).with_poiseuille_conductance(&net);
/// let oil = Phase::new("oil", &net).with_viscosity(1.0e-4).with_capillary_pressure(1.0e3);
///
/// let config = DrainageConfig::with_injection_rate(1.0e-15);
/// let mut sim = ViscousDrainage::setup(&net, &water, Some(&oil), config).unwrap();
/// sim.set_inlets(&[0], LabelMode::Overwrite).unwrap();
/// sim.set_outlets(&[9], LabelMode::Overwrite).unwrap();
/// let summary = sim.run().unwrap();
/// println!("breakthrough: {:?}", summary.breakthrough);
/// ```
pub struct ViscousDrainage<'a> {
    network: &'a PoreNetwork,
    config: DrainageConfig,
    injection_rate: f64,
    run_id: RunId,
    max_steps: usize,
    started: bool,
    net_vol: f64,
    invading_viscosity: Vec<f64>,
    defending_viscosity: Vec<f64>,
    pub(super) pores: PoreState,
    pub(super) throats: ThroatState,
    bcs: BoundaryConditions,
    pub(super) solver: PressureSolver,
    flows: StepFlows,
    ctx: SimulationContext,
    last_rates: OutflowRates,
    step_log: StepLog,
    exporter: Option<Box<dyn SnapshotExporter>>,
    history: Vec<StepRecord>,
}

impl<'a> ViscousDrainage<'a> {
    /// Validates the configuration and initializes every pore and throat to
    /// the defending phase.
    ///
    /// The throat conductance is read from `defending`, the capillary entry
    /// pressure from `invading`, and pore viscosities from both.
    pub fn setup(
        network: &'a PoreNetwork,
        defending: &Phase,
        invading: Option<&Phase>,
        config: DrainageConfig,
    ) -> Result<Self> {
        let rate = config.injection_rate.ok_or(ConfigError::MissingInjectionRate)?;
        if !(rate.is_finite() && rate > 0.0) {
            return Err(ConfigError::InvalidInjectionRate(rate).into());
        }
        let invading = invading.ok_or(ConfigError::MissingInvadingPhase)?;

        let np = network.num_pores();
        let nt = network.num_throats();
        let base_conductance = property(defending, &config.conductance, nt)?;
        let max_pc = property(invading, &config.entry_pressure, nt)?;
        let defending_viscosity = viscosity(defending, np)?;
        let invading_viscosity = viscosity(invading, np)?;

        let run_id = RunId::new();
        let exporter = config.snapshots.dir.as_ref().and_then(|dir| {
            match JsonSnapshotExporter::new(dir) {
                Ok(e) => Some(Box::new(e) as Box<dyn SnapshotExporter>),
                Err(e) => {
                    log::warn!("Snapshot export disabled: {e:#}");
                    None
                }
            }
        });

        log::info!(
            "Viscous drainage {} on '{}': {np} pores, {nt} throats, injection rate {rate:e} m^3/s",
            run_id.short(),
            network.name,
        );

        Ok(Self {
            network,
            injection_rate: rate,
            run_id,
            max_steps: config.max_steps,
            started: false,
            net_vol: network.total_void_volume(),
            invading_viscosity,
            defending_viscosity,
            pores: PoreState::new(np),
            throats: ThroatState::new(base_conductance, max_pc),
            bcs: BoundaryConditions::new(),
            solver: PressureSolver::new(config.solver, config.super_pore_conductance),
            flows: StepFlows::new(np, nt),
            ctx: SimulationContext::default(),
            last_rates: OutflowRates::default(),
            step_log: StepLog::disabled(),
            exporter,
            history: Vec::new(),
            config,
        })
    }

    /// Labels inlet pores and prepares the throats around them.
    ///
    /// Inlets hold the invading phase. Throats between two inlets are filled
    /// outright; throats leaving the inlet set get a meniscus at the inlet end.
    /// Nothing changes if the call fails.
    pub fn set_inlets(&mut self, pores: &[usize], mode: LabelMode) -> Result<()> {
        self.check_range(pores)?;
        if mode != LabelMode::Remove {
            let overlap: Vec<usize> = pores.iter().copied().filter(|&p| self.pores.outlet[p]).collect();
            if !overlap.is_empty() {
                return Err(ConfigError::InletIsOutlet(overlap).into());
            }
        }

        let flags = relabel(&self.pores.inlet, pores, mode);
        let inlets = indices(&flags);
        self.bcs.set(
            BoundaryCondition::GroupFlow {
                rate: self.injection_rate,
            },
            &inlets,
            BcMode::Overwrite,
        )?;
        self.pores.inlet = flags;

        for &p in &inlets {
            self.pores.inv_frac[p] = 1.0;
            self.pores.invaded[p] = true;
        }

        for t in self.network.find_neighbor_throats(&inlets, ThroatFilter::Intersection) {
            self.throats.inv_frac[t] = 1.0;
            self.throats.supply[t] = Supply::Invading;
            self.throats.menisci.clear(t);
            self.throats.contested[t] = false;
        }

        // No flow field applies while labelling.
        let still = vec![0.0; self.network.num_throats()];
        for t in self.network.find_neighbor_throats(&inlets, ThroatFilter::NotIntersection) {
            let [p1, p2] = self.network.conns(t);
            let inlet_end = if self.pores.inlet[p1] { p1 } else { p2 };
            if !self.throats.contested[t]
                && self.throats.supply_at(self.network, t, inlet_end) == Supply::Defending
            {
                set_menisci(self.network, &mut self.throats, &still, inlet_end, &[t]);
            }
        }

        log::info!("{} inlet pores, menisci set in throats leaving them", inlets.len());
        Ok(())
    }

    /// Labels outlet pores, held at zero pressure.
    pub fn set_outlets(&mut self, pores: &[usize], mode: LabelMode) -> Result<()> {
        self.check_range(pores)?;
        if mode != LabelMode::Remove {
            let overlap: Vec<usize> = pores.iter().copied().filter(|&p| self.pores.inlet[p]).collect();
            if !overlap.is_empty() {
                return Err(ConfigError::OutletIsInlet(overlap).into());
            }
        }

        let flags = relabel(&self.pores.outlet, pores, mode);
        let outlets = indices(&flags);
        self.bcs
            .set(BoundaryCondition::FixedValue { value: 0.0 }, &outlets, BcMode::Overwrite)?;
        self.pores.outlet = flags;

        log::info!("{} outlet pores", outlets.len());
        Ok(())
    }

    /// Runs from the current state until steady state or the step cap.
    ///
    /// Counters are reset and the clock starts at the time the injection would
    /// have needed to place the invading phase already in the network. The
    /// step log is truncated.
    pub fn run(&mut self) -> Result<RunSummary> {
        self.ensure_ready()?;
        self.begin();
        self.run_loop()
    }

    /// Continues a stopped run with a new cap on the step counter, appending to
    /// the step log.
    pub fn restart_simulation(&mut self, max_steps: usize) -> Result<RunSummary> {
        self.ensure_ready()?;
        if self.started {
            if let Some(path) = &self.config.log_path {
                self.step_log = StepLog::append(path);
            }
        } else {
            self.begin();
        }
        self.max_steps = max_steps;
        self.step_log.message(&format!("restart at step {} with max_steps {max_steps}", self.ctx.step));
        log::info!("Restarting run {} at step {}", self.run_id.short(), self.ctx.step);
        self.run_loop()
    }

    fn begin(&mut self) {
        self.ctx = SimulationContext::default();
        self.history.clear();
        self.max_steps = self.config.max_steps;
        self.ctx.time = self.stored_invading_volume() / self.injection_rate;

        self.step_log = match &self.config.log_path {
            Some(path) => StepLog::create(path),
            None => StepLog::disabled(),
        };
        self.step_log.message(&format!(
            "run {} network '{}' pores {} throats {} injection_rate {:e}",
            self.run_id,
            self.network.name,
            self.network.num_pores(),
            self.network.num_throats(),
            self.injection_rate,
        ));
        self.step_log.header();

        log::info!(
            "Starting run {}: initial invading saturation {:.6}, time {:e} s",
            self.run_id.short(),
            self.invading_saturation(),
            self.ctx.time,
        );
        self.started = true;
    }

    fn run_loop(&mut self) -> Result<RunSummary> {
        self.ctx.zero_dt_steps = 0;
        let stop_reason = loop {
            if self.ctx.step >= self.max_steps {
                break StopReason::MaxSteps;
            }
            match self.step_once()? {
                StepStatus::SteadyState => break StopReason::SteadyState,
                StepStatus::MaxSteps => break StopReason::MaxSteps,
                StepStatus::Continue | StepStatus::Breakthrough => {}
            }
        };

        let summary = self.summary(stop_reason);
        log::info!(
            "Run {} stopped ({:?}) after {} steps at t = {:e} s, mass balance residual {:e}",
            self.run_id.short(),
            stop_reason,
            summary.steps,
            summary.time,
            summary.mass_balance_residual,
        );
        if summary.zero_dt_steps > 0 {
            log::info!("{} steps had dt = 0", summary.zero_dt_steps);
        }
        self.step_log.message(&format!(
            "stop {:?} steps {} time {:e} mass_balance_residual {:e} zero_dt {}",
            stop_reason, summary.steps, summary.time, summary.mass_balance_residual, summary.zero_dt_steps,
        ));
        self.step_log.flush();
        Ok(summary)
    }

    /// Performs one outer iteration: conductances, pressure solve, time step,
    /// advance and bookkeeping.
    ///
    /// The first call on a fresh solver starts the clock like [`Self::run`].
    pub fn step_once(&mut self) -> Result<StepStatus> {
        self.ensure_ready()?;
        if !self.started {
            self.begin();
        }
        let network = self.network;

        update_conductance(
            network,
            &self.invading_viscosity,
            &self.defending_viscosity,
            &mut self.throats,
        );
        let rhs = capillary_rhs(network, &self.throats);
        let pressures = self
            .solver
            .solve(network, &self.throats.conductance, &self.bcs, &rhs)?
            .to_vec();

        let default_dt = self.net_vol / self.injection_rate * self.config.initial_fill_fraction;
        let dt = estimate_dt(
            network,
            &self.pores,
            &self.throats,
            &pressures,
            &self.config.limits,
            self.config.sat_tol,
            self.config.flow_noise * self.injection_rate,
            default_dt,
            &mut self.flows,
        );
        if dt == 0.0 {
            self.ctx.zero_dt_steps += 1;
            log::debug!("Zero time step at step {}", self.ctx.step);
        }

        self.export_snapshot(&pressures);

        let outlets = self.pores.outlets();
        let rates = outflow_rates(network, &self.throats, &pressures, &self.pores.invaded, &outlets);
        advance_interfaces(
            network,
            &mut self.pores,
            &mut self.throats,
            &self.flows,
            dt,
            self.config.sat_tol,
        );

        self.ctx.step += 1;
        self.ctx.time += dt;
        self.ctx.inv_out_rate = rates.invading;
        self.ctx.def_out_rate = rates.defending;
        self.ctx.total_inv_out += rates.invading * dt;
        self.ctx.total_def_out += rates.defending * dt;
        self.last_rates = rates;

        let inlets = self.pores.inlets();
        let inlet_pressure = if inlets.is_empty() {
            0.0
        } else {
            inlets.iter().map(|&p| pressures[p]).sum::<f64>() / inlets.len() as f64
        };
        let record = StepRecord {
            step: self.ctx.step,
            time: self.ctx.time,
            dt,
            inlet_pressure,
            saturation: self.invading_saturation(),
            mass_residual: self.mass_balance_residual(),
            invading_out: rates.invading * dt,
            defending_out: rates.defending * dt,
            injected: self.injection_rate * dt,
            zero_dt_steps: self.ctx.zero_dt_steps,
        };
        self.step_log.record(&record);
        if self.config.record_history {
            self.history.push(record);
        }

        Ok(self.check_status(&outlets))
    }

    fn check_status(&mut self, outlets: &[usize]) -> StepStatus {
        let mut status = StepStatus::Continue;

        let threshold = 1.0 - self.config.sat_tol;
        if self.ctx.breakthrough.is_none() && outlets.iter().any(|&p| self.pores.inv_frac[p] > threshold) {
            let bt = Breakthrough {
                time: self.ctx.time,
                step: self.ctx.step,
            };
            self.ctx.breakthrough = Some(bt);
            log::info!("Breakthrough at step {} (t = {:e} s)", bt.step, bt.time);
            self.step_log
                .message(&format!("breakthrough step {} time {:e}", bt.step, bt.time));
            status = StepStatus::Breakthrough;
        }

        let mismatch = (self.ctx.inv_out_rate - self.injection_rate).abs() / self.injection_rate;
        if mismatch < self.config.steady_state_tol {
            log::info!("Steady state reached at step {}", self.ctx.step);
            return StepStatus::SteadyState;
        }

        if self.ctx.step >= self.max_steps {
            log::warn!(
                "Maximum number of steps ({}) reached before steady state",
                self.max_steps
            );
            self.step_log.message("maximum number of steps reached");
            return StepStatus::MaxSteps;
        }

        status
    }

    fn export_snapshot(&mut self, pressures: &[f64]) {
        if self.exporter.is_none() {
            return;
        }
        let due = |every: usize| every > 0 && self.ctx.step % every == 0;
        let kind = if due(self.config.snapshots.full_every) {
            SnapshotKind::Full
        } else if due(self.config.snapshots.frequent_every) {
            SnapshotKind::Light
        } else {
            return;
        };

        let full = (kind == SnapshotKind::Full).then(|| FullFields {
            pore_pressure: pressures.to_vec(),
            pore_invaded: self.pores.invaded.clone(),
            pore_contested: self.pores.contested.clone(),
            throat_contested: self.throats.contested.clone(),
            throat_menisci: self.throats.menisci.to_vecs(),
        });
        let snapshot = Snapshot {
            run_id: self.run_id.clone(),
            network: self.network.name.clone(),
            kind,
            step: self.ctx.step,
            time: self.ctx.time,
            pore_inv_frac: self.pores.inv_frac.clone(),
            throat_inv_frac: self.throats.inv_frac.clone(),
            full,
        };

        if let Some(exporter) = self.exporter.as_mut()
            && let Err(e) = exporter.export(&snapshot)
        {
            log::warn!("Snapshot export failed at step {}: {e:#}", snapshot.step);
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        if !self.pores.inlet.contains(&true) {
            return Err(ConfigError::NoInlets.into());
        }
        if !self.pores.outlet.contains(&true) {
            return Err(ConfigError::NoOutlets.into());
        }
        Ok(())
    }

    fn check_range(&self, pores: &[usize]) -> Result<(), ConfigError> {
        let num_pores = self.network.num_pores();
        match pores.iter().find(|&&p| p >= num_pores) {
            Some(&pore) => Err(ConfigError::PoreOutOfRange { pore, num_pores }),
            None => Ok(()),
        }
    }

    fn summary(&self, stop_reason: StopReason) -> RunSummary {
        RunSummary {
            run_id: self.run_id.clone(),
            stop_reason,
            steps: self.ctx.step,
            time: self.ctx.time,
            breakthrough: self.ctx.breakthrough,
            stored_invading_volume: self.stored_invading_volume(),
            total_invading_out: self.ctx.total_inv_out,
            total_defending_out: self.ctx.total_def_out,
            invading_saturation: self.invading_saturation(),
            injected_volume: self.injected_volume(),
            mass_balance_residual: self.mass_balance_residual(),
            zero_dt_steps: self.ctx.zero_dt_steps,
        }
    }

    /// Replaces the snapshot destination configured through
    /// [`DrainageConfig::snapshots`].
    pub fn set_snapshot_exporter(&mut self, exporter: Box<dyn SnapshotExporter>) {
        self.exporter = Some(exporter);
    }

    pub fn network(&self) -> &'a PoreNetwork {
        self.network
    }

    pub fn config(&self) -> &DrainageConfig {
        &self.config
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn injection_rate(&self) -> f64 {
        self.injection_rate
    }

    pub fn pore_state(&self) -> &PoreState {
        &self.pores
    }

    pub fn throat_state(&self) -> &ThroatState {
        &self.throats
    }

    pub fn boundary_conditions(&self) -> &BoundaryConditions {
        &self.bcs
    }

    /// Pore pressures from the last solve (empty before the first step).
    pub fn pressures(&self) -> &[f64] {
        self.solver.pressures(self.network.num_pores())
    }

    pub fn inlets(&self) -> Vec<usize> {
        self.pores.inlets()
    }

    pub fn outlets(&self) -> Vec<usize> {
        self.pores.outlets()
    }

    /// Meniscus positions in `throat`, ascending from its lower indexed pore.
    pub fn menisci(&self, throat: usize) -> &[f64] {
        self.throats.menisci.get(throat)
    }

    pub fn time(&self) -> f64 {
        self.ctx.time
    }

    pub fn step(&self) -> usize {
        self.ctx.step
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn breakthrough(&self) -> Option<Breakthrough> {
        self.ctx.breakthrough
    }

    pub fn zero_dt_steps(&self) -> usize {
        self.ctx.zero_dt_steps
    }

    pub fn total_invading_out(&self) -> f64 {
        self.ctx.total_inv_out
    }

    pub fn total_defending_out(&self) -> f64 {
        self.ctx.total_def_out
    }

    /// Outlet flow rates of the last step.
    pub fn outflow_rates(&self) -> OutflowRates {
        self.last_rates
    }

    pub fn history(&self) -> &[StepRecord] {
        &self.history
    }

    pub fn total_void_volume(&self) -> f64 {
        self.net_vol
    }

    /// Invading phase volume held in pores and throats.
    pub fn stored_invading_volume(&self) -> f64 {
        let pores: f64 = self
            .pores
            .inv_frac
            .iter()
            .zip(self.network.pore_volumes())
            .map(|(f, v)| f * v)
            .sum();
        let throats: f64 = self
            .throats
            .inv_frac
            .iter()
            .zip(self.network.throat_volumes())
            .map(|(f, v)| f * v)
            .sum();
        pores + throats
    }

    pub fn invading_saturation(&self) -> f64 {
        self.stored_invading_volume() / self.net_vol
    }

    /// Volume injected since the clock started at zero.
    pub fn injected_volume(&self) -> f64 {
        self.injection_rate * self.ctx.time
    }

    /// Injected volume not accounted for by stored volume and outflow,
    /// normalized by total void volume.
    pub fn mass_balance_residual(&self) -> f64 {
        (self.injected_volume() - self.stored_invading_volume() - self.ctx.total_inv_out) / self.net_vol
    }
}

fn property(phase: &Phase, key: &PhaseProperty, expected: usize) -> Result<Vec<f64>, ConfigError> {
    let values = phase.get(key).ok_or_else(|| ConfigError::MissingProperty {
        phase: phase.name.clone(),
        property: key.to_string(),
    })?;
    if values.len() != expected {
        return Err(ConfigError::PropertyLength {
            phase: phase.name.clone(),
            property: key.to_string(),
            expected,
            actual: values.len(),
        });
    }
    Ok(values.to_vec())
}

fn viscosity(phase: &Phase, num_pores: usize) -> Result<Vec<f64>, ConfigError> {
    let mu = property(phase, &PhaseProperty::PoreViscosity, num_pores)?;
    match mu.iter().position(|&m| !(m.is_finite() && m > 0.0)) {
        Some(pore) => Err(ConfigError::InvalidViscosity {
            phase: phase.name.clone(),
            pore,
        }),
        None => Ok(mu),
    }
}

fn relabel(current: &[bool], pores: &[usize], mode: LabelMode) -> Vec<bool> {
    let mut flags = match mode {
        LabelMode::Overwrite => vec![false; current.len()],
        LabelMode::Add | LabelMode::Remove => current.to_vec(),
    };
    let value = mode != LabelMode::Remove;
    for &p in pores {
        flags[p] = value;
    }
    flags
}

fn indices(flags: &[bool]) -> Vec<usize> {
    flags
        .iter()
        .enumerate()
        .filter_map(|(i, &f)| f.then_some(i))
        .collect()
}
