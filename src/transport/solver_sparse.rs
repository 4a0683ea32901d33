use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::network::PoreNetwork;
use crate::transport::boundary::BoundaryConditions;

/// Configuration for the sparse pressure solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SparseSolverConfig {
    /// Maximum number of PCG iterations per solve.
    pub max_iterations: usize,
    /// Relative residual tolerance.
    pub rel_tolerance: f64,
    /// Absolute residual tolerance.
    pub abs_tolerance: f64,
}

impl Default for SparseSolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5000,
            rel_tolerance: 1e-12,
            abs_tolerance: 1e-30,
        }
    }
}

/// Steady pressure solver on a pore network.
///
/// Assembles the conductance Laplacian
///
/// ```text
/// sum_j g_ij (p_i - p_j) = b_i
/// ```
///
/// with fixed-value pores eliminated (the matrix stays symmetric) and
/// group-flow pores fed either evenly or through one virtual super pore per
/// group. The system is solved with preconditioned conjugate gradients
/// (Jacobi preconditioner), warm-started from the previous solution.
///
/// Every connected cluster of pores must reach a fixed-value pore, otherwise
/// the system is singular.
#[derive(Debug, Clone)]
pub struct PressureSolver {
    config: SparseSolverConfig,
    super_pore_conductance: Option<f64>,
    // Pore pressures followed by super pore pressures.
    solution: Vec<f64>,
    last_iterations: usize,
}

impl PressureSolver {
    pub fn new(config: SparseSolverConfig, super_pore_conductance: Option<f64>) -> Self {
        Self {
            config,
            super_pore_conductance,
            solution: Vec::new(),
            last_iterations: 0,
        }
    }

    /// Solves for pore pressures.
    ///
    /// `conductance` is per throat. `rhs` is a per-pore source perturbation in
    /// m^3/s added to free pores (positive = flow into the pore); it is ignored
    /// on fixed-value pores.
    pub fn solve(
        &mut self,
        network: &PoreNetwork,
        conductance: &[f64],
        bcs: &BoundaryConditions,
        rhs: &[f64],
    ) -> Result<&[f64]> {
        let np = network.num_pores();
        anyhow::ensure!(
            conductance.len() == network.num_throats(),
            "conductance length mismatch ({} for {} throats)",
            conductance.len(),
            network.num_throats()
        );
        anyhow::ensure!(rhs.len() == np, "rhs length mismatch ({} for {np} pores)", rhs.len());

        let num_super = match self.super_pore_conductance {
            Some(_) => bcs.groups().len(),
            None => 0,
        };
        let n = np + num_super;

        let mut fixed = vec![None; np];
        for (p, value) in bcs.fixed_pores() {
            anyhow::ensure!(p < np, "fixed-value pore {p} out of range ({np} pores)");
            fixed[p] = Some(value);
        }

        let mut diag = vec![0.0; n];
        let mut off = vec![Vec::<(usize, f64)>::new(); n];
        let mut b = vec![0.0; n];

        for p in 0..np {
            match fixed[p] {
                Some(value) => {
                    diag[p] = 1.0;
                    b[p] = value;
                }
                None => b[p] += rhs[p],
            }
        }

        for t in 0..network.num_throats() {
            let [i, j] = network.conns(t);
            let g = conductance[t];
            match (fixed[i], fixed[j]) {
                (None, None) => {
                    diag[i] += g;
                    diag[j] += g;
                    off[i].push((j, -g));
                    off[j].push((i, -g));
                }
                (None, Some(pj)) => {
                    diag[i] += g;
                    b[i] += g * pj;
                }
                (Some(pi), None) => {
                    diag[j] += g;
                    b[j] += g * pi;
                }
                (Some(_), Some(_)) => {}
            }
        }

        for (k, group) in bcs.groups().iter().enumerate() {
            for &p in &group.pores {
                anyhow::ensure!(p < np, "group-flow pore {p} out of range ({np} pores)");
            }
            match self.super_pore_conductance {
                None => {
                    let share = group.rate / group.pores.len() as f64;
                    for &p in &group.pores {
                        b[p] += share;
                    }
                }
                Some(gs) => {
                    let s = np + k;
                    b[s] += group.rate;
                    for &p in &group.pores {
                        diag[s] += gs;
                        diag[p] += gs;
                        off[s].push((p, -gs));
                        off[p].push((s, -gs));
                    }
                }
            }
        }

        // Pores with no coupling at all keep a zero pressure.
        for i in 0..n {
            if diag[i] == 0.0 {
                diag[i] = 1.0;
                b[i] = 0.0;
            }
        }

        if self.solution.len() != n {
            self.solution = vec![0.0; n];
        }
        let (x, iterations) = pcg_solve(&diag, &off, &b, &self.solution, self.config);
        self.last_iterations = iterations;
        if iterations >= self.config.max_iterations {
            log::warn!(
                "Pressure solve hit the iteration cap ({}) on network '{}'",
                self.config.max_iterations,
                network.name
            );
        }

        for (i, xi) in x.iter().enumerate() {
            xi.is_finite()
                .then_some(())
                .with_context(|| format!("Non-finite pressure at index {i}: {xi}"))?;
        }
        self.solution = x;
        Ok(&self.solution[..np])
    }

    /// Pore pressures from the last solve.
    pub fn pressures(&self, num_pores: usize) -> &[f64] {
        &self.solution[..num_pores.min(self.solution.len())]
    }

    /// PCG iterations used by the last solve.
    pub fn last_iterations(&self) -> usize {
        self.last_iterations
    }
}

fn pcg_solve(
    diag: &[f64],
    off: &[Vec<(usize, f64)>],
    b: &[f64],
    x0: &[f64],
    config: SparseSolverConfig,
) -> (Vec<f64>, usize) {
    let n = b.len();
    if n == 0 {
        return (Vec::new(), 0);
    }

    let mut x = x0.to_vec();
    let mut r = vec![0.0; n];
    apply_matrix(diag, off, &x, &mut r);
    r.iter_mut().zip(b).for_each(|(ri, bi)| *ri = bi - *ri);

    // Pore flows are O(1e-12) m^3/s and smaller, so the tolerance scales with
    // the right-hand side alone rather than with a unit floor.
    let tol = config.abs_tolerance.max(config.rel_tolerance * l2_norm(b));
    if l2_norm(&r) <= tol {
        return (x, 0);
    }

    let mut z = vec![0.0; n];
    precondition(diag, &r, &mut z);
    let mut p = z.clone();
    let mut rz = dot(&r, &z);
    let mut ap = vec![0.0; n];

    for iteration in 1..=config.max_iterations {
        apply_matrix(diag, off, &p, &mut ap);
        let pap = dot(&p, &ap);
        if pap.abs() < f64::MIN_POSITIVE || rz.abs() < f64::MIN_POSITIVE {
            return (x, iteration);
        }

        let alpha = rz / pap;
        axpy(alpha, &p, &mut x);
        axpy(-alpha, &ap, &mut r);
        if l2_norm(&r) <= tol {
            return (x, iteration);
        }

        precondition(diag, &r, &mut z);
        let rz_next = dot(&r, &z);
        let beta = rz_next / rz;
        p.iter_mut().zip(&z).for_each(|(pi, zi)| *pi = zi + beta * *pi);
        rz = rz_next;
    }

    (x, config.max_iterations)
}

/// Jacobi preconditioner; rows without a diagonal pass through.
fn precondition(diag: &[f64], r: &[f64], z: &mut [f64]) {
    for ((zi, ri), di) in z.iter_mut().zip(r).zip(diag) {
        *zi = if di.abs() > f64::MIN_POSITIVE { ri / di } else { *ri };
    }
}

fn apply_matrix(diag: &[f64], off: &[Vec<(usize, f64)>], x: &[f64], y: &mut [f64]) {
    for (i, yi) in y.iter_mut().enumerate() {
        *yi = diag[i] * x[i] + off[i].iter().map(|&(j, a_ij)| a_ij * x[j]).sum::<f64>();
    }
}

/// `y += a * x`
fn axpy(a: f64, x: &[f64], y: &mut [f64]) {
    y.iter_mut().zip(x).for_each(|(yi, xi)| *yi += a * xi);
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn l2_norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{ThroatSpec, build_chain};
    use crate::transport::boundary::{BcMode, BoundaryCondition};

    #[test]
    fn test_chain_with_injection_is_linear() {
        // Source 2.0 into pore 0, pore 3 fixed at 0: flux 2.0 through each throat.
        let net = build_chain(4, 1.0, 1.0, 1.0).unwrap();
        let mut bcs = BoundaryConditions::new();
        bcs.set(BoundaryCondition::GroupFlow { rate: 2.0 }, &[0], BcMode::Overwrite)
            .unwrap();
        bcs.set(BoundaryCondition::FixedValue { value: 0.0 }, &[3], BcMode::Overwrite)
            .unwrap();

        let mut solver = PressureSolver::new(SparseSolverConfig::default(), None);
        let p = solver.solve(&net, &[0.5, 1.0, 2.0], &bcs, &[0.0; 4]).unwrap();

        assert!((p[3]).abs() < 1e-12);
        assert!((p[2] - 1.0).abs() < 1e-9, "p2={}", p[2]);
        assert!((p[1] - 3.0).abs() < 1e-9, "p1={}", p[1]);
        assert!((p[0] - 7.0).abs() < 1e-9, "p0={}", p[0]);
    }

    #[test]
    fn test_fixed_values_on_both_ends() {
        let net = build_chain(3, 1.0, 1.0, 1.0).unwrap();
        let mut bcs = BoundaryConditions::new();
        bcs.set(BoundaryCondition::FixedValue { value: 10.0 }, &[0], BcMode::Merge)
            .unwrap();
        bcs.set(BoundaryCondition::FixedValue { value: 0.0 }, &[2], BcMode::Merge)
            .unwrap();

        let mut solver = PressureSolver::new(SparseSolverConfig::default(), None);
        let p = solver.solve(&net, &[1.0, 3.0], &bcs, &[0.0; 3]).unwrap();
        assert!((p[0] - 10.0).abs() < 1e-12);
        // (p1 - 10) * 1 + p1 * 3 = 0
        assert!((p[1] - 2.5).abs() < 1e-9, "p1={}", p[1]);
    }

    #[test]
    fn test_rhs_perturbation_acts_as_source() {
        let net = build_chain(2, 1.0, 1.0, 1.0).unwrap();
        let mut bcs = BoundaryConditions::new();
        bcs.set(BoundaryCondition::FixedValue { value: 0.0 }, &[1], BcMode::Merge)
            .unwrap();

        let mut solver = PressureSolver::new(SparseSolverConfig::default(), None);
        let p = solver.solve(&net, &[4.0], &bcs, &[2.0, 100.0]).unwrap();
        assert!((p[0] - 0.5).abs() < 1e-12);
        assert!(p[1].abs() < 1e-12);
    }

    #[test]
    fn test_group_flow_split_evenly_and_through_super_pore() {
        // Pores 0 and 1 both inject into pore 2 (fixed), asymmetric conductances.
        let net = PoreNetwork::new(
            "fork",
            vec![1.0; 3],
            vec![
                ThroatSpec::prismatic(0, 2, 1.0, 1.0),
                ThroatSpec::prismatic(1, 2, 1.0, 1.0),
            ],
        )
        .unwrap();
        let mut bcs = BoundaryConditions::new();
        bcs.set(BoundaryCondition::GroupFlow { rate: 2.0 }, &[0, 1], BcMode::Merge)
            .unwrap();
        bcs.set(BoundaryCondition::FixedValue { value: 0.0 }, &[2], BcMode::Merge)
            .unwrap();
        let g = [1.0, 3.0];

        let mut even = PressureSolver::new(SparseSolverConfig::default(), None);
        let p = even.solve(&net, &g, &bcs, &[0.0; 3]).unwrap().to_vec();
        assert!((p[0] - 1.0).abs() < 1e-9);
        assert!((p[1] - 1.0 / 3.0).abs() < 1e-9);

        // A very stiff super pore equalizes the inlet pressures.
        let mut stiff = PressureSolver::new(SparseSolverConfig::default(), Some(1e6));
        let p = stiff.solve(&net, &g, &bcs, &[0.0; 3]).unwrap().to_vec();
        assert!((p[0] - p[1]).abs() < 1e-4, "p0={} p1={}", p[0], p[1]);
        let total = g[0] * p[0] + g[1] * p[1];
        assert!((total - 2.0).abs() < 1e-8, "total={total}");
    }

    #[test]
    fn test_converges_at_pore_scale_flow_rates() {
        // 1e-14 m^3/s through throats of conductance 1e-18: 1e4 Pa per throat.
        let net = build_chain(4, 1.0, 1.0, 1.0).unwrap();
        let mut bcs = BoundaryConditions::new();
        bcs.set(BoundaryCondition::GroupFlow { rate: 1e-14 }, &[0], BcMode::Overwrite)
            .unwrap();
        bcs.set(BoundaryCondition::FixedValue { value: 0.0 }, &[3], BcMode::Overwrite)
            .unwrap();

        let mut solver = PressureSolver::new(SparseSolverConfig::default(), None);
        let p = solver.solve(&net, &[1e-18; 3], &bcs, &[0.0; 4]).unwrap().to_vec();
        assert!(solver.last_iterations() > 0);
        assert!((p[0] - 3e4).abs() < 1e-5, "p0={}", p[0]);
        assert!((p[1] - 2e4).abs() < 1e-5, "p1={}", p[1]);
    }
}
