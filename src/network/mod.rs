//! Pore network topology and geometry.
//!
//! A network is a graph of pores (nodes with volume) connected by throats
//! (edges with volume, length and cross-sectional area). Elements are stored as
//! parallel arrays indexed by integer id; the drainage solver only reads them.
//!
//! Throat endpoints are normalized so that `conns[0] < conns[1]`. Positions of
//! menisci inside a throat are measured from `conns[0]`.

pub mod builders;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

pub use builders::{build_chain, build_cubic, cubic_face_pores, lattice_throats};

/// Geometry of one throat, as supplied to [`PoreNetwork::new`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThroatSpec {
    /// Connected pore indices (any order).
    pub conns: [usize; 2],
    /// Throat length in m.
    pub length: f64,
    /// Cross-sectional area in m^2.
    pub area: f64,
    /// Throat volume in m^3. May be zero.
    pub volume: f64,
}

impl ThroatSpec {
    /// Throat with a prismatic volume `length * area`.
    pub fn prismatic(a: usize, b: usize, length: f64, area: f64) -> Self {
        Self {
            conns: [a, b],
            length,
            area,
            volume: length * area,
        }
    }
}

/// How a throat must relate to a pore set to be selected by
/// [`PoreNetwork::find_neighbor_throats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThroatFilter {
    /// At least one end in the set.
    Union,
    /// Both ends in the set.
    Intersection,
    /// Exactly one end in the set.
    NotIntersection,
}

/// Immutable pore network.
#[derive(Debug, Clone)]
pub struct PoreNetwork {
    pub name: String,
    pore_volume: Vec<f64>,
    throat_conns: Vec<[usize; 2]>,
    throat_length: Vec<f64>,
    throat_area: Vec<f64>,
    throat_volume: Vec<f64>,
    // Throats touching each pore, ascending.
    pore_throats: Vec<Vec<usize>>,
}

impl PoreNetwork {
    /// Builds a network from pore volumes and throat geometry.
    ///
    /// Fails on out-of-range or self-connected throats, negative or
    /// non-finite volumes, and non-positive throat length or area.
    pub fn new(name: &str, pore_volume: Vec<f64>, throats: Vec<ThroatSpec>) -> Result<Self> {
        let np = pore_volume.len();
        for (p, &v) in pore_volume.iter().enumerate() {
            anyhow::ensure!(
                v.is_finite() && v >= 0.0,
                "Pore {p} has invalid volume {v}"
            );
        }

        let nt = throats.len();
        let mut throat_conns = Vec::with_capacity(nt);
        let mut throat_length = Vec::with_capacity(nt);
        let mut throat_area = Vec::with_capacity(nt);
        let mut throat_volume = Vec::with_capacity(nt);
        let mut pore_throats = vec![Vec::new(); np];

        for (t, spec) in throats.iter().enumerate() {
            let [a, b] = spec.conns;
            if a >= np || b >= np {
                return Err(anyhow!(
                    "Throat {t} connects pores ({a}, {b}) but the network has {np} pores"
                ));
            }
            anyhow::ensure!(a != b, "Throat {t} connects pore {a} to itself");
            anyhow::ensure!(
                spec.length.is_finite() && spec.length > 0.0,
                "Throat {t} has invalid length {}",
                spec.length
            );
            anyhow::ensure!(
                spec.area.is_finite() && spec.area > 0.0,
                "Throat {t} has invalid area {}",
                spec.area
            );
            anyhow::ensure!(
                spec.volume.is_finite() && spec.volume >= 0.0,
                "Throat {t} has invalid volume {}",
                spec.volume
            );

            throat_conns.push([a.min(b), a.max(b)]);
            throat_length.push(spec.length);
            throat_area.push(spec.area);
            throat_volume.push(spec.volume);
            pore_throats[a].push(t);
            pore_throats[b].push(t);
        }

        Ok(Self {
            name: name.to_string(),
            pore_volume,
            throat_conns,
            throat_length,
            throat_area,
            throat_volume,
            pore_throats,
        })
    }

    pub fn num_pores(&self) -> usize {
        self.pore_volume.len()
    }

    pub fn num_throats(&self) -> usize {
        self.throat_conns.len()
    }

    pub fn pore_volume(&self, pore: usize) -> f64 {
        self.pore_volume[pore]
    }

    pub fn pore_volumes(&self) -> &[f64] {
        &self.pore_volume
    }

    /// Endpoint pores of a throat, lower index first.
    pub fn conns(&self, throat: usize) -> [usize; 2] {
        self.throat_conns[throat]
    }

    pub fn throat_length(&self, throat: usize) -> f64 {
        self.throat_length[throat]
    }

    pub fn throat_area(&self, throat: usize) -> f64 {
        self.throat_area[throat]
    }

    pub fn throat_volume(&self, throat: usize) -> f64 {
        self.throat_volume[throat]
    }

    pub fn throat_volumes(&self) -> &[f64] {
        &self.throat_volume
    }

    /// Sum of all pore and throat volumes.
    pub fn total_void_volume(&self) -> f64 {
        self.pore_volume.iter().sum::<f64>() + self.throat_volume.iter().sum::<f64>()
    }

    /// Throats touching `pore`, ascending.
    pub fn neighbor_throats(&self, pore: usize) -> &[usize] {
        &self.pore_throats[pore]
    }

    /// Pores sharing a throat with `pore`, in the order of its throats.
    pub fn neighbor_pores(&self, pore: usize) -> Vec<usize> {
        self.pore_throats[pore]
            .iter()
            .map(|&t| self.other_pore(t, pore))
            .collect()
    }

    /// The end of `throat` that is not `pore`.
    pub fn other_pore(&self, throat: usize, pore: usize) -> usize {
        let [a, b] = self.throat_conns[throat];
        if a == pore { b } else { a }
    }

    /// Throats selected by how their ends relate to `pores`, ascending and
    /// without duplicates.
    pub fn find_neighbor_throats(&self, pores: &[usize], filter: ThroatFilter) -> Vec<usize> {
        let mut in_set = vec![false; self.num_pores()];
        for &p in pores {
            if p < in_set.len() {
                in_set[p] = true;
            }
        }

        let mut out: Vec<usize> = pores
            .iter()
            .filter(|&&p| p < self.num_pores())
            .flat_map(|&p| self.pore_throats[p].iter().copied())
            .filter(|&t| {
                let [a, b] = self.throat_conns[t];
                let ends = in_set[a] as u8 + in_set[b] as u8;
                match filter {
                    ThroatFilter::Union => ends >= 1,
                    ThroatFilter::Intersection => ends == 2,
                    ThroatFilter::NotIntersection => ends == 1,
                }
            })
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_with_tail() -> PoreNetwork {
        // 0 - 1 - 2 - 0 triangle, 2 - 3 tail.
        PoreNetwork::new(
            "tri",
            vec![1.0, 1.0, 1.0, 2.0],
            vec![
                ThroatSpec::prismatic(0, 1, 1.0, 0.1),
                ThroatSpec::prismatic(2, 1, 1.0, 0.1),
                ThroatSpec::prismatic(0, 2, 1.0, 0.1),
                ThroatSpec::prismatic(3, 2, 2.0, 0.1),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_conns_are_normalized() {
        let net = triangle_with_tail();
        assert_eq!(net.conns(1), [1, 2]);
        assert_eq!(net.conns(3), [2, 3]);
    }

    #[test]
    fn test_total_void_volume() {
        let net = triangle_with_tail();
        // Pores 5.0 + throats 0.1 * (1 + 1 + 1 + 2).
        assert!((net.total_void_volume() - 5.5).abs() < 1e-12);
    }

    #[test]
    fn test_neighbor_queries() {
        let net = triangle_with_tail();
        assert_eq!(net.neighbor_throats(2), &[1, 2, 3]);
        assert_eq!(net.neighbor_pores(2), vec![1, 0, 3]);
        assert_eq!(net.other_pore(3, 3), 2);
    }

    #[test]
    fn test_find_neighbor_throats_filters() {
        let net = triangle_with_tail();
        let set = [0, 1];
        assert_eq!(
            net.find_neighbor_throats(&set, ThroatFilter::Union),
            vec![0, 1, 2]
        );
        assert_eq!(
            net.find_neighbor_throats(&set, ThroatFilter::Intersection),
            vec![0]
        );
        assert_eq!(
            net.find_neighbor_throats(&set, ThroatFilter::NotIntersection),
            vec![1, 2]
        );
    }

    #[test]
    fn test_rejects_invalid_geometry() {
        assert!(PoreNetwork::new("bad", vec![1.0], vec![ThroatSpec::prismatic(0, 1, 1.0, 1.0)]).is_err());
        assert!(PoreNetwork::new("bad", vec![1.0, 1.0], vec![ThroatSpec::prismatic(1, 1, 1.0, 1.0)]).is_err());
        assert!(PoreNetwork::new("bad", vec![-1.0, 1.0], vec![]).is_err());
        assert!(PoreNetwork::new("bad", vec![1.0, 1.0], vec![ThroatSpec::prismatic(0, 1, 0.0, 1.0)]).is_err());
    }

    #[test]
    fn test_zero_volume_throat_is_allowed() {
        let net = PoreNetwork::new(
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
        assert_eq!(net.throat_volume(0), 0.0);
    }
}
