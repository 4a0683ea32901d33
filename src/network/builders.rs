use anyhow::Result;

use super::{PoreNetwork, ThroatSpec};

/// Build a linear chain of `num_pores` equal pores joined by equal prismatic
/// throats (`volume = length * area`).
///
/// Pore `i` connects to pore `i + 1` through throat `i`.
pub fn build_chain(
    num_pores: usize,
    pore_volume: f64,
    throat_length: f64,
    throat_area: f64,
) -> Result<PoreNetwork> {
    let throats = (0..num_pores.saturating_sub(1))
        .map(|i| ThroatSpec::prismatic(i, i + 1, throat_length, throat_area))
        .collect();
    PoreNetwork::new("chain", vec![pore_volume; num_pores], throats)
}

/// Build a regular cubic lattice with `shape = [nx, ny, nz]` pores.
///
/// Pore index is `x + nx * (y + ny * z)`. Every pore has the same volume and
/// every throat is prismatic with length `spacing`.
pub fn build_cubic(
    shape: [usize; 3],
    spacing: f64,
    pore_volume: f64,
    throat_area: f64,
) -> Result<PoreNetwork> {
    let np = shape[0] * shape[1] * shape[2];
    PoreNetwork::new(
        "cubic",
        vec![pore_volume; np],
        lattice_throats(shape, spacing, throat_area),
    )
}

/// Nearest-neighbour throats of a cubic lattice, ordered by axis then by the
/// lower pore index.
pub fn lattice_throats(shape: [usize; 3], spacing: f64, throat_area: f64) -> Vec<ThroatSpec> {
    let [nx, ny, nz] = shape;
    let idx = |x: usize, y: usize, z: usize| x + nx * (y + ny * z);
    let mut throats = Vec::new();

    for axis in 0..3 {
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    let (xn, yn, zn) = match axis {
                        0 => (x + 1, y, z),
                        1 => (x, y + 1, z),
                        _ => (x, y, z + 1),
                    };
                    if xn >= nx || yn >= ny || zn >= nz {
                        continue;
                    }
                    throats.push(ThroatSpec::prismatic(
                        idx(x, y, z),
                        idx(xn, yn, zn),
                        spacing,
                        throat_area,
                    ));
                }
            }
        }
    }

    throats
}

/// Pores on one face of a cubic lattice.
///
/// `axis` is 0, 1 or 2; `far = false` selects the face at coordinate 0,
/// `far = true` the face at the last coordinate.
pub fn cubic_face_pores(shape: [usize; 3], axis: usize, far: bool) -> Vec<usize> {
    let [nx, ny, nz] = shape;
    let mut out = Vec::new();
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                let coord = [x, y, z][axis.min(2)];
                let target = if far { shape[axis.min(2)].saturating_sub(1) } else { 0 };
                if coord == target {
                    out.push(x + nx * (y + ny * z));
                }
            }
        }
    }
    out
}
