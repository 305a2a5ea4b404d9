//! Wave vectors of a simple (hyper)cubic lattice.
//!
//! Only one member of each `k, -k` pair is kept. A wave vector that is its
//! own partner (the origin, or a zone-boundary vector when a side has an even
//! number of cells) gets coefficient 0.5; every other vector gets 1.0.

use nalgebra::DVector;
use std::f64::consts::PI;

use crate::error::{Error, Result};

/// Wave vectors together with their pairing coefficients. Index 0 is always
/// the zero vector.
#[derive(Clone, Debug)]
pub struct WaveVectorSet {
    pub wave_vectors: Vec<DVector<f64>>,
    pub coefficients: Vec<f64>,
}

impl WaveVectorSet {
    pub fn len(&self) -> usize {
        self.wave_vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wave_vectors.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct WaveVectorFactory {
    n_cells: Vec<usize>,
    lattice_constant: f64,
}

impl WaveVectorFactory {
    /// `n_cells[d]` unit cells of edge `lattice_constant` along dimension `d`.
    pub fn new(n_cells: &[usize], lattice_constant: f64) -> Result<Self> {
        if n_cells.is_empty() {
            return Err(Error::Config("lattice needs at least one dimension".into()));
        }
        if let Some(d) = n_cells.iter().position(|&n| n == 0) {
            return Err(Error::Config(format!("dimension {} has no cells", d)));
        }
        if !(lattice_constant > 0.0 && lattice_constant.is_finite()) {
            return Err(Error::Config(format!(
                "lattice constant must be positive and finite, got {}",
                lattice_constant
            )));
        }
        Ok(Self {
            n_cells: n_cells.to_vec(),
            lattice_constant,
        })
    }

    pub fn dimension(&self) -> usize {
        self.n_cells.len()
    }

    pub fn make_wave_vectors(&self) -> WaveVectorSet {
        let bounds: Vec<(isize, isize)> = self
            .n_cells
            .iter()
            .map(|&n| (-(((n as isize) - 1) / 2), n as isize / 2))
            .collect();

        let mut picked: Vec<(Vec<isize>, bool)> = Vec::new();
        let mut index: Vec<isize> = bounds.iter().map(|&(lo, _)| lo).collect();
        loop {
            let partner = self.partner(&index);
            if index >= partner {
                picked.push((index.clone(), index == partner));
            }
            if !Self::advance(&mut index, &bounds) {
                break;
            }
        }

        picked.sort_by(|(a, _), (b, _)| {
            let na: isize = a.iter().map(|x| x * x).sum();
            let nb: isize = b.iter().map(|x| x * x).sum();
            na.cmp(&nb).then_with(|| a.cmp(b))
        });

        let wave_vectors = picked
            .iter()
            .map(|(n, _)| {
                DVector::from_iterator(
                    n.len(),
                    n.iter().zip(&self.n_cells).map(|(&nd, &cells)| {
                        2.0 * PI * nd as f64 / (cells as f64 * self.lattice_constant)
                    }),
                )
            })
            .collect();
        let coefficients = picked
            .iter()
            .map(|&(_, self_paired)| if self_paired { 0.5 } else { 1.0 })
            .collect();

        WaveVectorSet {
            wave_vectors,
            coefficients,
        }
    }

    /// Integer label of `-k`, folded back into the first Brillouin zone.
    fn partner(&self, index: &[isize]) -> Vec<isize> {
        index
            .iter()
            .zip(&self.n_cells)
            .map(|(&n, &cells)| {
                let cells = cells as isize;
                let r = (-n).rem_euclid(cells);
                if r > cells / 2 {
                    r - cells
                } else {
                    r
                }
            })
            .collect()
    }

    fn advance(index: &mut [isize], bounds: &[(isize, isize)]) -> bool {
        for d in (0..index.len()).rev() {
            if index[d] < bounds[d].1 {
                index[d] += 1;
                return true;
            }
            index[d] = bounds[d].0;
        }
        false
    }
}
