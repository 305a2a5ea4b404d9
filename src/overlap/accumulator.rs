//! Block averages of the Bennett overlap function over a grid of α values.

use serde::{Deserialize, Serialize};

use crate::sampling::ComparisonSample;

/// Which ensemble a chain samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainRole {
    /// Samples the hybrid system with harmonic compared modes.
    Reference,
    /// Samples the full system.
    Target,
}

impl std::fmt::Display for ChainRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainRole::Reference => write!(f, "reference"),
            ChainRole::Target => write!(f, "target"),
        }
    }
}

/// Bennett overlap value for one sample.
///
/// `delta = (E_full - E_hybrid)/T`. The reference chain gives
/// `1/(exp(delta) + α)`, the target chain `1/(1 + α·exp(-delta))`. Neither
/// form can overflow; an infinite complementary energy gives zero.
pub fn overlap_value(role: ChainRole, alpha: f64, full_energy: f64, hybrid_energy: f64, temperature: f64) -> f64 {
    let delta = (full_energy - hybrid_energy) / temperature;
    let value = match role {
        ChainRole::Reference => 1.0 / (delta.exp() + alpha),
        ChainRole::Target => 1.0 / (1.0 + alpha * (-delta).exp()),
    };
    // both energies infinite
    if value.is_nan() {
        0.0
    } else {
        value
    }
}

/// Logarithmically spaced α values around a centre.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BennettGrid {
    pub center: f64,
    /// Half-width of the grid in `ln α`.
    pub span: f64,
    pub n_points: usize,
}

impl BennettGrid {
    pub fn new(center: f64, span: f64, n_points: usize) -> Self {
        Self { center, span, n_points }
    }

    /// A grid holding only `alpha`.
    pub fn single(alpha: f64) -> Self {
        Self::new(alpha, 0.0, 1)
    }

    /// `ln α_i = ln center + span·(2i/(n-1) - 1)`.
    pub fn alphas(&self) -> Vec<f64> {
        if self.n_points <= 1 {
            return vec![self.center; self.n_points];
        }
        let ln_center = self.center.ln();
        let last = (self.n_points - 1) as f64;
        (0..self.n_points)
            .map(|i| (ln_center + self.span * (2.0 * i as f64 / last - 1.0)).exp())
            .collect()
    }
}

/// Running mean with a blocking error estimate.
#[derive(Clone, Debug)]
pub struct BlockAverage {
    block_size: usize,
    sum: f64,
    count: usize,
    block_sum: f64,
    block_count: usize,
    block_means: Vec<f64>,
}

impl BlockAverage {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size: block_size.max(1),
            sum: 0.0,
            count: 0,
            block_sum: 0.0,
            block_count: 0,
            block_means: Vec::new(),
        }
    }

    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
        self.block_sum += value;
        self.block_count += 1;
        if self.block_count == self.block_size {
            self.block_means.push(self.block_sum / self.block_size as f64);
            self.block_sum = 0.0;
            self.block_count = 0;
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn n_blocks(&self) -> usize {
        self.block_means.len()
    }

    /// Mean over every sample, including a partial block.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.sum / self.count as f64
        }
    }

    /// Standard error of the mean from complete blocks. NaN with fewer than
    /// two blocks.
    pub fn error(&self) -> f64 {
        let n_blocks = self.block_means.len();
        if n_blocks < 2 {
            return f64::NAN;
        }
        let mean = self.block_means.iter().sum::<f64>() / n_blocks as f64;
        let variance = self.block_means.iter()
            .map(|&x| (x - mean).powi(2))
            .sum::<f64>() / (n_blocks - 1) as f64;

        (variance / n_blocks as f64).sqrt()
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.block_size);
    }
}

/// Overlap averages for one chain at every α of a [`BennettGrid`].
#[derive(Clone, Debug)]
pub struct OverlapAccumulator {
    role: ChainRole,
    temperature: f64,
    grid: BennettGrid,
    alphas: Vec<f64>,
    averages: Vec<BlockAverage>,
    block_size: usize,
}

impl OverlapAccumulator {
    pub fn new(role: ChainRole, temperature: f64, grid: BennettGrid, block_size: usize) -> Self {
        let alphas = grid.alphas();
        let averages = vec![BlockAverage::new(block_size); alphas.len()];
        Self {
            role,
            temperature,
            grid,
            alphas,
            averages,
            block_size,
        }
    }

    pub fn role(&self) -> ChainRole {
        self.role
    }

    pub fn grid(&self) -> &BennettGrid {
        &self.grid
    }

    pub fn alphas(&self) -> &[f64] {
        &self.alphas
    }

    pub fn alpha(&self, i: usize) -> f64 {
        self.alphas[i]
    }

    pub fn n_points(&self) -> usize {
        self.alphas.len()
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Replace the grid. Collected data is discarded.
    pub fn set_grid(&mut self, grid: BennettGrid) {
        *self = Self::new(self.role, self.temperature, grid, self.block_size);
    }

    /// Change the block size. Collected data is discarded.
    pub fn set_block_size(&mut self, block_size: usize) {
        *self = Self::new(self.role, self.temperature, self.grid, block_size);
    }

    pub fn reset(&mut self) {
        self.averages.iter_mut().for_each(BlockAverage::reset);
    }

    pub fn add(&mut self, full_energy: f64, hybrid_energy: f64) {
        for (&alpha, average) in self.alphas.iter().zip(self.averages.iter_mut()) {
            average.add(overlap_value(self.role, alpha, full_energy, hybrid_energy, self.temperature));
        }
    }

    pub fn add_sample(&mut self, sample: &ComparisonSample) {
        self.add(sample.full_energy, sample.hybrid_energy());
    }

    /// Number of samples collected since the last reset.
    pub fn count(&self) -> usize {
        self.averages.first().map_or(0, BlockAverage::count)
    }

    pub fn average(&self, i: usize) -> f64 {
        self.averages[i].mean()
    }

    pub fn error(&self, i: usize) -> f64 {
        self.averages[i].error()
    }
}
