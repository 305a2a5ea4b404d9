//! Real-space displacements ⇄ complex normal-mode coordinates.
//!
//! Forward: `T(k) = N^{-1/2} Σ_R u(R) e^{-ik·R}` and `Q[mode] = e[mode] · T(k)`.
//! Inverse, one wave vector at a time:
//! `Δu(R) = Σ_mode e[mode] · 2c/√N · (Re Q cos kR - Im Q sin kR)`.
//! With `c = 0.5` for self-paired vectors the pair reproduces `u` exactly.

use nalgebra::{Complex, DVector};
use std::sync::Arc;

use super::basis::{ModeBasis, ModeCoordinates};
use crate::system::Configuration;

/// Deterministic transform between a [`Configuration`] and the mode
/// coordinates of a [`ModeBasis`]. Holds scratch space so repeated calls do
/// not allocate.
#[derive(Clone, Debug)]
pub struct NormalModeTransform {
    basis: Arc<ModeBasis>,
    real_t: DVector<f64>,
    imag_t: DVector<f64>,
    delta: DVector<f64>,
    uniform: ModeCoordinates,
}

impl NormalModeTransform {
    pub fn new(basis: Arc<ModeBasis>) -> Self {
        let dim = basis.coordinate_dim();
        let n_modes = basis.num_modes();
        Self {
            basis,
            real_t: DVector::zeros(dim),
            imag_t: DVector::zeros(dim),
            delta: DVector::zeros(dim),
            uniform: ModeCoordinates::zeros(n_modes),
        }
    }

    pub fn basis(&self) -> &Arc<ModeBasis> {
        &self.basis
    }

    /// Normal-mode coordinates of wave vector `k` in the current configuration.
    pub fn project_to_mode(&mut self, k: usize, config: &Configuration) -> ModeCoordinates {
        let mut coords = ModeCoordinates::zeros(self.basis.num_modes());
        self.project_into(k, config, &mut coords);
        coords
    }

    pub fn project_into(&mut self, k: usize, config: &Configuration, coords: &mut ModeCoordinates) {
        project(&self.basis, k, config, &mut self.real_t, &mut self.imag_t, coords);
    }

    /// Allocating projection for callers that only hold a shared basis.
    pub fn coordinates_of(basis: &ModeBasis, k: usize, config: &Configuration) -> ModeCoordinates {
        let dim = basis.coordinate_dim();
        let mut coords = ModeCoordinates::zeros(basis.num_modes());
        project(basis, k, config, &mut DVector::zeros(dim), &mut DVector::zeros(dim), &mut coords);
        coords
    }

    /// Accumulate into `delta` the displacement of the cell at
    /// `cell_position` produced by a single mode of wave vector `k`.
    pub fn reconstruct_displacement_delta(
        &self,
        k: usize,
        mode: usize,
        coord: Complex<f64>,
        cell_position: &DVector<f64>,
        n_cells: usize,
        delta: &mut DVector<f64>,
    ) {
        let kr = self.basis.wave_vector(k).dot(cell_position);
        let (sin_kr, cos_kr) = kr.sin_cos();
        let amplitude = self.mode_amplitude(k, coord, cos_kr, sin_kr, n_cells);
        let e = self.basis.eigenvectors(k).row(mode);
        for dof in 0..delta.len() {
            delta[dof] += e[dof] * amplitude;
        }
    }

    /// Displacement of one cell produced by all finite modes of `k`.
    pub fn cell_delta(&self, k: usize, coords: &ModeCoordinates, cell_position: &DVector<f64>, n_cells: usize) -> DVector<f64> {
        let mut delta = DVector::zeros(self.basis.coordinate_dim());
        for mode in 0..self.basis.num_modes() {
            if self.basis.is_finite_mode(k, mode) {
                self.reconstruct_displacement_delta(k, mode, coords[mode], cell_position, n_cells, &mut delta);
            }
        }
        delta
    }

    /// Add (`sign = 1`) or remove (`sign = -1`) the contribution of wave
    /// vector `k` with coordinates `coords` in every cell. Infinite modes are
    /// left alone.
    pub fn apply_mode(&mut self, k: usize, coords: &ModeCoordinates, sign: f64, config: &mut Configuration) {
        apply(&self.basis, k, coords, sign, config, &mut self.delta);
    }

    /// Shift every finite mode of `k` by the same complex amount.
    pub fn perturb(&mut self, k: usize, delta_re: f64, delta_im: f64, config: &mut Configuration) {
        self.uniform.fill(Complex::new(delta_re, delta_im));
        apply(&self.basis, k, &self.uniform, 1.0, config, &mut self.delta);
    }

    fn mode_amplitude(&self, k: usize, coord: Complex<f64>, cos_kr: f64, sin_kr: f64, n_cells: usize) -> f64 {
        let im = if self.basis.is_self_paired(k) { 0.0 } else { coord.im };
        let scale = 2.0 * self.basis.coefficient(k) / (n_cells as f64).sqrt();
        scale * (coord.re * cos_kr - im * sin_kr)
    }
}

fn project(
    basis: &ModeBasis,
    k: usize,
    config: &Configuration,
    real_t: &mut DVector<f64>,
    imag_t: &mut DVector<f64>,
    coords: &mut ModeCoordinates,
) {
    real_t.fill(0.0);
    imag_t.fill(0.0);
    let wave_vector = basis.wave_vector(k);
    let u = config.displacements();
    for cell in 0..config.num_cells() {
        let kr = wave_vector.dot(config.cell_position(cell));
        let (sin_kr, cos_kr) = kr.sin_cos();
        for dof in 0..u.ncols() {
            real_t[dof] += cos_kr * u[(cell, dof)];
            imag_t[dof] -= sin_kr * u[(cell, dof)];
        }
    }
    let sqrt_cells = (config.num_cells() as f64).sqrt();
    *real_t /= sqrt_cells;
    *imag_t /= sqrt_cells;

    let eigenvectors = basis.eigenvectors(k);
    for mode in 0..basis.num_modes() {
        let e = eigenvectors.row(mode);
        let mut q = Complex::new(0.0, 0.0);
        for dof in 0..real_t.len() {
            q.re += e[dof] * real_t[dof];
            q.im += e[dof] * imag_t[dof];
        }
        coords[mode] = q;
    }
}

fn apply(
    basis: &ModeBasis,
    k: usize,
    coords: &ModeCoordinates,
    sign: f64,
    config: &mut Configuration,
    delta: &mut DVector<f64>,
) {
    let n_cells = config.num_cells();
    let scale = sign * 2.0 * basis.coefficient(k) / (n_cells as f64).sqrt();
    let self_paired = basis.is_self_paired(k);
    let wave_vector = basis.wave_vector(k);
    let eigenvectors = basis.eigenvectors(k);

    for cell in 0..n_cells {
        let kr = wave_vector.dot(config.cell_position(cell));
        let (sin_kr, cos_kr) = kr.sin_cos();
        delta.fill(0.0);
        for mode in 0..basis.num_modes() {
            if !basis.is_finite_mode(k, mode) {
                continue;
            }
            let q = coords[mode];
            let im = if self_paired { 0.0 } else { q.im };
            let amplitude = scale * (q.re * cos_kr - im * sin_kr);
            let e = eigenvectors.row(mode);
            for dof in 0..delta.len() {
                delta[dof] += e[dof] * amplitude;
            }
        }
        let mut row = config.displacements_mut().row_mut(cell);
        for dof in 0..delta.len() {
            row[dof] += delta[dof];
        }
    }
}
