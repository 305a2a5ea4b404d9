//! The normal-mode basis: wave vectors, pairing coefficients, eigenvectors
//! and squared frequencies of the harmonic reference lattice.

use nalgebra::{Complex, DMatrix, DVector};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use std::f64::consts::PI;

use super::wave_vectors::WaveVectorFactory;
use crate::error::{Error, Result};

/// Complex normal-mode coordinates of one wave vector, one entry per mode.
pub type ModeCoordinates = DVector<Complex<f64>>;

/// Immutable description of the system's normal modes.
///
/// `eigenvectors[k]` holds one mode per row and one generalized coordinate
/// per column. `omega_squared[(k, mode)]` may be `+inf` for a mode without a
/// restoring force; such modes are skipped by every harmonic computation.
#[derive(Clone, Debug)]
pub struct ModeBasis {
    wave_vectors: Vec<DVector<f64>>,
    coefficients: Vec<f64>,
    eigenvectors: Vec<DMatrix<f64>>,
    omega_squared: DMatrix<f64>,
}

impl ModeBasis {
    pub fn new(
        wave_vectors: Vec<DVector<f64>>,
        coefficients: Vec<f64>,
        eigenvectors: Vec<DMatrix<f64>>,
        omega_squared: DMatrix<f64>,
    ) -> Result<Self> {
        let n_wv = wave_vectors.len();
        if n_wv == 0 {
            return Err(Error::Config("mode basis has no wave vectors".into()));
        }
        if coefficients.len() != n_wv || eigenvectors.len() != n_wv || omega_squared.nrows() != n_wv {
            return Err(Error::Config(format!(
                "wave-vector count mismatch: {} wave vectors, {} coefficients, {} eigenvector sets, {} omega-squared rows",
                n_wv,
                coefficients.len(),
                eigenvectors.len(),
                omega_squared.nrows()
            )));
        }

        let dim = wave_vectors[0].len();
        if let Some(k) = wave_vectors.iter().position(|k| k.len() != dim) {
            return Err(Error::Config(format!(
                "wave vector {} has dimension {}, expected {}",
                k,
                wave_vectors[k].len(),
                dim
            )));
        }

        let shape = eigenvectors[0].shape();
        if let Some(k) = eigenvectors.iter().position(|e| e.shape() != shape) {
            return Err(Error::Config(format!(
                "eigenvectors of wave vector {} have shape {:?}, expected {:?}",
                k,
                eigenvectors[k].shape(),
                shape
            )));
        }
        if omega_squared.ncols() != shape.0 {
            return Err(Error::Config(format!(
                "omega-squared has {} modes per wave vector, eigenvectors have {}",
                omega_squared.ncols(),
                shape.0
            )));
        }

        if let Some(k) = coefficients.iter().position(|&c| c != 0.5 && c != 1.0) {
            return Err(Error::Config(format!(
                "wave vector {} has coefficient {}; only 0.5 and 1.0 are meaningful",
                k, coefficients[k]
            )));
        }

        Ok(Self {
            wave_vectors,
            coefficients,
            eigenvectors,
            omega_squared,
        })
    }

    /// Harmonic description of `n_cells` unit-diameter hard rods on a ring.
    ///
    /// Gaps between neighbouring rods are treated as independent with mean
    /// `l = 1/density - 1`, giving `ω²(k) = fudge · 2(1 - cos ka) · T / l²`.
    /// The zero wave vector is the centre of mass and gets `ω² = +inf`.
    pub fn hard_rods_1d(n_cells: usize, density: f64, temperature: f64, harmonic_fudge: f64) -> Result<Self> {
        if n_cells < 2 {
            return Err(Error::Config(format!("need at least two rods, got {}", n_cells)));
        }
        if !(density > 0.0 && density < 1.0) {
            return Err(Error::Config(format!(
                "hard-rod density must lie in (0, 1), got {}",
                density
            )));
        }

        let spacing = 1.0 / density;
        let free_length = spacing - 1.0;
        let set = WaveVectorFactory::new(&[n_cells], spacing)?.make_wave_vectors();

        let omega_squared = DMatrix::from_fn(set.len(), 1, |k, _| {
            if k == 0 {
                return f64::INFINITY;
            }
            let ka = set.wave_vectors[k][0] * spacing;
            harmonic_fudge * 2.0 * (1.0 - ka.cos()) * temperature / (free_length * free_length)
        });
        let eigenvectors = vec![DMatrix::from_element(1, 1, 1.0); set.len()];

        Self::new(set.wave_vectors, set.coefficients, eigenvectors, omega_squared)
    }

    pub fn num_wave_vectors(&self) -> usize {
        self.wave_vectors.len()
    }

    pub fn num_modes(&self) -> usize {
        self.omega_squared.ncols()
    }

    /// Number of generalized coordinates per cell.
    pub fn coordinate_dim(&self) -> usize {
        self.eigenvectors[0].ncols()
    }

    /// Spatial dimension of the wave vectors.
    pub fn dimension(&self) -> usize {
        self.wave_vectors[0].len()
    }

    pub fn wave_vector(&self, k: usize) -> &DVector<f64> {
        &self.wave_vectors[k]
    }

    pub fn wave_vectors(&self) -> &[DVector<f64>] {
        &self.wave_vectors
    }

    pub fn coefficient(&self, k: usize) -> f64 {
        self.coefficients[k]
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn is_self_paired(&self, k: usize) -> bool {
        self.coefficients[k] == 0.5
    }

    pub fn eigenvectors(&self, k: usize) -> &DMatrix<f64> {
        &self.eigenvectors[k]
    }

    pub fn omega_squared(&self, k: usize, mode: usize) -> f64 {
        self.omega_squared[(k, mode)]
    }

    pub fn is_finite_mode(&self, k: usize, mode: usize) -> bool {
        self.omega_squared[(k, mode)].is_finite()
    }

    /// Largest Euclidean norm among the eigenvectors of wave vector `k`.
    pub fn max_eigenvector_norm(&self, k: usize) -> f64 {
        self.eigenvectors[k]
            .row_iter()
            .map(|row| row.norm())
            .fold(0.0, f64::max)
    }

    /// `Σ c·(re² + im²)·ω²` over the finite modes of wave vector `k`.
    pub fn harmonic_energy(&self, k: usize, coords: &ModeCoordinates) -> f64 {
        let c = self.coefficients[k];
        coords
            .iter()
            .enumerate()
            .filter(|&(mode, _)| self.is_finite_mode(k, mode))
            .map(|(mode, q)| c * q.norm_sqr() * self.omega_squared(k, mode))
            .sum()
    }

    /// Draw coordinates for wave vector `k` from its harmonic Boltzmann
    /// distribution at `temperature`.
    ///
    /// Both components are always drawn so the random stream does not
    /// depend on pairing; the imaginary part is discarded when self-paired.
    pub fn gaussian_coordinates<R: Rng + ?Sized>(&self, k: usize, temperature: f64, rng: &mut R) -> ModeCoordinates {
        let mut coords = ModeCoordinates::zeros(self.num_modes());
        self.fill_gaussian_coordinates(k, temperature, rng, &mut coords);
        coords
    }

    pub(crate) fn fill_gaussian_coordinates<R: Rng + ?Sized>(
        &self,
        k: usize,
        temperature: f64,
        rng: &mut R,
        coords: &mut ModeCoordinates,
    ) {
        let c = self.coefficients[k];
        let sqrt_t = temperature.sqrt();
        for mode in 0..self.num_modes() {
            let omega2 = self.omega_squared(k, mode);
            if !omega2.is_finite() {
                coords[mode] = Complex::new(0.0, 0.0);
                continue;
            }
            let std_dev = (1.0 / (2.0 * omega2 * c)).sqrt();
            let re: f64 = StandardNormal.sample(rng);
            let im: f64 = StandardNormal.sample(rng);
            let im = if self.is_self_paired(k) { 0.0 } else { im };
            coords[mode] = Complex::new(re, im) * (sqrt_t * std_dev);
        }
    }

    /// Free energy of the harmonic reference in mode space,
    /// `T·Σ c·ln(c·ω²/(πT))` over every finite mode.
    ///
    /// Jacobian factors of the lattice transform are not included; see
    /// [`ModeBasis::lattice_free_energy`].
    pub fn harmonic_free_energy(&self, temperature: f64) -> f64 {
        let mut beta_a = 0.0;
        for k in 0..self.num_wave_vectors() {
            let c = self.coefficients[k];
            for mode in 0..self.num_modes() {
                let omega2 = self.omega_squared(k, mode);
                if omega2.is_finite() {
                    beta_a += c * (c * omega2 / (temperature * PI)).ln();
                }
            }
        }
        temperature * beta_a
    }

    /// Harmonic reference free energy of the lattice with `n_cells` cells per
    /// dimension, the mode-space value minus the Jacobian of the transform,
    /// `T·ln(2^(m·(N - f)/2) / N^(D/2))` with `N` cells in total, `m`
    /// coordinates per cell and `f = 2^D` for even `N`, 1 otherwise.
    pub fn lattice_free_energy(&self, n_cells: &[usize], temperature: f64) -> Result<f64> {
        if n_cells.len() != self.dimension() {
            return Err(Error::Config(format!(
                "lattice has {} dimensions, wave vectors have {}",
                n_cells.len(),
                self.dimension()
            )));
        }
        let total: usize = n_cells.iter().product();
        if total == 0 {
            return Err(Error::Config("lattice has no cells".into()));
        }
        let dim = n_cells.len() as f64;
        let fac = if total % 2 == 0 { 2f64.powf(dim) } else { 1.0 };
        let total = total as f64;
        let ln_jacobian =
            self.coordinate_dim() as f64 * (total - fac) / 2.0 * 2f64.ln() - 0.5 * dim * total.ln();
        Ok(self.harmonic_free_energy(temperature) - temperature * ln_jacobian)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn toy_basis() -> ModeBasis {
        let wave_vectors = (0..3).map(|n| DVector::from_element(1, n as f64)).collect();
        let omega_squared = DMatrix::from_row_slice(3, 1, &[f64::INFINITY, 4.0, 9.0]);
        ModeBasis::new(
            wave_vectors,
            vec![0.5, 1.0, 0.5],
            vec![DMatrix::from_element(1, 1, 1.0); 3],
            omega_squared,
        )
        .unwrap()
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let wave_vectors = (0..3).map(|n| DVector::from_element(1, n as f64)).collect();
        let result = ModeBasis::new(
            wave_vectors,
            vec![0.5, 1.0],
            vec![DMatrix::from_element(1, 1, 1.0); 3],
            DMatrix::from_element(3, 1, 1.0),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_bad_coefficient_is_rejected() {
        let wave_vectors = (0..2).map(|n| DVector::from_element(1, n as f64)).collect();
        let result = ModeBasis::new(
            wave_vectors,
            vec![0.5, 0.7],
            vec![DMatrix::from_element(1, 1, 1.0); 2],
            DMatrix::from_element(2, 1, 1.0),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_harmonic_energy_of_paired_mode() {
        let basis = toy_basis();
        let mut rng = StdRng::seed_from_u64(7);
        let coords = basis.gaussian_coordinates(1, 1.0, &mut rng);
        let q = coords[0];
        assert_relative_eq!(basis.harmonic_energy(1, &coords), 1.0 * (q.re * q.re + q.im * q.im) * 4.0);
    }

    #[test]
    fn test_infinite_mode_contributes_nothing() {
        let basis = toy_basis();
        let coords = ModeCoordinates::from_element(1, Complex::new(3.0, 1.0));
        assert_eq!(basis.harmonic_energy(0, &coords), 0.0);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(basis.gaussian_coordinates(0, 1.0, &mut rng)[0], Complex::new(0.0, 0.0));
    }

    #[test]
    fn test_self_paired_gaussian_has_no_imaginary_part() {
        let basis = toy_basis();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            assert_eq!(basis.gaussian_coordinates(2, 2.0, &mut rng)[0].im, 0.0);
        }
    }

    #[test]
    fn test_gaussian_variance_matches_temperature() {
        // <c·|q|²·ω²> = T for a paired mode (two quadratic degrees of freedom at T/2 each)
        let basis = toy_basis();
        let mut rng = StdRng::seed_from_u64(11);
        let n = 20000;
        let mean: f64 = (0..n)
            .map(|_| basis.harmonic_energy(1, &basis.gaussian_coordinates(1, 1.5, &mut rng)))
            .sum::<f64>()
            / n as f64;
        assert_relative_eq!(mean, 1.5, epsilon = 0.05);
    }

    #[test]
    fn test_hard_rods_basis() {
        let basis = ModeBasis::hard_rods_1d(10, 0.5, 1.0, 1.0).unwrap();
        assert_eq!(basis.num_wave_vectors(), 6);
        assert!(!basis.is_finite_mode(0, 0));
        // zone boundary: 2(1 - cos π)/l² = 4 with l = 1
        assert_relative_eq!(basis.omega_squared(5, 0), 4.0, epsilon = 1e-12);
        assert!(ModeBasis::hard_rods_1d(10, 1.2, 1.0, 1.0).is_err());
    }

    #[test]
    fn test_harmonic_free_energy_single_mode() {
        let basis = toy_basis();
        let t = 2.0;
        let expected = t * ((4.0 / (t * PI)).ln() + 0.5 * (0.5 * 9.0 / (t * PI)).ln());
        assert_relative_eq!(basis.harmonic_free_energy(t), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_lattice_free_energy_includes_jacobian() {
        // 32 rods: even cell count, so 2^((32 - 2)/2) / 32^(1/2)
        let basis = ModeBasis::hard_rods_1d(32, 0.5, 1.0, 1.0).unwrap();
        let jacobian = 2f64.powf(15.0) / 32f64.sqrt();
        let expected = basis.harmonic_free_energy(1.0) - jacobian.ln();
        assert_relative_eq!(basis.lattice_free_energy(&[32], 1.0).unwrap(), expected, epsilon = 1e-10);
        assert_relative_eq!(expected, -23.2885, epsilon = 1e-3);

        // odd cell count subtracts a single cell, and T scales the whole thing
        let basis = ModeBasis::hard_rods_1d(7, 0.5, 2.0, 1.0).unwrap();
        let jacobian = 2f64.powf(3.0) / 7f64.sqrt();
        let expected = basis.harmonic_free_energy(2.0) - 2.0 * jacobian.ln();
        assert_relative_eq!(basis.lattice_free_energy(&[7], 2.0).unwrap(), expected, epsilon = 1e-10);

        assert!(basis.lattice_free_energy(&[7, 1], 2.0).is_err());
    }
}
