//! Purely harmonic energy in normal-mode space.

use std::sync::Arc;

use super::configuration::Configuration;
use super::traits::EnergyModel;
use crate::error::{Error, Result};
use crate::modes::{ModeBasis, NormalModeTransform};

/// `Σ_k s_k · Σ_mode c_k |Q_k,mode|² ω²_k,mode` over all finite modes.
///
/// With every `s_k = 1` this is the harmonic reference itself. Stiffening a
/// single wave vector gives a target whose free energy is known exactly,
/// which makes it useful for checking the overlap estimator.
#[derive(Clone, Debug)]
pub struct HarmonicModes {
    basis: Arc<ModeBasis>,
    stiffness: Vec<f64>,
}

impl HarmonicModes {
    pub fn new(basis: Arc<ModeBasis>) -> Self {
        let stiffness = vec![1.0; basis.num_wave_vectors()];
        Self { basis, stiffness }
    }

    /// Scale the force constants of wave vector `k` by `factor`.
    pub fn with_stiffness(mut self, k: usize, factor: f64) -> Result<Self> {
        if k >= self.stiffness.len() {
            return Err(Error::forbidden(k, "no such wave vector"));
        }
        if !(factor > 0.0) {
            return Err(Error::Config(format!("stiffness factor must be positive, got {}", factor)));
        }
        self.stiffness[k] = factor;
        Ok(self)
    }
}

impl EnergyModel for HarmonicModes {
    fn energy(&self, config: &Configuration) -> f64 {
        (0..self.basis.num_wave_vectors())
            .map(|k| {
                let coords = NormalModeTransform::coordinates_of(&self.basis, k, config);
                self.stiffness[k] * self.basis.harmonic_energy(k, &coords)
            })
            .sum()
    }
}
