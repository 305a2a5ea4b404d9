//! Traits for energy evaluation.

use super::configuration::Configuration;

/// Configurational energy of a box.
///
/// Returns `f64::INFINITY` for forbidden configurations (overlap). Called
/// once or twice per trial, so implementations should be cheap.
pub trait EnergyModel {
    fn energy(&self, config: &Configuration) -> f64;

    /// Energy of the undisplaced lattice.
    fn lattice_energy(&self) -> f64 {
        0.0
    }
}

impl<T: EnergyModel + ?Sized> EnergyModel for &T {
    fn energy(&self, config: &Configuration) -> f64 {
        (**self).energy(config)
    }

    fn lattice_energy(&self) -> f64 {
        (**self).lattice_energy()
    }
}
