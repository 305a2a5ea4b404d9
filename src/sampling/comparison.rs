//! Compare the real system against its harmonic description on a subset of
//! wave vectors.
//!
//! A measurement takes the sampled configuration, strips the compared modes
//! out of it, optionally disturbs the remainder, and puts the compared modes
//! back either as they were or freshly drawn from their Gaussian. Every
//! intermediate energy is reported. The configuration is always handed back
//! unchanged.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::wave_vector_move::{validate_wave_vectors, EligibleWaveVectors};
use crate::error::{Error, Result};
use crate::modes::{ModeBasis, ModeCoordinates, NormalModeTransform};
use crate::system::{Configuration, EnergyModel, Snapshot};

/// What goes back in place of the removed modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reinsertion {
    /// The coordinates that were removed.
    Restore,
    /// A fresh draw from the harmonic distribution.
    Gaussian,
}

/// Random shift of one other wave vector after the compared modes are removed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisturbPolicy {
    pub eligible: EligibleWaveVectors,
    pub step_size: f64,
}

/// Energies seen during one measurement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ComparisonSample {
    /// Energy of the configuration as sampled.
    pub full_energy: f64,
    /// Energy with the compared modes removed.
    pub remainder_energy: f64,
    /// Energy after the optional disturbance.
    pub disturbed_energy: Option<f64>,
    /// Harmonic energy of the removed coordinates.
    pub harmonic_energy: f64,
    /// Harmonic energy of the reinserted coordinates.
    pub reinserted_harmonic_energy: f64,
    /// Energy with the compared modes put back.
    pub reinserted_energy: f64,
}

impl ComparisonSample {
    /// Energy of the hybrid system: real interactions for every mode that was
    /// not compared, harmonic ones for the compared modes.
    pub fn hybrid_energy(&self) -> f64 {
        self.disturbed_energy.unwrap_or(self.remainder_energy) + self.harmonic_energy
    }
}

#[derive(Clone, Debug)]
pub struct ModeComparisonSampler {
    transform: NormalModeTransform,
    compared: Vec<usize>,
    temperature: f64,
    reinsertion: Reinsertion,
    disturb: Option<(Vec<usize>, f64)>,
    covers_all: bool,
    snapshot: Snapshot,
    removed: Vec<ModeCoordinates>,
    inserted: Vec<ModeCoordinates>,
}

impl ModeComparisonSampler {
    pub fn new(basis: Arc<ModeBasis>, compared: &[usize], temperature: f64, reinsertion: Reinsertion) -> Result<Self> {
        let n_wv = basis.num_wave_vectors();
        if compared.is_empty() {
            return Err(Error::Config("no wave vectors to compare".into()));
        }
        validate_wave_vectors(compared, n_wv, &[], "")?;
        if !(temperature > 0.0) {
            return Err(Error::Config(format!("temperature must be positive, got {}", temperature)));
        }

        let covers_all = (1..n_wv).all(|k| compared.contains(&k));
        let n_modes = basis.num_modes();
        Ok(Self {
            transform: NormalModeTransform::new(basis),
            compared: compared.to_vec(),
            temperature,
            reinsertion,
            disturb: None,
            covers_all,
            snapshot: Snapshot::default(),
            removed: vec![ModeCoordinates::zeros(n_modes); compared.len()],
            inserted: vec![ModeCoordinates::zeros(n_modes); compared.len()],
        })
    }

    pub fn with_disturbance(mut self, policy: &DisturbPolicy) -> Result<Self> {
        let n_wv = self.transform.basis().num_wave_vectors();
        let eligible = policy.eligible.resolve(n_wv);
        if eligible.is_empty() {
            return Err(Error::Config(format!("disturbance {:?} selects no wave vectors", policy.eligible)));
        }
        validate_wave_vectors(&eligible, n_wv, &self.compared, "compared wave vectors cannot be disturbed")?;
        self.disturb = Some((eligible, policy.step_size));
        Ok(self)
    }

    pub fn compared(&self) -> &[usize] {
        &self.compared
    }

    pub fn reinsertion(&self) -> Reinsertion {
        self.reinsertion
    }

    pub fn basis(&self) -> &Arc<ModeBasis> {
        self.transform.basis()
    }

    /// Run one comparison on `config`, which is restored before returning.
    pub fn measure<E, R>(&mut self, config: &mut Configuration, model: &E, rng: &mut R) -> Result<ComparisonSample>
    where
        E: EnergyModel + ?Sized,
        R: Rng + ?Sized,
    {
        let Self {
            transform,
            compared,
            temperature,
            reinsertion,
            disturb,
            covers_all,
            snapshot,
            removed,
            inserted,
        } = self;

        let mut txn = config.transaction(snapshot);
        let full_energy = model.energy(&txn);

        for (&k, coords) in compared.iter().zip(removed.iter_mut()) {
            transform.project_into(k, &txn, coords);
            transform.apply_mode(k, coords, -1.0, &mut txn);
        }
        let remainder_energy = model.energy(&txn);

        if *covers_all {
            // only the centre of mass is left
            let lattice = model.lattice_energy();
            let residual = remainder_energy - lattice;
            if !(residual.abs() <= 1e-10 * lattice.abs().max(1.0)) {
                return Err(Error::DecompositionViolated { residual });
            }
        }

        let disturbed_energy = match disturb {
            Some((eligible, step)) => {
                let k = eligible[rng.gen_range(0..eligible.len())];
                let delta_re = rng.gen_range(-*step..=*step);
                let delta_im = if transform.basis().is_self_paired(k) {
                    0.0
                } else {
                    rng.gen_range(-*step..=*step)
                };
                transform.perturb(k, delta_re, delta_im, &mut txn);
                Some(model.energy(&txn))
            }
            None => None,
        };

        let basis = Arc::clone(transform.basis());
        let mut harmonic_energy = 0.0;
        let mut reinserted_harmonic_energy = 0.0;
        for ((&k, old), new) in compared.iter().zip(removed.iter()).zip(inserted.iter_mut()) {
            match reinsertion {
                Reinsertion::Restore => new.copy_from(old),
                Reinsertion::Gaussian => basis.fill_gaussian_coordinates(k, *temperature, rng, new),
            }
            transform.apply_mode(k, new, 1.0, &mut txn);
            harmonic_energy += basis.harmonic_energy(k, old);
            reinserted_harmonic_energy += basis.harmonic_energy(k, new);
        }
        let reinserted_energy = model.energy(&txn);

        txn.rollback();
        Ok(ComparisonSample {
            full_energy,
            remainder_energy,
            disturbed_energy,
            harmonic_energy,
            reinserted_harmonic_energy,
            reinserted_energy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Complex;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use crate::sampling::{MovePolicy, WaveVectorMove};
    use crate::system::{HardRods1D, HarmonicModes};

    /// Harmonic model with a stiffer spring on the first excited wave vector,
    /// so removing modes changes the energy in a checkable way.
    fn stiff_model(basis: &Arc<ModeBasis>) -> HarmonicModes {
        HarmonicModes::new(basis.clone()).with_stiffness(1, 2.0).unwrap()
    }

    /// Equilibrated-ish configuration from a few hundred ordinary moves.
    fn shaken(basis: &Arc<ModeBasis>, model: &impl EnergyModel, n_cells: usize, density: f64, seed: u64) -> Configuration {
        let mut config = Configuration::simple_lattice(&[n_cells], 1.0 / density, 1).unwrap();
        let mut mv = WaveVectorMove::new(basis.clone(), &MovePolicy::default(), 1.0)
            .unwrap()
            .with_step_size(0.1, 0.001, 1.0);
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..300 {
            let trial = mv.do_trial(&mut config, model, &mut rng);
            if rng.gen::<f64>() < trial.chi(1.0) {
                trial.accept();
            } else {
                trial.reject();
            }
        }
        config
    }

    #[test]
    fn test_removing_every_mode_leaves_lattice_energy() {
        for &n in &[4usize, 7, 10, 16] {
            let basis = Arc::new(ModeBasis::hard_rods_1d(n, 0.5, 1.0, 1.0).unwrap());
            let all: Vec<usize> = (1..basis.num_wave_vectors()).collect();
            let mut rng = StdRng::seed_from_u64(n as u64);

            let rods = HardRods1D::new(n, 0.5);
            let mut config = shaken(&basis, &rods, n, 0.5, 11);
            let mut sampler = ModeComparisonSampler::new(basis.clone(), &all, 1.0, Reinsertion::Gaussian).unwrap();
            let sample = sampler.measure(&mut config, &rods, &mut rng).unwrap();
            assert_eq!(sample.remainder_energy, 0.0);

            let model = stiff_model(&basis);
            let mut config = shaken(&basis, &model, n, 0.5, 12);
            let sample = sampler.measure(&mut config, &model, &mut rng).unwrap();
            assert_relative_eq!(sample.remainder_energy, 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_configuration_is_always_restored() {
        let basis = Arc::new(ModeBasis::hard_rods_1d(10, 0.5, 1.0, 1.0).unwrap());
        let rods = HardRods1D::new(10, 0.5);
        let mut config = shaken(&basis, &rods, 10, 0.5, 3);
        let mut sampler = ModeComparisonSampler::new(basis.clone(), &[2, 3], 1.0, Reinsertion::Gaussian)
            .unwrap()
            .with_disturbance(&DisturbPolicy {
                eligible: EligibleWaveVectors::Explicit(vec![1]),
                step_size: 0.2,
            })
            .unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        let before = config.save();
        for _ in 0..20 {
            let sample = sampler.measure(&mut config, &rods, &mut rng).unwrap();
            assert!(sample.disturbed_energy.is_some());
            assert_eq!(config.save(), before);
        }
    }

    #[test]
    fn test_restore_reinsertion_reproduces_full_energy() {
        let basis = Arc::new(ModeBasis::hard_rods_1d(8, 0.5, 1.0, 1.0).unwrap());
        let model = stiff_model(&basis);
        let mut config = shaken(&basis, &model, 8, 0.5, 7);
        let mut sampler = ModeComparisonSampler::new(basis.clone(), &[1, 3], 1.0, Reinsertion::Restore).unwrap();
        let mut rng = StdRng::seed_from_u64(8);
        let sample = sampler.measure(&mut config, &model, &mut rng).unwrap();

        assert_relative_eq!(sample.reinserted_energy, sample.full_energy, epsilon = 1e-12);
        assert_relative_eq!(sample.reinserted_harmonic_energy, sample.harmonic_energy, epsilon = 1e-14);
        // the stiffened mode counts twice in the full energy
        let mut transform = NormalModeTransform::new(basis.clone());
        let q1 = transform.project_to_mode(1, &config);
        let q3 = transform.project_to_mode(3, &config);
        assert_relative_eq!(
            sample.harmonic_energy,
            basis.harmonic_energy(1, &q1) + basis.harmonic_energy(3, &q3),
            epsilon = 1e-12
        );
        assert_relative_eq!(
            sample.full_energy - sample.remainder_energy,
            2.0 * basis.harmonic_energy(1, &q1) + basis.harmonic_energy(3, &q3),
            epsilon = 1e-12
        );
        assert_relative_eq!(
            sample.hybrid_energy(),
            sample.full_energy - basis.harmonic_energy(1, &q1),
            epsilon = 1e-12
        );
    }

    /// Reports a constant offset even at the lattice, as a broken model would.
    struct Offset;

    impl EnergyModel for Offset {
        fn energy(&self, config: &Configuration) -> f64 {
            config.displacements().iter().map(|u| u.abs()).sum::<f64>() + 1.0
        }
    }

    #[test]
    fn test_decomposition_violation_is_reported() {
        let basis = Arc::new(ModeBasis::hard_rods_1d(6, 0.5, 1.0, 1.0).unwrap());
        let mut transform = NormalModeTransform::new(basis.clone());
        let mut config = Configuration::simple_lattice(&[6], 2.0, 1).unwrap();
        transform.apply_mode(2, &ModeCoordinates::from_element(1, Complex::new(0.1, 0.0)), 1.0, &mut config);

        let all: Vec<usize> = (1..basis.num_wave_vectors()).collect();
        let mut sampler = ModeComparisonSampler::new(basis, &all, 1.0, Reinsertion::Restore).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let err = sampler.measure(&mut config, &Offset, &mut rng).unwrap_err();
        match err {
            Error::DecompositionViolated { residual } => assert_relative_eq!(residual, 1.0, epsilon = 1e-12),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_gaussian_reinsertion_overlaps_hard_rods() {
        // a soft harmonic spring often pushes the rods into each other
        let basis = Arc::new(ModeBasis::hard_rods_1d(8, 0.5, 1.0, 0.1).unwrap());
        let rods = HardRods1D::new(8, 0.5);
        let mut config = Configuration::simple_lattice(&[8], 2.0, 1).unwrap();
        let mut sampler = ModeComparisonSampler::new(basis, &[4], 1.0, Reinsertion::Gaussian).unwrap();
        let mut rng = StdRng::seed_from_u64(21);
        let mut allowed = 0;
        for _ in 0..200 {
            let sample = sampler.measure(&mut config, &rods, &mut rng).unwrap();
            assert_eq!(sample.full_energy, 0.0);
            if sample.reinserted_energy.is_finite() {
                allowed += 1;
            }
        }
        assert!(allowed > 0 && allowed < 200);
    }
}
