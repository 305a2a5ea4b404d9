//! Metropolis trial move in normal-mode space.
//!
//! A trial picks one or more eligible wave vectors, shifts every finite mode
//! of each by a uniform random complex amount, and reports the energy before
//! and after. Which wave vectors may move, and whether a set of compared
//! wave vectors is redrawn from its harmonic distribution on every trial, is
//! set by a [`MovePolicy`].

use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::modes::{ModeBasis, ModeCoordinates, NormalModeTransform};
use crate::system::{Configuration, EnergyModel, Snapshot, Transaction};

/// Which wave vectors a move may perturb. Index 0 is never eligible.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibleWaveVectors {
    /// Every wave vector except the zero vector and any being resampled.
    AllNonZero,
    /// `1..k`.
    Below(usize),
    /// `k+1..len`.
    Above(usize),
    /// `start..end`; `start` must be at least 1.
    Range { start: usize, end: usize },
    Explicit(Vec<usize>),
}

impl EligibleWaveVectors {
    /// Indices named by this selection, before validation.
    pub fn resolve(&self, num_wave_vectors: usize) -> Vec<usize> {
        match self {
            EligibleWaveVectors::AllNonZero => (1..num_wave_vectors).collect(),
            EligibleWaveVectors::Below(k) => (1..*k).collect(),
            EligibleWaveVectors::Above(k) => (k + 1..num_wave_vectors).collect(),
            EligibleWaveVectors::Range { start, end } => (*start..*end).collect(),
            EligibleWaveVectors::Explicit(list) => list.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovePolicy {
    pub eligible: EligibleWaveVectors,
    /// Distinct wave vectors perturbed per trial.
    pub wave_vectors_per_trial: usize,
    /// Wave vectors removed before the energy is measured and redrawn from
    /// their Gaussian afterwards. Empty for an ordinary move.
    pub resample_compared: Vec<usize>,
}

impl Default for MovePolicy {
    fn default() -> Self {
        Self {
            eligible: EligibleWaveVectors::AllNonZero,
            wave_vectors_per_trial: 1,
            resample_compared: Vec::new(),
        }
    }
}

/// Check a list of wave-vector indices against a basis. Zero, out-of-range
/// and duplicated entries are rejected, as is anything listed in `exclude`.
pub(crate) fn validate_wave_vectors(
    indices: &[usize],
    num_wave_vectors: usize,
    exclude: &[usize],
    excluded_reason: &str,
) -> Result<()> {
    for (i, &k) in indices.iter().enumerate() {
        if k == 0 {
            return Err(Error::forbidden(0, "the zero wave vector is centre-of-mass motion"));
        }
        if k >= num_wave_vectors {
            return Err(Error::forbidden(
                k,
                format!("only {} wave vectors exist", num_wave_vectors),
            ));
        }
        if indices[..i].contains(&k) {
            return Err(Error::forbidden(k, "listed more than once"));
        }
        if exclude.contains(&k) {
            return Err(Error::forbidden(k, excluded_reason));
        }
    }
    Ok(())
}

/// One perturbation applied during a trial.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaveVectorChange {
    pub wave_vector: usize,
    pub delta_re: f64,
    pub delta_im: f64,
}

/// Trial and acceptance counts.
#[derive(Clone, Copy, Debug, Default)]
pub struct MoveStats {
    pub trials: u64,
    pub accepted: u64,
}

impl MoveStats {
    pub fn acceptance_rate(&self) -> f64 {
        if self.trials == 0 {
            0.0
        } else {
            self.accepted as f64 / self.trials as f64
        }
    }
}

#[derive(Clone, Debug)]
pub struct WaveVectorMove {
    transform: NormalModeTransform,
    eligible: Vec<usize>,
    per_trial: usize,
    compared: Vec<usize>,
    temperature: f64,
    step_size: f64,
    step_size_min: f64,
    step_size_max: f64,
    snapshot: Snapshot,
    compared_coords: Vec<ModeCoordinates>,
    changes: Vec<WaveVectorChange>,
    /// Counts since the last step-size adjustment.
    window: MoveStats,
    total: MoveStats,
}

impl WaveVectorMove {
    pub fn new(basis: Arc<ModeBasis>, policy: &MovePolicy, temperature: f64) -> Result<Self> {
        let n_wv = basis.num_wave_vectors();
        validate_wave_vectors(&policy.resample_compared, n_wv, &[], "")?;

        let mut eligible = policy.eligible.resolve(n_wv);
        if policy.eligible == EligibleWaveVectors::AllNonZero {
            eligible.retain(|k| !policy.resample_compared.contains(k));
        }
        if eligible.is_empty() {
            return Err(Error::Config(format!("move policy {:?} selects no wave vectors", policy.eligible)));
        }
        validate_wave_vectors(
            &eligible,
            n_wv,
            &policy.resample_compared,
            "compared wave vectors are redrawn, not moved",
        )?;

        if policy.wave_vectors_per_trial == 0 || policy.wave_vectors_per_trial > eligible.len() {
            return Err(Error::Config(format!(
                "cannot move {} wave vectors per trial out of {} eligible",
                policy.wave_vectors_per_trial,
                eligible.len()
            )));
        }
        if !(temperature > 0.0) {
            return Err(Error::Config(format!("temperature must be positive, got {}", temperature)));
        }

        let n_modes = basis.num_modes();
        Ok(Self {
            transform: NormalModeTransform::new(basis),
            eligible,
            per_trial: policy.wave_vectors_per_trial,
            compared: policy.resample_compared.clone(),
            temperature,
            step_size: 0.01,
            step_size_min: 0.001,
            step_size_max: f64::INFINITY,
            snapshot: Snapshot::default(),
            compared_coords: vec![ModeCoordinates::zeros(n_modes); policy.resample_compared.len()],
            changes: Vec::with_capacity(policy.wave_vectors_per_trial),
            window: MoveStats::default(),
            total: MoveStats::default(),
        })
    }

    pub fn with_step_size(mut self, step_size: f64, min: f64, max: f64) -> Self {
        self.step_size_min = min;
        self.step_size_max = max;
        self.step_size = step_size.max(min).min(max);
        self
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    /// Wave vectors redrawn from their harmonic distribution on every trial.
    pub fn resampled(&self) -> &[usize] {
        &self.compared
    }

    pub fn eligible(&self) -> &[usize] {
        &self.eligible
    }

    pub fn basis(&self) -> &Arc<ModeBasis> {
        self.transform.basis()
    }

    pub fn stats(&self) -> MoveStats {
        self.total
    }

    /// Propose a trial. The configuration is modified in place; the returned
    /// [`ProposedTrial`] must be accepted to keep the change; rejecting or
    /// dropping it restores the configuration exactly.
    pub fn do_trial<'a, E, R>(
        &'a mut self,
        config: &'a mut Configuration,
        model: &E,
        rng: &mut R,
    ) -> ProposedTrial<'a>
    where
        E: EnergyModel + ?Sized,
        R: Rng + ?Sized,
    {
        let Self {
            transform,
            eligible,
            per_trial,
            compared,
            temperature,
            step_size,
            snapshot,
            compared_coords,
            changes,
            window,
            total,
            ..
        } = self;

        window.trials += 1;
        total.trials += 1;

        let mut txn = config.transaction(snapshot);
        for (&k, coords) in compared.iter().zip(compared_coords.iter_mut()) {
            transform.project_into(k, &txn, coords);
            transform.apply_mode(k, coords, -1.0, &mut txn);
        }
        let energy_old = model.energy(&txn);

        changes.clear();
        if *per_trial == 1 {
            let k = eligible[rng.gen_range(0..eligible.len())];
            changes.push(draw_change(transform.basis(), k, *step_size, rng));
        } else {
            for i in index::sample(rng, eligible.len(), *per_trial).iter() {
                changes.push(draw_change(transform.basis(), eligible[i], *step_size, rng));
            }
        }
        for change in changes.iter() {
            transform.perturb(change.wave_vector, change.delta_re, change.delta_im, &mut txn);
        }
        let energy_new = model.energy(&txn);

        // redraw only when the trial can still be accepted
        if energy_new.is_finite() {
            let basis = Arc::clone(transform.basis());
            for (&k, coords) in compared.iter().zip(compared_coords.iter_mut()) {
                basis.fill_gaussian_coordinates(k, *temperature, rng, coords);
                transform.apply_mode(k, coords, 1.0, &mut txn);
            }
        }

        ProposedTrial {
            txn,
            window,
            total,
            changes,
            energy_old,
            energy_new,
        }
    }

    /// Scale the step size toward `target_acceptance` using the acceptance
    /// seen since the previous call.
    pub fn adapt_step_size(&mut self, target_acceptance: f64) -> f64 {
        if self.window.trials == 0 {
            return self.step_size;
        }
        let rate = self.window.acceptance_rate();
        let adjustment = (rate / target_acceptance).sqrt();
        self.step_size = (self.step_size * adjustment)
            .max(self.step_size_min)
            .min(self.step_size_max);
        self.window = MoveStats::default();
        self.step_size
    }
}

fn draw_change<R: Rng + ?Sized>(basis: &ModeBasis, k: usize, step_size: f64, rng: &mut R) -> WaveVectorChange {
    let delta_re = rng.gen_range(-step_size..=step_size);
    let delta_im = if basis.is_self_paired(k) {
        0.0
    } else {
        rng.gen_range(-step_size..=step_size)
    };
    WaveVectorChange {
        wave_vector: k,
        delta_re,
        delta_im,
    }
}

/// A trial waiting for the Metropolis decision.
pub struct ProposedTrial<'a> {
    txn: Transaction<'a>,
    window: &'a mut MoveStats,
    total: &'a mut MoveStats,
    changes: &'a [WaveVectorChange],
    energy_old: f64,
    energy_new: f64,
}

impl<'a> ProposedTrial<'a> {
    pub fn energy_old(&self) -> f64 {
        self.energy_old
    }

    pub fn energy_new(&self) -> f64 {
        self.energy_new
    }

    pub fn delta_energy(&self) -> f64 {
        self.energy_new - self.energy_old
    }

    /// Metropolis weight `exp(-ΔE/T)`; zero for a forbidden new state.
    pub fn chi(&self, temperature: f64) -> f64 {
        if !self.energy_new.is_finite() {
            return 0.0;
        }
        (-self.delta_energy() / temperature).exp()
    }

    pub fn changes(&self) -> &[WaveVectorChange] {
        self.changes
    }

    /// The trial configuration.
    pub fn config(&self) -> &Configuration {
        &self.txn
    }

    /// Displacements from before the trial.
    pub fn saved(&self) -> &Snapshot {
        self.txn.saved()
    }

    pub fn accept(self) {
        let ProposedTrial { txn, window, total, .. } = self;
        window.accepted += 1;
        total.accepted += 1;
        txn.commit();
    }

    pub fn reject(self) {
        self.txn.rollback();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{DMatrix, DVector};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::f64::consts::PI;
    use crate::system::{HardRods1D, HarmonicModes};

    /// Ten cells, ten wave vectors, only the zero vector without a restoring force.
    fn ten_cell_basis() -> Arc<ModeBasis> {
        let wave_vectors = (0..10).map(|n| DVector::from_element(1, 2.0 * PI * n as f64 / 10.0)).collect();
        let mut coefficients = vec![1.0; 10];
        coefficients[0] = 0.5;
        let omega_squared = DMatrix::from_fn(10, 1, |k, _| if k == 0 { f64::INFINITY } else { 1.0 + k as f64 });
        Arc::new(ModeBasis::new(wave_vectors, coefficients, vec![DMatrix::from_element(1, 1, 1.0); 10], omega_squared).unwrap())
    }

    #[test]
    fn test_zero_wave_vector_is_forbidden() {
        let basis = ten_cell_basis();
        let policy = MovePolicy {
            eligible: EligibleWaveVectors::Explicit(vec![0, 3]),
            ..MovePolicy::default()
        };
        let err = WaveVectorMove::new(basis.clone(), &policy, 1.0).unwrap_err();
        assert!(matches!(err, Error::ForbiddenWaveVector { index: 0, .. }));

        let policy = MovePolicy {
            eligible: EligibleWaveVectors::Range { start: 0, end: 4 },
            ..MovePolicy::default()
        };
        assert!(WaveVectorMove::new(basis, &policy, 1.0).is_err());
    }

    #[test]
    fn test_compared_wave_vector_cannot_move() {
        let policy = MovePolicy {
            eligible: EligibleWaveVectors::AllNonZero,
            wave_vectors_per_trial: 1,
            resample_compared: vec![2],
        };
        let mv = WaveVectorMove::new(ten_cell_basis(), &policy, 1.0).unwrap();
        assert!(!mv.eligible().contains(&2));
        assert_eq!(mv.eligible().len(), 8);

        let policy = MovePolicy {
            eligible: EligibleWaveVectors::Below(5),
            wave_vectors_per_trial: 1,
            resample_compared: vec![2],
        };
        let err = WaveVectorMove::new(ten_cell_basis(), &policy, 1.0).unwrap_err();
        assert!(matches!(err, Error::ForbiddenWaveVector { index: 2, .. }));
    }

    #[test]
    fn test_range_policies() {
        assert_eq!(EligibleWaveVectors::Below(4).resolve(10), vec![1, 2, 3]);
        assert_eq!(EligibleWaveVectors::Above(7).resolve(10), vec![8, 9]);
        assert_eq!(EligibleWaveVectors::AllNonZero.resolve(3), vec![1, 2]);
        assert!(EligibleWaveVectors::Below(1).resolve(10).is_empty());
    }

    #[test]
    fn test_single_trial_on_wave_vector_three() {
        let basis = ten_cell_basis();
        let policy = MovePolicy {
            eligible: EligibleWaveVectors::Explicit(vec![3]),
            ..MovePolicy::default()
        };
        let step = 0.01;
        let mut mv = WaveVectorMove::new(basis.clone(), &policy, 1.0).unwrap().with_step_size(step, 0.001, 1.0);
        let mut config = Configuration::simple_lattice(&[10], 1.0, 1).unwrap();
        config.displacements_mut()[(0, 0)] = 0.02;
        let model = HarmonicModes::new(basis.clone());
        let mut rng = StdRng::seed_from_u64(42);

        let u_old = config.save();
        let trial = mv.do_trial(&mut config, &model, &mut rng);
        let change = trial.changes()[0];
        assert_eq!(change.wave_vector, 3);
        assert!(change.delta_re.abs() <= step && change.delta_im.abs() <= step);

        let transform = NormalModeTransform::new(basis.clone());
        let q = ModeCoordinates::from_element(1, nalgebra::Complex::new(change.delta_re, change.delta_im));
        let bound = 2.0 * step * basis.max_eigenvector_norm(3);
        for cell in 0..10 {
            let delta = transform.cell_delta(3, &q, trial.config().cell_position(cell), 10);
            assert!(delta.norm() <= bound);
            assert_relative_eq!(
                trial.config().displacement(cell)[0],
                u_old.displacement(cell)[0] + delta[0],
                epsilon = 1e-15
            );
        }
        trial.accept();
        assert_eq!(mv.stats().accepted, 1);
    }

    #[test]
    fn test_rejection_restores_exactly() {
        let basis = Arc::new(ModeBasis::hard_rods_1d(12, 0.6, 1.0, 1.0).unwrap());
        let policy = MovePolicy {
            wave_vectors_per_trial: 3,
            ..MovePolicy::default()
        };
        let mut mv = WaveVectorMove::new(basis, &policy, 1.0).unwrap().with_step_size(0.5, 0.001, 1.0);
        let model = HardRods1D::new(12, 0.6);
        let mut config = Configuration::simple_lattice(&[12], 1.0 / 0.6, 1).unwrap();
        let mut rng = StdRng::seed_from_u64(9);

        for _ in 0..50 {
            let before = config.save();
            let trial = mv.do_trial(&mut config, &model, &mut rng);
            assert_eq!(trial.changes().len(), 3);
            assert_ne!(trial.config().save(), before);
            trial.reject();
            assert_eq!(config.save(), before);
        }
        assert_eq!(mv.stats().trials, 50);
        assert_eq!(mv.stats().accepted, 0);
    }

    #[test]
    fn test_dropped_trial_is_rejected() {
        let basis = ten_cell_basis();
        let mut mv = WaveVectorMove::new(basis.clone(), &MovePolicy::default(), 1.0).unwrap();
        let mut config = Configuration::simple_lattice(&[10], 1.0, 1).unwrap();
        let before = config.save();
        let mut rng = StdRng::seed_from_u64(1);
        {
            let _trial = mv.do_trial(&mut config, &HarmonicModes::new(basis), &mut rng);
        }
        assert_eq!(config.save(), before);
    }

    #[test]
    fn test_resampled_modes_follow_harmonic_distribution() {
        // with a harmonic model and the compared mode resampled, the
        // compared mode's energy averages to T regardless of step size
        let basis = Arc::new(ModeBasis::hard_rods_1d(8, 0.5, 1.0, 1.0).unwrap());
        let policy = MovePolicy {
            eligible: EligibleWaveVectors::Explicit(vec![1]),
            wave_vectors_per_trial: 1,
            resample_compared: vec![2],
        };
        let mut mv = WaveVectorMove::new(basis.clone(), &policy, 1.0).unwrap().with_step_size(0.3, 0.001, 1.0);
        let model = HarmonicModes::new(basis.clone());
        let mut config = Configuration::simple_lattice(&[8], 2.0, 1).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let mut transform = NormalModeTransform::new(basis.clone());

        let n = 20000;
        let mut sum = 0.0;
        for _ in 0..n {
            let trial = mv.do_trial(&mut config, &model, &mut rng);
            if rng.gen::<f64>() < trial.chi(1.0) {
                trial.accept();
            } else {
                trial.reject();
            }
            let q = transform.project_to_mode(2, &config);
            sum += basis.harmonic_energy(2, &q);
        }
        assert_relative_eq!(sum / n as f64, 1.0, epsilon = 0.05);
    }

    #[test]
    fn test_step_size_adaptation() {
        let basis = Arc::new(ModeBasis::hard_rods_1d(8, 0.9, 1.0, 1.0).unwrap());
        let mut mv = WaveVectorMove::new(basis, &MovePolicy::default(), 1.0)
            .unwrap()
            .with_step_size(0.5, 0.001, 1.0);
        let model = HardRods1D::new(8, 0.9);
        let mut config = Configuration::simple_lattice(&[8], 1.0 / 0.9, 1).unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..200 {
            let trial = mv.do_trial(&mut config, &model, &mut rng);
            if trial.chi(1.0) > 0.0 {
                trial.accept();
            } else {
                trial.reject();
            }
        }
        let before = mv.step_size();
        let after = mv.adapt_step_size(0.5);
        // dense rods reject most large steps
        assert!(after < before);
    }
}
