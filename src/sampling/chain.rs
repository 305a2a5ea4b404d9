//! Metropolis Markov chain driving a [`WaveVectorMove`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::comparison::{ComparisonSample, ModeComparisonSampler};
use super::wave_vector_move::{MoveStats, WaveVectorMove};
use crate::error::Result;
use crate::system::{Configuration, EnergyModel};

/// Parameters for a Markov chain.
#[derive(Copy, Clone, Debug)]
pub struct ChainParams {
    pub temperature: f64,
    pub target_acceptance: f64,
    /// Steps between step-size adjustments while equilibrating.
    pub adaptation_interval: u64,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            target_acceptance: 0.5,
            adaptation_interval: 100,
        }
    }
}

/// One configuration evolved by Metropolis steps with its own random stream.
pub struct MarkovChain<E: EnergyModel> {
    config: Configuration,
    mv: WaveVectorMove,
    model: E,
    rng: StdRng,
    params: ChainParams,
    equilibrating: bool,
    steps: u64,
}

impl<E: EnergyModel> MarkovChain<E> {
    pub fn new(config: Configuration, mv: WaveVectorMove, model: E, params: ChainParams, seed: u64) -> Self {
        Self {
            config,
            mv,
            model,
            rng: StdRng::seed_from_u64(seed),
            params,
            equilibrating: false,
            steps: 0,
        }
    }

    /// While equilibrating, the move's step size is adapted every
    /// `adaptation_interval` steps.
    pub fn set_equilibrating(&mut self, equilibrating: bool) {
        self.equilibrating = equilibrating;
    }

    pub fn is_equilibrating(&self) -> bool {
        self.equilibrating
    }

    /// Perform a single Metropolis step. Returns whether the trial was accepted.
    pub fn step(&mut self) -> bool {
        let trial = self.mv.do_trial(&mut self.config, &self.model, &mut self.rng);
        let chi = trial.chi(self.params.temperature);
        let accepted = chi >= 1.0 || self.rng.gen::<f64>() < chi;
        if accepted {
            trial.accept();
        } else {
            trial.reject();
        }

        self.steps += 1;
        let interval = self.params.adaptation_interval;
        if self.equilibrating && interval > 0 && self.steps % interval == 0 {
            let step_size = self.mv.adapt_step_size(self.params.target_acceptance);
            debug!(step = self.steps, step_size, "Adapted step size");
        }
        accepted
    }

    pub fn run(&mut self, n_steps: u64) {
        for _ in 0..n_steps {
            self.step();
        }
    }

    /// Compare the current configuration against its harmonic description.
    pub fn measure(&mut self, sampler: &mut ModeComparisonSampler) -> Result<ComparisonSample> {
        sampler.measure(&mut self.config, &self.model, &mut self.rng)
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn model(&self) -> &E {
        &self.model
    }

    pub fn temperature(&self) -> f64 {
        self.params.temperature
    }

    pub fn resampled_wave_vectors(&self) -> &[usize] {
        self.mv.resampled()
    }

    pub fn step_size(&self) -> f64 {
        self.mv.step_size()
    }

    pub fn move_stats(&self) -> MoveStats {
        self.mv.stats()
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }
}
