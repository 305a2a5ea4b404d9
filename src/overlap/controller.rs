//! Two-chain overlap sampling between a harmonic reference and the full system.
//!
//! The reference chain samples the hybrid system, in which the compared wave
//! vectors are harmonic and everything else interacts normally. The target
//! chain samples the full system. Both chains are measured after every step
//! and the Bennett estimator turns the two sets of overlap averages into
//! `Z_target / Z_reference`.
//!
//! A run goes through four phases: [`OverlapSimulation::init_bennett_parameter`]
//! searches a wide grid for α, [`OverlapSimulation::equilibrate`] adapts step
//! sizes and fixes α, [`OverlapSimulation::production`] collects data and
//! [`OverlapSimulation::finalize`] turns it into a free energy.

use std::sync::Arc;
use tracing::{debug, info};

use super::accumulator::{BennettGrid, ChainRole, OverlapAccumulator};
use super::bennett_file::BennettParameterFile;
use super::estimator::{validate_alpha, OverlapEstimator};
use crate::error::{Error, Result};
use crate::modes::ModeBasis;
use crate::sampling::{MarkovChain, ModeComparisonSampler, Reinsertion};
use crate::system::EnergyModel;

/// Parameters for the overlap controller.
#[derive(Copy, Clone, Debug)]
pub struct OverlapParams {
    /// MC steps each chain takes per controller step.
    pub sub_steps: u64,
    /// Controller steps between progress reports; 0 disables them.
    pub report_interval: u64,
    /// Centre of the initial α search.
    pub alpha_center: f64,
    pub search_points: usize,
    pub search_span: f64,
    pub refine_points: usize,
    pub refine_span: f64,
}

impl Default for OverlapParams {
    fn default() -> Self {
        Self {
            sub_steps: 1000,
            report_interval: 0,
            alpha_center: 1.0,
            search_points: 41,
            search_span: 40.0,
            refine_points: 11,
            refine_span: 5.0,
        }
    }
}

impl OverlapParams {
    pub fn with_sub_steps(mut self, sub_steps: u64) -> Self {
        self.sub_steps = sub_steps;
        self
    }

    pub fn with_report_interval(mut self, report_interval: u64) -> Self {
        self.report_interval = report_interval;
        self
    }

    pub fn with_alpha_center(mut self, alpha_center: f64) -> Self {
        self.alpha_center = alpha_center;
        self
    }
}

/// Final result of an overlap run.
#[derive(Clone, Copy, Debug)]
pub struct FreeEnergyResult {
    /// `Z_target / Z_reference`.
    pub ratio: f64,
    pub ratio_error: f64,
    /// `F_target - F_reference`.
    pub free_energy_difference: f64,
    pub free_energy_difference_error: f64,
    pub reference_free_energy: f64,
    pub target_free_energy: f64,
    pub alpha: f64,
    /// Overlap average and error on the reference chain.
    pub reference_overlap: (f64, f64),
    /// Overlap average and error on the target chain.
    pub target_overlap: (f64, f64),
    pub ideal_reference_fraction: f64,
    pub reference_fraction: f64,
}

pub struct OverlapSimulation<E: EnergyModel> {
    reference: MarkovChain<E>,
    target: MarkovChain<E>,
    reference_sampler: ModeComparisonSampler,
    target_sampler: ModeComparisonSampler,
    reference_overlap: OverlapAccumulator,
    target_overlap: OverlapAccumulator,
    params: OverlapParams,
    alpha: f64,
    searching: bool,
    block_size: usize,
}

impl<E: EnergyModel> OverlapSimulation<E> {
    /// The reference chain's move must resample exactly the `compared` wave
    /// vectors; the target chain's move must not resample anything.
    pub fn new(
        basis: Arc<ModeBasis>,
        compared: &[usize],
        reference: MarkovChain<E>,
        target: MarkovChain<E>,
        params: OverlapParams,
        block_size: usize,
    ) -> Result<Self> {
        let temperature = reference.temperature();
        if target.temperature() != temperature {
            return Err(Error::Config(format!(
                "reference chain runs at T = {}, target chain at T = {}",
                temperature,
                target.temperature()
            )));
        }
        if params.sub_steps == 0 {
            return Err(Error::Config("sub_steps must be at least 1".into()));
        }
        let mut expected = compared.to_vec();
        expected.sort_unstable();
        let mut resampled = reference.resampled_wave_vectors().to_vec();
        resampled.sort_unstable();
        if resampled != expected {
            return Err(Error::Config(format!(
                "reference chain resamples wave vectors {:?}, compared wave vectors are {:?}",
                resampled, expected
            )));
        }
        if !target.resampled_wave_vectors().is_empty() {
            return Err(Error::Config(format!(
                "target chain must not resample wave vectors, got {:?}",
                target.resampled_wave_vectors()
            )));
        }

        let reference_sampler = ModeComparisonSampler::new(basis.clone(), compared, temperature, Reinsertion::Gaussian)?;
        let target_sampler = ModeComparisonSampler::new(basis, compared, temperature, Reinsertion::Restore)?;
        let grid = BennettGrid::single(params.alpha_center);

        Ok(Self {
            reference,
            target,
            reference_sampler,
            target_sampler,
            reference_overlap: OverlapAccumulator::new(ChainRole::Reference, temperature, grid, block_size),
            target_overlap: OverlapAccumulator::new(ChainRole::Target, temperature, grid, block_size),
            params,
            alpha: params.alpha_center,
            searching: false,
            block_size,
        })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// True between the wide α search and the end of equilibration.
    pub fn is_searching(&self) -> bool {
        self.searching
    }

    pub fn chain(&self, role: ChainRole) -> &MarkovChain<E> {
        match role {
            ChainRole::Reference => &self.reference,
            ChainRole::Target => &self.target,
        }
    }

    pub fn accumulator(&self, role: ChainRole) -> &OverlapAccumulator {
        match role {
            ChainRole::Reference => &self.reference_overlap,
            ChainRole::Target => &self.target_overlap,
        }
    }

    pub fn estimator(&self) -> Result<OverlapEstimator<'_>> {
        OverlapEstimator::new(&self.reference_overlap, &self.target_overlap)
    }

    /// Use α grid centred on `center`. Collected data is discarded.
    pub fn set_bennett_parameter(&mut self, center: f64, span: f64, n_points: usize) {
        let grid = BennettGrid::new(center, span, n_points);
        self.reference_overlap.set_grid(grid);
        self.target_overlap.set_grid(grid);
        self.alpha = center;
    }

    /// Collected data is discarded.
    pub fn set_block_size(&mut self, block_size: usize) {
        self.block_size = block_size;
        self.reference_overlap.set_block_size(block_size);
        self.target_overlap.set_block_size(block_size);
    }

    pub fn reset(&mut self) {
        self.reference_overlap.reset();
        self.target_overlap.reset();
    }

    fn set_equilibrating(&mut self, equilibrating: bool) {
        self.reference.set_equilibrating(equilibrating);
        self.target.set_equilibrating(equilibrating);
    }

    /// `sub_steps` measured MC steps on the reference chain, then on the target chain.
    pub fn step(&mut self) -> Result<()> {
        for _ in 0..self.params.sub_steps {
            self.reference.step();
            let sample = self.reference.measure(&mut self.reference_sampler)?;
            self.reference_overlap.add_sample(&sample);
        }
        for _ in 0..self.params.sub_steps {
            self.target.step();
            let sample = self.target.measure(&mut self.target_sampler)?;
            self.target_overlap.add_sample(&sample);
        }
        Ok(())
    }

    /// Run `n_steps` controller steps.
    pub fn run(&mut self, n_steps: u64) -> Result<()> {
        for i in 0..n_steps {
            self.step()?;

            if self.params.report_interval > 0 && (i + 1) % self.params.report_interval == 0 {
                let (ratio, error) = self.estimator()?.overlap_average_and_error();
                info!(step = i + 1, ratio, error, "Progress");
            }
        }
        Ok(())
    }

    /// Find an initial α, from `file` if it holds one, otherwise by running
    /// `steps` to leave the lattice and `steps` more on a wide grid.
    pub fn init_bennett_parameter(
        &mut self,
        file: Option<&BennettParameterFile>,
        steps: u64,
        block_size: usize,
    ) -> Result<()> {
        self.searching = true;
        self.set_equilibrating(true);

        if let Some(file) = file {
            if let Some(alpha) = file.read()? {
                let alpha = validate_alpha(alpha, "file")?;
                info!(alpha, path = %file.path().display(), "Setting Bennett parameter from file");
                self.set_bennett_parameter(alpha, 0.0, 1);
                self.searching = false;
            }
        }

        if self.searching {
            info!(steps, "Searching for Bennett parameter");
            // off the lattice first
            self.run(steps)?;
            self.reset();

            self.set_block_size(block_size);
            self.set_bennett_parameter(self.params.alpha_center, self.params.search_span, self.params.search_points);
            self.run(steps)?;

            let estimator = self.estimator()?;
            let loc = estimator.min_diff_location();
            debug!(
                loc,
                reference = self.reference_overlap.average(loc),
                target = self.target_overlap.average(loc),
                "Bennett averages"
            );
            let alpha = validate_alpha(estimator.refined_alpha(), "search")?;
            info!(alpha, "Setting Bennett parameter");

            self.set_bennett_parameter(alpha, self.params.refine_span, self.params.refine_points);
        }

        self.set_equilibrating(false);
        Ok(())
    }

    /// Adapt step sizes over `steps`. After a search the α is refined once
    /// more, frozen and written to `file`.
    pub fn equilibrate(&mut self, file: Option<&BennettParameterFile>, steps: u64, block_size: usize) -> Result<()> {
        info!(steps, "Equilibrating");
        self.set_block_size(block_size);
        self.set_equilibrating(true);
        self.run(steps)?;
        self.set_equilibrating(false);

        for role in [ChainRole::Reference, ChainRole::Target] {
            let chain = self.chain(role);
            debug!(
                %role,
                step_size = chain.step_size(),
                acceptance = chain.move_stats().acceptance_rate(),
                "Equilibrated"
            );
        }

        if self.searching {
            let estimator = self.estimator()?;
            let loc = estimator.min_diff_location();
            let alpha = validate_alpha(estimator.refined_alpha(), "equilibration")?;
            info!(alpha, loc, "Setting Bennett parameter");
            self.set_bennett_parameter(alpha, 0.0, 1);
            if let Some(file) = file {
                file.write(alpha)?;
            }
            self.searching = false;
        } else {
            self.reset();
        }
        Ok(())
    }

    /// Collect data with α fixed.
    pub fn production(&mut self, steps: u64, block_size: usize) -> Result<()> {
        info!(steps, block_size, alpha = self.alpha, "Production");
        validate_alpha(self.alpha, "production")?;
        self.set_block_size(block_size);
        self.set_equilibrating(false);
        self.run(steps)
    }

    /// Turn the collected averages into a free energy, given the free energy
    /// of the reference system.
    pub fn finalize(&self, reference_free_energy: f64) -> Result<FreeEnergyResult> {
        let estimator = self.estimator()?;
        let loc = estimator.min_diff_location();
        let ratio = estimator.ratio(loc);
        let ratio_error = estimator.error(loc);
        let temperature = self.reference.temperature();

        let free_energy_difference = -temperature * ratio.ln();
        let result = FreeEnergyResult {
            ratio,
            ratio_error,
            free_energy_difference,
            free_energy_difference_error: temperature * ratio_error / ratio,
            reference_free_energy,
            target_free_energy: reference_free_energy + free_energy_difference,
            alpha: estimator.alpha(loc),
            reference_overlap: (self.reference_overlap.average(loc), self.reference_overlap.error(loc)),
            target_overlap: (self.target_overlap.average(loc), self.target_overlap.error(loc)),
            ideal_reference_fraction: estimator.ideal_reference_fraction(loc),
            reference_fraction: 0.5,
        };

        info!(
            ratio = result.ratio,
            error = result.ratio_error,
            free_energy_difference = result.free_energy_difference,
            target_free_energy = result.target_free_energy,
            "Overlap sampling finished"
        );
        Ok(result)
    }
}
