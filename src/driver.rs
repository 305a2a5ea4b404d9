//! Assembly of the 1-D hard-rod overlap run from a [`SimulationConfig`].
//!
//! Both chains move the changeable wave vectors. The reference chain also
//! redraws the compared wave vectors from their Gaussian on every trial,
//! while the target chain moves them like any other.

use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::io::SimulationConfig;
use crate::modes::ModeBasis;
use crate::overlap::{BennettParameterFile, FreeEnergyResult, OverlapParams, OverlapSimulation};
use crate::sampling::{ChainParams, EligibleWaveVectors, MarkovChain, MovePolicy, WaveVectorMove};
use crate::system::{Configuration, HardRods1D};

/// Build the two hard-rod chains and their controller, returning the mode
/// basis alongside for the reference free energy.
pub fn build_hard_rod_overlap(config: &SimulationConfig) -> Result<(OverlapSimulation<HardRods1D>, Arc<ModeBasis>)> {
    config.validate()?;
    let n = config.num_atoms;
    let basis = Arc::new(ModeBasis::hard_rods_1d(
        n,
        config.density,
        config.temperature,
        config.harmonic_fudge,
    )?);
    info!(
        atoms = n,
        density = config.density,
        wave_vectors = basis.num_wave_vectors(),
        "Built hard-rod mode basis"
    );

    let compared = &config.compared_wave_vectors;
    let changeable = &config.changeable_wave_vectors;
    let mut target_changeable = changeable.clone();
    target_changeable.extend(compared.iter().filter(|k| !changeable.contains(k)));

    let reference_policy = MovePolicy {
        eligible: EligibleWaveVectors::Explicit(changeable.clone()),
        wave_vectors_per_trial: 1,
        resample_compared: compared.clone(),
    };
    let target_policy = MovePolicy {
        eligible: EligibleWaveVectors::Explicit(target_changeable),
        wave_vectors_per_trial: 1,
        resample_compared: Vec::new(),
    };

    let new_move = |policy: &MovePolicy| -> Result<WaveVectorMove> {
        Ok(WaveVectorMove::new(basis.clone(), policy, config.temperature)?
            .with_step_size(config.step_size, config.step_size_min, config.step_size_max))
    };
    let chain_params = ChainParams {
        temperature: config.temperature,
        target_acceptance: config.target_acceptance,
        adaptation_interval: config.adaptation_interval,
    };

    let lattice = Configuration::simple_lattice(&[n], 1.0 / config.density, 1)?;
    let model = HardRods1D::new(n, config.density);
    let reference = MarkovChain::new(
        lattice.clone(),
        new_move(&reference_policy)?,
        model,
        chain_params,
        config.seed,
    );
    let target = MarkovChain::new(
        lattice,
        new_move(&target_policy)?,
        model,
        chain_params,
        config.seed.wrapping_add(1),
    );

    let params = OverlapParams::default()
        .with_sub_steps(config.sub_block_size)
        .with_report_interval(config.report_interval)
        .with_alpha_center(config.alpha_center);
    let simulation = OverlapSimulation::new(
        basis.clone(),
        compared,
        reference,
        target,
        params,
        config.bennett_block_size,
    )?;
    Ok((simulation, basis))
}

/// Run all four phases. Step counts in `config` are MC steps per chain.
pub fn run_hard_rod_overlap(config: &SimulationConfig) -> Result<FreeEnergyResult> {
    let (mut simulation, basis) = build_hard_rod_overlap(config)?;
    let file = config.bennett_file.as_ref().map(BennettParameterFile::new);
    let sub = config.sub_block_size;

    simulation.init_bennett_parameter(file.as_ref(), config.bennett_num_steps / sub, config.bennett_block_size)?;
    simulation.equilibrate(file.as_ref(), config.eq_num_steps / sub, config.eq_block_size)?;
    simulation.production(config.num_steps / sub, config.run_block_size)?;

    let reference_free_energy = match config.reference_free_energy {
        Some(value) => value,
        None => basis.lattice_free_energy(&[config.num_atoms], config.temperature)?,
    };
    simulation.finalize(reference_free_energy)
}

/// Exact free energy of `n` hard rods of unit length on a ring at `density`,
/// `T·(-(n-1)·ln(L - n) + ln n!)` with `L = n/density`.
pub fn exact_hard_rod_free_energy(n: usize, density: f64, temperature: f64) -> f64 {
    let box_length = n as f64 / density;
    let ln_factorial: f64 = (2..=n).map(|i| (i as f64).ln()).sum();
    temperature * (-((n - 1) as f64) * (box_length - n as f64).ln() + ln_factorial)
}
