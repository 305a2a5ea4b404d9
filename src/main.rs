use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use rust_overlap::logging::setup_logging;
use rust_overlap::{exact_hard_rod_free_energy, read_config, run_hard_rod_overlap, Result, SimulationConfig};

#[derive(Parser, Debug)]
#[command(version, about = "Free energy of 1-D hard rods by overlap sampling against a harmonic reference", long_about = None)]
struct Args {
    /// YAML run parameters; defaults are used when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Silence all logging
    #[arg(short, long)]
    quiet: bool,

    /// Seed for the random number generators
    #[arg(long)]
    seed: Option<u64>,

    /// File holding the Bennett parameter between runs
    #[arg(long)]
    bennett_file: Option<PathBuf>,
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if args.bennett_file.is_some() {
        config.bennett_file = args.bennett_file;
    }
    config.validate()?;

    println!("{} atoms at density {}", config.num_atoms, config.density);
    println!("harmonic fudge: {}", config.harmonic_fudge);
    println!("temperature: {}", config.temperature);
    println!("compared wave vectors: {:?}", config.compared_wave_vectors);
    println!("changeable wave vectors: {:?}", config.changeable_wave_vectors);
    println!("Total steps: {}, split into blocks of {}", config.num_steps, config.run_block_size);
    println!("{} steps per chain per controller step", config.sub_block_size);

    let results = run_hard_rod_overlap(&config)?;

    println!("Overlap Sampling Results");
    println!("------------------------");
    println!("Bennett parameter: {:.6e}", results.alpha);
    println!(
        "Ideal reference step fraction: {:.4} (actual: {:.4})",
        results.ideal_reference_fraction, results.reference_fraction
    );
    println!("Ratio average: {:.8} ± {:.8}", results.ratio, results.ratio_error);
    println!(
        "Reference overlap average: {:.8} ± {:.8}",
        results.reference_overlap.0, results.reference_overlap.1
    );
    println!(
        "Target overlap average: {:.8} ± {:.8}",
        results.target_overlap.0, results.target_overlap.1
    );
    println!(
        "Free energy difference: {:.8} ± {:.8}",
        results.free_energy_difference, results.free_energy_difference_error
    );
    println!("Harmonic free energy: {:.8}", results.reference_free_energy);
    println!("Target free energy: {:.8}", results.target_free_energy);
    println!(
        "Hard-rod free energy: {:.8}",
        exact_hard_rod_free_energy(config.num_atoms, config.density, config.temperature)
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = setup_logging(args.verbose, args.quiet) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
