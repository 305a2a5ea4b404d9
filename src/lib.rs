//! Rust Overlap - harmonic-reference free energies by overlap sampling
//!
//! This crate decomposes lattice displacements into normal modes, samples
//! the real system and a hybrid system that treats selected wave vectors
//! harmonically, and combines the two with Bennett's acceptance ratio to get
//! the free-energy difference between them.

pub mod error;
pub mod logging;
pub mod modes;
pub mod system;
pub mod sampling;
pub mod overlap;
pub mod io;
pub mod driver;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use modes::{ModeBasis, ModeCoordinates, NormalModeTransform, WaveVectorFactory, WaveVectorSet};
pub use system::{Configuration, EnergyModel, HardRods1D, HarmonicModes, Snapshot, Transaction};
pub use sampling::{ChainParams, ComparisonSample, DisturbPolicy, EligibleWaveVectors, MarkovChain, ModeComparisonSampler, MovePolicy, ProposedTrial, Reinsertion, WaveVectorMove};
pub use overlap::{BennettGrid, BennettParameterFile, ChainRole, FreeEnergyResult, OverlapAccumulator, OverlapEstimator, OverlapParams, OverlapSimulation};
pub use io::{read_config, SimulationConfig};
pub use driver::{build_hard_rod_overlap, exact_hard_rod_free_energy, run_hard_rod_overlap};
