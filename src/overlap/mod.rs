//! Overlap module - Bennett overlap sampling between a harmonic reference
//! and the full system.

mod accumulator;
mod bennett_file;
mod controller;
mod estimator;

pub use accumulator::{overlap_value, BennettGrid, BlockAverage, ChainRole, OverlapAccumulator};
pub use bennett_file::BennettParameterFile;
pub use controller::{FreeEnergyResult, OverlapParams, OverlapSimulation};
pub use estimator::{validate_alpha, OverlapEstimator};
