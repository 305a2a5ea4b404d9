//! Sampling module - normal-mode Monte Carlo moves, harmonic comparison
//! measurements and the Markov chain that drives them.

mod chain;
mod comparison;
mod wave_vector_move;

pub use chain::{ChainParams, MarkovChain};
pub use comparison::{ComparisonSample, DisturbPolicy, ModeComparisonSampler, Reinsertion};
pub use wave_vector_move::{
    EligibleWaveVectors, MovePolicy, MoveStats, ProposedTrial, WaveVectorChange, WaveVectorMove,
};
