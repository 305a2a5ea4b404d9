//! System module - configurations and the energy models that score them.

mod configuration;
mod hard_rods;
mod harmonic;
mod traits;

pub use configuration::{CellView, Configuration, Snapshot, Transaction};
pub use hard_rods::HardRods1D;
pub use harmonic::HarmonicModes;
pub use traits::EnergyModel;
