//! Modes module - normal-mode basis, wave vectors and the coordinate transform.

mod basis;
mod transform;
mod wave_vectors;

pub use basis::{ModeBasis, ModeCoordinates};
pub use transform::NormalModeTransform;
pub use wave_vectors::{WaveVectorFactory, WaveVectorSet};
