//! Hard rods on a periodic line.

use super::configuration::Configuration;
use super::traits::EnergyModel;

/// Rods of diameter `diameter` on a ring of length `box_length`.
///
/// The energy is zero unless two neighbours overlap or swap order, in which
/// case it is infinite. Cells are assumed to be listed in lattice order.
#[derive(Clone, Copy, Debug)]
pub struct HardRods1D {
    pub box_length: f64,
    pub diameter: f64,
}

impl HardRods1D {
    /// `n_rods` unit-diameter rods at the given number density.
    pub fn new(n_rods: usize, density: f64) -> Self {
        Self {
            box_length: n_rods as f64 / density,
            diameter: 1.0,
        }
    }

    fn position(config: &Configuration, rod: usize) -> f64 {
        config.cell_position(rod)[0] + config.displacement(rod)[0]
    }
}

impl EnergyModel for HardRods1D {
    fn energy(&self, config: &Configuration) -> f64 {
        let n = config.num_cells();
        for i in 0..n {
            let x = Self::position(config, i);
            let gap = if i + 1 < n {
                Self::position(config, i + 1) - x
            } else {
                Self::position(config, 0) + self.box_length - x
            };
            if gap < self.diameter {
                return f64::INFINITY;
            }
        }
        0.0
    }
}
