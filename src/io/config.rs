//! Run parameters for the hard-rod overlap driver, read from YAML.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Every field has a default, so a YAML file only needs the values it changes.
///
/// Step counts are MC steps per chain; they are divided by
/// `sub_block_size` to get controller steps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub num_atoms: usize,
    pub density: f64,
    pub temperature: f64,
    pub harmonic_fudge: f64,
    /// Wave vectors treated harmonically in the reference system.
    pub compared_wave_vectors: Vec<usize>,
    /// Wave vectors moved by both chains.
    pub changeable_wave_vectors: Vec<usize>,

    pub num_steps: u64,
    pub run_block_size: usize,
    pub sub_block_size: u64,
    pub eq_num_steps: u64,
    pub eq_block_size: usize,
    pub bennett_num_steps: u64,
    pub bennett_block_size: usize,

    pub seed: u64,
    pub bennett_file: Option<PathBuf>,
    /// Centre of the initial α search.
    pub alpha_center: f64,
    pub step_size: f64,
    pub step_size_min: f64,
    pub step_size_max: f64,
    pub target_acceptance: f64,
    pub adaptation_interval: u64,
    /// Controller steps between progress reports during production; 0 disables them.
    pub report_interval: u64,
    /// Free energy of the reference system. Computed from the harmonic
    /// basis when absent.
    pub reference_free_energy: Option<f64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_atoms: 32,
            density: 0.5,
            temperature: 1.0,
            harmonic_fudge: 1.0,
            compared_wave_vectors: vec![2],
            changeable_wave_vectors: vec![1],
            num_steps: 4_000_000,
            run_block_size: 100_000,
            sub_block_size: 1000,
            eq_num_steps: 40_000,
            eq_block_size: 1000,
            bennett_num_steps: 40_000,
            bennett_block_size: 1000,
            seed: 0,
            bennett_file: None,
            alpha_center: 1.0,
            step_size: 0.01,
            step_size_min: 0.001,
            step_size_max: 10.0,
            target_acceptance: 0.5,
            adaptation_interval: 100,
            report_interval: 0,
            reference_free_energy: None,
        }
    }
}

impl SimulationConfig {
    /// Reject values no run could use.
    pub fn validate(&self) -> Result<()> {
        if self.sub_block_size == 0 {
            return Err(Error::Config("sub_block_size must be at least 1".into()));
        }
        if self.adaptation_interval == 0 {
            return Err(Error::Config("adaptation_interval must be at least 1".into()));
        }
        if !(self.temperature > 0.0) {
            return Err(Error::Config(format!("temperature must be positive, got {}", self.temperature)));
        }
        if !(self.target_acceptance > 0.0 && self.target_acceptance < 1.0) {
            return Err(Error::Config(format!(
                "target_acceptance must lie in (0, 1), got {}",
                self.target_acceptance
            )));
        }
        if !(self.step_size_min > 0.0 && self.step_size_min <= self.step_size_max) {
            return Err(Error::Config(format!(
                "step size bounds [{}, {}] are not usable",
                self.step_size_min, self.step_size_max
            )));
        }
        if [self.run_block_size, self.eq_block_size, self.bennett_block_size].contains(&0) {
            return Err(Error::Config("block sizes must be at least 1".into()));
        }
        Ok(())
    }
}

pub fn read_config(path: impl AsRef<Path>) -> Result<SimulationConfig> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);
    let config: SimulationConfig = serde_yaml::from_reader(reader)?;
    config.validate()?;
    Ok(config)
}

// example of yaml file
// num_atoms: 32
// density: 0.5
// compared_wave_vectors: [2]
// changeable_wave_vectors: [1]
// num_steps: 4000000
// bennett_file: HR1D_alpha

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = SimulationConfig::default();
        assert_eq!(config.num_atoms, 32);
        assert_eq!(config.density, 0.5);
        assert_eq!(config.compared_wave_vectors, vec![2]);
        assert_eq!(config.changeable_wave_vectors, vec![1]);
        assert_eq!(config.num_steps, 4_000_000);
        assert_eq!(config.sub_block_size, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "num_atoms: 16\ndensity: 0.7\ncompared_wave_vectors: [3, 4]\nbennett_file: alpha.txt").unwrap();
        let config = read_config(file.path()).unwrap();
        assert_eq!(config.num_atoms, 16);
        assert_eq!(config.density, 0.7);
        assert_eq!(config.compared_wave_vectors, vec![3, 4]);
        assert_eq!(config.bennett_file, Some(PathBuf::from("alpha.txt")));
        assert_eq!(config.temperature, 1.0);
        assert_eq!(config.eq_block_size, 1000);
    }

    #[test]
    fn test_invalid_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sub_block_size: 0").unwrap();
        assert!(matches!(read_config(file.path()), Err(Error::Config(_))));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "density: [1, 2]").unwrap();
        assert!(matches!(read_config(file.path()), Err(Error::Yaml(_))));

        assert!(matches!(read_config("/nonexistent/config.yml"), Err(Error::Io(_))));
    }
}
