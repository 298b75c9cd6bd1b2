//! Simulation-wide configuration flags.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for a simulation run.
///
/// Stored in the [`EntityContext`](crate::entity::EntityContext) and read-only
/// for the lifetime of the run. Missing TOML fields fall back to the defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Skip the GEN1 multi-channel / module adjacency check.
    pub disable_module_restrictions: bool,

    /// Residual volume (uL) a tip may carry into contact with a different
    /// liquid before a mixing warning is raised.
    pub mixing_residual_threshold_ul: f64,

    /// Tolerance (uL) used when comparing volumes.
    pub volume_tolerance_ul: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            disable_module_restrictions: false,
            mixing_residual_threshold_ul: 1.0,
            volume_tolerance_ul: 1e-6,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mixing_residual_threshold_ul.is_nan() || self.mixing_residual_threshold_ul < 0.0 {
            return Err(ConfigError::Invalid(
                "mixing_residual_threshold_ul must be >= 0".to_string(),
            ));
        }
        if !self.volume_tolerance_ul.is_finite() || self.volume_tolerance_ul < 0.0 {
            return Err(ConfigError::Invalid(
                "volume_tolerance_ul must be a finite value >= 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Parses and validates a config from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let cfg: SimulationConfig = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }
}
