use crate::scheduler::SchedulerConfig;
use crate::session::{ParticleOptions, SessionOptions};
use anyhow::{Context, Result};
use ethnosim_core::SimulationConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Everything a `--config` file may set. Missing sections take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub simulation: SimulationConfig,
    pub scheduler: SchedulerConfig,
    pub particles: Option<ParticleOptions>,
}

impl AppConfig {
    /// Read and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config
            .simulation
            .validate()
            .with_context(|| format!("invalid simulation config in {}", path.display()))?;
        Ok(config)
    }

    #[must_use]
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            simulation: self.simulation.clone(),
            scheduler: self.scheduler,
            particles: self.particles.clone(),
        }
    }
}
