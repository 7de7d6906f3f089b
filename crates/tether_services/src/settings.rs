//! Settings management

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tether_core::ecs::SystemKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to access settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid setting '{field}': {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Runtime settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// `tracing_subscriber::EnvFilter` directive, e.g. `"info,tether_core=debug"`.
    pub log_filter: String,
    pub simulation: SimulationSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Number of `progress` calls to run.
    pub ticks: u32,
    /// Seconds passed to each `progress` call.
    pub delta_time: f32,
    /// Entities spawned with `Position` and `Velocity`.
    pub entities: u32,
    /// Worker threads the engine may use for dispatch.
    pub threads: u32,
    /// Phase the movement system is registered in.
    pub move_kind: SystemKind,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_filter: "info".to_owned(),
            simulation: SimulationSettings::default(),
        }
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            ticks: 60,
            delta_time: 1.0 / 60.0,
            entities: 1024,
            threads: 1,
            move_kind: SystemKind::OnUpdate,
        }
    }
}

impl Settings {
    /// Load and validate settings from a JSON file. Missing fields take their
    /// defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let settings = Self::from_json(&text)?;
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let sim = &self.simulation;
        if !(sim.delta_time.is_finite() && sim.delta_time > 0.0) {
            return Err(SettingsError::Invalid {
                field: "simulation.delta_time",
                reason: "must be a positive number of seconds",
            });
        }
        if sim.threads == 0 {
            return Err(SettingsError::Invalid {
                field: "simulation.threads",
                reason: "must be at least 1",
            });
        }
        if sim.move_kind.is_reactive() {
            return Err(SettingsError::Invalid {
                field: "simulation.move_kind",
                reason: "must be a tick phase or Manual",
            });
        }
        Ok(())
    }
}
