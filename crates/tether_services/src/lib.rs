//! Tether Services Layer
//!
//! Configuration for the runtime: logging filter and the parameters of the
//! demo simulation, loaded from an optional JSON file.

pub mod settings;

pub use settings::{Settings, SettingsError, SimulationSettings};
