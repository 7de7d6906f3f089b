//! Tether Runtime
//!
//! Boots a world on the loopback engine and runs the movement demo.
//!
//! ```text
//! tether [settings.json]
//! ```

mod simulation;

use anyhow::{Context, Result};
use tether_services::Settings;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let settings = match std::env::args().nth(1) {
        Some(path) => Settings::load(&path)
            .with_context(|| format!("failed to load settings from {path}"))?,
        None => Settings::default(),
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Tether v{}", tether_core::VERSION);
    let report = simulation::run(&settings.simulation)?;
    tracing::info!(
        ticks = report.ticks,
        entities = report.entities,
        batches = report.batches,
        tick_ms = %format!("{:.3}", report.tick_time_ms),
        "simulation finished"
    );
    if let Some(first) = report.first_position {
        tracing::info!(x = first.x, y = first.y, "first entity position");
    }
    Ok(())
}
