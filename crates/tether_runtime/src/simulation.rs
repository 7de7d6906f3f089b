//! Movement demo: `Position += Velocity * dt` over a configurable number of
//! entities and ticks.

use anyhow::{ensure, Context, Result};
use bytemuck::{Pod, Zeroable};
use std::sync::Arc;
use tether_core::ecs::{BatchInfo, EntityId, SystemKind, World};
use tether_core::{define_component, ecs_system};
use tether_loopback::LoopbackEngine;
use tether_metrics::TickTimer;
use tether_services::SimulationSettings;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}
define_component!(Position);

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Velocity {
    pub x: f64,
    pub y: f64,
}
define_component!(Velocity);

fn integrate(info: &BatchInfo<'_>, positions: &mut [Position], velocities: &mut [Velocity]) {
    let dt = info.delta_time as f64;
    for (p, v) in positions.iter_mut().zip(velocities.iter()) {
        p.x += v.x * dt;
        p.y += v.y * dt;
    }
}

#[derive(Debug)]
pub struct Report {
    pub ticks: u64,
    pub entities: u32,
    pub batches: u64,
    pub tick_time_ms: f64,
    pub first_position: Option<Position>,
}

pub fn run(settings: &SimulationSettings) -> Result<Report> {
    let engine = Arc::new(LoopbackEngine::new());
    let world = World::new(engine.clone()).context("failed to create world")?;
    world.set_threads(settings.threads)?;

    // Type expressions can only name components the world already knows.
    let system = ecs_system!(world, integrate, settings.move_kind)?;

    let moving = world.type_set("Moving", "Position, Velocity")?;
    let first = world.new_w_count(Some(moving), settings.entities)?;
    for i in 0..settings.entities as u64 {
        let entity = EntityId::from_raw(first.raw() + i);
        world.set(entity, Velocity { x: 1.0, y: (i % 7) as f64 })?;
    }

    tracing::info!(
        system = %system,
        kind = %settings.move_kind,
        entities = settings.entities,
        "simulation ready"
    );

    let mut timer = TickTimer::new(60);
    for _ in 0..settings.ticks {
        timer.begin();
        if settings.move_kind == SystemKind::Manual {
            world.run(system, settings.delta_time)?;
        } else {
            world.progress(settings.delta_time)?;
        }
        timer.end();
    }

    let failures = world
        .trampoline(system)
        .map(|t| t.failures())
        .unwrap_or_default();
    ensure!(failures == 0, "{failures} system invocations failed");

    let first_position = if settings.entities > 0 {
        world.get::<Position>(first)?
    } else {
        None
    };
    let batches = world
        .raw()
        .and_then(|raw| engine.stats(raw))
        .map(|s| s.batches_dispatched)
        .unwrap_or_default();

    Ok(Report {
        ticks: timer.ticks(),
        entities: settings.entities,
        batches,
        tick_time_ms: timer.tick_time_ms(),
        first_position,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(kind: SystemKind, threads: u32) -> SimulationSettings {
        SimulationSettings {
            ticks: 10,
            delta_time: 0.5,
            entities: 16,
            threads,
            move_kind: kind,
        }
    }

    #[test]
    fn positions_advance_each_tick() {
        let report = run(&settings(SystemKind::OnUpdate, 1)).unwrap();
        assert_eq!(report.ticks, 10);
        assert_eq!(report.first_position, Some(Position { x: 5.0, y: 0.0 }));
        assert_eq!(report.batches, 10);
    }

    #[test]
    fn manual_systems_run_explicitly() {
        let report = run(&settings(SystemKind::Manual, 1)).unwrap();
        assert_eq!(report.first_position, Some(Position { x: 5.0, y: 0.0 }));
    }

    #[test]
    fn threaded_dispatch_matches_serial() {
        let report = run(&settings(SystemKind::PreUpdate, 4)).unwrap();
        assert_eq!(report.first_position, Some(Position { x: 5.0, y: 0.0 }));
        assert_eq!(report.batches, 40);
    }
}
