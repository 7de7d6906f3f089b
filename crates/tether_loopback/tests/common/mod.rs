#![allow(dead_code)]

use bytemuck::{Pod, Zeroable};
use std::sync::Arc;
use tether_core::define_component;
use tether_core::ecs::{RawWorld, World};
use tether_loopback::{LoopbackEngine, LoopbackStats};

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

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Mass(pub f32);
define_component!(Mass);

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Gravity {
    pub y: f64,
}
define_component!(Gravity);

pub fn world() -> (Arc<LoopbackEngine>, World) {
    let engine = Arc::new(LoopbackEngine::new());
    let world = World::new(engine.clone()).expect("loopback init never fails");
    (engine, world)
}

pub fn raw(world: &World) -> RawWorld {
    world.raw().expect("world is live")
}

pub fn stats(engine: &LoopbackEngine, world: &World) -> LoopbackStats {
    engine.stats(raw(world)).expect("world is registered")
}
