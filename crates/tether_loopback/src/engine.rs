// engine.rs - `NativeEcs` implementation backed by loopback worlds

use crate::world::{LoopbackStats, LoopbackWorld};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::{c_char, c_void};
use std::sync::Arc;
use tether_core::ecs::{
    ComponentTypeId, EntityId, NativeEcs, NativeStatus, RawWorld, SystemAction, SystemKind,
};

/// In-process engine speaking the same boundary as a native library.
///
/// A world handle is the address of its [`LoopbackWorld`]. Handles are
/// looked up on every call, so a finalized handle fails with
/// [`NativeStatus::InvalidWorld`] instead of dangling.
#[derive(Default)]
pub struct LoopbackEngine {
    worlds: Mutex<HashMap<usize, Arc<LoopbackWorld>>>,
}

impl LoopbackEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn world(&self, raw: RawWorld) -> Result<Arc<LoopbackWorld>, NativeStatus> {
        self.worlds
            .lock()
            .get(&(raw.as_ptr() as usize))
            .cloned()
            .ok_or(NativeStatus::InvalidWorld)
    }

    /// Number of worlds created and not yet finalized.
    pub fn live_worlds(&self) -> usize {
        self.worlds.lock().len()
    }

    pub fn stats(&self, raw: RawWorld) -> Option<LoopbackStats> {
        self.world(raw).ok().map(|w| w.stats())
    }

    pub fn parent_of(&self, raw: RawWorld, entity: EntityId) -> Option<EntityId> {
        self.world(raw).ok()?.parent_of(entity)
    }

    pub fn base_of(&self, raw: RawWorld, entity: EntityId) -> Option<EntityId> {
        self.world(raw).ok()?.base_of(entity)
    }

    /// Name the binding registered for `entity`, read back through the
    /// pointer the engine kept.
    pub fn entity_name(&self, raw: RawWorld, entity: EntityId) -> Option<String> {
        self.world(raw).ok()?.entity_name(entity)
    }

    pub fn lookup(&self, raw: RawWorld, name: &str) -> Option<EntityId> {
        self.world(raw).ok()?.lookup(name)
    }

    /// Signature expression of `system`, read back through the kept pointer.
    pub fn system_signature(&self, raw: RawWorld, system: EntityId) -> Option<String> {
        self.world(raw).ok()?.system_signature(system)
    }

    pub fn entity_count(&self, raw: RawWorld) -> Option<usize> {
        self.world(raw).ok().map(|w| w.entity_count())
    }

    pub fn threads(&self, raw: RawWorld) -> Option<u32> {
        self.world(raw).ok().map(|w| w.threads())
    }
}

impl NativeEcs for LoopbackEngine {
    fn init(&self) -> Result<RawWorld, NativeStatus> {
        let world = Arc::new(LoopbackWorld::new());
        let raw = RawWorld::from_ptr(Arc::as_ptr(&world) as *mut c_void);
        self.worlds.lock().insert(raw.as_ptr() as usize, world);
        tracing::debug!(world = ?raw.as_ptr(), "loopback world created");
        Ok(raw)
    }

    fn fini(&self, world: RawWorld) -> Result<(), NativeStatus> {
        self.worlds
            .lock()
            .remove(&(world.as_ptr() as usize))
            .ok_or(NativeStatus::InvalidWorld)?;
        tracing::debug!(world = ?world.as_ptr(), "loopback world finalized");
        Ok(())
    }

    unsafe fn new_component(
        &self,
        world: RawWorld,
        name: *const c_char,
        size: usize,
    ) -> Result<EntityId, NativeStatus> {
        self.world(world)?.new_component(name, size)
    }

    fn type_from_entity(
        &self,
        world: RawWorld,
        entity: EntityId,
    ) -> Result<ComponentTypeId, NativeStatus> {
        self.world(world)?.type_from_entity(entity)
    }

    unsafe fn new_entity_named(
        &self,
        world: RawWorld,
        name: *const c_char,
        expr: *const c_char,
    ) -> Result<EntityId, NativeStatus> {
        self.world(world)?.new_entity_named(name, expr)
    }

    unsafe fn new_type(
        &self,
        world: RawWorld,
        name: *const c_char,
        expr: *const c_char,
    ) -> Result<EntityId, NativeStatus> {
        self.world(world)?.new_type(name, expr)
    }

    unsafe fn new_prefab(
        &self,
        world: RawWorld,
        name: *const c_char,
        expr: *const c_char,
    ) -> Result<EntityId, NativeStatus> {
        self.world(world)?.new_prefab(name, expr)
    }

    fn new_w_count(
        &self,
        world: RawWorld,
        ty: Option<ComponentTypeId>,
        count: u32,
    ) -> Result<EntityId, NativeStatus> {
        self.world(world)?.new_w_count(ty, count)
    }

    fn new_child_w_count(
        &self,
        world: RawWorld,
        parent: EntityId,
        ty: Option<ComponentTypeId>,
        count: u32,
    ) -> Result<EntityId, NativeStatus> {
        self.world(world)?.new_child_w_count(parent, ty, count)
    }

    fn new_instance_w_count(
        &self,
        world: RawWorld,
        base: EntityId,
        ty: Option<ComponentTypeId>,
        count: u32,
    ) -> Result<EntityId, NativeStatus> {
        self.world(world)?.new_instance_w_count(base, ty, count)
    }

    fn add_remove(
        &self,
        world: RawWorld,
        entity: EntityId,
        add: Option<ComponentTypeId>,
        remove: Option<ComponentTypeId>,
    ) -> Result<(), NativeStatus> {
        self.world(world)?.add_remove(entity, add, remove)
    }

    fn has(
        &self,
        world: RawWorld,
        entity: EntityId,
        ty: ComponentTypeId,
    ) -> Result<bool, NativeStatus> {
        self.world(world)?.has(entity, ty)
    }

    unsafe fn set_ptr(
        &self,
        world: RawWorld,
        entity: EntityId,
        component: EntityId,
        size: usize,
        ptr: *const c_void,
    ) -> Result<(), NativeStatus> {
        self.world(world)?.set_ptr(entity, component, size, ptr)
    }

    fn get_ptr(
        &self,
        world: RawWorld,
        entity: EntityId,
        component: EntityId,
    ) -> Result<*const c_void, NativeStatus> {
        self.world(world)?.get_ptr(entity, component)
    }

    fn singleton(&self, world: RawWorld) -> Result<EntityId, NativeStatus> {
        Ok(self.world(world)?.singleton())
    }

    unsafe fn new_system(
        &self,
        world: RawWorld,
        name: *const c_char,
        kind: SystemKind,
        signature: *const c_char,
        action: SystemAction,
        ctx: *mut c_void,
    ) -> Result<EntityId, NativeStatus> {
        self.world(world)?
            .new_system(name, kind, signature, action, ctx)
    }

    fn progress(&self, world: RawWorld, delta_time: f32) -> Result<(), NativeStatus> {
        self.world(world)?.progress(world, delta_time)
    }

    fn run(&self, world: RawWorld, system: EntityId, delta_time: f32) -> Result<(), NativeStatus> {
        self.world(world)?.run(world, system, delta_time)
    }

    fn set_threads(&self, world: RawWorld, threads: u32) -> Result<(), NativeStatus> {
        self.world(world)?.set_threads(threads)
    }
}
