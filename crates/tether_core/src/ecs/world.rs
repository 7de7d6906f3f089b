// world.rs - Safe owner of one native world

use crate::ecs::{
    dispatch, BindError, Component, ComponentDescriptor, ComponentHandle, ComponentTypeId,
    EntityId, IdentityCache, InternedStr, NativeEcs, NativeStatus, RawWorld, RowBatch, SystemFn,
    SystemKind, Trampoline, MAX_ARITY,
};
use parking_lot::Mutex;
use std::ffi::{c_void, CString};
use std::mem::size_of;
use std::slice;
use std::sync::Arc;
use tether_metrics::CallCounter;

/// A system registered with this world, with its pinned trampoline.
#[derive(Clone, Debug)]
pub struct RegisteredSystem {
    pub entity: EntityId,
    pub name: String,
    pub kind: SystemKind,
    pub trampoline: Arc<Trampoline>,
}

/// Registration state guarded by the world's mutex.
#[derive(Default)]
struct WorldState {
    identity: IdentityCache,
    systems: Vec<RegisteredSystem>,
    calls: CallCounter,
}

/// The binding's view of one native world.
///
/// Registration (components, systems, names) is serialized by one mutex so
/// the identity cache check-then-register is atomic. Entity operations and
/// scheduling go straight to the engine, which is responsible for its own
/// synchronization.
///
/// Teardown happens once, through [`World::fini`] or on drop. The engine is
/// finalized first; only then are the interned strings and pinned
/// trampolines released.
pub struct World {
    native: Arc<dyn NativeEcs>,
    raw: Option<RawWorld>,
    state: Mutex<WorldState>,
}

impl World {
    /// Create a world on `native`.
    pub fn new(native: Arc<dyn NativeEcs>) -> Result<Self, BindError> {
        let raw = native
            .init()
            .map_err(|status| BindError::native("init", status))?;
        tracing::debug!(world = ?raw.as_ptr(), "world created");
        Ok(Self {
            native,
            raw: Some(raw),
            state: Mutex::new(WorldState::default()),
        })
    }

    /// Native handle, or `None` after teardown.
    pub fn raw(&self) -> Option<RawWorld> {
        self.raw
    }

    pub fn native(&self) -> &Arc<dyn NativeEcs> {
        &self.native
    }

    pub fn is_live(&self) -> bool {
        self.raw.is_some()
    }

    /// Finalize the native world and release everything pinned for it.
    ///
    /// If the engine refuses, the world is still considered torn down but
    /// strings and trampolines stay pinned until the value is dropped.
    pub fn fini(&mut self) -> Result<(), BindError> {
        let raw = self.raw.take().ok_or(BindError::UnknownWorld)?;
        self.native
            .fini(raw)
            .map_err(|status| BindError::native("fini", status))?;

        let state = self.state.get_mut();
        tracing::debug!(
            components = state.identity.len(),
            systems = state.systems.len(),
            "world finalized"
        );
        state.systems.clear();
        state.identity.clear();
        Ok(())
    }

    fn handle(&self) -> Result<RawWorld, BindError> {
        self.raw.ok_or(BindError::UnknownWorld)
    }

    // ========================================================================
    // Identity cache
    // ========================================================================

    /// World-scoped type id for `desc`, registering it on first use.
    pub fn resolve_component_id(
        &self,
        desc: &ComponentDescriptor,
    ) -> Result<ComponentTypeId, BindError> {
        self.component_handle(desc).map(|handle| handle.type_id)
    }

    /// Full handle for `desc`, registering it on first use.
    pub fn component_handle(&self, desc: &ComponentDescriptor) -> Result<ComponentHandle, BindError> {
        let raw = self.handle()?;
        let mut state = self.state.lock();
        let known = state.identity.len();
        let handle = state.identity.resolve(self.native.as_ref(), raw, desc)?;
        if state.identity.len() > known {
            tether_metrics::metrics! {
                state.calls.record("new_component");
            }
        }
        Ok(handle)
    }

    /// `ECS_COMPONENT`: type id for a Rust component.
    pub fn component<T: Component>(&self) -> Result<ComponentTypeId, BindError> {
        self.resolve_component_id(&ComponentDescriptor::of::<T>())
    }

    /// Copy `text` into the world's arena.
    ///
    /// The returned string stays valid and unmoved until teardown, which
    /// needs `&mut self` and so cannot overlap the borrow.
    pub fn intern_string(&self, text: &str) -> Result<InternedStr<'_>, BindError> {
        self.handle()?;
        let ptr = self.state.lock().identity.intern(text)?;
        // SAFETY: the arena is only cleared by `fini(&mut self)`.
        Ok(unsafe { InternedStr::from_arena(ptr) })
    }

    /// Component shapes registered so far.
    pub fn component_count(&self) -> usize {
        self.state.lock().identity.len()
    }

    /// Native calls of `name` made by this world. Always zero without the
    /// `metrics` feature.
    pub fn native_calls(&self, name: &str) -> u64 {
        self.state.lock().calls.get(name)
    }

    // ========================================================================
    // Systems
    // ========================================================================

    /// Resolve the column types of `callback` and wrap it for dispatch.
    pub fn build_trampoline<M, F: SystemFn<M>>(&self, callback: F) -> Result<Trampoline, BindError> {
        let descriptors = F::descriptors();
        let columns = self.resolve_columns(&descriptors)?;
        Ok(Trampoline::new(
            columns,
            Box::new(move |batch: &mut RowBatch<'_>| callback.call(batch)),
        ))
    }

    /// Wrap a callback that fetches its own columns from the batch.
    pub fn build_untyped_trampoline<F>(
        &self,
        columns: &[ComponentDescriptor],
        callback: F,
    ) -> Result<Trampoline, BindError>
    where
        F: Fn(&mut RowBatch<'_>) -> Result<(), BindError> + Send + Sync + 'static,
    {
        let columns = self.resolve_columns(columns)?;
        Ok(Trampoline::new(columns, Box::new(callback)))
    }

    fn resolve_columns(
        &self,
        descriptors: &[ComponentDescriptor],
    ) -> Result<Vec<ComponentHandle>, BindError> {
        let arity = descriptors.len();
        if arity == 0 || arity > MAX_ARITY {
            return Err(BindError::UnsupportedArity {
                arity,
                max: MAX_ARITY,
            });
        }
        descriptors
            .iter()
            .map(|desc| self.component_handle(desc))
            .collect()
    }

    /// Register `trampoline` as system `name` matching `signature`.
    pub fn register_system(
        &self,
        name: &str,
        kind: SystemKind,
        signature: &str,
        trampoline: Trampoline,
    ) -> Result<EntityId, BindError> {
        let raw = self.handle()?;
        let mut state = self.state.lock();
        let name_ptr = state.identity.intern(name)?;
        let signature_ptr = state.identity.intern(signature)?;

        let trampoline = Arc::new(trampoline);
        let ctx = Arc::as_ptr(&trampoline) as *mut c_void;

        // SAFETY: both strings live in the arena and `ctx` is kept alive by
        // `state.systems` until after the engine is finalized.
        let entity = unsafe {
            self.native
                .new_system(raw, name_ptr, kind, signature_ptr, dispatch, ctx)
        }
        .map_err(|status| match status {
            NativeStatus::DuplicateName => BindError::DuplicateSystemName {
                name: name.to_owned(),
            },
            status => BindError::native("new_system", status),
        })?;

        tether_metrics::metrics! {
            state.calls.record("new_system");
        }
        tracing::debug!(
            system = name,
            %kind,
            signature,
            entity = %entity,
            "registered system"
        );
        state.systems.push(RegisteredSystem {
            entity,
            name: name.to_owned(),
            kind,
            trampoline,
        });
        Ok(entity)
    }

    /// `ECS_SYSTEM`: build and register a typed system. The signature names
    /// the column components in declaration order.
    pub fn system<M, F: SystemFn<M>>(
        &self,
        name: &str,
        kind: SystemKind,
        callback: F,
    ) -> Result<EntityId, BindError> {
        let trampoline = self.build_trampoline(callback)?;
        let signature = trampoline.signature();
        self.register_system(name, kind, &signature, trampoline)
    }

    /// Systems registered so far, in registration order.
    pub fn systems(&self) -> Vec<RegisteredSystem> {
        self.state.lock().systems.clone()
    }

    /// Pinned trampoline of `system`.
    pub fn trampoline(&self, system: EntityId) -> Option<Arc<Trampoline>> {
        self.state
            .lock()
            .systems
            .iter()
            .find(|s| s.entity == system)
            .map(|s| s.trampoline.clone())
    }

    // ========================================================================
    // Entities
    // ========================================================================

    pub fn new_entity(&self, ty: Option<ComponentTypeId>) -> Result<EntityId, BindError> {
        self.new_w_count(ty, 1)
    }

    /// New entity with the single component `T`, zero-initialized.
    pub fn new_entity_of<T: Component>(&self) -> Result<EntityId, BindError> {
        let ty = self.component::<T>()?;
        self.new_entity(Some(ty))
    }

    /// Create `count` entities of type `ty`; returns the first id.
    pub fn new_w_count(&self, ty: Option<ComponentTypeId>, count: u32) -> Result<EntityId, BindError> {
        let raw = self.handle()?;
        self.native
            .new_w_count(raw, ty, count)
            .map_err(|status| BindError::native("new_w_count", status))
    }

    pub fn new_child(
        &self,
        parent: EntityId,
        ty: Option<ComponentTypeId>,
    ) -> Result<EntityId, BindError> {
        self.new_child_w_count(parent, ty, 1)
    }

    pub fn new_child_w_count(
        &self,
        parent: EntityId,
        ty: Option<ComponentTypeId>,
        count: u32,
    ) -> Result<EntityId, BindError> {
        let raw = self.handle()?;
        let parent = non_null(parent)?;
        self.native
            .new_child_w_count(raw, parent, ty, count)
            .map_err(|status| BindError::native("new_child_w_count", status))
    }

    pub fn new_instance(
        &self,
        base: EntityId,
        ty: Option<ComponentTypeId>,
    ) -> Result<EntityId, BindError> {
        self.new_instance_w_count(base, ty, 1)
    }

    /// Create `count` entities inheriting the components of `base`.
    pub fn new_instance_w_count(
        &self,
        base: EntityId,
        ty: Option<ComponentTypeId>,
        count: u32,
    ) -> Result<EntityId, BindError> {
        let raw = self.handle()?;
        let base = non_null(base)?;
        self.native
            .new_instance_w_count(raw, base, ty, count)
            .map_err(|status| BindError::native("new_instance_w_count", status))
    }

    pub fn has(&self, entity: EntityId, ty: ComponentTypeId) -> Result<bool, BindError> {
        let raw = self.handle()?;
        let entity = non_null(entity)?;
        self.native
            .has(raw, entity, ty)
            .map_err(|status| BindError::native("has", status))
    }

    pub fn has_component<T: Component>(&self, entity: EntityId) -> Result<bool, BindError> {
        let ty = self.component::<T>()?;
        self.has(entity, ty)
    }

    pub fn add(&self, entity: EntityId, ty: ComponentTypeId) -> Result<(), BindError> {
        self.add_remove(entity, Some(ty), None)
    }

    pub fn remove(&self, entity: EntityId, ty: ComponentTypeId) -> Result<(), BindError> {
        self.add_remove(entity, None, Some(ty))
    }

    /// Add `add` and remove `remove` in one structural change.
    pub fn add_remove(
        &self,
        entity: EntityId,
        add: Option<ComponentTypeId>,
        remove: Option<ComponentTypeId>,
    ) -> Result<(), BindError> {
        let raw = self.handle()?;
        let entity = non_null(entity)?;
        self.native
            .add_remove(raw, entity, add, remove)
            .map_err(|status| BindError::native("add_remove", status))
    }

    /// Write `value` into `entity`, adding `T` first when missing.
    pub fn set<T: Component>(&self, entity: EntityId, value: T) -> Result<(), BindError> {
        let raw = self.handle()?;
        let entity = non_null(entity)?;
        let handle = self.component_handle(&ComponentDescriptor::of::<T>())?;
        let ptr = &value as *const T as *const c_void;
        // SAFETY: `ptr` is readable for `size_of::<T>()` bytes.
        unsafe {
            self.native
                .set_ptr(raw, entity, handle.entity, size_of::<T>(), ptr)
        }
        .map_err(|status| BindError::native("set", status))
    }

    /// Copy of `T` on `entity`, or `None` when absent.
    pub fn get<T: Component>(&self, entity: EntityId) -> Result<Option<T>, BindError> {
        let raw = self.handle()?;
        let entity = non_null(entity)?;
        let handle = self.component_handle(&ComponentDescriptor::of::<T>())?;
        let ptr = self
            .native
            .get_ptr(raw, entity, handle.entity)
            .map_err(|status| BindError::native("get", status))?;
        if ptr.is_null() {
            return Ok(None);
        }
        // SAFETY: the engine returned the address of a live `T`-sized value;
        // it is copied out before any further call into the engine.
        let bytes = unsafe { slice::from_raw_parts(ptr as *const u8, size_of::<T>()) };
        Ok(Some(bytemuck::pod_read_unaligned(bytes)))
    }

    pub fn set_singleton<T: Component>(&self, value: T) -> Result<(), BindError> {
        let singleton = self.singleton()?;
        self.set(singleton, value)
    }

    pub fn get_singleton<T: Component>(&self) -> Result<Option<T>, BindError> {
        let singleton = self.singleton()?;
        self.get(singleton)
    }

    fn singleton(&self) -> Result<EntityId, BindError> {
        let raw = self.handle()?;
        self.native
            .singleton(raw)
            .map_err(|status| BindError::native("singleton", status))
    }

    /// `ECS_ENTITY`: named entity with the components listed in `expr`.
    pub fn entity(&self, name: &str, expr: &str) -> Result<EntityId, BindError> {
        self.named("new_entity", name, expr, |native, raw, name, expr| unsafe {
            native.new_entity_named(raw, name, expr)
        })
    }

    /// `ECS_PREFAB`: named prefab with the components listed in `expr`.
    pub fn prefab(&self, name: &str, expr: &str) -> Result<EntityId, BindError> {
        self.named("new_prefab", name, expr, |native, raw, name, expr| unsafe {
            native.new_prefab(raw, name, expr)
        })
    }

    /// `ECS_TYPE`: named set of components usable wherever a single type id
    /// is accepted.
    pub fn type_set(&self, name: &str, expr: &str) -> Result<ComponentTypeId, BindError> {
        let entity = self.named("new_type", name, expr, |native, raw, name, expr| unsafe {
            native.new_type(raw, name, expr)
        })?;
        self.type_of(entity)
    }

    /// `ECS_TAG`: zero-sized component.
    pub fn tag(&self, name: &str) -> Result<ComponentTypeId, BindError> {
        let raw = self.handle()?;
        let entity = {
            let mut state = self.state.lock();
            let name_ptr = state.identity.intern(name)?;
            // SAFETY: the name lives in the arena until teardown.
            unsafe { self.native.new_component(raw, name_ptr, 0) }
                .map_err(|status| BindError::native("new_tag", status))?
        };
        tracing::debug!(tag = name, entity = %entity, "registered tag");
        self.type_of(entity)
    }

    fn type_of(&self, entity: EntityId) -> Result<ComponentTypeId, BindError> {
        let raw = self.handle()?;
        self.native
            .type_from_entity(raw, entity)
            .map_err(|status| BindError::native("type_from_entity", status))
    }

    fn named<F>(
        &self,
        operation: &'static str,
        name: &str,
        expr: &str,
        create: F,
    ) -> Result<EntityId, BindError>
    where
        F: FnOnce(
            &dyn NativeEcs,
            RawWorld,
            *const std::ffi::c_char,
            *const std::ffi::c_char,
        ) -> Result<EntityId, NativeStatus>,
    {
        let raw = self.handle()?;
        let expr = CString::new(expr)?;
        let mut state = self.state.lock();
        let name_ptr = state.identity.intern(name)?;
        create(self.native.as_ref(), raw, name_ptr, expr.as_ptr())
            .map_err(|status| BindError::native(operation, status))
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Run every tick-driven system once.
    pub fn progress(&self, delta_time: f32) -> Result<(), BindError> {
        let raw = self.handle()?;
        self.native
            .progress(raw, delta_time)
            .map_err(|status| BindError::native("progress", status))
    }

    /// Run one system once, typically a [`SystemKind::Manual`] one.
    pub fn run(&self, system: EntityId, delta_time: f32) -> Result<(), BindError> {
        let raw = self.handle()?;
        let system = non_null(system)?;
        self.native
            .run(raw, system, delta_time)
            .map_err(|status| BindError::native("run", status))
    }

    pub fn set_threads(&self, threads: u32) -> Result<(), BindError> {
        let raw = self.handle()?;
        self.native
            .set_threads(raw, threads)
            .map_err(|status| BindError::native("set_threads", status))
    }
}

impl Drop for World {
    fn drop(&mut self) {
        if self.raw.is_some() {
            if let Err(err) = self.fini() {
                tracing::warn!(error = %err, "world teardown failed");
            }
        }
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("raw", &self.raw)
            .field("components", &self.component_count())
            .finish()
    }
}

fn non_null(entity: EntityId) -> Result<EntityId, BindError> {
    if entity.is_null() {
        Err(BindError::InvalidHandle { entity })
    } else {
        Ok(entity)
    }
}
