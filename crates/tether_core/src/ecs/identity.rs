//! Per-world identity cache
//!
//! Maps component shapes to the handles the native engine issued for them
//! and owns the arena of strings the engine holds pointers into. The cache
//! itself has no lock; [`World`](crate::ecs::World) keeps it behind its
//! registration mutex so the check-then-register sequence is atomic.

use crate::ecs::{
    BindError, ComponentDescriptor, ComponentHandle, ComponentKey, EntityId, NativeEcs, RawWorld,
    StringArena,
};
use std::collections::HashMap;
use std::ffi::c_char;

#[derive(Default)]
pub struct IdentityCache {
    components: HashMap<ComponentKey, ComponentHandle>,
    /// Component entities created so far, including ones whose type lookup
    /// has not succeeded yet.
    entities: HashMap<ComponentKey, EntityId>,
    /// Registered name to the shape that owns it.
    names: HashMap<String, ComponentKey>,
    strings: StringArena,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for `desc`, registering the component on a miss.
    ///
    /// A hit performs no native call. The component entity is remembered as
    /// soon as the engine creates it, so a retry after a failed type lookup
    /// does not register the component twice. A name already registered by
    /// a different shape fails with [`BindError::ComponentNameTaken`].
    pub fn resolve(
        &mut self,
        native: &dyn NativeEcs,
        world: RawWorld,
        desc: &ComponentDescriptor,
    ) -> Result<ComponentHandle, BindError> {
        if let Some(handle) = self.components.get(desc.key()) {
            return Ok(handle.clone());
        }

        desc.validate()?;
        let entity = match self.entities.get(desc.key()) {
            Some(&entity) => entity,
            None => self.register(native, world, desc)?,
        };
        let type_id = native
            .type_from_entity(world, entity)
            .map_err(|status| BindError::native("type_from_entity", status))?;

        let handle = ComponentHandle {
            entity,
            type_id,
            name: desc.name().to_owned(),
            size: desc.size(),
            align: desc.align(),
        };
        tracing::debug!(
            component = %handle.name,
            size = handle.size,
            entity = %entity,
            type_id = %type_id,
            "registered component"
        );
        self.components.insert(desc.key().clone(), handle.clone());
        Ok(handle)
    }

    fn register(
        &mut self,
        native: &dyn NativeEcs,
        world: RawWorld,
        desc: &ComponentDescriptor,
    ) -> Result<EntityId, BindError> {
        if self.names.get(desc.name()).is_some_and(|owner| owner != desc.key()) {
            return Err(BindError::ComponentNameTaken {
                name: desc.name().to_owned(),
            });
        }
        let name = self.strings.intern(desc.name())?;

        // SAFETY: `name` lives in `self.strings`, which is only cleared after
        // the native world is finalized.
        let entity = unsafe { native.new_component(world, name, desc.size()) }
            .map_err(|status| BindError::native("new_component", status))?;
        self.entities.insert(desc.key().clone(), entity);
        self.names.insert(desc.name().to_owned(), desc.key().clone());
        Ok(entity)
    }

    /// Cached handle for `key`, without registering.
    pub fn get(&self, key: &ComponentKey) -> Option<&ComponentHandle> {
        self.components.get(key)
    }

    /// Copy `text` into the arena and return its stable address.
    pub fn intern(&mut self, text: &str) -> Result<*const c_char, BindError> {
        Ok(self.strings.intern(text)?)
    }

    /// Number of component shapes registered so far.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn interned_strings(&self) -> usize {
        self.strings.len()
    }

    /// Drop every cached handle and interned string. Only valid after the
    /// native world is gone.
    pub(crate) fn clear(&mut self) {
        self.components.clear();
        self.entities.clear();
        self.names.clear();
        self.strings.clear();
    }
}
