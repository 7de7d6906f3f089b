//! The native engine boundary
//!
//! Everything the binding needs from the engine is expressed by the
//! [`NativeEcs`] trait plus a handful of `#[repr(C)]` types that cross the
//! boundary unchanged. Strings and callbacks are passed as raw pointers
//! because the engine stores the addresses, not copies.

use crate::ecs::{ComponentTypeId, EntityId, SystemKind};
use std::ffi::{c_char, c_void};
use std::ptr;
use thiserror::Error;

/// Opaque handle to one native world.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RawWorld(*mut c_void);

// SAFETY: the handle is an opaque token. Every dereference happens inside a
// `NativeEcs` implementation, which is itself `Send + Sync`.
unsafe impl Send for RawWorld {}
unsafe impl Sync for RawWorld {}

impl RawWorld {
    pub const fn from_ptr(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    pub const fn as_ptr(self) -> *mut c_void {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

/// Entry point the engine calls once per matched batch.
pub type SystemAction = unsafe extern "C" fn(rows: *mut RawRows);

/// One batch of matched rows, laid out the way the engine hands it over.
///
/// `columns` and `column_sizes` both hold `column_count` entries; column `k`
/// of the system signature lives at index `k - 1`. `ctx` is the context
/// pointer supplied when the system was registered.
#[repr(C)]
#[derive(Debug)]
pub struct RawRows {
    pub world: RawWorld,
    pub system: EntityId,
    pub ctx: *mut c_void,
    pub delta_time: f32,
    pub count: u32,
    pub entities: *const EntityId,
    pub column_count: u32,
    pub columns: *const *mut c_void,
    pub column_sizes: *const usize,
}

impl RawRows {
    /// Element size the engine used to lay out column `index` (1-based).
    ///
    /// # Safety
    /// `column_sizes` must point to `column_count` readable entries.
    pub unsafe fn column_size(&self, index: u32) -> Option<usize> {
        if index == 0 || index > self.column_count || self.column_sizes.is_null() {
            return None;
        }
        Some(*self.column_sizes.add(index as usize - 1))
    }

    /// Base pointer of column `index` (1-based) for elements of `size` bytes.
    ///
    /// Returns null when the index is out of range or the engine laid the
    /// column out with a different element size.
    ///
    /// # Safety
    /// `columns` and `column_sizes` must point to `column_count` readable
    /// entries.
    pub unsafe fn column_ptr(&self, index: u32, size: usize) -> *mut c_void {
        match self.column_size(index) {
            Some(actual) if actual == size && !self.columns.is_null() => {
                *self.columns.add(index as usize - 1)
            }
            _ => ptr::null_mut(),
        }
    }
}

/// Status codes the engine reports when it refuses an operation.
#[repr(i32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Error)]
pub enum NativeStatus {
    #[error("world handle is not live")]
    InvalidWorld = 1,
    #[error("entity is not alive")]
    InvalidEntity = 2,
    #[error("type handle is not known")]
    UnknownType = 3,
    #[error("signature expression could not be parsed")]
    InvalidExpression = 4,
    #[error("name is already taken")]
    DuplicateName = 5,
    #[error("system kind is not supported")]
    UnsupportedKind = 6,
    #[error("world is locked while systems run")]
    WorldLocked = 7,
    #[error("element size does not match the registered component size")]
    SizeMismatch = 8,
}

/// Operations the binding invokes on the native engine.
///
/// Methods taking string pointers are `unsafe`: the engine keeps the
/// addresses, so the caller must keep the bytes alive and unmoved until the
/// world is finalized.
pub trait NativeEcs: Send + Sync {
    /// Create a world.
    fn init(&self) -> Result<RawWorld, NativeStatus>;

    /// Destroy a world. No callback registered on it is invoked afterwards.
    fn fini(&self, world: RawWorld) -> Result<(), NativeStatus>;

    /// Create a component entity whose instances occupy `size` bytes.
    /// A size of zero creates a tag.
    ///
    /// # Safety
    /// `name` must be null or a NUL-terminated string alive until `fini`.
    unsafe fn new_component(
        &self,
        world: RawWorld,
        name: *const c_char,
        size: usize,
    ) -> Result<EntityId, NativeStatus>;

    /// Type handle describing `entity` (a component, tag or type entity).
    fn type_from_entity(
        &self,
        world: RawWorld,
        entity: EntityId,
    ) -> Result<ComponentTypeId, NativeStatus>;

    /// Create a named entity with the components listed in `expr`.
    ///
    /// # Safety
    /// `name` must be a NUL-terminated string alive until `fini`; `expr`
    /// must be NUL-terminated for the duration of the call.
    unsafe fn new_entity_named(
        &self,
        world: RawWorld,
        name: *const c_char,
        expr: *const c_char,
    ) -> Result<EntityId, NativeStatus>;

    /// Create a named type entity grouping the components listed in `expr`.
    ///
    /// # Safety
    /// Same as [`NativeEcs::new_entity_named`].
    unsafe fn new_type(
        &self,
        world: RawWorld,
        name: *const c_char,
        expr: *const c_char,
    ) -> Result<EntityId, NativeStatus>;

    /// Create a named prefab with the components listed in `expr`.
    ///
    /// # Safety
    /// Same as [`NativeEcs::new_entity_named`].
    unsafe fn new_prefab(
        &self,
        world: RawWorld,
        name: *const c_char,
        expr: *const c_char,
    ) -> Result<EntityId, NativeStatus>;

    /// Create `count` entities with type `ty`. Returns the first id; the
    /// rest follow consecutively.
    fn new_w_count(
        &self,
        world: RawWorld,
        ty: Option<ComponentTypeId>,
        count: u32,
    ) -> Result<EntityId, NativeStatus>;

    /// Create `count` children of `parent` with type `ty`.
    fn new_child_w_count(
        &self,
        world: RawWorld,
        parent: EntityId,
        ty: Option<ComponentTypeId>,
        count: u32,
    ) -> Result<EntityId, NativeStatus>;

    /// Create `count` instances of `base` with additional type `ty`.
    fn new_instance_w_count(
        &self,
        world: RawWorld,
        base: EntityId,
        ty: Option<ComponentTypeId>,
        count: u32,
    ) -> Result<EntityId, NativeStatus>;

    /// Add `add` then remove `remove` in one structural change.
    fn add_remove(
        &self,
        world: RawWorld,
        entity: EntityId,
        add: Option<ComponentTypeId>,
        remove: Option<ComponentTypeId>,
    ) -> Result<(), NativeStatus>;

    /// Whether `entity` has every component of `ty`.
    fn has(&self, world: RawWorld, entity: EntityId, ty: ComponentTypeId)
        -> Result<bool, NativeStatus>;

    /// Copy `size` bytes from `ptr` into `component` on `entity`, adding the
    /// component first when missing.
    ///
    /// # Safety
    /// `ptr` must be readable for `size` bytes.
    unsafe fn set_ptr(
        &self,
        world: RawWorld,
        entity: EntityId,
        component: EntityId,
        size: usize,
        ptr: *const c_void,
    ) -> Result<(), NativeStatus>;

    /// Address of `component` on `entity`, or null when absent.
    fn get_ptr(
        &self,
        world: RawWorld,
        entity: EntityId,
        component: EntityId,
    ) -> Result<*const c_void, NativeStatus>;

    /// The world's singleton entity.
    fn singleton(&self, world: RawWorld) -> Result<EntityId, NativeStatus>;

    /// Register a system. The engine calls `action` with `ctx` stored in
    /// [`RawRows::ctx`] for every matched batch.
    ///
    /// # Safety
    /// `name` and `signature` must be NUL-terminated strings alive until
    /// `fini`; `ctx` must stay valid until `fini`.
    unsafe fn new_system(
        &self,
        world: RawWorld,
        name: *const c_char,
        kind: SystemKind,
        signature: *const c_char,
        action: SystemAction,
        ctx: *mut c_void,
    ) -> Result<EntityId, NativeStatus>;

    /// Run every tick-driven system once.
    fn progress(&self, world: RawWorld, delta_time: f32) -> Result<(), NativeStatus>;

    /// Run a single system once, regardless of its kind.
    fn run(&self, world: RawWorld, system: EntityId, delta_time: f32)
        -> Result<(), NativeStatus>;

    /// Number of worker threads the engine may use for dispatch.
    fn set_threads(&self, world: RawWorld, threads: u32) -> Result<(), NativeStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_ptr_checks_index_and_size() {
        let mut a = [1.0f64, 2.0];
        let mut b = [3u32, 4];
        let columns = [a.as_mut_ptr() as *mut c_void, b.as_mut_ptr() as *mut c_void];
        let sizes = [8usize, 4];
        let rows = RawRows {
            world: RawWorld::from_ptr(ptr::null_mut()),
            system: EntityId::NULL,
            ctx: ptr::null_mut(),
            delta_time: 0.0,
            count: 2,
            entities: ptr::null(),
            column_count: 2,
            columns: columns.as_ptr(),
            column_sizes: sizes.as_ptr(),
        };

        unsafe {
            assert_eq!(rows.column_size(1), Some(8));
            assert_eq!(rows.column_size(2), Some(4));
            assert_eq!(rows.column_size(0), None);
            assert_eq!(rows.column_size(3), None);
            assert_eq!(rows.column_ptr(1, 8), columns[0]);
            assert_eq!(rows.column_ptr(2, 4), columns[1]);
            assert!(rows.column_ptr(2, 8).is_null());
            assert!(rows.column_ptr(3, 4).is_null());
        }
    }

    #[test]
    fn status_codes_are_stable() {
        assert_eq!(NativeStatus::InvalidWorld as i32, 1);
        assert_eq!(NativeStatus::DuplicateName as i32, 5);
        assert_eq!(NativeStatus::SizeMismatch as i32, 8);
    }
}
