// world.rs - State of one loopback world
//
// Entities live in tables keyed by their component set. Names handed over by
// the binding are kept as raw pointers and read back on every lookup, the
// way a native engine that stores `const char*` would.

use crate::table::Table;
use crate::type_set::{TableId, TypeSet};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::collections::HashMap;
use std::ffi::{c_char, c_void, CStr};
use std::sync::atomic::{AtomicBool, Ordering};
use tether_core::ecs::{
    ComponentTypeId, EntityId, NativeStatus, RawRows, RawWorld, SystemAction, SystemKind,
};

// ============================================================================
// Pointers kept across calls
// ============================================================================

/// A NUL-terminated name owned by the caller.
struct NamePtr(*const c_char);

// SAFETY: the pointee is immutable and, per the `NativeEcs` contract, alive
// until the world is finalized.
unsafe impl Send for NamePtr {}
unsafe impl Sync for NamePtr {}

impl NamePtr {
    /// # Safety
    /// `ptr` must be null or a NUL-terminated string alive until `fini`.
    unsafe fn new(ptr: *const c_char) -> Self {
        Self(ptr)
    }

    fn builtin(name: &'static [u8]) -> Self {
        Self(name.as_ptr() as *const c_char)
    }

    fn as_c_str(&self) -> Option<&CStr> {
        // SAFETY: see `NamePtr::new`.
        (!self.0.is_null()).then(|| unsafe { CStr::from_ptr(self.0) })
    }

    fn read(&self) -> Option<String> {
        self.as_c_str().map(|s| s.to_string_lossy().into_owned())
    }

    fn matches(&self, name: &str) -> bool {
        self.as_c_str()
            .is_some_and(|s| s.to_bytes() == name.as_bytes())
    }
}

/// Context pointer handed back to a system's action.
#[derive(Copy, Clone)]
struct Ctx(*mut c_void);

// SAFETY: the binding guarantees the context is `Send + Sync` and pinned
// until `fini`.
unsafe impl Send for Ctx {}
unsafe impl Sync for Ctx {}

// ============================================================================
// Records
// ============================================================================

struct ComponentRecord {
    name: NamePtr,
    size: usize,
}

struct TypeRecord {
    name: NamePtr,
    set: TypeSet,
}

struct SystemRecord {
    entity: EntityId,
    name: NamePtr,
    signature: NamePtr,
    kind: SystemKind,
    columns: Vec<EntityId>,
    action: SystemAction,
    ctx: Ctx,
}

#[derive(Copy, Clone, Debug)]
struct Location {
    table: TableId,
    row: usize,
}

/// Counters describing what the binding asked of one world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopbackStats {
    /// `new_component` calls, tags included.
    pub component_registrations: u64,
    pub system_registrations: u64,
    pub entities_created: u64,
    pub progress_calls: u64,
    pub batches_dispatched: u64,
}

// ============================================================================
// Batches
// ============================================================================

/// One slice of a table handed to a system action.
struct Batch {
    world: RawWorld,
    system: EntityId,
    action: SystemAction,
    ctx: Ctx,
    entities: *const EntityId,
    count: u32,
    columns: Vec<*mut c_void>,
    sizes: Vec<usize>,
}

// SAFETY: batches of one pass cover disjoint rows, and tables cannot change
// while the world is iterating.
unsafe impl Send for Batch {}
unsafe impl Sync for Batch {}

impl Batch {
    /// Split into at most `parts` batches over consecutive rows.
    fn split(self, parts: usize) -> Vec<Batch> {
        let count = self.count as usize;
        if parts <= 1 || count <= 1 {
            return vec![self];
        }
        let chunk = count.div_ceil(parts);
        (0..count)
            .step_by(chunk)
            .map(|start| {
                let len = chunk.min(count - start);
                Batch {
                    world: self.world,
                    system: self.system,
                    action: self.action,
                    ctx: self.ctx,
                    // SAFETY: `start < count`, so every offset stays inside
                    // the table's allocations.
                    entities: unsafe { self.entities.add(start) },
                    count: len as u32,
                    columns: self
                        .columns
                        .iter()
                        .zip(&self.sizes)
                        .map(|(&ptr, &size)| {
                            if ptr.is_null() {
                                ptr
                            } else {
                                unsafe { (ptr as *mut u8).add(start * size) as *mut c_void }
                            }
                        })
                        .collect(),
                    sizes: self.sizes.clone(),
                }
            })
            .collect()
    }

    /// # Safety
    /// The table rows this batch points at must be alive and not accessed
    /// by anything else for the duration of the call.
    unsafe fn call(&self, delta_time: f32) {
        let mut rows = RawRows {
            world: self.world,
            system: self.system,
            ctx: self.ctx.0,
            delta_time,
            count: self.count,
            entities: self.entities,
            column_count: self.columns.len() as u32,
            columns: self.columns.as_ptr(),
            column_sizes: self.sizes.as_ptr(),
        };
        (self.action)(&mut rows);
    }
}

// ============================================================================
// World data
// ============================================================================

struct WorldData {
    next_id: u64,
    components: HashMap<EntityId, ComponentRecord>,
    types: HashMap<EntityId, TypeRecord>,
    type_sets: Vec<TypeSet>,
    type_lookup: HashMap<TypeSet, ComponentTypeId>,
    tables: HashMap<TableId, Table>,
    locations: HashMap<EntityId, Location>,
    names: HashMap<EntityId, NamePtr>,
    parents: HashMap<EntityId, EntityId>,
    bases: HashMap<EntityId, EntityId>,
    systems: Vec<SystemRecord>,
    prefab_tag: EntityId,
    singleton_tag: EntityId,
    singleton: EntityId,
    threads: u32,
    stats: LoopbackStats,
}

impl WorldData {
    fn new() -> Self {
        let mut data = Self {
            next_id: 0,
            components: HashMap::new(),
            types: HashMap::new(),
            type_sets: Vec::new(),
            type_lookup: HashMap::new(),
            tables: HashMap::new(),
            locations: HashMap::new(),
            names: HashMap::new(),
            parents: HashMap::new(),
            bases: HashMap::new(),
            systems: Vec::new(),
            prefab_tag: EntityId::NULL,
            singleton_tag: EntityId::NULL,
            singleton: EntityId::NULL,
            threads: 1,
            stats: LoopbackStats::default(),
        };
        data.prefab_tag = data.insert_component(NamePtr::builtin(b"Prefab\0"), 0);
        data.singleton_tag = data.insert_component(NamePtr::builtin(b"Singleton\0"), 0);
        let set = TypeSet::from_components(vec![data.singleton_tag]);
        data.singleton = data.spawn(&set);
        data.stats = LoopbackStats::default();
        data
    }

    fn alloc(&mut self) -> EntityId {
        self.next_id += 1;
        EntityId::from_raw(self.next_id)
    }

    fn insert_component(&mut self, name: NamePtr, size: usize) -> EntityId {
        let entity = self.alloc();
        self.components.insert(entity, ComponentRecord { name, size });
        entity
    }

    fn component_size(&self, component: EntityId) -> usize {
        self.components.get(&component).map_or(0, |r| r.size)
    }

    fn intern_type(&mut self, set: TypeSet) -> ComponentTypeId {
        if let Some(&ty) = self.type_lookup.get(&set) {
            return ty;
        }
        self.type_sets.push(set.clone());
        let ty = ComponentTypeId::from_raw(self.type_sets.len() as u64);
        self.type_lookup.insert(set, ty);
        ty
    }

    fn type_set(&self, ty: Option<ComponentTypeId>) -> Result<TypeSet, NativeStatus> {
        let Some(ty) = ty else {
            return Ok(TypeSet::default());
        };
        (ty.raw() as usize)
            .checked_sub(1)
            .and_then(|index| self.type_sets.get(index))
            .cloned()
            .ok_or(NativeStatus::UnknownType)
    }

    fn entity_set(&self, entity: EntityId) -> Result<TypeSet, NativeStatus> {
        let loc = self.location(entity)?;
        Ok(self
            .tables
            .get(&loc.table)
            .map(|t| t.set().clone())
            .unwrap_or_default())
    }

    fn location(&self, entity: EntityId) -> Result<Location, NativeStatus> {
        self.locations
            .get(&entity)
            .copied()
            .ok_or(NativeStatus::InvalidEntity)
    }

    /// Resolve a comma-separated list of component (and optionally type)
    /// names into one set.
    fn parse_expr(&self, expr: &str, allow_types: bool) -> Result<TypeSet, NativeStatus> {
        let mut components = Vec::new();
        for name in expr.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            if let Some((&entity, _)) = self.components.iter().find(|(_, r)| r.name.matches(name)) {
                components.push(entity);
                continue;
            }
            let set = allow_types
                .then(|| self.types.values().find(|r| r.name.matches(name)))
                .flatten()
                .ok_or(NativeStatus::InvalidExpression)?;
            components.extend_from_slice(set.set.components());
        }
        Ok(TypeSet::from_components(components))
    }

    fn table_mut(&mut self, set: &TypeSet) -> &mut Table {
        let components = &self.components;
        self.tables.entry(set.table_id()).or_insert_with(|| {
            Table::new(set.clone(), |c| {
                components.get(&c).map_or(0, |r| r.size)
            })
        })
    }

    fn spawn(&mut self, set: &TypeSet) -> EntityId {
        let entity = self.alloc();
        let table = set.table_id();
        let row = self.table_mut(set).push(entity);
        self.locations.insert(entity, Location { table, row });
        self.stats.entities_created += 1;
        entity
    }

    fn spawn_many(&mut self, set: &TypeSet, count: u32) -> EntityId {
        let first = EntityId::from_raw(self.next_id + 1);
        for _ in 0..count {
            self.spawn(set);
        }
        first
    }

    fn remove_row(&mut self, loc: Location) {
        let Some(table) = self.tables.get_mut(&loc.table) else {
            return;
        };
        if let Some(moved) = table.swap_remove(loc.row) {
            if let Some(moved_loc) = self.locations.get_mut(&moved) {
                moved_loc.row = loc.row;
            }
        }
    }

    /// Move `entity` to the table of `set`, keeping the values of components
    /// present in both.
    fn move_entity(&mut self, entity: EntityId, set: TypeSet) -> Result<(), NativeStatus> {
        let loc = self.location(entity)?;
        let table = set.table_id();
        if table == loc.table {
            return Ok(());
        }
        let values = self
            .tables
            .get(&loc.table)
            .map(|t| t.row_values(loc.row))
            .unwrap_or_default();
        self.remove_row(loc);

        let dst = self.table_mut(&set);
        let row = dst.push(entity);
        for (component, bytes) in values {
            dst.write(row, component, &bytes);
        }
        self.locations.insert(entity, Location { table, row });
        Ok(())
    }

    fn write(&mut self, entity: EntityId, component: EntityId, bytes: &[u8]) -> Result<(), NativeStatus> {
        let loc = self.location(entity)?;
        match self.tables.get_mut(&loc.table).map(|table| table.write(loc.row, component, bytes)) {
            Some(true) => Ok(()),
            _ => Err(NativeStatus::SizeMismatch),
        }
    }

    fn copy_values(&mut self, from: EntityId, to: EntityId) -> Result<(), NativeStatus> {
        let loc = self.location(from)?;
        let values = self
            .tables
            .get(&loc.table)
            .map(|t| t.row_values(loc.row))
            .unwrap_or_default();
        for (component, bytes) in values {
            self.write(to, component, &bytes)?;
        }
        Ok(())
    }

    fn named_entity(&self, name: &str) -> Option<EntityId> {
        self.names
            .iter()
            .find(|(e, n)| n.matches(name) && self.locations.contains_key(*e))
            .map(|(e, _)| *e)
    }

    /// Batches for every table matching `system`, in entity order.
    fn collect_batches(&mut self, world: RawWorld, index: usize) -> Vec<Batch> {
        let Some(system) = self.systems.get(index) else {
            return Vec::new();
        };
        let required = TypeSet::from_components(system.columns.clone());
        let (prefab, singleton) = (self.prefab_tag, self.singleton_tag);

        let mut matching: Vec<(EntityId, TableId)> = self
            .tables
            .iter()
            .filter(|(_, t)| {
                !t.is_empty()
                    && t.set().contains_all(&required)
                    && !t.set().contains(prefab)
                    && !t.set().contains(singleton)
            })
            .map(|(&id, t)| (t.entities()[0], id))
            .collect();
        matching.sort_unstable();

        let (entity, action, ctx) = (system.entity, system.action, system.ctx);
        let columns = system.columns.clone();
        let mut batches = Vec::with_capacity(matching.len());
        for (_, id) in matching {
            let Some(table) = self.tables.get_mut(&id) else {
                continue;
            };
            let (ptrs, sizes): (Vec<_>, Vec<_>) =
                columns.iter().map(|&c| table.column_ptr(c)).unzip();
            batches.push(Batch {
                world,
                system: entity,
                action,
                ctx,
                entities: table.entities().as_ptr(),
                count: table.len() as u32,
                columns: ptrs,
                sizes,
            });
        }
        batches
    }
}

// ============================================================================
// Loopback world
// ============================================================================

/// One world of the loopback engine.
pub struct LoopbackWorld {
    data: Mutex<WorldData>,
    iterating: AtomicBool,
}

/// Clears the iterating flag when a pass ends, unwinding included.
struct IterationGuard<'a>(&'a AtomicBool);

impl Drop for IterationGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl LoopbackWorld {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(WorldData::new()),
            iterating: AtomicBool::new(false),
        }
    }

    fn unlocked(&self) -> Result<(), NativeStatus> {
        if self.iterating.load(Ordering::Acquire) {
            Err(NativeStatus::WorldLocked)
        } else {
            Ok(())
        }
    }

    fn begin_iteration(&self) -> Result<IterationGuard<'_>, NativeStatus> {
        self.iterating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| NativeStatus::WorldLocked)?;
        Ok(IterationGuard(&self.iterating))
    }

    pub fn stats(&self) -> LoopbackStats {
        self.data.lock().stats
    }

    pub fn parent_of(&self, entity: EntityId) -> Option<EntityId> {
        self.data.lock().parents.get(&entity).copied()
    }

    pub fn base_of(&self, entity: EntityId) -> Option<EntityId> {
        self.data.lock().bases.get(&entity).copied()
    }

    pub fn entity_name(&self, entity: EntityId) -> Option<String> {
        let data = self.data.lock();
        if let Some(record) = data.components.get(&entity) {
            return record.name.read();
        }
        if let Some(record) = data.types.get(&entity) {
            return record.name.read();
        }
        if let Some(record) = data.systems.iter().find(|s| s.entity == entity) {
            return record.name.read();
        }
        data.names.get(&entity).and_then(NamePtr::read)
    }

    pub fn lookup(&self, name: &str) -> Option<EntityId> {
        let data = self.data.lock();
        data.named_entity(name).or_else(|| {
            data.components
                .iter()
                .find(|(_, r)| r.name.matches(name))
                .map(|(e, _)| *e)
        })
    }

    pub fn system_signature(&self, system: EntityId) -> Option<String> {
        self.data
            .lock()
            .systems
            .iter()
            .find(|s| s.entity == system)
            .and_then(|s| s.signature.read())
    }

    pub fn entity_count(&self) -> usize {
        self.data.lock().locations.len()
    }

    pub fn threads(&self) -> u32 {
        self.data.lock().threads
    }

    // ------------------------------------------------------------------------
    // Operations backing `NativeEcs`
    // ------------------------------------------------------------------------

    /// # Safety
    /// `name` must be null or a NUL-terminated string alive until `fini`.
    pub(crate) unsafe fn new_component(
        &self,
        name: *const c_char,
        size: usize,
    ) -> Result<EntityId, NativeStatus> {
        let name = NamePtr::new(name);
        let mut data = self.data.lock();
        data.stats.component_registrations += 1;
        if let Some(text) = name.as_c_str().and_then(|s| s.to_str().ok()) {
            let existing = data
                .components
                .iter()
                .find(|(_, r)| r.name.matches(text))
                .map(|(e, r)| (*e, r.size));
            if let Some((entity, existing_size)) = existing {
                return if existing_size == size {
                    Ok(entity)
                } else {
                    Err(NativeStatus::SizeMismatch)
                };
            }
        }
        Ok(data.insert_component(name, size))
    }

    pub(crate) fn type_from_entity(&self, entity: EntityId) -> Result<ComponentTypeId, NativeStatus> {
        let mut data = self.data.lock();
        let set = if data.components.contains_key(&entity) {
            TypeSet::from_components(vec![entity])
        } else if let Some(record) = data.types.get(&entity) {
            record.set.clone()
        } else {
            data.entity_set(entity)?
        };
        Ok(data.intern_type(set))
    }

    /// # Safety
    /// `name` as in [`LoopbackWorld::new_component`]; `expr` null or
    /// NUL-terminated for the duration of the call.
    pub(crate) unsafe fn new_entity_named(
        &self,
        name: *const c_char,
        expr: *const c_char,
    ) -> Result<EntityId, NativeStatus> {
        self.unlocked()?;
        let name = NamePtr::new(name);
        let expr = read_expr(expr);
        let mut data = self.data.lock();
        let set = data.parse_expr(&expr, true)?;

        let existing = name
            .as_c_str()
            .and_then(|s| s.to_str().ok())
            .and_then(|text| data.named_entity(text));
        if let Some(entity) = existing {
            let merged = data.entity_set(entity)?.union(&set);
            data.move_entity(entity, merged)?;
            return Ok(entity);
        }

        let entity = data.spawn(&set);
        data.names.insert(entity, name);
        Ok(entity)
    }

    /// # Safety
    /// Same as [`LoopbackWorld::new_entity_named`].
    pub(crate) unsafe fn new_type(
        &self,
        name: *const c_char,
        expr: *const c_char,
    ) -> Result<EntityId, NativeStatus> {
        let name = NamePtr::new(name);
        let expr = read_expr(expr);
        let mut data = self.data.lock();
        let set = data.parse_expr(&expr, true)?;
        let entity = data.alloc();
        data.types.insert(entity, TypeRecord { name, set });
        Ok(entity)
    }

    /// # Safety
    /// Same as [`LoopbackWorld::new_entity_named`].
    pub(crate) unsafe fn new_prefab(
        &self,
        name: *const c_char,
        expr: *const c_char,
    ) -> Result<EntityId, NativeStatus> {
        self.unlocked()?;
        let name = NamePtr::new(name);
        let expr = read_expr(expr);
        let mut data = self.data.lock();
        let prefab = TypeSet::from_components(vec![data.prefab_tag]);
        let set = data.parse_expr(&expr, true)?.union(&prefab);
        let entity = data.spawn(&set);
        data.names.insert(entity, name);
        Ok(entity)
    }

    pub(crate) fn new_w_count(
        &self,
        ty: Option<ComponentTypeId>,
        count: u32,
    ) -> Result<EntityId, NativeStatus> {
        self.unlocked()?;
        let mut data = self.data.lock();
        let set = data.type_set(ty)?;
        Ok(data.spawn_many(&set, count))
    }

    pub(crate) fn new_child_w_count(
        &self,
        parent: EntityId,
        ty: Option<ComponentTypeId>,
        count: u32,
    ) -> Result<EntityId, NativeStatus> {
        self.unlocked()?;
        let mut data = self.data.lock();
        data.location(parent)?;
        let set = data.type_set(ty)?;
        let first = data.spawn_many(&set, count);
        for raw in first.raw()..first.raw() + count as u64 {
            data.parents.insert(EntityId::from_raw(raw), parent);
        }
        Ok(first)
    }

    pub(crate) fn new_instance_w_count(
        &self,
        base: EntityId,
        ty: Option<ComponentTypeId>,
        count: u32,
    ) -> Result<EntityId, NativeStatus> {
        self.unlocked()?;
        let mut data = self.data.lock();
        let prefab = TypeSet::from_components(vec![data.prefab_tag]);
        let set = data
            .entity_set(base)?
            .union(&data.type_set(ty)?)
            .difference(&prefab);
        let first = data.spawn_many(&set, count);
        for raw in first.raw()..first.raw() + count as u64 {
            let instance = EntityId::from_raw(raw);
            data.copy_values(base, instance)?;
            data.bases.insert(instance, base);
        }
        Ok(first)
    }

    pub(crate) fn add_remove(
        &self,
        entity: EntityId,
        add: Option<ComponentTypeId>,
        remove: Option<ComponentTypeId>,
    ) -> Result<(), NativeStatus> {
        self.unlocked()?;
        let mut data = self.data.lock();
        let set = data
            .entity_set(entity)?
            .union(&data.type_set(add)?)
            .difference(&data.type_set(remove)?);
        data.move_entity(entity, set)
    }

    pub(crate) fn has(&self, entity: EntityId, ty: ComponentTypeId) -> Result<bool, NativeStatus> {
        let data = self.data.lock();
        let required = data.type_set(Some(ty))?;
        Ok(data.entity_set(entity)?.contains_all(&required))
    }

    /// # Safety
    /// `ptr` must be readable for `size` bytes.
    pub(crate) unsafe fn set_ptr(
        &self,
        entity: EntityId,
        component: EntityId,
        size: usize,
        ptr: *const c_void,
    ) -> Result<(), NativeStatus> {
        self.unlocked()?;
        let mut data = self.data.lock();
        let expected = data
            .components
            .get(&component)
            .map(|r| r.size)
            .ok_or(NativeStatus::UnknownType)?;
        if size != expected {
            return Err(NativeStatus::SizeMismatch);
        }
        let set = data.entity_set(entity)?;
        if !set.contains(component) {
            let added = set.union(&TypeSet::from_components(vec![component]));
            data.move_entity(entity, added)?;
        }
        if size == 0 || ptr.is_null() {
            return Ok(());
        }
        let bytes = std::slice::from_raw_parts(ptr as *const u8, size);
        data.write(entity, component, bytes)
    }

    pub(crate) fn get_ptr(
        &self,
        entity: EntityId,
        component: EntityId,
    ) -> Result<*const c_void, NativeStatus> {
        self.unlocked()?;
        let data = self.data.lock();
        if !data.components.contains_key(&component) {
            return Err(NativeStatus::UnknownType);
        }
        let loc = data.location(entity)?;
        Ok(data
            .tables
            .get(&loc.table)
            .and_then(|t| t.element_ptr(loc.row, component))
            .unwrap_or(std::ptr::null()))
    }

    pub(crate) fn singleton(&self) -> EntityId {
        self.data.lock().singleton
    }

    /// # Safety
    /// `name` and `signature` as in [`LoopbackWorld::new_component`]; `ctx`
    /// valid for `action` until `fini`.
    pub(crate) unsafe fn new_system(
        &self,
        name: *const c_char,
        kind: SystemKind,
        signature: *const c_char,
        action: SystemAction,
        ctx: *mut c_void,
    ) -> Result<EntityId, NativeStatus> {
        if kind.is_reactive() {
            return Err(NativeStatus::UnsupportedKind);
        }
        let name = NamePtr::new(name);
        let signature = NamePtr::new(signature);
        let mut data = self.data.lock();

        if let Some(text) = name.as_c_str().map(CStr::to_bytes) {
            let taken = data
                .systems
                .iter()
                .any(|s| s.name.as_c_str().is_some_and(|n| n.to_bytes() == text));
            if taken {
                return Err(NativeStatus::DuplicateName);
            }
        }

        let expr = signature.read().ok_or(NativeStatus::InvalidExpression)?;
        let mut columns = Vec::new();
        for column in expr.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let entity = data
                .components
                .iter()
                .find(|(_, r)| r.name.matches(column))
                .map(|(e, _)| *e)
                .ok_or(NativeStatus::InvalidExpression)?;
            columns.push(entity);
        }
        if columns.is_empty() {
            return Err(NativeStatus::InvalidExpression);
        }

        let entity = data.alloc();
        tracing::debug!(
            system = %entity,
            %kind,
            signature = %expr,
            "loopback registered system"
        );
        data.systems.push(SystemRecord {
            entity,
            name,
            signature,
            kind,
            columns,
            action,
            ctx: Ctx(ctx),
        });
        data.stats.system_registrations += 1;
        Ok(entity)
    }

    pub(crate) fn progress(&self, world: RawWorld, delta_time: f32) -> Result<(), NativeStatus> {
        let _pass = self.begin_iteration()?;
        let order: Vec<usize> = {
            let mut data = self.data.lock();
            data.stats.progress_calls += 1;
            let mut order = Vec::with_capacity(data.systems.len());
            for phase in SystemKind::TICK_PHASES {
                for (index, system) in data.systems.iter().enumerate() {
                    if system.kind == phase {
                        order.push(index);
                    }
                }
            }
            order
        };
        tracing::trace!(systems = order.len(), delta_time, "loopback progress");
        for index in order {
            self.dispatch(world, index, delta_time);
        }
        Ok(())
    }

    pub(crate) fn run(
        &self,
        world: RawWorld,
        system: EntityId,
        delta_time: f32,
    ) -> Result<(), NativeStatus> {
        let _pass = self.begin_iteration()?;
        let index = self
            .data
            .lock()
            .systems
            .iter()
            .position(|s| s.entity == system)
            .ok_or(NativeStatus::InvalidEntity)?;
        self.dispatch(world, index, delta_time);
        Ok(())
    }

    pub(crate) fn set_threads(&self, threads: u32) -> Result<(), NativeStatus> {
        self.unlocked()?;
        self.data.lock().threads = threads.max(1);
        Ok(())
    }

    /// Invoke system `index` on every matching table. Must be called with
    /// the iterating flag held.
    fn dispatch(&self, world: RawWorld, index: usize, delta_time: f32) {
        let (batches, threads) = {
            let mut data = self.data.lock();
            let threads = data.threads as usize;
            (data.collect_batches(world, index), threads)
        };

        let batches: Vec<Batch> = batches
            .into_iter()
            .flat_map(|batch| batch.split(threads))
            .collect();
        let dispatched = batches.len() as u64;

        // SAFETY: tables are frozen while iterating and batches cover
        // disjoint rows.
        if threads > 1 {
            batches.par_iter().for_each(|batch| unsafe { batch.call(delta_time) });
        } else {
            for batch in &batches {
                unsafe { batch.call(delta_time) };
            }
        }

        self.data.lock().stats.batches_dispatched += dispatched;
    }
}

impl Default for LoopbackWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy an optional C expression into an owned string.
///
/// # Safety
/// `expr` must be null or NUL-terminated.
unsafe fn read_expr(expr: *const c_char) -> String {
    if expr.is_null() {
        String::new()
    } else {
        CStr::from_ptr(expr).to_string_lossy().into_owned()
    }
}
