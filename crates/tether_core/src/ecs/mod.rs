//! Typed bindings over a native Entity-Component-System engine.
//!
//! The engine owns storage, matching and scheduling. This module owns the
//! Rust side of the boundary: component identities per world, the strings
//! and callbacks the engine keeps pointers to, and the adapters that turn
//! raw row batches into typed column slices.

mod component;
mod entity;
mod error;
mod identity;
mod interner;
mod macros;
mod native;
mod rows;
mod system;
mod system_kind;
mod trampoline;
mod world;

pub use component::{Component, ComponentDescriptor, ComponentHandle, ComponentKey};
pub use entity::{ComponentTypeId, EntityId};
pub use error::BindError;
pub use identity::IdentityCache;
pub use interner::{InternedStr, StringArena};
pub use native::{NativeEcs, NativeStatus, RawRows, RawWorld, SystemAction};
pub use rows::{BatchInfo, ColumnBuffer, OwnedRows, RowBatch};
pub use system::{SystemFn, MAX_ARITY};
pub use system_kind::SystemKind;
pub(crate) use trampoline::dispatch;
pub use trampoline::Trampoline;
pub use world::{RegisteredSystem, World};
