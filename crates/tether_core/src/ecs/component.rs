// component.rs - Component shapes and their resolved handles
//
// Rust components are keyed by their `TypeId`. Components whose layout is
// only known at runtime (scripts, data files) are keyed by name instead, so
// both kinds can live in the same identity cache.

use crate::ecs::{BindError, ComponentTypeId, EntityId};
use bytemuck::Pod;
use std::any::TypeId;
use std::borrow::Cow;
use std::mem::{align_of, size_of};

/// Trait for Rust-defined components.
///
/// `Pod` guarantees the type is plain data with no padding, so any byte
/// pattern the engine hands back is a valid value.
pub trait Component: Pod + Send + Sync + 'static {
    /// Name registered with the engine and used in signature expressions.
    const NAME: &'static str;
}

/// Identity under which a component shape is cached.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ComponentKey {
    Rust(TypeId),
    External(String),
}

/// Static description of a component shape, before it is registered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentDescriptor {
    key: ComponentKey,
    name: Cow<'static, str>,
    size: usize,
    align: usize,
}

impl ComponentDescriptor {
    /// Describe a Rust component.
    pub fn of<T: Component>() -> Self {
        Self {
            key: ComponentKey::Rust(TypeId::of::<T>()),
            name: Cow::Borrowed(T::NAME),
            size: size_of::<T>(),
            align: align_of::<T>(),
        }
    }

    /// Describe a component defined outside Rust, keyed by its name.
    pub fn external(name: impl Into<String>, size: usize, align: usize) -> Self {
        let name: String = name.into();
        Self {
            key: ComponentKey::External(name.clone()),
            name: Cow::Owned(name),
            size,
            align,
        }
    }

    pub fn key(&self) -> &ComponentKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn align(&self) -> usize {
        self.align
    }

    /// Reject shapes that cannot be stored as fixed-size plain data.
    pub fn validate(&self) -> Result<(), BindError> {
        let reason = if self.size == 0 {
            "zero-sized types are tags, not components"
        } else if !self.align.is_power_of_two() {
            "alignment is not a power of two"
        } else if self.size % self.align != 0 {
            "size is not a multiple of its alignment"
        } else {
            return Ok(());
        };
        Err(BindError::InvalidComponentShape {
            name: self.name.to_string(),
            reason,
        })
    }
}

/// A component shape after registration with one world.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentHandle {
    /// Component entity on the native side.
    pub entity: EntityId,
    /// Type handle used for has/add/remove and entity creation.
    pub type_id: ComponentTypeId,
    pub name: String,
    pub size: usize,
    pub align: usize,
}

/// Implement [`Component`] for a plain-data type.
///
/// Names must be unique per world: resolving a second type under a name
/// that is already registered fails with `BindError::ComponentNameTaken`.
///
/// # Example
/// ```ignore
/// #[repr(C)]
/// #[derive(Clone, Copy, Pod, Zeroable)]
/// struct Position { x: f64, y: f64 }
///
/// define_component!(Position);
/// define_component!(Velocity, "Vel");
/// ```
#[macro_export]
macro_rules! define_component {
    ($ty:ident) => {
        $crate::define_component!($ty, stringify!($ty));
    };
    ($ty:ty, $name:expr) => {
        impl $crate::ecs::Component for $ty {
            const NAME: &'static str = $name;
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{Pod, Zeroable};

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    struct Position {
        x: f64,
        y: f64,
    }
    crate::define_component!(Position);

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    struct Health {
        value: u32,
    }
    crate::define_component!(Health, "Hp");

    #[test]
    fn rust_descriptor_reflects_layout() {
        let desc = ComponentDescriptor::of::<Position>();
        assert_eq!(desc.name(), "Position");
        assert_eq!(desc.size(), 16);
        assert_eq!(desc.align(), 8);
        assert_eq!(desc.key(), &ComponentKey::Rust(TypeId::of::<Position>()));
        assert!(desc.validate().is_ok());
    }

    #[test]
    fn explicit_name_overrides_identifier() {
        assert_eq!(ComponentDescriptor::of::<Health>().name(), "Hp");
    }

    #[test]
    fn external_descriptor_is_keyed_by_name() {
        let a = ComponentDescriptor::external("Script.Mana", 4, 4);
        let b = ComponentDescriptor::external("Script.Mana", 4, 4);
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), ComponentDescriptor::of::<Health>().key());
    }

    #[test]
    fn rejects_shapes_without_fixed_plain_layout() {
        for desc in [
            ComponentDescriptor::external("Empty", 0, 1),
            ComponentDescriptor::external("OddAlign", 12, 3),
            ComponentDescriptor::external("Ragged", 10, 4),
        ] {
            match desc.validate() {
                Err(BindError::InvalidComponentShape { name, .. }) => {
                    assert_eq!(name, desc.name())
                }
                other => panic!("expected InvalidComponentShape, got {other:?}"),
            }
        }
    }
}
