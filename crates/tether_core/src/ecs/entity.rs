//! Entity and type handles shared with the native engine
//!
//! Both are plain integers on the wire. The engine allocates them; the
//! binding never invents values except the null sentinels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Entity handle as issued by the native engine.
///
/// Components, systems, prefabs and type sets are all entities on the native
/// side, so the same handle type names all of them.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// The null entity. Never returned by a successful native call.
    pub const NULL: EntityId = EntityId(0);

    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// World-scoped handle for a component type or a set of component types.
///
/// Values are only meaningful inside the world that produced them; the same
/// Rust type resolved in two worlds yields two unrelated ids.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentTypeId(u64);

impl ComponentTypeId {
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_entity_is_zero() {
        assert!(EntityId::NULL.is_null());
        assert!(!EntityId::from_raw(7).is_null());
        assert_eq!(EntityId::default(), EntityId::NULL);
    }

    #[test]
    fn entity_matches_u64_layout() {
        assert_eq!(std::mem::size_of::<EntityId>(), std::mem::size_of::<u64>());
        assert_eq!(std::mem::align_of::<EntityId>(), std::mem::align_of::<u64>());
    }

    #[test]
    fn display_forms() {
        assert_eq!(EntityId::from_raw(42).to_string(), "#42");
        assert_eq!(ComponentTypeId::from_raw(3).to_string(), "type:3");
    }
}
