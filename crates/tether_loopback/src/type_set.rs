// type_set.rs - Sorted component sets and their table ids
//
// Entities with the same set of components share one table. The set is kept
// sorted and deduplicated so equal sets always hash to the same table id.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tether_core::ecs::EntityId;

pub type TableId = u64;

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TypeSet {
    components: Vec<EntityId>,
}

impl TypeSet {
    /// Build a set from components in any order, with duplicates.
    pub fn from_components(mut components: Vec<EntityId>) -> Self {
        components.sort_unstable();
        components.dedup();
        Self { components }
    }

    pub fn components(&self) -> &[EntityId] {
        &self.components
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn contains(&self, component: EntityId) -> bool {
        self.components.binary_search(&component).is_ok()
    }

    pub fn contains_all(&self, other: &TypeSet) -> bool {
        other.components.iter().all(|c| self.contains(*c))
    }

    pub fn union(&self, other: &TypeSet) -> TypeSet {
        let mut components = self.components.clone();
        components.extend_from_slice(&other.components);
        Self::from_components(components)
    }

    pub fn difference(&self, other: &TypeSet) -> TypeSet {
        Self {
            components: self
                .components
                .iter()
                .copied()
                .filter(|c| !other.contains(*c))
                .collect(),
        }
    }

    /// Stable table id for this set.
    pub fn table_id(&self) -> TableId {
        let mut hasher = DefaultHasher::new();
        for c in &self.components {
            c.hash(&mut hasher);
        }
        hasher.finish()
    }
}
