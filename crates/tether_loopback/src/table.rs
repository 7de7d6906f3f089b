// table.rs - Column storage for all entities sharing one type set
//
// One `ColumnBuffer` per sized component, one row per entity. Tags have no
// column. Rows are removed by swapping the last row into the hole.

use crate::type_set::TypeSet;
use std::collections::HashMap;
use std::ffi::c_void;
use tether_core::ecs::{ColumnBuffer, EntityId};

pub struct Table {
    set: TypeSet,
    entities: Vec<EntityId>,
    columns: HashMap<EntityId, ColumnBuffer>,
}

impl Table {
    /// Create an empty table; `size_of` gives each component's element size.
    pub fn new(set: TypeSet, size_of: impl Fn(EntityId) -> usize) -> Self {
        let columns = set
            .components()
            .iter()
            .filter_map(|&c| {
                let size = size_of(c);
                (size > 0).then(|| (c, ColumnBuffer::new(size)))
            })
            .collect();
        Self {
            set,
            entities: Vec::new(),
            columns,
        }
    }

    pub fn set(&self) -> &TypeSet {
        &self.set
    }

    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Append a zero-initialized row for `entity`.
    pub fn push(&mut self, entity: EntityId) -> usize {
        for column in self.columns.values_mut() {
            column.push_zeroed();
        }
        self.entities.push(entity);
        self.entities.len() - 1
    }

    /// Remove `row`; returns the entity that now occupies it, if any.
    pub fn swap_remove(&mut self, row: usize) -> Option<EntityId> {
        if row >= self.entities.len() {
            return None;
        }
        for column in self.columns.values_mut() {
            column.swap_remove(row);
        }
        self.entities.swap_remove(row);
        self.entities.get(row).copied()
    }

    pub fn read(&self, row: usize, component: EntityId) -> Option<&[u8]> {
        self.columns.get(&component)?.element(row)
    }

    /// Overwrite `component` at `row`. Returns false when the table has no
    /// such column or row.
    pub fn write(&mut self, row: usize, component: EntityId, bytes: &[u8]) -> bool {
        match self
            .columns
            .get_mut(&component)
            .and_then(|column| column.element_mut(row))
        {
            Some(slot) if slot.len() == bytes.len() => {
                slot.copy_from_slice(bytes);
                true
            }
            _ => false,
        }
    }

    /// Every sized component value at `row`.
    pub fn row_values(&self, row: usize) -> Vec<(EntityId, Vec<u8>)> {
        self.columns
            .iter()
            .filter_map(|(&c, column)| column.element(row).map(|bytes| (c, bytes.to_vec())))
            .collect()
    }

    /// Base pointer and element size of `component`'s column. Tags and
    /// missing components yield a null pointer.
    pub fn column_ptr(&mut self, component: EntityId) -> (*mut c_void, usize) {
        match self.columns.get_mut(&component) {
            Some(column) => (column.as_mut_ptr(), column.elem_size()),
            None => (std::ptr::null_mut(), 0),
        }
    }

    pub fn element_ptr(&self, row: usize, component: EntityId) -> Option<*const c_void> {
        self.read(row, component)
            .map(|bytes| bytes.as_ptr() as *const c_void)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> EntityId {
        EntityId::from_raw(n)
    }

    fn table() -> Table {
        let set = TypeSet::from_components(vec![id(1), id(2), id(3)]);
        Table::new(set, |c| match c.raw() {
            1 => 8,
            2 => 4,
            _ => 0,
        })
    }

    #[test]
    fn tags_have_no_column() {
        let mut t = table();
        assert_eq!(t.column_ptr(id(3)), (std::ptr::null_mut(), 0));
        assert_eq!(t.column_ptr(id(1)).1, 8);
    }

    #[test]
    fn swap_remove_moves_last_row() {
        let mut t = table();
        for e in 10..13 {
            let row = t.push(id(e));
            assert!(t.write(row, id(2), &(e as u32).to_ne_bytes()));
        }

        assert_eq!(t.swap_remove(0), Some(id(12)));
        assert_eq!(t.entities(), &[id(12), id(11)]);
        assert_eq!(t.read(0, id(2)), Some(&12u32.to_ne_bytes()[..]));
        assert_eq!(t.swap_remove(1), None);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn write_checks_size() {
        let mut t = table();
        let row = t.push(id(10));
        assert!(!t.write(row, id(2), &[0u8; 8]));
        assert!(!t.write(row, id(3), &[]));
        assert_eq!(t.read(row, id(1)), Some(&[0u8; 8][..]));
    }
}
