//! Row batches and typed column views
//!
//! A [`RowBatch`] wraps the [`RawRows`] the engine passes to a system and
//! hands out typed slices over its columns. Every view is checked against
//! the element size the engine reported for that column before the base
//! pointer is touched.
//!
//! [`ColumnBuffer`] and [`OwnedRows`] are the owning side: aligned byte
//! storage for one column, and a batch assembled in Rust that can be handed
//! to a trampoline without an engine.

use crate::ecs::{BindError, EntityId, RawRows, RawWorld};
use bytemuck::Pod;
use std::ffi::c_void;
use std::mem::{align_of, size_of};
use std::ptr::{self, NonNull};
use std::slice;

// ============================================================================
// Column storage
// ============================================================================

/// Growable storage for `len` elements of `elem_size` bytes each.
///
/// Backed by `u128` words so base pointers are 16-byte aligned, enough for
/// every plain-data component.
#[derive(Clone, Debug)]
pub struct ColumnBuffer {
    words: Vec<u128>,
    elem_size: usize,
    len: usize,
}

impl ColumnBuffer {
    pub fn new(elem_size: usize) -> Self {
        Self {
            words: Vec::new(),
            elem_size,
            len: 0,
        }
    }

    /// Buffer holding a copy of `values`.
    pub fn from_slice<T: Pod>(values: &[T]) -> Self {
        let mut buffer = Self::new(size_of::<T>());
        buffer.extend_bytes(bytemuck::cast_slice(values));
        buffer
    }

    pub fn elem_size(&self) -> usize {
        self.elem_size
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<u128, u8>(&self.words)[..self.len * self.elem_size]
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        let used = self.len * self.elem_size;
        &mut bytemuck::cast_slice_mut::<u128, u8>(&mut self.words)[..used]
    }

    /// Bytes of the element at `row`.
    pub fn element(&self, row: usize) -> Option<&[u8]> {
        if row >= self.len {
            return None;
        }
        let start = row * self.elem_size;
        Some(&self.bytes()[start..start + self.elem_size])
    }

    pub fn element_mut(&mut self, row: usize) -> Option<&mut [u8]> {
        if row >= self.len {
            return None;
        }
        let start = row * self.elem_size;
        let size = self.elem_size;
        Some(&mut self.bytes_mut()[start..start + size])
    }

    /// Append one element. `bytes` is truncated or zero-padded to the
    /// element size.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        let row = self.len;
        self.grow_to(self.len + 1);
        if let Some(slot) = self.element_mut(row) {
            let n = bytes.len().min(slot.len());
            slot[..n].copy_from_slice(&bytes[..n]);
        }
    }

    pub fn push_zeroed(&mut self) {
        self.grow_to(self.len + 1);
    }

    /// Append whole elements from `bytes`; a trailing partial element is
    /// ignored.
    pub fn extend_bytes(&mut self, bytes: &[u8]) {
        if self.elem_size == 0 {
            return;
        }
        for chunk in bytes.chunks_exact(self.elem_size) {
            self.push_bytes(chunk);
        }
    }

    /// Remove the element at `row`, moving the last element into its place.
    pub fn swap_remove(&mut self, row: usize) {
        if row >= self.len {
            return;
        }
        let last = self.len - 1;
        if row != last {
            let size = self.elem_size;
            self.bytes_mut()
                .copy_within(last * size..(last + 1) * size, row * size);
        }
        if let Some(slot) = self.element_mut(last) {
            slot.fill(0);
        }
        self.len = last;
    }

    pub fn as_mut_ptr(&mut self) -> *mut c_void {
        self.words.as_mut_ptr() as *mut c_void
    }

    fn grow_to(&mut self, len: usize) {
        let words = (len * self.elem_size).div_ceil(size_of::<u128>());
        if words > self.words.len() {
            self.words.resize(words, 0);
        }
        self.len = len;
    }
}

// ============================================================================
// Borrowed batch
// ============================================================================

/// Row metadata shared by every column of one invocation.
#[derive(Copy, Clone, Debug)]
pub struct BatchInfo<'a> {
    pub system: EntityId,
    pub delta_time: f32,
    pub count: usize,
    pub entities: &'a [EntityId],
}

/// One invocation's batch of rows. Valid only for the duration of the
/// callback it was handed to.
pub struct RowBatch<'a> {
    raw: &'a RawRows,
    entities: &'a [EntityId],
}

impl<'a> RowBatch<'a> {
    /// # Safety
    /// `raw` must describe a live batch: `entities` readable for `count`
    /// ids, `columns` and `column_sizes` readable for `column_count` entries,
    /// and each non-null column writable for `count` elements of its
    /// reported size, with no other live references to that memory.
    pub unsafe fn from_raw(raw: &'a RawRows) -> Self {
        let entities = if raw.count == 0 || raw.entities.is_null() {
            &[]
        } else {
            slice::from_raw_parts(raw.entities, raw.count as usize)
        };
        Self { raw, entities }
    }

    pub fn count(&self) -> usize {
        self.raw.count as usize
    }

    pub fn entities(&self) -> &'a [EntityId] {
        self.entities
    }

    pub fn delta_time(&self) -> f32 {
        self.raw.delta_time
    }

    pub fn system(&self) -> EntityId {
        self.raw.system
    }

    pub fn world(&self) -> RawWorld {
        self.raw.world
    }

    pub fn column_count(&self) -> u32 {
        self.raw.column_count
    }

    pub fn info(&self) -> BatchInfo<'a> {
        BatchInfo {
            system: self.raw.system,
            delta_time: self.raw.delta_time,
            count: self.count(),
            entities: self.entities,
        }
    }

    /// Read-only view of column `index` (1-based) as `T`.
    pub fn column<T: Pod>(&self, index: u32) -> Result<&[T], BindError> {
        let (ptr, count) = self.column_parts::<T>(index)?;
        // SAFETY: validated by `column_parts`; the borrow of `self` keeps
        // the view from outliving the batch.
        Ok(unsafe { slice::from_raw_parts(ptr.as_ptr(), count) })
    }

    /// Mutable view of column `index` (1-based) as `T`.
    pub fn column_mut<T: Pod>(&mut self, index: u32) -> Result<&mut [T], BindError> {
        let (ptr, count) = self.column_parts::<T>(index)?;
        // SAFETY: as in `column`; `&mut self` rules out a second view.
        Ok(unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), count) })
    }

    /// Mutable view not tied to a borrow of `self`.
    ///
    /// # Safety
    /// The caller must not hold two views of the same column at once, and
    /// must have checked that columns do not overlap (see
    /// [`RowBatch::check_disjoint`]).
    pub(crate) unsafe fn column_detached<T: Pod>(
        &self,
        index: u32,
    ) -> Result<&'a mut [T], BindError> {
        let (ptr, count) = self.column_parts::<T>(index)?;
        Ok(slice::from_raw_parts_mut(ptr.as_ptr(), count))
    }

    /// Fail when two of the first `columns` columns share memory.
    pub(crate) fn check_disjoint(&self, columns: u32) -> Result<(), BindError> {
        if self.count() == 0 {
            return Ok(());
        }
        let mut spans = Vec::with_capacity(columns as usize);
        for index in 1..=columns.min(self.raw.column_count) {
            // SAFETY: `from_raw` requires the size table to be readable.
            let Some(size) = (unsafe { self.raw.column_size(index) }) else {
                continue;
            };
            let base = unsafe { self.raw.column_ptr(index, size) } as usize;
            if base == 0 || size == 0 {
                continue;
            }
            let end = base + size * self.count();
            if let Some(&(first, _, _)) = spans
                .iter()
                .find(|(_, start, stop)| base < *stop && *start < end)
            {
                return Err(BindError::AliasedColumns {
                    first,
                    second: index,
                });
            }
            spans.push((index, base, end));
        }
        Ok(())
    }

    fn column_parts<T: Pod>(&self, index: u32) -> Result<(NonNull<T>, usize), BindError> {
        let available = self.raw.column_count;
        // SAFETY: `from_raw` requires the size table to be readable.
        let actual = match unsafe { self.raw.column_size(index) } {
            Some(actual) => actual,
            None => {
                return Err(BindError::ColumnOutOfRange {
                    column: index,
                    available,
                })
            }
        };
        let expected = size_of::<T>();
        if actual != expected {
            return Err(BindError::TypeMismatch {
                column: index,
                expected,
                actual,
            });
        }

        let count = self.count();
        if count == 0 {
            return Ok((NonNull::dangling(), 0));
        }

        // SAFETY: index and size were checked above.
        let base = unsafe { self.raw.column_ptr(index, expected) } as *mut T;
        let Some(base) = NonNull::new(base) else {
            return Err(BindError::NullColumn {
                column: index,
                count,
            });
        };
        if base.as_ptr() as usize % align_of::<T>() != 0 {
            return Err(BindError::MisalignedColumn {
                column: index,
                align: align_of::<T>(),
            });
        }
        Ok((base, count))
    }
}

// ============================================================================
// Owned batch
// ============================================================================

/// A batch assembled in Rust, for driving trampolines without an engine.
pub struct OwnedRows {
    entities: Vec<EntityId>,
    columns: Vec<Option<ColumnBuffer>>,
    pointers: Vec<*mut c_void>,
    sizes: Vec<usize>,
    system: EntityId,
    delta_time: f32,
}

impl OwnedRows {
    pub fn new(entities: Vec<EntityId>) -> Self {
        Self {
            entities,
            columns: Vec::new(),
            pointers: Vec::new(),
            sizes: Vec::new(),
            system: EntityId::NULL,
            delta_time: 0.0,
        }
    }

    pub fn with_system(mut self, system: EntityId) -> Self {
        self.system = system;
        self
    }

    pub fn with_delta_time(mut self, delta_time: f32) -> Self {
        self.delta_time = delta_time;
        self
    }

    /// Append a column holding `values`, one per entity.
    pub fn with_column<T: Pod>(self, values: &[T]) -> Self {
        self.with_buffer(ColumnBuffer::from_slice(values))
    }

    /// Append a column of `elem_size`-byte elements copied from `bytes`.
    pub fn with_raw_column(self, elem_size: usize, bytes: &[u8]) -> Self {
        let mut buffer = ColumnBuffer::new(elem_size);
        buffer.extend_bytes(bytes);
        self.with_buffer(buffer)
    }

    /// Append a column that reports `elem_size` but has no data.
    pub fn with_null_column(mut self, elem_size: usize) -> Self {
        self.columns.push(None);
        self.sizes.push(elem_size);
        self
    }

    pub fn with_buffer(mut self, buffer: ColumnBuffer) -> Self {
        self.sizes.push(buffer.elem_size());
        self.columns.push(Some(buffer));
        self
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Copy of column `index` (1-based) read back as `T`.
    pub fn column_values<T: Pod>(&self, index: usize) -> Vec<T> {
        match self.columns.get(index.wrapping_sub(1)) {
            Some(Some(buffer)) if buffer.elem_size() == size_of::<T>() => buffer
                .bytes()
                .chunks_exact(size_of::<T>())
                .map(bytemuck::pod_read_unaligned)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Raw view of this batch. The result borrows `self`'s buffers through
    /// raw pointers: it must not outlive `self` or a later call to `as_raw`.
    ///
    /// Fails when a column does not hold exactly one element per entity.
    pub fn as_raw(&mut self, ctx: *mut c_void) -> Result<RawRows, BindError> {
        let rows = self.entities.len();
        for (index, column) in self.columns.iter().enumerate() {
            if let Some(buffer) = column {
                if buffer.len() != rows {
                    return Err(BindError::ColumnLength {
                        column: index as u32 + 1,
                        rows,
                        len: buffer.len(),
                    });
                }
            }
        }

        self.pointers.clear();
        for column in &mut self.columns {
            self.pointers.push(match column {
                Some(buffer) => buffer.as_mut_ptr(),
                None => ptr::null_mut(),
            });
        }
        Ok(RawRows {
            world: RawWorld::from_ptr(ptr::null_mut()),
            system: self.system,
            ctx,
            delta_time: self.delta_time,
            count: rows as u32,
            entities: self.entities.as_ptr(),
            column_count: self.columns.len() as u32,
            columns: self.pointers.as_ptr(),
            column_sizes: self.sizes.as_ptr(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{Pod, Zeroable};

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    struct Vec2 {
        x: f64,
        y: f64,
    }

    fn ids(n: u64) -> Vec<EntityId> {
        (1..=n).map(EntityId::from_raw).collect()
    }

    #[test]
    fn column_buffer_swap_remove_keeps_rest() {
        let mut buffer = ColumnBuffer::from_slice(&[1u32, 2, 3, 4]);
        buffer.swap_remove(1);
        assert_eq!(buffer.len(), 3);
        assert_eq!(bytemuck::cast_slice::<u8, u32>(buffer.bytes()), &[1, 4, 3]);
        buffer.swap_remove(2);
        assert_eq!(bytemuck::cast_slice::<u8, u32>(buffer.bytes()), &[1, 4]);
    }

    #[test]
    fn column_buffer_is_sixteen_byte_aligned() {
        let mut buffer = ColumnBuffer::new(24);
        buffer.push_zeroed();
        assert_eq!(buffer.as_mut_ptr() as usize % 16, 0);
        assert_eq!(buffer.bytes().len(), 24);
    }

    #[test]
    fn typed_view_reads_and_writes() {
        let mut rows = OwnedRows::new(ids(2))
            .with_delta_time(0.5)
            .with_column(&[Vec2 { x: 1.0, y: 2.0 }, Vec2 { x: 3.0, y: 4.0 }]);
        let raw = rows.as_raw(ptr::null_mut()).unwrap();
        let mut batch = unsafe { RowBatch::from_raw(&raw) };

        assert_eq!(batch.count(), 2);
        assert_eq!(batch.entities(), &ids(2)[..]);
        assert_eq!(batch.info().delta_time, 0.5);

        let column = batch.column_mut::<Vec2>(1).unwrap();
        column[1].x = 30.0;
        drop(batch);

        let values: Vec<Vec2> = rows.column_values(1);
        assert_eq!(values[1], Vec2 { x: 30.0, y: 4.0 });
    }

    #[test]
    fn wrong_element_size_is_a_type_mismatch() {
        let mut rows = OwnedRows::new(ids(3)).with_column(&[1.0f64, 2.0, 3.0]);
        let raw = rows.as_raw(ptr::null_mut()).unwrap();
        let batch = unsafe { RowBatch::from_raw(&raw) };

        match batch.column::<Vec2>(1) {
            Err(BindError::TypeMismatch {
                column: 1,
                expected: 16,
                actual: 8,
            }) => {}
            other => panic!("expected TypeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn out_of_range_columns_are_rejected() {
        let mut rows = OwnedRows::new(ids(1)).with_column(&[1u32]);
        let raw = rows.as_raw(ptr::null_mut()).unwrap();
        let batch = unsafe { RowBatch::from_raw(&raw) };

        for index in [0, 2] {
            assert!(matches!(
                batch.column::<u32>(index),
                Err(BindError::ColumnOutOfRange { available: 1, .. })
            ));
        }
    }

    #[test]
    fn null_column_with_rows_is_rejected() {
        let mut rows = OwnedRows::new(ids(2)).with_null_column(4);
        let raw = rows.as_raw(ptr::null_mut()).unwrap();
        let batch = unsafe { RowBatch::from_raw(&raw) };

        assert!(matches!(
            batch.column::<u32>(1),
            Err(BindError::NullColumn { column: 1, count: 2 })
        ));
    }

    #[test]
    fn empty_batch_yields_empty_views() {
        let mut rows = OwnedRows::new(Vec::new()).with_null_column(16);
        let raw = rows.as_raw(ptr::null_mut()).unwrap();
        let batch = unsafe { RowBatch::from_raw(&raw) };

        assert!(batch.column::<Vec2>(1).unwrap().is_empty());
        assert!(batch.entities().is_empty());
    }

    #[test]
    fn short_column_is_rejected_before_any_view() {
        let mut rows = OwnedRows::new(ids(64)).with_column(&[7u64]);
        assert!(matches!(
            rows.as_raw(ptr::null_mut()),
            Err(BindError::ColumnLength {
                column: 1,
                rows: 64,
                len: 1
            })
        ));

        let mut rows = OwnedRows::new(ids(2))
            .with_column(&[1u32, 2])
            .with_raw_column(4, &[0u8; 12]);
        assert!(matches!(
            rows.as_raw(ptr::null_mut()),
            Err(BindError::ColumnLength { column: 2, rows: 2, len: 3 })
        ));
    }

    #[test]
    fn misaligned_base_is_rejected() {
        let mut storage = [0u128; 4];
        let base = unsafe { (storage.as_mut_ptr() as *mut u8).add(4) } as *mut c_void;
        let columns = [base];
        let sizes = [8usize];
        let entities = ids(2);
        let raw = RawRows {
            world: RawWorld::from_ptr(ptr::null_mut()),
            system: EntityId::NULL,
            ctx: ptr::null_mut(),
            delta_time: 0.0,
            count: 2,
            entities: entities.as_ptr(),
            column_count: 1,
            columns: columns.as_ptr(),
            column_sizes: sizes.as_ptr(),
        };
        let batch = unsafe { RowBatch::from_raw(&raw) };

        assert!(matches!(
            batch.column::<f64>(1),
            Err(BindError::MisalignedColumn { column: 1, align: 8 })
        ));
    }

    #[test]
    fn overlapping_columns_are_detected() {
        let mut storage = [0u64; 4];
        let base = storage.as_mut_ptr() as *mut c_void;
        let columns = [base, base];
        let sizes = [8usize, 8];
        let entities = ids(2);
        let raw = RawRows {
            world: RawWorld::from_ptr(ptr::null_mut()),
            system: EntityId::NULL,
            ctx: ptr::null_mut(),
            delta_time: 0.0,
            count: 2,
            entities: entities.as_ptr(),
            column_count: 2,
            columns: columns.as_ptr(),
            column_sizes: sizes.as_ptr(),
        };
        let batch = unsafe { RowBatch::from_raw(&raw) };

        assert!(matches!(
            batch.check_disjoint(2),
            Err(BindError::AliasedColumns { first: 1, second: 2 })
        ));
        assert!(batch.check_disjoint(1).is_ok());
    }
}
