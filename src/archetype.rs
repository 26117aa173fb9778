// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Archetype storage: one contiguous table per component mask.
//!
//! Rows are removed by swap-with-last; row indices are stable only between
//! structural mutations.

use std::any::TypeId;

use crate::component::{Component, ComponentRegistry, MAX_COMPONENTS};
use crate::entity::Entity;

/// `column_of` sentinel for bits outside the mask.
const NO_COLUMN: u8 = u8::MAX;

/// Transition edge sentinel: target archetype not yet known.
const NO_EDGE: u32 = u32::MAX;

/// Type-erased component column
pub struct ComponentColumn {
    data: Vec<u8>,
    len: usize,
    item_size: usize,
    bit: u64,
    type_id: TypeId,
    drop_fn: Option<unsafe fn(*mut u8)>,
}

impl ComponentColumn {
    fn new(bit: u64, type_id: TypeId, item_size: usize, drop_fn: Option<unsafe fn(*mut u8)>) -> Self {
        Self {
            data: Vec::new(),
            len: 0,
            item_size,
            bit,
            type_id,
            drop_fn,
        }
    }

    /// Mask bit this column stores.
    pub fn bit(&self) -> u64 {
        self.bit
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn item_size(&self) -> usize {
        self.item_size
    }

    /// Number of values stored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append one zero-initialized slot and return its row index.
    fn grow_one(&mut self) -> usize {
        let row = self.len;
        self.data.resize(self.data.len() + self.item_size, 0);
        self.len += 1;
        row
    }

    /// Raw pointer to a row slot. The slot must exist.
    pub(crate) fn get_ptr_mut(&mut self, row: usize) -> *mut u8 {
        debug_assert!(row < self.len);
        if self.item_size == 0 {
            return std::ptr::NonNull::dangling().as_ptr();
        }
        unsafe { self.data.as_mut_ptr().add(row * self.item_size) }
    }

    fn get_ptr(&self, row: usize) -> *const u8 {
        debug_assert!(row < self.len);
        if self.item_size == 0 {
            return std::ptr::NonNull::dangling().as_ptr();
        }
        unsafe { self.data.as_ptr().add(row * self.item_size) }
    }

    /// Get component at row
    pub fn get<T: Component>(&self, row: usize) -> Option<&T> {
        if row >= self.len || self.type_id != TypeId::of::<T>() {
            return None;
        }
        Some(unsafe { &*(self.get_ptr(row) as *const T) })
    }

    /// Get mutable component at row
    pub fn get_mut<T: Component>(&mut self, row: usize) -> Option<&mut T> {
        if row >= self.len || self.type_id != TypeId::of::<T>() {
            return None;
        }
        Some(unsafe { &mut *(self.get_ptr_mut(row) as *mut T) })
    }

    /// View the column as a typed slice. Empty on type mismatch.
    pub fn as_slice<T: Component>(&self) -> &[T] {
        if self.type_id != TypeId::of::<T>() {
            return &[];
        }
        unsafe { self.as_slice_unchecked() }
    }

    /// Mutable typed view. Empty on type mismatch.
    pub fn as_mut_slice<T: Component>(&mut self) -> &mut [T] {
        if self.type_id != TypeId::of::<T>() {
            return &mut [];
        }
        unsafe { self.as_mut_slice_unchecked() }
    }

    /// Typed view without the type check.
    ///
    /// # Safety
    /// `T` must be the column's component type.
    pub unsafe fn as_slice_unchecked<T: Component>(&self) -> &[T] {
        debug_assert_eq!(self.type_id, TypeId::of::<T>());
        if std::mem::size_of::<T>() == 0 {
            std::slice::from_raw_parts(std::ptr::NonNull::dangling().as_ptr(), self.len)
        } else {
            std::slice::from_raw_parts(self.data.as_ptr() as *const T, self.len)
        }
    }

    /// Mutable typed view without the type check.
    ///
    /// # Safety
    /// `T` must be the column's component type.
    pub unsafe fn as_mut_slice_unchecked<T: Component>(&mut self) -> &mut [T] {
        debug_assert_eq!(self.type_id, TypeId::of::<T>());
        if std::mem::size_of::<T>() == 0 {
            std::slice::from_raw_parts_mut(std::ptr::NonNull::dangling().as_ptr(), self.len)
        } else {
            std::slice::from_raw_parts_mut(self.data.as_mut_ptr() as *mut T, self.len)
        }
    }

    /// Copy one row's bytes from another column of the same type.
    ///
    /// # Safety
    /// Both rows must exist and the columns must share item size. The
    /// destination slot's previous bytes are overwritten without drop; the
    /// source value must be treated as moved by the caller.
    pub(crate) unsafe fn copy_row_from(&mut self, src: &ComponentColumn, src_row: usize, dst_row: usize) {
        debug_assert_eq!(self.item_size, src.item_size);
        if self.item_size == 0 {
            return;
        }
        std::ptr::copy_nonoverlapping(src.get_ptr(src_row), self.get_ptr_mut(dst_row), self.item_size);
    }

    /// Swap-remove a row. Runs drop glue for the removed value only when
    /// `drop_value` is set (migrated values are moved, not destroyed).
    fn swap_remove(&mut self, row: usize, drop_value: bool) {
        debug_assert!(row < self.len);
        let last = self.len - 1;

        if drop_value {
            if let Some(drop_fn) = self.drop_fn {
                unsafe { drop_fn(self.get_ptr_mut(row)) };
            }
        }

        if self.item_size != 0 {
            if row != last {
                unsafe {
                    std::ptr::copy_nonoverlapping(
                        self.data.as_ptr().add(last * self.item_size),
                        self.data.as_mut_ptr().add(row * self.item_size),
                        self.item_size,
                    );
                }
            }
            self.data.truncate(last * self.item_size);
        }
        self.len = last;
    }

    fn reserve(&mut self, additional_rows: usize) {
        self.data.reserve(additional_rows * self.item_size);
    }
}

impl Drop for ComponentColumn {
    fn drop(&mut self) {
        if let Some(drop_fn) = self.drop_fn {
            for row in 0..self.len {
                unsafe {
                    drop_fn(self.get_ptr_mut(row));
                }
            }
        }
    }
}

/// Archetype: Structure of Arrays storage for one component mask.
///
/// Columns are laid out in ascending bit order; `column_of` maps a bit
/// index to its column in O(1). The edge arrays memoize which archetype a
/// single-bit add or remove lands in.
pub struct Archetype {
    mask: u64,
    entities: Vec<Entity>,
    columns: Vec<ComponentColumn>,
    column_of: [u8; MAX_COMPONENTS],
    add_edges: [u32; MAX_COMPONENTS],
    remove_edges: [u32; MAX_COMPONENTS],
}

impl Archetype {
    /// Create the table for `mask`. Every bit of the mask must already be
    /// registered.
    pub(crate) fn new(mask: u64, registry: &ComponentRegistry) -> Self {
        let mut columns = Vec::with_capacity(mask.count_ones() as usize);
        let mut column_of = [NO_COLUMN; MAX_COMPONENTS];

        let mut bits = mask;
        while bits != 0 {
            let bit_index = bits.trailing_zeros() as usize;
            bits &= bits - 1;

            if let Some(info) = registry.info(bit_index) {
                column_of[bit_index] = columns.len() as u8;
                columns.push(ComponentColumn::new(
                    1u64 << bit_index,
                    info.type_id,
                    info.size,
                    info.drop_fn,
                ));
            } else {
                debug_assert!(false, "archetype mask contains unregistered bit {bit_index}");
            }
        }

        Self {
            mask,
            entities: Vec::new(),
            columns,
            column_of,
            add_edges: [NO_EDGE; MAX_COMPONENTS],
            remove_edges: [NO_EDGE; MAX_COMPONENTS],
        }
    }

    /// Component mask of this archetype.
    pub fn mask(&self) -> u64 {
        self.mask
    }

    /// Get all entities
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity_at(&self, row: usize) -> Option<Entity> {
        self.entities.get(row).copied()
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Is empty
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn has_bit(&self, bit: u64) -> bool {
        self.mask & bit != 0
    }

    /// Column index for a mask bit
    pub fn column_index(&self, bit: u64) -> Option<usize> {
        let slot = self.column_of[bit.trailing_zeros() as usize];
        if slot == NO_COLUMN {
            None
        } else {
            Some(slot as usize)
        }
    }

    /// Get column by mask bit
    pub fn column(&self, bit: u64) -> Option<&ComponentColumn> {
        let idx = self.column_index(bit)?;
        self.columns.get(idx)
    }

    /// Get column by mask bit, mutably
    pub fn column_mut(&mut self, bit: u64) -> Option<&mut ComponentColumn> {
        let idx = self.column_index(bit)?;
        self.columns.get_mut(idx)
    }

    /// Find a column by component type. Linear scan; prefer the by-bit
    /// accessors on hot paths.
    pub fn column_by_type<T: Component>(&self) -> Option<&ComponentColumn> {
        let type_id = TypeId::of::<T>();
        self.columns.iter().find(|col| col.type_id == type_id)
    }

    pub(crate) fn columns(&self) -> &[ComponentColumn] {
        &self.columns
    }

    pub(crate) fn columns_mut(&mut self) -> &mut [ComponentColumn] {
        &mut self.columns
    }

    /// Typed view of a column by bit. Empty when the bit is absent, the
    /// table has no rows, or the type does not match the column.
    pub fn column_slice<T: Component>(&self, bit: u64) -> &[T] {
        match self.column(bit) {
            Some(col) => col.as_slice(),
            None => &[],
        }
    }

    /// Mutable typed view of a column by bit.
    pub fn column_slice_mut<T: Component>(&mut self, bit: u64) -> &mut [T] {
        match self.column_mut(bit) {
            Some(col) => col.as_mut_slice(),
            None => &mut [],
        }
    }

    /// Typed view by component type. Linear scan; convenience only.
    pub fn column_slice_by_type<T: Component>(&self) -> &[T] {
        match self.column_by_type::<T>() {
            Some(col) => col.as_slice(),
            None => &[],
        }
    }

    /// Typed view with every check elided.
    ///
    /// # Safety
    /// The bit must be present in this archetype's mask and `T` must be
    /// the component type registered for it.
    pub unsafe fn column_slice_unchecked<T: Component>(&self, bit: u64) -> &[T] {
        let idx = *self.column_of.get_unchecked(bit.trailing_zeros() as usize) as usize;
        self.columns.get_unchecked(idx).as_slice_unchecked()
    }

    /// Allocate a zero-initialized row for `entity` and return its index.
    pub(crate) fn allocate_row(&mut self, entity: Entity) -> usize {
        let row = self.entities.len();
        self.entities.push(entity);
        for column in &mut self.columns {
            column.grow_one();
        }
        row
    }

    /// Swap-remove a row. Values of columns whose bit is set in
    /// `drop_mask` are destroyed; the rest are assumed moved elsewhere.
    /// Returns the entity that was swapped into `row`, if any.
    pub(crate) fn swap_remove_row(&mut self, row: usize, drop_mask: u64) -> Option<Entity> {
        debug_assert!(row < self.entities.len());

        for column in &mut self.columns {
            column.swap_remove(row, drop_mask & column.bit != 0);
        }

        self.entities.swap_remove(row);

        // If we swapped someone in, return their entity so the caller can
        // patch their location.
        if row < self.entities.len() {
            Some(self.entities[row])
        } else {
            None
        }
    }

    /// Reserve space for additional rows
    pub fn reserve_rows(&mut self, additional: usize) {
        if self.entities.capacity() - self.entities.len() < additional {
            self.entities.reserve(additional);
            for column in &mut self.columns {
                column.reserve(additional);
            }
        }
    }

    pub(crate) fn add_edge(&self, bit_index: usize) -> Option<usize> {
        let target = self.add_edges[bit_index];
        if target == NO_EDGE {
            None
        } else {
            Some(target as usize)
        }
    }

    pub(crate) fn remove_edge(&self, bit_index: usize) -> Option<usize> {
        let target = self.remove_edges[bit_index];
        if target == NO_EDGE {
            None
        } else {
            Some(target as usize)
        }
    }

    pub(crate) fn set_add_edge(&mut self, bit_index: usize, target: usize) {
        self.add_edges[bit_index] = target as u32;
    }

    pub(crate) fn set_remove_edge(&mut self, bit_index: usize, target: usize) {
        self.remove_edges[bit_index] = target as u32;
    }
}
