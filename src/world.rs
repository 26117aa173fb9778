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

//! World: central entity and archetype storage

use std::any::TypeId;
use std::cell::RefCell;

use ahash::AHashMap;
use smallvec::SmallVec;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::archetype::Archetype;
use crate::component::{Bundle, Component, ComponentRegistry, MAX_BUNDLE_COMPONENTS};
use crate::entity::{Entity, EntityAllocator, EntityLocation};
use crate::query::QueryKey;

/// Central ECS world
///
/// The World owns all entities, archetypes, the component registry and the
/// query cache. Entity handles held by callers are validated against the
/// locations table on every access.
pub struct World {
    /// Entity handles and the id -> location table
    pub(crate) entities: EntityAllocator,

    /// Component type -> mask bit registry
    pub(crate) registry: ComponentRegistry,

    /// All archetypes in the world; indices are stable for its lifetime
    pub(crate) archetypes: Vec<Archetype>,

    /// Maps component masks to archetype indices
    pub(crate) archetype_index: AHashMap<u64, usize>,

    /// Cached query results, kept complete as archetypes appear
    pub(crate) query_cache: RefCell<AHashMap<QueryKey, Vec<usize>>>,
}

impl World {
    /// Create a new, empty world.
    pub fn new() -> Self {
        Self {
            entities: EntityAllocator::new(),
            registry: ComponentRegistry::new(),

            // Start with reasonable defaults to avoid resize spikes
            archetypes: Vec::with_capacity(64),
            archetype_index: AHashMap::with_capacity(64),
            query_cache: RefCell::new(AHashMap::with_capacity(32)),
        }
    }

    /// Register a component type and return its mask bit.
    ///
    /// Idempotent per world. The first registered type receives bit 0.
    ///
    /// # Panics
    /// Registering a 65th distinct type aborts; see
    /// [`MAX_COMPONENTS`](crate::component::MAX_COMPONENTS).
    pub fn register<T: Component>(&mut self) -> u64 {
        self.registry.register::<T>()
    }

    /// Mask bit of a registered component type.
    pub fn bit_of<T: Component>(&self) -> Option<u64> {
        self.registry.bit_of::<T>()
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> u32 {
        self.entities.alive_count()
    }

    /// Pre-size the locations table for a burst of spawns.
    pub fn reserve_entities(&mut self, additional: usize) {
        self.entities.reserve(additional);
    }

    /// Check if an entity handle is live (id in range, slot alive, and
    /// generation matching).
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.resolve(entity).is_some()
    }

    /// Current location of a live entity.
    pub fn location(&self, entity: Entity) -> Option<EntityLocation> {
        self.entities.resolve(entity)
    }

    /// Spawn a new entity with the given bundle of components.
    ///
    /// Bundle members whose type is not registered are ignored when
    /// building the mask (their values are dropped). If no member is
    /// registered, no entity is created and [`Entity::DEAD`] is returned.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> Entity {
        let type_ids = B::type_ids();

        #[cfg(feature = "profiling")]
        let span = info_span!(
            "world.spawn",
            bundle_components = type_ids.len(),
            archetype_count = self.archetypes.len()
        );
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let mut bits: SmallVec<[u64; MAX_BUNDLE_COMPONENTS]> = SmallVec::new();
        let mut mask = 0u64;
        for &type_id in type_ids.iter() {
            let bit = self.registry.bit_of_id(type_id).unwrap_or(0);
            mask |= bit;
            bits.push(bit);
        }

        if mask == 0 {
            return Entity::DEAD;
        }

        let arch_id = self.find_or_create_archetype(mask);
        let entity = self.entities.allocate();
        let archetype = &mut self.archetypes[arch_id];
        let row = archetype.allocate_row(entity);

        // Null pointer means "no storage": the bundle drops that member.
        let mut ptrs: SmallVec<[*mut u8; MAX_BUNDLE_COMPONENTS]> = SmallVec::new();
        for &bit in bits.iter() {
            if bit == 0 {
                ptrs.push(std::ptr::null_mut());
            } else {
                match archetype.column_mut(bit) {
                    Some(column) => ptrs.push(column.get_ptr_mut(row)),
                    None => ptrs.push(std::ptr::null_mut()),
                }
            }
        }

        unsafe {
            bundle.write(&ptrs);
        }

        let loc = self.entities.location_mut(entity.id);
        loc.archetype_id = arch_id;
        loc.row = row;
        entity
    }

    /// Spawn `n` entities carrying copies of the same bundle.
    ///
    /// Rows and columns are reserved up front, so the loop allocates only
    /// when a column doubles past the reservation.
    pub fn spawn_batch<B: Bundle + Clone>(&mut self, n: usize, bundle: B) -> Vec<Entity> {
        #[cfg(feature = "profiling")]
        let span = info_span!("world.spawn_batch", count = n);
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        if n == 0 {
            return Vec::new();
        }

        let type_ids = B::type_ids();
        let mut bits: SmallVec<[u64; MAX_BUNDLE_COMPONENTS]> = SmallVec::new();
        let mut mask = 0u64;
        for &type_id in type_ids.iter() {
            let bit = self.registry.bit_of_id(type_id).unwrap_or(0);
            mask |= bit;
            bits.push(bit);
        }

        if mask == 0 {
            return Vec::new();
        }

        let arch_id = self.find_or_create_archetype(mask);
        self.entities.reserve(n);
        self.archetypes[arch_id].reserve_rows(n);

        let mut spawned = Vec::with_capacity(n);
        for _ in 0..n {
            let entity = self.entities.allocate();
            let archetype = &mut self.archetypes[arch_id];
            let row = archetype.allocate_row(entity);

            let mut ptrs: SmallVec<[*mut u8; MAX_BUNDLE_COMPONENTS]> = SmallVec::new();
            for &bit in bits.iter() {
                if bit == 0 {
                    ptrs.push(std::ptr::null_mut());
                } else {
                    match archetype.column_mut(bit) {
                        Some(column) => ptrs.push(column.get_ptr_mut(row)),
                        None => ptrs.push(std::ptr::null_mut()),
                    }
                }
            }

            unsafe {
                bundle.clone().write(&ptrs);
            }

            let loc = self.entities.location_mut(entity.id);
            loc.archetype_id = arch_id;
            loc.row = row;
            spawned.push(entity);
        }
        spawned
    }

    /// Spawn `n` zero-initialized entities for `mask`.
    ///
    /// Unknown bits are ignored; a mask with no known bits spawns nothing.
    /// Intended for plain-data components: zeroed bytes must be a valid
    /// value of every component in the mask. The caller writes column data
    /// directly afterwards.
    pub fn spawn_with_mask(&mut self, mask: u64, n: usize) -> Vec<Entity> {
        let mask = mask & self.registry.known_mask();
        if mask == 0 || n == 0 {
            return Vec::new();
        }

        let arch_id = self.find_or_create_archetype(mask);
        self.entities.reserve(n);
        self.archetypes[arch_id].reserve_rows(n);

        let mut spawned = Vec::with_capacity(n);
        for _ in 0..n {
            let entity = self.entities.allocate();
            let row = self.archetypes[arch_id].allocate_row(entity);
            let loc = self.entities.location_mut(entity.id);
            loc.archetype_id = arch_id;
            loc.row = row;
            spawned.push(entity);
        }
        spawned
    }

    /// Spawn `n` zero-initialized entities, then run `init` once per new
    /// row so the caller can fill column data in place.
    pub fn spawn_batch_with_init<F>(&mut self, mask: u64, n: usize, mut init: F) -> Vec<Entity>
    where
        F: FnMut(&mut Archetype, usize),
    {
        let spawned = self.spawn_with_mask(mask, n);
        if let Some(&first) = spawned.first() {
            // Rows are appended consecutively by spawn_with_mask.
            if let Some(loc) = self.entities.resolve(first) {
                let archetype = &mut self.archetypes[loc.archetype_id];
                for row in loc.row..loc.row + spawned.len() {
                    init(archetype, row);
                }
            }
        }
        spawned
    }

    /// Despawn an entity, dropping its components.
    ///
    /// Returns false for dead or stale handles.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        let Some(loc) = self.entities.resolve(entity) else {
            return false;
        };

        let archetype = &mut self.archetypes[loc.archetype_id];
        let drop_mask = archetype.mask();
        if let Some(swapped) = archetype.swap_remove_row(loc.row, drop_mask) {
            self.entities.location_mut(swapped.id).row = loc.row;
        }
        self.entities.release(entity);
        true
    }

    /// Despawn a batch of entities, returning how many were live.
    pub fn despawn_batch(&mut self, entities: &[Entity]) -> usize {
        let mut despawned = 0;
        for &entity in entities {
            if self.despawn(entity) {
                despawned += 1;
            }
        }
        despawned
    }

    /// Get immutable reference to a component on an entity
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        let loc = self.entities.resolve(entity)?;
        let bit = self.registry.bit_of::<T>()?;
        self.archetypes.get(loc.archetype_id)?.column(bit)?.get::<T>(loc.row)
    }

    /// Get mutable reference to a component on an entity
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let loc = self.entities.resolve(entity)?;
        let bit = self.registry.bit_of::<T>()?;
        self.archetypes
            .get_mut(loc.archetype_id)?
            .column_mut(bit)?
            .get_mut::<T>(loc.row)
    }

    /// Component access with every check elided.
    ///
    /// # Safety
    /// `entity` must be live, `T` must be registered, and the entity must
    /// have the component. Violating any of these is undefined behavior.
    pub unsafe fn get_unchecked<T: Component>(&self, entity: Entity) -> &T {
        let loc = self.entities.location_unchecked(entity.id);
        let bit = self.registry.bit_of::<T>().unwrap_unchecked();
        let archetype = self.archetypes.get_unchecked(loc.archetype_id);
        archetype.column_slice_unchecked::<T>(bit).get_unchecked(loc.row)
    }

    /// Check if entity has a specific component
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        match (self.entities.resolve(entity), self.registry.bit_of::<T>()) {
            (Some(loc), Some(bit)) => self.archetypes[loc.archetype_id].has_bit(bit),
            _ => false,
        }
    }

    /// Check if entity has every component in `mask`
    pub fn has_components(&self, entity: Entity, mask: u64) -> bool {
        self.component_mask(entity)
            .is_some_and(|m| m & mask == mask)
    }

    /// Component mask of a live entity.
    pub fn component_mask(&self, entity: Entity) -> Option<u64> {
        let loc = self.entities.resolve(entity)?;
        Some(self.archetypes[loc.archetype_id].mask())
    }

    /// Write a component value, adding the component if absent.
    ///
    /// Alias of [`World::add_component`].
    pub fn set<T: Component>(&mut self, entity: Entity, value: T) -> bool {
        self.add_component(entity, value)
    }

    /// Add a component to an entity.
    ///
    /// If the entity already has `T` the value is overwritten in place and
    /// no migration happens. Otherwise the entity's row moves to the
    /// archetype one bit over, through the memoized transition edge.
    ///
    /// Returns false for dead handles and unregistered types.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) -> bool {
        let Some(loc) = self.entities.resolve(entity) else {
            return false;
        };
        let Some(bit) = self.registry.bit_of::<T>() else {
            return false;
        };

        let archetype = &mut self.archetypes[loc.archetype_id];
        if archetype.has_bit(bit) {
            if let Some(slot) = archetype.column_mut(bit).and_then(|c| c.get_mut::<T>(loc.row)) {
                *slot = value;
            }
            return true;
        }

        let target = self.add_edge_target(loc.archetype_id, bit.trailing_zeros() as usize);
        let new_row = self.move_entity(entity, loc, target);

        // The migrated slot is zero bytes; write the value over it.
        if let Some(column) = self.archetypes[target].column_mut(bit) {
            unsafe { std::ptr::write(column.get_ptr_mut(new_row).cast::<T>(), value) };
        }
        true
    }

    /// Add every registered component in `mask`, zero-initialized, one
    /// single-bit migration per missing component. Bits already present
    /// and unknown bits are skipped. As with
    /// [`World::spawn_with_mask`], zeroed bytes must be a valid value of
    /// every added component.
    pub fn add_components(&mut self, entity: Entity, mask: u64) -> bool {
        if self.entities.resolve(entity).is_none() {
            return false;
        }

        let mut bits = mask & self.registry.known_mask();
        while bits != 0 {
            let bit_index = bits.trailing_zeros() as usize;
            bits &= bits - 1;

            let Some(loc) = self.entities.resolve(entity) else {
                return false;
            };
            if self.archetypes[loc.archetype_id].has_bit(1u64 << bit_index) {
                continue;
            }
            let target = self.add_edge_target(loc.archetype_id, bit_index);
            self.move_entity(entity, loc, target);
        }
        true
    }

    /// Remove a component from an entity.
    ///
    /// Returns false when the entity is dead, the type unregistered, or
    /// the component absent. Removing the last component despawns the
    /// entity: an empty-mask archetype is not representable.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> bool {
        let Some(loc) = self.entities.resolve(entity) else {
            return false;
        };
        let Some(bit) = self.registry.bit_of::<T>() else {
            return false;
        };

        let arch_mask = self.archetypes[loc.archetype_id].mask();
        if arch_mask & bit == 0 {
            return false;
        }
        if arch_mask & !bit == 0 {
            return self.despawn(entity);
        }

        let target = self.remove_edge_target(loc.archetype_id, bit.trailing_zeros() as usize);
        self.move_entity(entity, loc, target);
        true
    }

    /// Remove every component in `mask`, one single-bit migration per
    /// present component. Absent bits are skipped; emptying the mask
    /// despawns the entity.
    pub fn remove_components(&mut self, entity: Entity, mask: u64) -> bool {
        if self.entities.resolve(entity).is_none() {
            return false;
        }

        let mut bits = mask;
        while bits != 0 {
            let bit_index = bits.trailing_zeros() as usize;
            bits &= bits - 1;
            let bit = 1u64 << bit_index;

            let Some(loc) = self.entities.resolve(entity) else {
                return true;
            };
            let arch_mask = self.archetypes[loc.archetype_id].mask();
            if arch_mask & bit == 0 {
                continue;
            }
            if arch_mask & !bit == 0 {
                self.despawn(entity);
                return true;
            }
            let target = self.remove_edge_target(loc.archetype_id, bit_index);
            self.move_entity(entity, loc, target);
        }
        true
    }

    /// Get archetype by index
    pub fn archetype(&self, index: usize) -> Option<&Archetype> {
        self.archetypes.get(index)
    }

    /// Get archetype mutably
    pub fn archetype_mut(&mut self, index: usize) -> Option<&mut Archetype> {
        self.archetypes.get_mut(index)
    }

    /// Get all archetypes
    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Get or create the archetype for `mask`.
    ///
    /// Creation wires transition edges to every existing single-bit
    /// neighbor and appends the new index to every cached query result it
    /// matches, so outstanding results stay complete.
    pub(crate) fn find_or_create_archetype(&mut self, mask: u64) -> usize {
        debug_assert_ne!(mask, 0);

        if let Some(&id) = self.archetype_index.get(&mask) {
            return id;
        }

        let mut archetype = Archetype::new(mask, &self.registry);
        let id = self.archetypes.len();

        for (other_id, other) in self.archetypes.iter_mut().enumerate() {
            let diff = other.mask() ^ mask;
            if diff.count_ones() == 1 {
                let bit_index = diff.trailing_zeros() as usize;
                if other.mask() & diff == 0 {
                    other.set_add_edge(bit_index, id);
                    archetype.set_remove_edge(bit_index, other_id);
                } else {
                    other.set_remove_edge(bit_index, id);
                    archetype.set_add_edge(bit_index, other_id);
                }
            }
        }

        self.archetypes.push(archetype);
        self.archetype_index.insert(mask, id);

        let mut cache = self.query_cache.borrow_mut();
        for (key, matches) in cache.iter_mut() {
            if key.matches(mask) {
                matches.push(id);
            }
        }

        id
    }

    /// Spawn from recorded payload bytes; used by command replay.
    /// `parts` yields `(bit, payload offset, type id)` per component.
    pub(crate) fn spawn_raw(
        &mut self,
        mask: u64,
        parts: impl Iterator<Item = (u64, usize, TypeId)>,
        data: &[u8],
    ) -> Entity {
        let mask = mask & self.registry.known_mask();
        if mask == 0 {
            return Entity::DEAD;
        }

        let arch_id = self.find_or_create_archetype(mask);
        let entity = self.entities.allocate();
        let archetype = &mut self.archetypes[arch_id];
        let row = archetype.allocate_row(entity);

        for (bit, offset, type_id) in parts {
            let Some(column) = archetype.column_mut(bit) else {
                continue;
            };
            // The recorded type must still be the one registered for the
            // bit; a mismatch means the buffer was recorded against a
            // different world.
            if column.type_id() != type_id {
                debug_assert!(false, "spawn command type mismatch for bit {bit:#x}");
                continue;
            }
            let size = column.item_size();
            if size > 0 {
                unsafe {
                    std::ptr::copy_nonoverlapping(
                        data.as_ptr().add(offset),
                        column.get_ptr_mut(row),
                        size,
                    );
                }
            }
        }

        let loc = self.entities.location_mut(entity.id);
        loc.archetype_id = arch_id;
        loc.row = row;
        entity
    }

    fn add_edge_target(&mut self, from: usize, bit_index: usize) -> usize {
        if let Some(target) = self.archetypes[from].add_edge(bit_index) {
            return target;
        }
        let new_mask = self.archetypes[from].mask() | (1u64 << bit_index);
        let target = self.find_or_create_archetype(new_mask);
        self.archetypes[from].set_add_edge(bit_index, target);
        self.archetypes[target].set_remove_edge(bit_index, from);
        target
    }

    fn remove_edge_target(&mut self, from: usize, bit_index: usize) -> usize {
        if let Some(target) = self.archetypes[from].remove_edge(bit_index) {
            return target;
        }
        let new_mask = self.archetypes[from].mask() & !(1u64 << bit_index);
        let target = self.find_or_create_archetype(new_mask);
        self.archetypes[from].set_remove_edge(bit_index, target);
        self.archetypes[target].set_add_edge(bit_index, from);
        target
    }

    /// Internal: move an entity's row to another archetype.
    ///
    /// Overlapping columns are copied byte-wise; values whose bit vanishes
    /// in the target are dropped with the source row. Returns the new row.
    fn move_entity(&mut self, entity: Entity, from: EntityLocation, to_id: usize) -> usize {
        debug_assert_ne!(from.archetype_id, to_id);

        let (from_arch, to_arch) =
            archetype_pair_mut(&mut self.archetypes, from.archetype_id, to_id);
        let new_row = to_arch.allocate_row(entity);

        for column in to_arch.columns_mut() {
            if let Some(src) = from_arch.column(column.bit()) {
                unsafe { column.copy_row_from(src, from.row, new_row) };
            }
        }

        let drop_mask = from_arch.mask() & !to_arch.mask();
        if let Some(swapped) = from_arch.swap_remove_row(from.row, drop_mask) {
            self.entities.location_mut(swapped.id).row = from.row;
        }

        let loc = self.entities.location_mut(entity.id);
        loc.archetype_id = to_id;
        loc.row = new_row;
        new_row
    }
}

/// Mutable access to two distinct archetypes at once.
fn archetype_pair_mut(
    archetypes: &mut [Archetype],
    a: usize,
    b: usize,
) -> (&mut Archetype, &mut Archetype) {
    debug_assert_ne!(a, b);
    if a < b {
        let (left, right) = archetypes.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = archetypes.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
