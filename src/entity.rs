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

//! Entity identifiers, location metadata and the generational allocator.

/// Minimum capacity of the locations table.
const MIN_LOCATIONS: usize = 64;

/// Entity handle: a stable id plus the generation it was issued under.
///
/// Handles are plain values. A handle stays valid until the entity is
/// despawned; after that, the same id can be reissued under a higher
/// generation and the old handle resolves as dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity {
    pub id: u32,
    pub generation: u32,
}

impl Entity {
    /// Sentinel returned by spawns that recognize no components.
    ///
    /// Note that `(0, 0)` is also the very first handle a fresh world
    /// issues; the sentinel is only meaningful as a spawn-failure marker
    /// and must be disambiguated through `World::is_alive`.
    pub const DEAD: Entity = Entity {
        id: 0,
        generation: 0,
    };
}

/// Entity location in archetype storage, one slot per id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityLocation {
    pub archetype_id: usize,
    pub row: usize,
    pub generation: u32,
    pub alive: bool,
}

impl EntityLocation {
    const VACANT: EntityLocation = EntityLocation {
        archetype_id: usize::MAX,
        row: usize::MAX,
        generation: 0,
        alive: false,
    };
}

/// Issues entity handles and owns the id -> location table.
///
/// Despawned ids are recycled through a free list. Each free-list entry
/// already carries the generation the id will be reissued under, so
/// `allocate` never has to touch the table to compute it.
pub struct EntityAllocator {
    locations: Vec<EntityLocation>,
    free_list: Vec<Entity>,
    next_id: u32,
    alive: u32,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self {
            locations: Vec::new(),
            free_list: Vec::new(),
            next_id: 0,
            alive: 0,
        }
    }

    /// Allocate a handle. The location slot is marked alive under the
    /// handle's generation; archetype and row are set by the caller once
    /// the row exists.
    pub fn allocate(&mut self) -> Entity {
        let entity = match self.free_list.pop() {
            Some(entity) => entity,
            None => {
                let entity = Entity {
                    id: self.next_id,
                    generation: 0,
                };
                self.next_id += 1;
                self.ensure_slot(entity.id);
                entity
            }
        };

        let slot = &mut self.locations[entity.id as usize];
        slot.generation = entity.generation;
        slot.alive = true;
        self.alive += 1;
        entity
    }

    /// Release a live handle: the slot goes dead, the generation advances,
    /// and the id is queued for reuse under the new generation.
    pub fn release(&mut self, entity: Entity) {
        let slot = &mut self.locations[entity.id as usize];
        debug_assert!(slot.alive && slot.generation == entity.generation);
        slot.alive = false;
        slot.generation += 1;
        self.free_list.push(Entity {
            id: entity.id,
            generation: slot.generation,
        });
        self.alive -= 1;
    }

    /// Resolve a handle to its location, or `None` if the handle is stale,
    /// dead or out of bounds.
    pub fn resolve(&self, entity: Entity) -> Option<EntityLocation> {
        let slot = self.locations.get(entity.id as usize)?;
        if slot.alive && slot.generation == entity.generation {
            Some(*slot)
        } else {
            None
        }
    }

    /// Location slot for an id, without any liveness check.
    pub(crate) fn location_mut(&mut self, id: u32) -> &mut EntityLocation {
        &mut self.locations[id as usize]
    }

    /// Location slot without bounds or liveness checks.
    ///
    /// # Safety
    /// `id` must have been issued by this allocator.
    pub(crate) unsafe fn location_unchecked(&self, id: u32) -> &EntityLocation {
        self.locations.get_unchecked(id as usize)
    }

    /// Number of live entities.
    pub fn alive_count(&self) -> u32 {
        self.alive
    }

    /// Pre-size the locations table for `additional` fresh ids.
    pub fn reserve(&mut self, additional: usize) {
        self.locations.reserve(additional);
    }

    fn ensure_slot(&mut self, id: u32) {
        let needed = id as usize + 1;
        if self.locations.len() < needed {
            let grown = (self.locations.len() * 2).max(needed).max(MIN_LOCATIONS);
            self.locations.resize(grown, EntityLocation::VACANT);
        }
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_ids_are_sequential() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        assert_eq!(a, Entity { id: 0, generation: 0 });
        assert_eq!(b, Entity { id: 1, generation: 0 });
        assert_eq!(alloc.alive_count(), 2);
    }

    #[test]
    fn test_release_bumps_generation_and_recycles_id() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.allocate();
        alloc.release(a);
        assert_eq!(alloc.alive_count(), 0);

        let b = alloc.allocate();
        assert_eq!(b.id, a.id);
        assert_eq!(b.generation, 1);
        assert!(alloc.resolve(a).is_none());
        assert!(alloc.resolve(b).is_some());
    }

    #[test]
    fn test_resolve_rejects_stale_and_unknown() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.allocate();
        assert!(alloc.resolve(a).is_some());

        alloc.release(a);
        assert!(alloc.resolve(a).is_none());

        let unknown = Entity {
            id: 999,
            generation: 0,
        };
        assert!(alloc.resolve(unknown).is_none());
    }

    #[test]
    fn test_generations_are_monotonic_per_id() {
        let mut alloc = EntityAllocator::new();
        let mut last = alloc.allocate();
        for _ in 0..5 {
            alloc.release(last);
            let next = alloc.allocate();
            assert_eq!(next.id, last.id);
            assert!(next.generation > last.generation);
            last = next;
        }
    }

    #[test]
    fn test_locations_table_grows_with_doubling() {
        let mut alloc = EntityAllocator::new();
        for _ in 0..100 {
            alloc.allocate();
        }
        assert_eq!(alloc.alive_count(), 100);
        assert!(alloc.resolve(Entity { id: 99, generation: 0 }).is_some());
    }
}
