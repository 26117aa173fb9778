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

//! Query engine: mask matching with cached results.
//!
//! A query is an `(include, exclude)` mask pair. Results are vectors of
//! archetype indices, cached per pair and appended to as archetypes
//! appear, so a result never goes stale.

use std::cell::Ref;

use smallvec::SmallVec;

use crate::archetype::Archetype;
use crate::component::Component;
use crate::entity::Entity;
use crate::world::World;

/// Cache key for one include/exclude mask pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub include: u64,
    pub exclude: u64,
}

impl QueryKey {
    pub fn new(include: u64, exclude: u64) -> Self {
        Self { include, exclude }
    }

    /// Does an archetype mask satisfy this query?
    pub fn matches(&self, mask: u64) -> bool {
        mask & self.include == self.include && mask & self.exclude == 0
    }
}

impl World {
    /// Archetype indices matching `(include, exclude)`, in creation order.
    ///
    /// The result is cached; repeated calls with the same masks are
    /// allocation-free. The returned borrow must be released before any
    /// structural mutation.
    pub fn matching_archetypes(&self, include: u64, exclude: u64) -> Ref<'_, [usize]> {
        let key = QueryKey::new(include, exclude);

        if !self.query_cache.borrow().contains_key(&key) {
            let matches: Vec<usize> = self
                .archetypes
                .iter()
                .enumerate()
                .filter_map(|(id, archetype)| key.matches(archetype.mask()).then_some(id))
                .collect();
            self.query_cache.borrow_mut().insert(key, matches);
        }

        Ref::map(self.query_cache.borrow(), |cache| {
            cache.get(&key).map(Vec::as_slice).unwrap_or(&[])
        })
    }

    /// Number of entities matching the query.
    pub fn query_count(&self, include: u64, exclude: u64) -> usize {
        let matches = self.matching_archetypes(include, exclude);
        matches.iter().map(|&id| self.archetypes[id].len()).sum()
    }

    /// Append every matching entity to `out`, archetype by archetype.
    pub fn query_entities(&self, include: u64, exclude: u64, out: &mut Vec<Entity>) {
        let matches = self.matching_archetypes(include, exclude);
        for &id in matches.iter() {
            out.extend_from_slice(self.archetypes[id].entities());
        }
    }

    /// First entity of the first non-empty matching archetype.
    pub fn query_first(&self, include: u64, exclude: u64) -> Option<Entity> {
        let matches = self.matching_archetypes(include, exclude);
        matches
            .iter()
            .map(|&id| &self.archetypes[id])
            .find(|archetype| !archetype.is_empty())
            .and_then(|archetype| archetype.entity_at(0))
    }

    /// Invoke `f` once per matching row.
    pub fn for_each<F: FnMut(Entity)>(&self, include: u64, exclude: u64, mut f: F) {
        let ids: SmallVec<[usize; 16]> = self
            .matching_archetypes(include, exclude)
            .iter()
            .copied()
            .collect();
        for id in ids {
            for &entity in self.archetypes[id].entities() {
                f(entity);
            }
        }
    }

    /// Invoke `f` once per matching archetype.
    pub fn for_each_table<F: FnMut(&Archetype)>(&self, include: u64, exclude: u64, mut f: F) {
        let ids: SmallVec<[usize; 16]> = self
            .matching_archetypes(include, exclude)
            .iter()
            .copied()
            .collect();
        for id in ids {
            f(&self.archetypes[id]);
        }
    }

    /// Invoke `f` once per matching archetype, with column write access.
    pub fn for_each_table_mut<F: FnMut(&mut Archetype)>(
        &mut self,
        include: u64,
        exclude: u64,
        mut f: F,
    ) {
        let ids: SmallVec<[usize; 16]> = self
            .matching_archetypes(include, exclude)
            .iter()
            .copied()
            .collect();
        for id in ids {
            f(&mut self.archetypes[id]);
        }
    }

    /// Start a fluent query.
    pub fn query(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(self)
    }
}

/// Fluent facade over the query engine.
///
/// Accumulates include/exclude bits and delegates; adds no semantics of
/// its own.
pub struct QueryBuilder<'w> {
    world: &'w World,
    include: u64,
    exclude: u64,
    unsatisfiable: bool,
}

impl<'w> QueryBuilder<'w> {
    fn new(world: &'w World) -> Self {
        Self {
            world,
            include: 0,
            exclude: 0,
            unsatisfiable: false,
        }
    }

    /// Require component `T`. An unregistered type can exist on no entity,
    /// so the query becomes unsatisfiable.
    pub fn with<T: Component>(mut self) -> Self {
        match self.world.bit_of::<T>() {
            Some(bit) => self.include |= bit,
            None => self.unsatisfiable = true,
        }
        self
    }

    /// Exclude component `T`. An unregistered type is trivially absent.
    pub fn without<T: Component>(mut self) -> Self {
        if let Some(bit) = self.world.bit_of::<T>() {
            self.exclude |= bit;
        }
        self
    }

    /// Require the component behind an already-resolved mask bit.
    pub fn with_bit(mut self, bit: u64) -> Self {
        self.include |= bit;
        self
    }

    /// Exclude the component behind an already-resolved mask bit.
    pub fn without_bit(mut self, bit: u64) -> Self {
        self.exclude |= bit;
        self
    }

    pub fn count(&self) -> usize {
        if self.unsatisfiable {
            return 0;
        }
        self.world.query_count(self.include, self.exclude)
    }

    pub fn first(&self) -> Option<Entity> {
        if self.unsatisfiable {
            return None;
        }
        self.world.query_first(self.include, self.exclude)
    }

    /// Iterate matching entities.
    pub fn iter(&self) -> QueryEntityIter<'w> {
        QueryEntityIter {
            world: self.world,
            archetypes: self.matched(),
            cursor: 0,
            row: 0,
        }
    }

    /// Iterate matching archetypes (tables), including empty ones.
    pub fn iter_tables(&self) -> QueryTableIter<'w> {
        QueryTableIter {
            world: self.world,
            archetypes: self.matched(),
            cursor: 0,
        }
    }

    fn matched(&self) -> SmallVec<[usize; 16]> {
        if self.unsatisfiable {
            return SmallVec::new();
        }
        self.world
            .matching_archetypes(self.include, self.exclude)
            .iter()
            .copied()
            .collect()
    }
}

/// Row-by-row entity iterator over a query result.
pub struct QueryEntityIter<'w> {
    world: &'w World,
    archetypes: SmallVec<[usize; 16]>,
    cursor: usize,
    row: usize,
}

impl<'w> Iterator for QueryEntityIter<'w> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        loop {
            let &arch_id = self.archetypes.get(self.cursor)?;
            let archetype = &self.world.archetypes[arch_id];
            if self.row < archetype.len() {
                let entity = archetype.entities()[self.row];
                self.row += 1;
                return Some(entity);
            }
            self.cursor += 1;
            self.row = 0;
        }
    }
}

/// Table iterator over a query result.
pub struct QueryTableIter<'w> {
    world: &'w World,
    archetypes: SmallVec<[usize; 16]>,
    cursor: usize,
}

impl<'w> Iterator for QueryTableIter<'w> {
    type Item = &'w Archetype;

    fn next(&mut self) -> Option<&'w Archetype> {
        let &arch_id = self.archetypes.get(self.cursor)?;
        self.cursor += 1;
        Some(&self.world.archetypes[arch_id])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Velocity {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Health(u32);

    fn fan_out_world() -> (World, u64, u64, u64) {
        let mut world = World::new();
        let p = world.register::<Position>();
        let v = world.register::<Velocity>();
        let h = world.register::<Health>();

        world.spawn((Position { x: 1.0, y: 1.0 },));
        world.spawn((Position { x: 2.0, y: 2.0 }, Velocity { x: 0.0, y: 0.0 }));
        world.spawn((
            Position { x: 3.0, y: 3.0 },
            Velocity { x: 0.0, y: 0.0 },
            Health(10),
        ));
        (world, p, v, h)
    }

    #[test]
    fn test_mask_matching() {
        let key = QueryKey::new(0b011, 0b100);
        assert!(key.matches(0b011));
        assert!(!key.matches(0b001)); // missing include bit
        assert!(!key.matches(0b111)); // excluded bit present
    }

    #[test]
    fn test_query_counts() {
        let (world, p, v, h) = fan_out_world();
        assert_eq!(world.archetype_count(), 3);
        assert_eq!(world.query_count(p, 0), 3);
        assert_eq!(world.query_count(v, 0), 2);
        assert_eq!(world.query_count(h, 0), 1);
        assert_eq!(world.query_count(p | v, 0), 2);
        assert_eq!(world.query_count(p, v), 1);
    }

    #[test]
    fn test_cache_grows_with_new_archetypes() {
        let (mut world, p, v, _) = fan_out_world();

        // Prime the cache.
        assert_eq!(world.query_count(p, 0), 3);

        // A new matching archetype must show up in the cached result.
        world.register::<u64>();
        let bit = world.bit_of::<u64>().unwrap();
        world.spawn_with_mask(p | bit, 2);
        assert_eq!(world.query_count(p, 0), 5);
        assert_eq!(world.query_count(p | v, 0), 2);
    }

    #[test]
    fn test_query_entities_and_first() {
        let (world, p, v, _) = fan_out_world();

        let mut out = Vec::new();
        world.query_entities(p, 0, &mut out);
        assert_eq!(out.len(), 3);

        let first = world.query_first(p | v, 0).unwrap();
        assert!(out.contains(&first));
    }

    #[test]
    fn test_builder_matches_engine() {
        let (world, p, v, _) = fan_out_world();

        assert_eq!(world.query().with::<Position>().count(), 3);
        assert_eq!(
            world.query().with::<Position>().without::<Velocity>().count(),
            1
        );
        assert_eq!(world.query().with_bit(p).with_bit(v).count(), 2);
        assert_eq!(world.query().with::<Position>().iter().count(), 3);
        assert_eq!(world.query().with::<Position>().iter_tables().count(), 3);
    }

    #[test]
    fn test_builder_unregistered_type_matches_nothing() {
        let (world, _, _, _) = fan_out_world();

        struct Unseen;
        assert_eq!(world.query().with::<Unseen>().count(), 0);
        assert!(world.query().with::<Unseen>().first().is_none());
        assert_eq!(world.query().with::<Unseen>().iter().count(), 0);
    }

    #[test]
    fn test_for_each_table_mut_column_access() {
        let (mut world, p, v, _) = fan_out_world();

        world.for_each_table_mut(p | v, 0, |archetype| {
            for row in 0..archetype.len() {
                let dx = archetype.column_slice::<Velocity>(v)[row].x;
                archetype.column_slice_mut::<Position>(p)[row].x += dx;
            }
        });

        assert_eq!(world.query_count(p | v, 0), 2);
    }
}
