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

//! Name-keyed sparse entity sets, decoupled from the component mask.
//!
//! Tagging an entity never migrates its row; the sets live entirely
//! outside archetype storage. Stored entries carry the generation the
//! handle had at tag time, so stale handles read as absent.

use rustc_hash::FxHashMap;

use crate::entity::Entity;

/// Maximum number of tags per `Tags` instance.
pub const MAX_TAGS: usize = 64;

/// Sparse, by-name membership sets of entities.
pub struct Tags {
    names: Vec<String>,
    by_name: FxHashMap<String, usize>,
    storages: Vec<FxHashMap<u32, Entity>>,
}

impl Tags {
    pub fn new() -> Self {
        Self {
            names: Vec::new(),
            by_name: FxHashMap::default(),
            storages: Vec::new(),
        }
    }

    /// Register a tag by name and return its index.
    ///
    /// Idempotent: re-registering a name returns its existing index.
    ///
    /// # Panics
    /// Registering a 65th distinct tag is a contract violation and aborts.
    pub fn register_tag(&mut self, name: &str) -> usize {
        if let Some(&tag) = self.by_name.get(name) {
            return tag;
        }

        let tag = self.names.len();
        assert!(tag < MAX_TAGS, "tag capacity exceeded ({MAX_TAGS})");

        self.names.push(name.to_owned());
        self.by_name.insert(name.to_owned(), tag);
        self.storages.push(FxHashMap::default());
        tag
    }

    /// Index of a registered tag name.
    pub fn tag_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, tag: usize) -> Option<&str> {
        self.names.get(tag).map(String::as_str)
    }

    /// Number of registered tags.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Tag an entity. Re-tagging refreshes the stored generation.
    pub fn add_tag(&mut self, tag: usize, entity: Entity) -> bool {
        let Some(storage) = self.storages.get_mut(tag) else {
            return false;
        };
        storage.insert(entity.id, entity);
        true
    }

    /// Remove an entity from a tag. Returns false when the entity was not
    /// tagged (or the stored handle is from another generation).
    pub fn remove_tag(&mut self, tag: usize, entity: Entity) -> bool {
        let Some(storage) = self.storages.get_mut(tag) else {
            return false;
        };
        match storage.get(&entity.id) {
            Some(&stored) if stored == entity => {
                storage.remove(&entity.id);
                true
            }
            _ => false,
        }
    }

    /// Membership check; stale generations read as absent.
    pub fn has_tag(&self, tag: usize, entity: Entity) -> bool {
        self.storages
            .get(tag)
            .and_then(|storage| storage.get(&entity.id))
            .is_some_and(|&stored| stored == entity)
    }

    /// Iterate the entities carrying a tag, in no particular order.
    ///
    /// Handles are returned as stored at tag time; despawned entities may
    /// still appear until cleared.
    pub fn query_tag(&self, tag: usize) -> impl Iterator<Item = Entity> + '_ {
        self.storages
            .get(tag)
            .into_iter()
            .flat_map(|storage| storage.values().copied())
    }

    /// Number of entities carrying a tag.
    pub fn tag_count(&self, tag: usize) -> usize {
        self.storages.get(tag).map_or(0, FxHashMap::len)
    }

    /// Remove an entity id from every tag.
    pub fn clear_entity_tags(&mut self, entity: Entity) {
        for storage in &mut self.storages {
            storage.remove(&entity.id);
        }
    }
}

impl Default for Tags {
    fn default() -> Self {
        Self::new()
    }
}
