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

//! Mask ECS - archetype-based Entity Component System
//!
//! Entities are generational `(id, generation)` handles; each world maps
//! component types to bits of a 64-bit mask and stores all entities
//! sharing a mask in one contiguous archetype table. Structural changes
//! migrate rows between archetypes through a memoized transition graph;
//! queries match archetypes by mask and cache their results.

pub mod archetype;
pub mod command;
pub mod component;
pub mod entity;
pub mod event;
pub mod prelude;
pub mod query;
pub mod schedule;
pub mod tags;
pub mod utils;
pub mod world;

// Re-exports for convenience
pub use archetype::{Archetype, ComponentColumn};
pub use command::CommandBuffer;
pub use component::{Bundle, Component, ComponentRegistry, MAX_BUNDLE_COMPONENTS, MAX_COMPONENTS};
pub use entity::{Entity, EntityLocation};
pub use event::EventQueue;
pub use query::{QueryBuilder, QueryKey};
pub use schedule::Schedule;
pub use tags::{Tags, MAX_TAGS};
pub use world::World;
