//! Convenience re-exports.

pub use crate::archetype::Archetype;
pub use crate::command::CommandBuffer;
pub use crate::component::{Bundle, Component, MAX_COMPONENTS};
pub use crate::entity::Entity;
pub use crate::event::EventQueue;
pub use crate::query::QueryBuilder;
pub use crate::schedule::Schedule;
pub use crate::tags::{Tags, MAX_TAGS};
pub use crate::world::World;
