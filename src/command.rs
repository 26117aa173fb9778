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

//! Command buffer for deferred structural mutations.
//!
//! Systems enqueue; the host applies at a safe point, typically end of
//! frame. Spawn payloads are copied into buffer-owned bytes at record
//! time, so the caller's values are not retained.

use std::any::TypeId;

use smallvec::SmallVec;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::component::{Bundle, MAX_BUNDLE_COMPONENTS};
use crate::entity::Entity;
use crate::utils::align_to;
use crate::world::World;

/// One recorded spawn payload component: where its bytes live in the
/// buffer and what type they claim to be.
struct SpawnComponent {
    bit: u64,
    offset: usize,
    type_id: TypeId,
    drop_fn: Option<unsafe fn(*mut u8)>,
}

/// Deferred world mutation.
enum Command {
    Spawn {
        mask: u64,
        components: SmallVec<[SpawnComponent; MAX_BUNDLE_COMPONENTS]>,
        data: Vec<u8>,
    },
    Despawn(Entity),
    AddComponents(Entity, u64),
    RemoveComponents(Entity, u64),
}

/// Command buffer for deferred operations
#[derive(Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    /// Create new command buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
        }
    }

    /// Record a spawn. Component bits are resolved against `world` now;
    /// members whose type is unregistered are dropped immediately, exactly
    /// as an immediate spawn would ignore them.
    pub fn queue_spawn<B: Bundle>(&mut self, world: &World, bundle: B) {
        let type_ids = B::type_ids();

        let mut components: SmallVec<[SpawnComponent; MAX_BUNDLE_COMPONENTS]> = SmallVec::new();
        let mut member_offsets: SmallVec<[Option<usize>; MAX_BUNDLE_COMPONENTS]> = SmallVec::new();
        let mut mask = 0u64;
        let mut total = 0usize;

        for &type_id in type_ids.iter() {
            let resolved = world.registry.bit_of_id(type_id).and_then(|bit| {
                world
                    .registry
                    .info(bit.trailing_zeros() as usize)
                    .map(|info| (bit, *info))
            });
            match resolved {
                Some((bit, info)) => {
                    let offset = align_to(total, info.align.max(1));
                    components.push(SpawnComponent {
                        bit,
                        offset,
                        type_id,
                        drop_fn: info.drop_fn,
                    });
                    member_offsets.push(Some(offset));
                    mask |= bit;
                    total = offset + info.size;
                }
                None => member_offsets.push(None),
            }
        }

        let mut data = vec![0u8; total];
        let mut ptrs: SmallVec<[*mut u8; MAX_BUNDLE_COMPONENTS]> = SmallVec::new();
        for offset in &member_offsets {
            match offset {
                Some(offset) => ptrs.push(unsafe { data.as_mut_ptr().add(*offset) }),
                None => ptrs.push(std::ptr::null_mut()),
            }
        }

        unsafe {
            bundle.write(&ptrs);
        }

        self.commands.push(Command::Spawn {
            mask,
            components,
            data,
        });
    }

    /// Queue despawn command
    pub fn queue_despawn(&mut self, entity: Entity) {
        self.commands.push(Command::Despawn(entity));
    }

    /// Queue zero-initialized addition of every component in `mask`; see
    /// [`World::add_components`].
    pub fn queue_add_components(&mut self, entity: Entity, mask: u64) {
        self.commands.push(Command::AddComponents(entity, mask));
    }

    /// Queue removal of every component in `mask`.
    pub fn queue_remove_components(&mut self, entity: Entity, mask: u64) {
        self.commands.push(Command::RemoveComponents(entity, mask));
    }

    /// Apply all commands to the world in insertion order and clear the
    /// buffer. Commands against entities that died in the meantime, or
    /// bits that are absent or already present, are silently skipped.
    pub fn apply(&mut self, world: &mut World) {
        #[cfg(feature = "profiling")]
        let span = info_span!("commands.apply", queued = self.commands.len());
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        for command in self.commands.drain(..) {
            match command {
                Command::Spawn {
                    mask,
                    components,
                    data,
                } => {
                    // Payload bytes move into the columns; the raw buffer
                    // is freed without running drop glue.
                    world.spawn_raw(
                        mask,
                        components.iter().map(|c| (c.bit, c.offset, c.type_id)),
                        &data,
                    );
                }
                Command::Despawn(entity) => {
                    world.despawn(entity);
                }
                Command::AddComponents(entity, mask) => {
                    world.add_components(entity, mask);
                }
                Command::RemoveComponents(entity, mask) => {
                    world.remove_components(entity, mask);
                }
            }
        }
    }

    /// Drop all recorded commands without applying them. Spawn payloads
    /// own their values, so their drop glue runs here.
    pub fn clear(&mut self) {
        for command in self.commands.drain(..) {
            if let Command::Spawn {
                components,
                mut data,
                ..
            } = command
            {
                for part in &components {
                    if let Some(drop_fn) = part.drop_fn {
                        unsafe { drop_fn(data.as_mut_ptr().add(part.offset)) };
                    }
                }
            }
        }
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Get length
    pub fn len(&self) -> usize {
        self.commands.len()
    }
}

impl Drop for CommandBuffer {
    fn drop(&mut self) {
        self.clear();
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

    #[test]
    fn test_buffer_starts_empty() {
        let buffer = CommandBuffer::new();
        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn test_spawn_is_deferred_until_apply() {
        let mut world = World::new();
        world.register::<Position>();

        let mut buffer = CommandBuffer::new();
        buffer.queue_spawn(&world, (Position { x: 1.0, y: 2.0 },));
        assert_eq!(buffer.len(), 1);
        assert_eq!(world.entity_count(), 0);

        buffer.apply(&mut world);
        assert!(buffer.is_empty());
        assert_eq!(world.entity_count(), 1);

        let entity = world.query_first(world.bit_of::<Position>().unwrap(), 0).unwrap();
        assert_eq!(world.get::<Position>(entity), Some(&Position { x: 1.0, y: 2.0 }));
    }

    #[test]
    fn test_despawn_of_dead_entity_is_skipped() {
        let mut world = World::new();
        world.register::<Position>();

        let entity = world.spawn((Position { x: 1.0, y: 1.0 },));
        let mut buffer = CommandBuffer::new();
        buffer.queue_despawn(entity);
        buffer.queue_despawn(entity); // second one hits a dead handle

        buffer.apply(&mut world);
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn test_mask_commands_add_and_remove() {
        let mut world = World::new();
        let p = world.register::<Position>();
        let v = world.register::<Velocity>();

        let entity = world.spawn((Position { x: 1.0, y: 1.0 },));

        let mut buffer = CommandBuffer::new();
        buffer.queue_add_components(entity, v);
        buffer.apply(&mut world);
        assert_eq!(world.component_mask(entity), Some(p | v));
        assert_eq!(world.get::<Velocity>(entity), Some(&Velocity { x: 0.0, y: 0.0 }));

        buffer.queue_remove_components(entity, v);
        buffer.apply(&mut world);
        assert_eq!(world.component_mask(entity), Some(p));
    }

    #[test]
    fn test_clear_runs_payload_drop_glue() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static DROPS: AtomicUsize = AtomicUsize::new(0);

        struct Tracked(#[allow(dead_code)] u32);
        impl Drop for Tracked {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::SeqCst);
            }
        }

        let mut world = World::new();
        world.register::<Tracked>();

        let mut buffer = CommandBuffer::new();
        buffer.queue_spawn(&world, (Tracked(1),));
        assert_eq!(DROPS.load(Ordering::SeqCst), 0);

        buffer.clear();
        assert_eq!(DROPS.load(Ordering::SeqCst), 1);
        assert_eq!(world.entity_count(), 0);
    }
}
