//! Example: basic world usage
//!
//! Shows registration, spawning, column iteration and deferred despawn.

use mask_ecs::prelude::*;

#[derive(Debug)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug)]
struct Velocity {
    x: f32,
    y: f32,
}

fn main() {
    let mut world = World::new();

    // Component types get their mask bits up front.
    let p = world.register::<Position>();
    let v = world.register::<Velocity>();

    for i in 0..10 {
        world.spawn((
            Position {
                x: i as f32,
                y: 0.0,
            },
            Velocity { x: 0.1, y: 0.0 },
        ));
    }
    println!("spawned {} entities", world.entity_count());

    // One integration step over the {Position, Velocity} tables.
    world.for_each_table_mut(p | v, 0, |archetype| {
        for row in 0..archetype.len() {
            let vel_x = archetype.column_slice::<Velocity>(v)[row].x;
            archetype.column_slice_mut::<Position>(p)[row].x += vel_x;
        }
    });

    let movers = world.query().with::<Position>().with::<Velocity>().count();
    println!("{movers} entities moved");

    // Structural changes are deferred while iterating.
    let mut commands = CommandBuffer::new();
    world.for_each(p, 0, |entity| {
        commands.queue_despawn(entity);
    });
    commands.apply(&mut world);

    println!("{} entities left", world.entity_count());
}
