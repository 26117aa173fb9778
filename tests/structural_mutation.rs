use mask_ecs::prelude::*;

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

#[test]
fn test_add_component_moves_row_once() {
    let mut world = World::new();
    let p = world.register::<Position>();
    let v = world.register::<Velocity>();

    let e = world.spawn((Position { x: 1.0, y: 2.0 },));
    assert!(world.add_component(e, Velocity { x: 3.0, y: 4.0 }));

    assert_eq!(world.component_mask(e), Some(p | v));
    assert_eq!(world.query_count(p, 0), 1);
    assert_eq!(world.query_count(p | v, 0), 1);
    assert_eq!(world.get::<Position>(e), Some(&Position { x: 1.0, y: 2.0 }));
}

#[test]
fn test_mutation_preserves_unrelated_entities() {
    let mut world = World::new();
    world.register::<Position>();
    world.register::<Velocity>();

    let stay1 = world.spawn((Position { x: 1.0, y: 0.0 },));
    let mover = world.spawn((Position { x: 2.0, y: 0.0 },));
    let stay2 = world.spawn((Position { x: 3.0, y: 0.0 },));

    world.add_component(mover, Velocity { x: 9.0, y: 9.0 });

    assert_eq!(world.get::<Position>(stay1), Some(&Position { x: 1.0, y: 0.0 }));
    assert_eq!(world.get::<Position>(stay2), Some(&Position { x: 3.0, y: 0.0 }));
    assert_eq!(world.get::<Position>(mover), Some(&Position { x: 2.0, y: 0.0 }));
}

#[test]
fn test_remove_component_drops_column_data() {
    let mut world = World::new();
    let p = world.register::<Position>();
    let v = world.register::<Velocity>();

    let e = world.spawn((Position { x: 1.0, y: 2.0 }, Velocity { x: 3.0, y: 4.0 }));
    assert!(world.remove_component::<Velocity>(e));

    assert_eq!(world.component_mask(e), Some(p));
    assert!(!world.has::<Velocity>(e));
    assert_eq!(world.get::<Position>(e), Some(&Position { x: 1.0, y: 2.0 }));
    assert_eq!(world.query_count(v, 0), 0);
}

#[test]
fn test_add_remove_round_trip_returns_to_same_archetype() {
    let mut world = World::new();
    world.register::<Position>();
    world.register::<Velocity>();

    let e = world.spawn((Position { x: 0.0, y: 0.0 },));
    let home = world.location(e).unwrap().archetype_id;

    world.add_component(e, Velocity { x: 0.0, y: 0.0 });
    world.remove_component::<Velocity>(e);

    assert_eq!(world.location(e).unwrap().archetype_id, home);
    // The round trip created exactly one extra archetype.
    assert_eq!(world.archetype_count(), 2);
}

#[test]
fn test_removing_last_component_despawns() {
    let mut world = World::new();
    world.register::<Health>();

    let e = world.spawn((Health(5),));
    assert!(world.remove_component::<Health>(e));
    assert!(!world.is_alive(e));
    assert_eq!(world.entity_count(), 0);
}

#[test]
fn test_mask_mutations_skip_partial_failures() {
    let mut world = World::new();
    let p = world.register::<Position>();
    let v = world.register::<Velocity>();
    let h = world.register::<Health>();

    let e = world.spawn((Position { x: 0.0, y: 0.0 }, Velocity { x: 0.0, y: 0.0 }));

    // P already present, H missing: only H is added.
    assert!(world.add_components(e, p | h));
    assert_eq!(world.component_mask(e), Some(p | v | h));
    assert_eq!(world.get::<Health>(e), Some(&Health(0)));

    // V present, and a never-registered bit is ignored.
    assert!(world.remove_components(e, v | (1 << 40)));
    assert_eq!(world.component_mask(e), Some(p | h));
}

#[test]
fn test_despawn_patches_swapped_location() {
    let mut world = World::new();
    world.register::<Health>();

    let a = world.spawn((Health(1),));
    let b = world.spawn((Health(2),));
    let c = world.spawn((Health(3),));

    // Removing the first row swaps the last row into its place.
    world.despawn(a);

    assert_eq!(world.get::<Health>(b), Some(&Health(2)));
    assert_eq!(world.get::<Health>(c), Some(&Health(3)));

    let loc = world.location(c).unwrap();
    assert_eq!(loc.row, 0);
}

#[test]
fn test_stress_interleaved_mutations() {
    let mut world = World::new();
    world.register::<Position>();
    world.register::<Velocity>();
    world.register::<Health>();

    let mut entities = Vec::new();
    for i in 0..64u32 {
        entities.push(world.spawn((Position {
            x: i as f32,
            y: 0.0,
        },)));
    }

    for (i, &e) in entities.iter().enumerate() {
        if i % 2 == 0 {
            world.add_component(e, Velocity { x: 1.0, y: 0.0 });
        }
        if i % 3 == 0 {
            world.add_component(e, Health(i as u32));
        }
    }
    for (i, &e) in entities.iter().enumerate() {
        if i % 6 == 0 {
            world.remove_component::<Velocity>(e);
        }
    }

    // Every survivor still reads back its spawn-time position.
    for (i, &e) in entities.iter().enumerate() {
        assert_eq!(
            world.get::<Position>(e).map(|p| p.x),
            Some(i as f32),
            "entity {i} lost its position"
        );
    }
}
