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
struct Frozen;

#[test]
fn test_query_cache_basic() {
    let mut world = World::new();
    let p = world.register::<Position>();
    let v = world.register::<Velocity>();

    for i in 0..100 {
        world.spawn((
            Position {
                x: i as f32,
                y: 0.0,
            },
            Velocity { x: 1.0, y: 1.0 },
        ));
    }

    // First query builds the cache, second one reuses it.
    assert_eq!(world.query_count(p | v, 0), 100);
    assert_eq!(world.query_count(p | v, 0), 100);
    assert_eq!(world.query().with::<Position>().with::<Velocity>().count(), 100);
}

#[test]
fn test_cached_results_see_new_archetypes() {
    let mut world = World::new();
    let p = world.register::<Position>();
    let v = world.register::<Velocity>();

    for i in 0..50 {
        world.spawn((Position {
            x: i as f32,
            y: 0.0,
        },));
    }

    // Prime the cache before the {P, V} archetype exists.
    assert_eq!(world.query_count(p, 0), 50);

    for i in 0..50 {
        world.spawn((
            Position {
                x: i as f32,
                y: 0.0,
            },
            Velocity { x: 0.0, y: 0.0 },
        ));
    }

    // The cached result was extended, not rebuilt stale.
    assert_eq!(world.query_count(p, 0), 100);
    assert_eq!(world.query_count(p | v, 0), 50);
}

#[test]
fn test_exclude_masks() {
    let mut world = World::new();
    let p = world.register::<Position>();
    let f = world.register::<Frozen>();

    for _ in 0..10 {
        world.spawn((Position { x: 0.0, y: 0.0 },));
    }
    for _ in 0..4 {
        world.spawn((Position { x: 0.0, y: 0.0 }, Frozen));
    }

    assert_eq!(world.query_count(p, 0), 14);
    assert_eq!(world.query_count(p, f), 10);
    assert_eq!(world.query_count(f, 0), 4);
    assert_eq!(
        world.query().with::<Position>().without::<Frozen>().count(),
        10
    );
}

#[test]
fn test_query_results_follow_archetype_creation_order() {
    let mut world = World::new();
    let p = world.register::<Position>();
    let v = world.register::<Velocity>();

    let a = world.spawn((Position { x: 1.0, y: 0.0 },));
    let b = world.spawn((Position { x: 2.0, y: 0.0 }, Velocity { x: 0.0, y: 0.0 }));

    let mut out = Vec::new();
    world.query_entities(p, 0, &mut out);
    assert_eq!(out, vec![a, b]);

    assert_eq!(world.query_first(p, 0), Some(a));
    assert_eq!(world.query_first(p | v, 0), Some(b));
}

#[test]
fn test_query_first_skips_empty_archetypes() {
    let mut world = World::new();
    let p = world.register::<Position>();
    world.register::<Velocity>();

    // {P} archetype exists but is emptied; {P, V} still has an entity.
    let lone = world.spawn((Position { x: 1.0, y: 0.0 },));
    let kept = world.spawn((Position { x: 2.0, y: 0.0 }, Velocity { x: 0.0, y: 0.0 }));
    world.despawn(lone);

    assert_eq!(world.query_first(p, 0), Some(kept));
}

#[test]
fn test_for_each_visits_every_row() {
    let mut world = World::new();
    let p = world.register::<Position>();
    world.register::<Velocity>();

    world.spawn((Position { x: 0.0, y: 0.0 },));
    world.spawn((Position { x: 0.0, y: 0.0 }, Velocity { x: 0.0, y: 0.0 }));
    world.spawn((Position { x: 0.0, y: 0.0 }, Velocity { x: 0.0, y: 0.0 }));

    let mut visited = 0;
    world.for_each(p, 0, |entity| {
        assert!(world.is_alive(entity));
        visited += 1;
    });
    assert_eq!(visited, 3);

    let mut tables = 0;
    world.for_each_table(p, 0, |archetype| {
        assert!(archetype.has_bit(p));
        tables += 1;
    });
    assert_eq!(tables, 2);
}
