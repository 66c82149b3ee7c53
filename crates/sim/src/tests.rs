//! Whole-world scenarios driven tick by tick.

use crate::ai::guardian_attack::GuardianAttackKind;
use crate::components::ai_helper;
use crate::components::slime::SlimeSize;
use crate::config::SimConfig;
use crate::entities::{self, EntityConfig};
use crate::entity::{EntityId, EntityType};
use crate::events::SimEvent;
use crate::hitbox::{HitboxDef, HitboxFlag};
use crate::math::Point;
use crate::snapshot::state_digest;
use crate::terrain::{Biome, TerrainGrid, TileType};
use crate::transform::TransformComponent;
use crate::world::World;

fn grass_world(seed: u64) -> World {
    World::new(
        SimConfig {
            seed,
            ..SimConfig::default()
        },
        TerrainGrid::filled(40, 40, TileType::Grass, Biome::Grasslands),
    )
    .expect("world")
}

fn slime_ids(world: &World) -> Vec<EntityId> {
    world.components().slime.entity_ids()
}

#[test]
fn two_small_slimes_merge_into_one_medium_at_midpoint() {
    let mut world = grass_world(7);
    let first = world
        .create_entity(entities::slime(Point::new(1000.0, 1000.0), SlimeSize::Small), 0)
        .expect("first");
    let second = world
        .create_entity(entities::slime(Point::new(1050.0, 1000.0), SlimeSize::Small), 0)
        .expect("second");

    let mut merged = None;
    let mut last_midpoint = Point::ZERO;
    for _ in 0..600 {
        last_midpoint = world.position_of(first).midpoint(world.position_of(second));
        world.tick();
        merged = world.events().last_tick_events().iter().find_map(|event| match event {
            SimEvent::SlimesMerged { result, .. } => Some(*result),
            _ => None,
        });
        if merged.is_some() {
            break;
        }
    }
    let merged = merged.expect("slimes never merged");

    assert!(!world.entity_exists(first));
    assert!(!world.entity_exists(second));
    assert_eq!(slime_ids(&world), vec![merged]);
    let slime = world.components().slime.get(merged);
    assert_eq!(slime.size, SlimeSize::Medium);
    assert_eq!(slime.orbs, vec![SlimeSize::Small, SlimeSize::Small]);
    assert_eq!(slime.merge_weight, 2 * SlimeSize::Small.merge_weight());
    let position = world.position_of(merged);
    assert!(position.distance_to(last_midpoint) < 10.0, "{position:?} vs {last_midpoint:?}");
}

fn wall_marker(position: Point, ignores_walls: bool) -> EntityConfig {
    let mut root = HitboxDef::circle(6.0);
    if ignores_walls {
        root = root.flag(HitboxFlag::IgnoresWallCollisions);
    }
    EntityConfig::new(EntityType::Boulder, TransformComponent::new(position, 0.0, root))
}

fn wall_callbacks_for(ignores_walls: bool) -> usize {
    let mut terrain = TerrainGrid::filled(16, 16, TileType::Dirt, Biome::Grasslands);
    terrain.set_wall_subtile(10, 10, true);
    terrain.set_wall_subtile(11, 10, true);
    let mut world = World::new(SimConfig::default(), terrain).expect("world");
    // Straddles the border between the two wall subtiles.
    world
        .create_entity(wall_marker(Point::new(174.0, 168.0), ignores_walls), 0)
        .expect("marker");
    world.tick();
    world
        .events()
        .last_tick_events()
        .iter()
        .filter(|event| matches!(event, SimEvent::WallCollision { .. }))
        .count()
}

#[test]
fn wall_callbacks_are_skipped_for_ignoring_hitboxes() {
    assert_eq!(wall_callbacks_for(true), 0);
    assert_eq!(wall_callbacks_for(false), 2);
}

fn populate(world: &mut World) {
    let config = *world.config();
    let spawns = [
        entities::player(Point::new(600.0, 600.0), "alice"),
        entities::cow(Point::new(900.0, 900.0), &config),
        entities::cow(Point::new(960.0, 930.0), &config),
        entities::krumblid(Point::new(1500.0, 700.0)),
        entities::slime(Point::new(1800.0, 1800.0), SlimeSize::Small),
        entities::slime(Point::new(1900.0, 1850.0), SlimeSize::Small),
        entities::guardian(Point::new(700.0, 1700.0), &config),
        entities::boulder(Point::new(1200.0, 1200.0)),
    ];
    for bundle in spawns {
        world.create_entity(bundle, 0).expect("spawn");
    }
}

fn digest_after(seed: u64, ticks: u32) -> String {
    let mut world = grass_world(seed);
    populate(&mut world);
    for _ in 0..ticks {
        world.tick();
    }
    state_digest(&world).expect("digest")
}

#[test]
fn same_seed_produces_identical_state() {
    assert_eq!(digest_after(11, 300), digest_after(11, 300));
}

#[test]
fn different_seeds_diverge() {
    assert_ne!(digest_after(11, 600), digest_after(12, 600));
}

#[test]
fn visible_entities_stay_within_candidates_every_tick() {
    let mut world = grass_world(3);
    populate(&mut world);
    for _ in 0..240 {
        world.tick();
        for viewer in world.components().ai_helper.entity_ids() {
            let helper = world.components().ai_helper.get(viewer);
            let visible = helper.visible_entities();
            assert!(visible.windows(2).all(|pair| pair[0] < pair[1]));
            for entity in visible {
                assert!(helper.potential_visible_entities().contains(*entity));
                assert_ne!(*entity, viewer);
            }
        }
    }
}

#[test]
fn idle_krumblid_eventually_wanders() {
    let mut world = grass_world(5);
    let krumblid = world
        .create_entity(entities::krumblid(Point::new(1200.0, 1200.0)), 0)
        .expect("krumblid");
    let start = world.position_of(krumblid);
    let mut moved = false;
    for _ in 0..1800 {
        world.tick();
        if world.position_of(krumblid).distance_to(start) > 16.0 {
            moved = true;
            break;
        }
    }
    assert!(moved, "krumblid never left its spawn point");
}

#[test]
fn removed_entities_disappear_from_every_table() {
    let mut world = grass_world(9);
    populate(&mut world);
    world.tick();
    let cow = world.components().cow.entity_ids()[0];
    world.destroy_entity(cow);
    world.tick();
    assert!(world.components().kinds_of(cow).is_empty());
    assert!(!world.entity_exists(cow));
    for viewer in world.components().ai_helper.entity_ids() {
        let helper = world.components().ai_helper.get(viewer);
        assert!(!helper.can_see(cow));
        assert!(!helper.potential_visible_entities().contains(cow));
    }
}

#[test]
fn removal_hooks_run_in_passes_before_slots_are_freed() {
    let mut world = grass_world(13);
    let config = *world.config();
    let first = world
        .create_entity(entities::guardian(Point::new(400.0, 400.0), &config), 0)
        .expect("first guardian");
    let second = world
        .create_entity(entities::guardian(Point::new(1800.0, 1800.0), &config), 0)
        .expect("second guardian");
    world.tick();
    for guardian in [first, second] {
        assert!(ai_helper::start_special_attack(
            &mut world,
            guardian,
            GuardianAttackKind::CrystalSlam
        ));
    }

    world.destroy_entity(first);
    world.destroy_entity(second);
    let report = world.tick();
    assert_eq!(report.removed, 2);

    // Stopping the attack reads the helper, so every pre-remove must finish
    // before any slot is deleted.
    let lifecycle = world
        .events()
        .last_tick_events()
        .iter()
        .filter_map(|event| match *event {
            SimEvent::SpecialAttackFinished { entity, attack } => Some(("finished", entity, Some(attack))),
            SimEvent::EntityRemoved { entity } => Some(("removed", entity, None)),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(
        lifecycle,
        vec![
            ("finished", first, Some(GuardianAttackKind::CrystalSlam)),
            ("finished", second, Some(GuardianAttackKind::CrystalSlam)),
            ("removed", first, None),
            ("removed", second, None),
        ]
    );

    for guardian in [first, second] {
        assert!(world.components().kinds_of(guardian).is_empty());
    }
    let chunks = world.chunks();
    for y in 0..chunks.height() {
        for x in 0..chunks.width() {
            let chunk = chunks.get_chunk(x, y).expect("chunk");
            assert!(!chunk.viewing_entities().contains(&first));
            assert!(!chunk.viewing_entities().contains(&second));
            assert!(!chunk.entities().contains(&first));
        }
    }
}

#[test]
fn land_wanderer_on_open_water_stays_idle() {
    let mut world = World::new(
        SimConfig::default(),
        TerrainGrid::filled(24, 24, TileType::Water, Biome::Grasslands),
    )
    .expect("world");
    let mut bundle = entities::krumblid(Point::new(760.0, 760.0));
    if let Some(wander) = bundle.ai_helper.as_mut().and_then(|helper| helper.wander.as_mut()) {
        // Roll for a new target every tick.
        wander.wander_rate = 1000.0;
    }
    let krumblid = world.create_entity(bundle, 0).expect("krumblid");
    world.tick();
    let start = world.position_of(krumblid);
    let rng_start = world.rng_word_pos();

    for _ in 0..120 {
        world.tick();
    }

    assert_eq!(world.tick_count(), 121);
    assert!(world.rng_word_pos() > rng_start, "no wander targets were sampled");
    let helper = world.components().ai_helper.get(krumblid);
    assert_eq!(helper.current_ai, None);
    assert!(helper.wander.as_ref().is_some_and(|wander| !wander.is_wandering()));
    assert_eq!(world.components().transform.get(krumblid).velocity(), Point::ZERO);
    assert_eq!(world.position_of(krumblid), start);
}
