use crate::components::health;
use crate::math::Point;
use crate::terrain::{TerrainQuery, TileType};
use crate::world::World;

/// Ticks between terrain effect procs such as slime healing.
pub const TERRAIN_PROC_INTERVAL_TICKS: u32 = 30;
pub const SLIME_TILE_HEAL_AMOUNT: f32 = 1.0;

/// Integrates every joined transform, then relaxes tethers and applies terrain
/// effects. Entities flagged for removal are skipped.
pub fn run_physics(world: &mut World) {
    let dt = world.fixed_dt();
    let width = world.terrain.width();
    let height = world.terrain.height();

    for entity in world.components.transform.active().to_vec() {
        if world.is_flagged_for_removal(entity) {
            continue;
        }
        let tile = world
            .terrain
            .tile_type_at(world.position_of(entity))
            .unwrap_or_default();

        let transform = world.components.transform.get_mut(entity);
        transform.move_speed_multiplier = tile.move_speed_multiplier();
        transform.integrate(dt, tile.drag());
        keep_roots_inside(transform, width, height);
        transform.update_poses();
        transform.relax_tethers(dt);

        let proc_due = if transform.terrain_proc_ticks == 0 {
            transform.terrain_proc_ticks = TERRAIN_PROC_INTERVAL_TICKS;
            true
        } else {
            transform.terrain_proc_ticks -= 1;
            false
        };
        if proc_due && tile == TileType::Slime {
            let heals = world
                .components
                .health
                .try_get(entity)
                .is_some_and(|health| health.heals_on_slime);
            if heals {
                health::heal_entity(world, entity, SLIME_TILE_HEAL_AMOUNT);
            }
        }

        if world.components.transform.is_joined(entity) {
            world.update_chunk_membership(entity);
        }
    }
}

fn keep_roots_inside(transform: &mut crate::transform::TransformComponent, width: f32, height: f32) {
    let root_count = transform.hitboxes().len();
    for index in 0..root_count {
        let Some(hitbox) = transform.hitbox(index).filter(|hitbox| hitbox.is_root()) else {
            continue;
        };
        let position = hitbox.position;
        let clamped = Point::new(
            position.x.clamp(0.0, (width - 0.01).max(0.0)),
            position.y.clamp(0.0, (height - 0.01).max(0.0)),
        );
        if clamped != position {
            transform.push_by(index, clamped - position);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::entities;
    use crate::terrain::{Biome, TerrainGrid};

    #[test]
    fn sludge_slows_ground_acceleration() {
        let mut terrain = TerrainGrid::filled(16, 16, TileType::Grass, Biome::Swamp);
        terrain.fill_tiles((8, 0), (15, 15), TileType::Sludge, Biome::Swamp);
        let mut world = World::new(SimConfig::default(), terrain).expect("world");
        let on_grass = world
            .create_entity(entities::boulder(Point::new(100.0, 300.0)), 0)
            .expect("grass");
        let on_sludge = world
            .create_entity(entities::boulder(Point::new(700.0, 300.0)), 0)
            .expect("sludge");
        world.tick();

        for entity in [on_grass, on_sludge] {
            world
                .components_mut()
                .transform
                .get_mut(entity)
                .apply_acceleration_from_ground(0, Point::new(0.0, 600.0));
        }
        world.tick();
        for entity in [on_grass, on_sludge] {
            world
                .components_mut()
                .transform
                .get_mut(entity)
                .apply_acceleration_from_ground(0, Point::new(0.0, 600.0));
        }
        world.tick();

        let grass_speed = world.components().transform.get(on_grass).velocity().length();
        let sludge_speed = world.components().transform.get(on_sludge).velocity().length();
        assert!(sludge_speed < grass_speed);
        assert!(
            (world.components().transform.get(on_sludge).move_speed_multiplier - 0.6).abs() < 1e-6
        );
    }

    #[test]
    fn roots_are_kept_inside_the_world() {
        let mut world = World::new(
            SimConfig::default(),
            TerrainGrid::filled(4, 4, TileType::Grass, Biome::Grasslands),
        )
        .expect("world");
        let id = world
            .create_entity(entities::boulder(Point::new(10.0, 10.0)), 0)
            .expect("spawn");
        world.tick();
        world
            .components_mut()
            .transform
            .get_mut(id)
            .add_velocity(0, Point::new(-6000.0, 0.0));
        world.tick();
        assert!(world.position_of(id).x >= 0.0);
    }
}
