use std::f32::consts::TAU;

use rand::Rng;

use crate::ai::{has_reached_position, move_toward_point, stop_moving};
use crate::entity::EntityId;
use crate::math::Point;
use crate::terrain::{Biome, TerrainQuery, TileType};
use crate::world::World;

/// Which sampled positions an entity is willing to wander to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WanderPositionRule {
    /// Anything but water.
    Land,
    /// Land tiles inside one biome.
    Biome(Biome),
    /// One of the listed tile types.
    Tiles(&'static [TileType]),
}

impl WanderPositionRule {
    pub fn accepts(self, terrain: &impl TerrainQuery, position: Point) -> bool {
        if !terrain.contains(position) || terrain.is_wall_at(position) {
            return false;
        }
        let Some(tile) = terrain.tile_type_at(position) else {
            return false;
        };
        match self {
            Self::Land => tile != TileType::Water,
            Self::Biome(biome) => tile != TileType::Water && terrain.biome_at(position) == Some(biome),
            Self::Tiles(tiles) => tiles.contains(&tile),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WanderAi {
    pub acceleration: f32,
    pub turn_speed: f32,
    /// Expected wander starts per second while idle.
    pub wander_rate: f32,
    pub max_attempts: u32,
    pub rule: WanderPositionRule,
    target: Option<Point>,
}

impl WanderAi {
    pub fn new(acceleration: f32, turn_speed: f32, wander_rate: f32, rule: WanderPositionRule) -> Self {
        Self {
            acceleration,
            turn_speed,
            wander_rate,
            max_attempts: 50,
            rule,
            target: None,
        }
    }

    pub fn target(&self) -> Option<Point> {
        self.target
    }

    pub fn is_wandering(&self) -> bool {
        self.target.is_some()
    }

    pub fn clear(&mut self) {
        self.target = None;
    }

    /// Samples up to `max_attempts` points within `range` of `origin` and
    /// returns the first one the rule accepts.
    pub fn pick_target<R: Rng>(
        &self,
        rng: &mut R,
        terrain: &impl TerrainQuery,
        origin: Point,
        range: f32,
    ) -> Option<Point> {
        if range <= 0.0 {
            return None;
        }
        for _ in 0..self.max_attempts {
            let angle = rng.gen_range(0.0..TAU);
            let distance = rng.gen_range(0.0..range);
            let candidate = origin + Point::from_polar(distance, angle);
            if self.rule.accepts(terrain, candidate) {
                return Some(candidate);
            }
        }
        None
    }

    /// Moves toward the current target or rolls for a new one. Returns
    /// whether the entity is wandering after this tick.
    pub fn tick(&mut self, world: &mut World, entity: EntityId, range: f32) -> bool {
        if let Some(target) = self.target {
            if has_reached_position(world, entity, target) {
                self.target = None;
                stop_moving(world, entity);
                return false;
            }
            move_toward_point(world, entity, target, self.acceleration, self.turn_speed);
            return true;
        }

        let chance = f64::from((self.wander_rate * world.fixed_dt()).clamp(0.0, 1.0));
        let origin = world.position_of(entity);
        let (terrain, rng) = world.terrain_and_rng();
        if !rng.gen_bool(chance) {
            return false;
        }
        let Some(target) = self.pick_target(rng, terrain, origin, range) else {
            return false;
        };
        self.target = Some(target);
        move_toward_point(world, entity, target, self.acceleration, self.turn_speed);
        true
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::terrain::TerrainGrid;

    #[test]
    fn water_is_never_picked_for_land_rule() {
        let mut terrain = TerrainGrid::filled(8, 8, TileType::Water, Biome::Grasslands);
        terrain.fill_tiles((0, 0), (1, 1), TileType::Grass, Biome::Grasslands);
        let wander = WanderAi::new(100.0, 3.0, 1.0, WanderPositionRule::Land);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..20 {
            if let Some(target) = wander.pick_target(&mut rng, &terrain, Point::new(64.0, 64.0), 300.0) {
                assert_eq!(terrain.tile_type_at(target), Some(TileType::Grass));
            }
        }
    }

    #[test]
    fn impossible_rule_yields_no_target() {
        let terrain = TerrainGrid::filled(8, 8, TileType::Grass, Biome::Grasslands);
        let wander = WanderAi::new(100.0, 3.0, 1.0, WanderPositionRule::Biome(Biome::Desert));
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert_eq!(wander.pick_target(&mut rng, &terrain, Point::new(200.0, 200.0), 300.0), None);
    }

    #[test]
    fn zero_range_yields_no_target() {
        let terrain = TerrainGrid::filled(8, 8, TileType::Grass, Biome::Grasslands);
        let wander = WanderAi::new(100.0, 3.0, 1.0, WanderPositionRule::Land);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert_eq!(wander.pick_target(&mut rng, &terrain, Point::new(200.0, 200.0), 0.0), None);
    }
}
