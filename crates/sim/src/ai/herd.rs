use crate::ai::{alignment_penalty, turn_toward_angle};
use crate::entity::EntityId;
use crate::math::{angle_difference, Point};
use crate::terrain::{TerrainQuery, TileType};
use crate::world::World;

/// Flocking among visible members of the same herd.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HerdAi {
    pub acceleration: f32,
    pub turn_speed: f32,
    pub min_separation: f32,
    pub separation_influence: f32,
    pub alignment_influence: f32,
    pub cohesion_influence: f32,
    /// How far ahead walls and water are probed.
    pub avoidance_range: f32,
    pub avoidance_influence: f32,
}

impl HerdAi {
    pub fn new(acceleration: f32, turn_speed: f32, min_separation: f32) -> Self {
        Self {
            acceleration,
            turn_speed,
            min_separation,
            separation_influence: 1.0,
            alignment_influence: 0.5,
            cohesion_influence: 0.6,
            avoidance_range: 96.0,
            avoidance_influence: 1.5,
        }
    }

    pub fn steering(&self, world: &World, entity: EntityId, members: &[EntityId]) -> Point {
        let transform = world.components.transform.get(entity);
        let position = transform.position();
        let facing = transform.rotation();

        let mut separation = Point::ZERO;
        let mut heading_sum = Point::ZERO;
        let mut center = Point::ZERO;
        let mut counted = 0.0;
        for member in members.iter().copied().filter(|member| *member != entity) {
            let Some(other) = world.components.transform.try_get(member) else {
                continue;
            };
            let offset = position - other.position();
            let distance = offset.length();
            if distance < self.min_separation {
                if let Some(away) = offset.normalized() {
                    separation += away * ((self.min_separation - distance) / self.min_separation);
                }
            }
            heading_sum += Point::from_polar(1.0, other.rotation());
            center += other.position();
            counted += 1.0;
        }
        if counted == 0.0 {
            return Point::ZERO;
        }

        let alignment = heading_sum.normalized().unwrap_or(Point::ZERO);
        let cohesion = (center * (1.0 / counted) - position)
            .normalized()
            .unwrap_or(Point::ZERO);

        let probe = position + Point::from_polar(self.avoidance_range, facing);
        let terrain = world.terrain();
        let blocked = !terrain.contains(probe)
            || terrain.is_wall_at(probe)
            || terrain.tile_type_at(probe) == Some(TileType::Water);
        let avoidance = if blocked {
            Point::from_polar(-1.0, facing)
        } else {
            Point::ZERO
        };

        separation * self.separation_influence
            + alignment * self.alignment_influence
            + cohesion * self.cohesion_influence
            + avoidance * self.avoidance_influence
    }

    /// Steers with the herd. Returns false when no other member is visible.
    pub fn tick(&self, world: &mut World, entity: EntityId, members: &[EntityId]) -> bool {
        if !members.iter().any(|member| *member != entity) {
            return false;
        }
        let steer = self.steering(world, entity, members);
        let Some(direction) = steer.normalized() else {
            return true;
        };
        let target_angle = direction.angle();
        turn_toward_angle(world, entity, target_angle, self.turn_speed);
        let transform = world.components.transform.get_mut(entity);
        let facing = transform.rotation();
        let scale = alignment_penalty(angle_difference(facing, target_angle));
        transform.apply_acceleration_from_ground(0, Point::from_polar(self.acceleration * scale, facing));
        true
    }
}
