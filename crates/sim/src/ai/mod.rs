pub mod escape;
pub mod follow;
pub mod guardian_attack;
pub mod herd;
pub mod wander;

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::math::{angle_difference, turn_angle_toward, Point};
use crate::world::World;

/// Within this distance a movement target counts as reached.
pub const ARRIVAL_RADIUS: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiType {
    Wander,
    Follow,
    Escape,
    Herd,
    Chase,
    Merge,
    ReturnHome,
    GuardianSpecial,
}

impl AiType {
    pub fn packet_index(self) -> f32 {
        match self {
            Self::Wander => 0.0,
            Self::Follow => 1.0,
            Self::Escape => 2.0,
            Self::Herd => 3.0,
            Self::Chase => 4.0,
            Self::Merge => 5.0,
            Self::ReturnHome => 6.0,
            Self::GuardianSpecial => 7.0,
        }
    }
}

/// Acceleration scale for moving while facing away from the travel direction.
///
/// Approximate: linear in the heading error, bottoming out at half speed
/// when facing directly away.
pub fn alignment_penalty(heading_error: f32) -> f32 {
    (1.0 - heading_error.abs() / PI * 0.5).clamp(0.5, 1.0)
}

pub fn turn_toward_angle(world: &mut World, entity: EntityId, angle: f32, turn_speed: f32) {
    let max_step = turn_speed * world.fixed_dt();
    let transform = world.components.transform.get_mut(entity);
    let turned = turn_angle_toward(transform.rotation(), angle, max_step);
    transform.set_rotation(turned);
}

pub fn turn_toward_point(world: &mut World, entity: EntityId, target: Point, turn_speed: f32) {
    let angle = world.position_of(entity).angle_to(target);
    turn_toward_angle(world, entity, angle, turn_speed);
}

/// Turns toward `target` and accelerates along the new facing.
pub fn move_toward_point(world: &mut World, entity: EntityId, target: Point, acceleration: f32, turn_speed: f32) {
    let position = world.position_of(entity);
    if position.distance_squared_to(target) <= f32::EPSILON {
        return;
    }
    let target_angle = position.angle_to(target);
    turn_toward_angle(world, entity, target_angle, turn_speed);

    let transform = world.components.transform.get_mut(entity);
    let facing = transform.rotation();
    let scale = alignment_penalty(angle_difference(facing, target_angle));
    transform.apply_acceleration_from_ground(0, Point::from_polar(acceleration * scale, facing));
}

pub fn stop_moving(world: &mut World, entity: EntityId) {
    world.components.transform.get_mut(entity).clear_acceleration();
}

/// A target is reached inside the arrival radius, or once the entity is
/// moving away from it.
pub fn has_reached_position(world: &World, entity: EntityId, target: Point) -> bool {
    let transform = world.components.transform.get(entity);
    let position = transform.position();
    if position.distance_squared_to(target) <= ARRIVAL_RADIUS * ARRIVAL_RADIUS {
        return true;
    }
    transform.velocity().dot(position - target) > 0.0
}

/// Closest entity to `entity` among `candidates`; ties go to the lower id.
pub fn nearest_entity(world: &World, entity: EntityId, candidates: impl IntoIterator<Item = EntityId>) -> Option<EntityId> {
    let origin = world.position_of(entity);
    let mut best: Option<(f32, EntityId)> = None;
    for candidate in candidates {
        let Some(position) = world.try_position_of(candidate) else {
            continue;
        };
        let distance = origin.distance_squared_to(position);
        let closer = match best {
            Some((best_distance, best_id)) => {
                distance < best_distance || (distance == best_distance && candidate < best_id)
            }
            None => true,
        };
        if closer {
            best = Some((distance, candidate));
        }
    }
    best.map(|(_, candidate)| candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_penalty_is_bounded() {
        assert_eq!(alignment_penalty(0.0), 1.0);
        assert!((alignment_penalty(PI) - 0.5).abs() < 1e-6);
        assert!((alignment_penalty(-PI / 2.0) - 0.75).abs() < 1e-6);
    }
}
