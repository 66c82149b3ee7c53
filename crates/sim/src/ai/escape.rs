use crate::ai::{move_toward_point, nearest_entity};
use crate::entity::EntityId;
use crate::world::World;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EscapeAi {
    pub acceleration: f32,
    pub turn_speed: f32,
}

impl EscapeAi {
    pub fn new(acceleration: f32, turn_speed: f32) -> Self {
        Self {
            acceleration,
            turn_speed,
        }
    }

    /// Runs toward the point mirrored through the entity away from `threat`.
    pub fn tick(&self, world: &mut World, entity: EntityId, threat: EntityId) {
        let position = world.position_of(entity);
        let threat_position = world.position_of(threat);
        let target = position * 2.0 - threat_position;
        move_toward_point(world, entity, target, self.acceleration, self.turn_speed);
    }
}

/// Nearest visible entity that has recently attacked `entity` and passes the
/// caller's extra condition.
pub fn choose_escape_entity(
    world: &World,
    entity: EntityId,
    visible: &[EntityId],
    mut extra: impl FnMut(&World, EntityId) -> bool,
) -> Option<EntityId> {
    let health = world.components.health.try_get(entity)?;
    let threats = visible
        .iter()
        .copied()
        .filter(|candidate| health.is_being_attacked_by(*candidate))
        .filter(|candidate| world.is_live(*candidate))
        .filter(|candidate| extra(world, *candidate))
        .collect::<Vec<_>>();
    nearest_entity(world, entity, threats)
}
