use std::collections::BTreeMap;

use crate::ai::move_toward_point;
use crate::collision::HitboxCollision;
use crate::component::ComponentSystem;
use crate::components::guardian_projectile::is_guardian_family;
use crate::components::health;
use crate::entity::EntityId;
use crate::error::SimError;
use crate::snapshot::PacketWriter;
use crate::world::World;

pub const SPIKY_BALL_ACCELERATION: f32 = 220.0;
pub const SPIKY_BALL_TURN_SPEED: f32 = 6.0;
pub const SPIKY_BALL_DAMAGE: f32 = 2.0;
pub const SPIKY_BALL_CONTACT_COOLDOWN_SECONDS: f32 = 1.0;
pub const SPIKY_BALL_LIFETIME_SECONDS: f32 = 12.0;
/// Idle balls drift back once they stray this far from their guardian.
pub const SPIKY_BALL_TETHER_RANGE: f32 = 200.0;

#[derive(Debug, Clone, PartialEq)]
pub struct GuardianSpikyBallComponent {
    pub owner: EntityId,
    pub remaining_ticks: u32,
    contact_cooldowns: BTreeMap<EntityId, u32>,
}

impl GuardianSpikyBallComponent {
    pub fn new(owner: EntityId, lifetime_ticks: u32) -> Self {
        Self {
            owner,
            remaining_ticks: lifetime_ticks,
            contact_cooldowns: BTreeMap::new(),
        }
    }
}

pub struct GuardianSpikyBallSystem;

impl ComponentSystem for GuardianSpikyBallSystem {
    fn on_tick(&self, world: &mut World, entity: EntityId) -> Result<(), SimError> {
        let ball = world.components.guardian_spiky_ball.get_mut(entity);
        ball.remaining_ticks = ball.remaining_ticks.saturating_sub(1);
        ball.contact_cooldowns.retain(|_, ticks| {
            *ticks = ticks.saturating_sub(1);
            *ticks > 0
        });
        let owner = ball.owner;
        if ball.remaining_ticks == 0 || !world.is_live(owner) {
            world.destroy_entity(entity);
            return Ok(());
        }

        let target = world
            .components
            .guardian
            .try_get(owner)
            .and_then(|guardian| guardian.target)
            .filter(|target| world.is_live(*target));
        if let Some(target) = target {
            let position = world.position_of(target);
            move_toward_point(world, entity, position, SPIKY_BALL_ACCELERATION, SPIKY_BALL_TURN_SPEED);
            return Ok(());
        }
        let home = world.position_of(owner);
        if world.position_of(entity).distance_to(home) > SPIKY_BALL_TETHER_RANGE {
            move_toward_point(world, entity, home, SPIKY_BALL_ACCELERATION, SPIKY_BALL_TURN_SPEED);
        }
        Ok(())
    }

    fn on_hitbox_collision(&self, world: &mut World, collision: &HitboxCollision) {
        let (entity, other) = (collision.entity, collision.other);
        let ball = world.components.guardian_spiky_ball.get(entity);
        if ball.contact_cooldowns.contains_key(&other) {
            return;
        }
        if is_guardian_family(world, other) || !world.components.health.has(other) {
            return;
        }
        let owner = ball.owner;
        let cooldown = world.config().seconds_to_ticks(SPIKY_BALL_CONTACT_COOLDOWN_SECONDS);
        world
            .components
            .guardian_spiky_ball
            .get_mut(entity)
            .contact_cooldowns
            .insert(other, cooldown);
        let attacker = world.entity_exists(owner).then_some(owner);
        health::damage_entity(world, other, attacker, SPIKY_BALL_DAMAGE);
    }

    fn packet_length(&self, _world: &World, _entity: EntityId) -> usize {
        1
    }

    fn add_to_packet(&self, world: &World, entity: EntityId, packet: &mut PacketWriter) {
        packet.write_f32(world.components().guardian_spiky_ball.get(entity).owner.0 as f32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::entities;
    use crate::math::Point;
    use crate::terrain::{Biome, TerrainGrid, TileType};

    #[test]
    fn ball_is_destroyed_with_its_guardian() {
        let mut world = World::new(
            SimConfig::default(),
            TerrainGrid::filled(32, 32, TileType::Rock, Biome::Mountains),
        )
        .expect("world");
        let config = *world.config();
        let guardian = world
            .create_entity(entities::guardian(Point::new(1000.0, 1000.0), &config), 0)
            .expect("guardian");
        let ball = world
            .create_entity(
                entities::guardian_spiky_ball(Point::new(1150.0, 1000.0), guardian, &config),
                0,
            )
            .expect("ball");
        world.tick();
        assert!(world.is_live(ball));

        world.destroy_entity(guardian);
        world.tick();
        assert!(!world.entity_exists(guardian));
        world.tick();
        assert!(!world.entity_exists(ball));
    }
}
