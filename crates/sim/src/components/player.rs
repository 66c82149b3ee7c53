use crate::collision::max_entity_reach;
use crate::commands::PlayerCommand;
use crate::component::ComponentSystem;
use crate::components::health;
use crate::entity::EntityId;
use crate::error::SimError;
use crate::math::Point;
use crate::snapshot::PacketWriter;
use crate::world::World;

pub const PLAYER_ACCELERATION: f32 = 800.0;
pub const PLAYER_ATTACK_DAMAGE: f32 = 2.0;
/// Probe circle in front of the player used by attacks.
pub const PLAYER_ATTACK_OFFSET: f32 = 48.0;
pub const PLAYER_ATTACK_RADIUS: f32 = 40.0;
pub const PLAYER_ATTACK_COOLDOWN_SECONDS: f32 = 0.4;

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerComponent {
    pub username: String,
    pub movement_direction: Point,
    pub attack_cooldown_ticks: u32,
}

impl PlayerComponent {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            movement_direction: Point::ZERO,
            attack_cooldown_ticks: 0,
        }
    }
}

pub struct PlayerSystem;

impl ComponentSystem for PlayerSystem {
    fn on_tick(&self, world: &mut World, entity: EntityId) -> Result<(), SimError> {
        let player = world.components.player.get_mut(entity);
        player.attack_cooldown_ticks = player.attack_cooldown_ticks.saturating_sub(1);
        let Some(direction) = player.movement_direction.normalized() else {
            return Ok(());
        };
        world
            .components
            .transform
            .get_mut(entity)
            .apply_acceleration_from_ground(0, direction * PLAYER_ACCELERATION);
        Ok(())
    }

    fn packet_length(&self, _world: &World, _entity: EntityId) -> usize {
        3
    }

    fn add_to_packet(&self, world: &World, entity: EntityId, packet: &mut PacketWriter) {
        let player = world.components().player.get(entity);
        packet.write_point(player.movement_direction);
        packet.write_f32(player.attack_cooldown_ticks as f32);
    }
}

/// Applies one queued intent to a player entity.
pub fn apply_command(world: &mut World, entity: EntityId, command: PlayerCommand) -> Result<(), SimError> {
    if !world.entity_exists(entity) || world.is_flagged_for_removal(entity) {
        return Err(SimError::UnknownEntity(entity.0));
    }
    let rejected = || SimError::CommandRejected {
        entity: entity.0,
        command: command.name(),
    };
    if !world.components.player.is_joined(entity) {
        return Err(rejected());
    }

    match command {
        PlayerCommand::Move { direction } => {
            if !direction.is_finite() {
                return Err(rejected());
            }
            world.components.player.get_mut(entity).movement_direction = direction;
        }
        PlayerCommand::Face { angle } => {
            if !angle.is_finite() {
                return Err(rejected());
            }
            world.components.transform.get_mut(entity).set_rotation(angle);
        }
        PlayerCommand::Attack => {
            if world.components.player.get(entity).attack_cooldown_ticks > 0 {
                return Err(rejected());
            }
            let cooldown = world.config().seconds_to_ticks(PLAYER_ATTACK_COOLDOWN_SECONDS);
            world.components.player.get_mut(entity).attack_cooldown_ticks = cooldown;
            for target in attack_targets(world, entity) {
                health::damage_entity(world, target, Some(entity), PLAYER_ATTACK_DAMAGE);
            }
        }
    }
    world.mark_dirty(entity);
    Ok(())
}

/// Damageable entities touching the attack probe, in id order.
fn attack_targets(world: &World, entity: EntityId) -> Vec<EntityId> {
    let transform = world.components.transform.get(entity);
    let probe = transform.position() + Point::from_polar(PLAYER_ATTACK_OFFSET, transform.rotation());
    let bounds = world
        .chunks
        .bounds_around(probe, PLAYER_ATTACK_RADIUS + max_entity_reach(world));
    world
        .chunks
        .entities_in_bounds(bounds)
        .into_iter()
        .filter(|target| *target != entity)
        .filter(|target| world.is_live(*target) && world.components.health.has(*target))
        .filter(|target| {
            world
                .components
                .transform
                .get(*target)
                .hitboxes()
                .iter()
                .any(|hitbox| hitbox.placed().intersects_circle(probe, PLAYER_ATTACK_RADIUS))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::entities;
    use crate::terrain::{Biome, TerrainGrid, TileType};

    fn world_with_player() -> (World, EntityId) {
        let mut world = World::new(
            SimConfig::default(),
            TerrainGrid::filled(16, 16, TileType::Grass, Biome::Grasslands),
        )
        .expect("world");
        let player = world
            .create_entity(entities::player(Point::new(400.0, 400.0), "tester"), 0)
            .expect("player");
        world.tick();
        (world, player)
    }

    #[test]
    fn move_command_accelerates_player() {
        let (mut world, player) = world_with_player();
        world.queue_command(player, PlayerCommand::Move { direction: Point::new(1.0, 0.0) });
        let report = world.tick();
        assert_eq!(report.commands.applied, 1);
        assert!(world.components().transform.get(player).velocity().x > 0.0);
    }

    #[test]
    fn commands_for_unknown_or_non_player_entities_are_rejected() {
        let (mut world, _player) = world_with_player();
        let boulder = world
            .create_entity(entities::boulder(Point::new(200.0, 200.0)), 0)
            .expect("boulder");
        world.tick();
        world.queue_command(EntityId(999), PlayerCommand::Attack);
        world.queue_command(boulder, PlayerCommand::Face { angle: 1.0 });
        let report = world.tick();
        assert_eq!(report.commands.rejected, 2);
        assert_eq!(report.commands.applied, 0);
    }

    #[test]
    fn attack_damages_entity_in_front() {
        let (mut world, player) = world_with_player();
        let config = *world.config();
        let cow = world
            .create_entity(entities::cow(Point::new(400.0, 460.0), &config), 0)
            .expect("cow");
        world.tick();
        world.queue_command(player, PlayerCommand::Face { angle: 0.0 });
        world.queue_command(player, PlayerCommand::Attack);
        world.tick();
        let health = world.components().health.get(cow);
        assert!(health.health < health.max_health);
        assert!(health.is_being_attacked_by(player));

        world.queue_command(player, PlayerCommand::Attack);
        let report = world.tick();
        assert_eq!(report.commands.rejected, 1);
    }

    #[test]
    fn attack_reaches_far_tail_of_long_entity() {
        let mut world = World::new(
            SimConfig::default(),
            TerrainGrid::filled(40, 40, TileType::Sand, Biome::Desert),
        )
        .expect("world");
        let serpent = world
            .create_entity(entities::serpent(Point::new(1000.0, 2000.0), 24), 0)
            .expect("serpent");
        let tail = world
            .components()
            .transform
            .get(serpent)
            .hitboxes()
            .last()
            .expect("tail")
            .position;
        let player = world
            .create_entity(
                entities::player(tail - Point::new(0.0, PLAYER_ATTACK_OFFSET), "tester"),
                0,
            )
            .expect("player");
        world.tick();
        world.components_mut().transform.get_mut(player).set_rotation(0.0);

        assert!(world.position_of(serpent).distance_to(tail) > 900.0);
        assert_eq!(attack_targets(&world, player), vec![serpent]);
    }
}
