use std::collections::BTreeMap;

use tracing::debug;

use crate::component::ComponentSystem;
use crate::components::{guardian, slime};
use crate::entity::EntityId;
use crate::error::SimError;
use crate::events::SimEvent;
use crate::snapshot::PacketWriter;
use crate::world::World;

/// How long an attacker stays "recently attacking" after its last hit.
pub const ATTACKER_MEMORY_SECONDS: f32 = 3.0;

#[derive(Debug, Clone, PartialEq)]
pub struct HealthComponent {
    pub max_health: f32,
    pub health: f32,
    pub heals_on_slime: bool,
    /// Remaining ticks per recent attacker.
    attackers: BTreeMap<EntityId, u32>,
}

impl HealthComponent {
    pub fn new(max_health: f32) -> Self {
        Self {
            max_health,
            health: max_health,
            heals_on_slime: false,
            attackers: BTreeMap::new(),
        }
    }

    pub fn healing_on_slime(mut self) -> Self {
        self.heals_on_slime = true;
        self
    }

    pub fn is_being_attacked_by(&self, entity: EntityId) -> bool {
        self.attackers.contains_key(&entity)
    }

    pub fn attackers(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.attackers.keys().copied()
    }

    pub fn is_dead(&self) -> bool {
        self.health <= 0.0
    }
}

pub struct HealthSystem;

impl ComponentSystem for HealthSystem {
    fn on_tick(&self, world: &mut World, entity: EntityId) -> Result<(), SimError> {
        let health = world.components.health.get_mut(entity);
        health.attackers.retain(|_, ticks| {
            *ticks = ticks.saturating_sub(1);
            *ticks > 0
        });
        Ok(())
    }

    fn packet_length(&self, _world: &World, _entity: EntityId) -> usize {
        2
    }

    fn add_to_packet(&self, world: &World, entity: EntityId, packet: &mut PacketWriter) {
        let health = world.components().health.get(entity);
        packet.write_f32(health.health);
        packet.write_f32(health.max_health);
    }
}

/// Applies damage, remembers the attacker and kills the entity at zero
/// health. Returns whether the hit was fatal.
pub fn damage_entity(world: &mut World, target: EntityId, attacker: Option<EntityId>, amount: f32) -> bool {
    if !world.is_live(target) || amount <= 0.0 {
        return false;
    }
    let memory_ticks = world.config().seconds_to_ticks(ATTACKER_MEMORY_SECONDS);
    let Some(health) = world.components.health.try_get_mut(target) else {
        return false;
    };
    if health.is_dead() {
        return false;
    }
    health.health = (health.health - amount).max(0.0);
    if let Some(attacker) = attacker {
        health.attackers.insert(attacker, memory_ticks);
    }
    let died = health.is_dead();

    world.emit(SimEvent::EntityDamaged {
        entity: target,
        attacker,
        amount,
    });
    world.mark_dirty(target);

    if let Some(attacker) = attacker {
        if world.components.slime.has(target) {
            slime::on_damaged(world, target, attacker);
        }
        if world.components.guardian.has(target) {
            guardian::on_damaged(world, target, attacker);
        }
    }

    if died {
        world.emit(SimEvent::EntityDied { entity: target });
        world.destroy_entity(target);
        debug!(entity = target.0, attacker = attacker.map(|id| id.0), "entity_died");
    }
    died
}

pub fn heal_entity(world: &mut World, target: EntityId, amount: f32) {
    let Some(health) = world.components.health.try_get_mut(target) else {
        return;
    };
    let healed = (health.health + amount).min(health.max_health);
    if healed != health.health {
        health.health = healed;
        world.mark_dirty(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::entities;
    use crate::math::Point;
    use crate::terrain::{Biome, TerrainGrid, TileType};

    fn world_with_cow() -> (World, EntityId, EntityId) {
        let mut world = World::new(
            SimConfig::default(),
            TerrainGrid::filled(16, 16, TileType::Grass, Biome::Grasslands),
        )
        .expect("world");
        let config = *world.config();
        let cow = world
            .create_entity(entities::cow(Point::new(300.0, 300.0), &config), 0)
            .expect("cow");
        let player = world
            .create_entity(entities::player(Point::new(500.0, 300.0), "tester"), 0)
            .expect("player");
        world.tick();
        (world, cow, player)
    }

    #[test]
    fn attacker_is_remembered_then_forgotten() {
        let (mut world, cow, player) = world_with_cow();
        assert!(!damage_entity(&mut world, cow, Some(player), 1.0));
        assert!(world.components().health.get(cow).is_being_attacked_by(player));

        let memory = world.config().seconds_to_ticks(ATTACKER_MEMORY_SECONDS);
        for _ in 0..memory {
            world.tick();
        }
        assert!(!world.components().health.get(cow).is_being_attacked_by(player));
    }

    #[test]
    fn fatal_damage_destroys_entity_at_end_of_tick() {
        let (mut world, cow, player) = world_with_cow();
        assert!(damage_entity(&mut world, cow, Some(player), 1000.0));
        assert!(world.is_flagged_for_removal(cow));
        assert!(!damage_entity(&mut world, cow, Some(player), 1.0));
        world.tick();
        assert!(!world.entity_exists(cow));
    }

    #[test]
    fn healing_is_capped_at_max() {
        let (mut world, cow, player) = world_with_cow();
        damage_entity(&mut world, cow, Some(player), 2.0);
        heal_entity(&mut world, cow, 50.0);
        let health = world.components().health.get(cow);
        assert_eq!(health.health, health.max_health);
    }
}
