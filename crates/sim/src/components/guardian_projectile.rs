use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collision::HitboxCollision;
use crate::component::ComponentSystem;
use crate::components::health;
use crate::entity::{EntityId, EntityType};
use crate::error::SimError;
use crate::math::Point;
use crate::snapshot::PacketWriter;
use crate::world::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectileKind {
    /// Aimed shard from a crystal burst. Shatters on the first hit or wall.
    GemFragment,
    /// Ring wave from a crystal slam. Passes through walls and targets.
    Shockwave,
}

impl ProjectileKind {
    pub fn damage(self) -> f32 {
        match self {
            Self::GemFragment => 2.0,
            Self::Shockwave => 3.0,
        }
    }

    pub fn lifetime_seconds(self) -> f32 {
        match self {
            Self::GemFragment => 2.0,
            Self::Shockwave => 0.8,
        }
    }

    pub fn entity_type(self) -> EntityType {
        match self {
            Self::GemFragment => EntityType::GuardianGemFragment,
            Self::Shockwave => EntityType::GuardianShockwave,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuardianProjectileComponent {
    pub kind: ProjectileKind,
    pub owner: EntityId,
    pub velocity: Point,
    pub remaining_ticks: u32,
    /// Entities already damaged; each is hit at most once.
    hit: BTreeSet<EntityId>,
}

impl GuardianProjectileComponent {
    pub fn new(kind: ProjectileKind, owner: EntityId, velocity: Point, lifetime_ticks: u32) -> Self {
        Self {
            kind,
            owner,
            velocity,
            remaining_ticks: lifetime_ticks,
            hit: BTreeSet::new(),
        }
    }

    pub fn has_hit(&self, entity: EntityId) -> bool {
        self.hit.contains(&entity)
    }
}

/// Guardian hazards never hurt each other.
pub(crate) fn is_guardian_family(world: &World, entity: EntityId) -> bool {
    matches!(
        world.entity_type(entity),
        Some(
            EntityType::Guardian
                | EntityType::GuardianSpikyBall
                | EntityType::GuardianGemFragment
                | EntityType::GuardianShockwave
        )
    )
}

pub struct GuardianProjectileSystem;

impl ComponentSystem for GuardianProjectileSystem {
    fn on_tick(&self, world: &mut World, entity: EntityId) -> Result<(), SimError> {
        let projectile = world.components.guardian_projectile.get_mut(entity);
        projectile.remaining_ticks = projectile.remaining_ticks.saturating_sub(1);
        if projectile.remaining_ticks == 0 {
            world.destroy_entity(entity);
            return Ok(());
        }
        let velocity = projectile.velocity;
        world.components.transform.get_mut(entity).set_velocity(velocity);
        Ok(())
    }

    fn on_hitbox_collision(&self, world: &mut World, collision: &HitboxCollision) {
        let (entity, other) = (collision.entity, collision.other);
        let projectile = world.components.guardian_projectile.get(entity);
        if other == projectile.owner || projectile.has_hit(other) {
            return;
        }
        if is_guardian_family(world, other) || !world.components.health.has(other) {
            return;
        }
        let (kind, owner) = (projectile.kind, projectile.owner);
        world
            .components
            .guardian_projectile
            .get_mut(entity)
            .hit
            .insert(other);
        let attacker = world.entity_exists(owner).then_some(owner);
        health::damage_entity(world, other, attacker, kind.damage());
        if kind == ProjectileKind::GemFragment {
            world.destroy_entity(entity);
            debug!(entity = entity.0, target = other.0, "gem_fragment_shattered");
        }
    }

    fn on_wall_collision(&self, world: &mut World, entity: EntityId, _hitbox: usize) {
        if world.components.guardian_projectile.get(entity).kind == ProjectileKind::GemFragment {
            world.destroy_entity(entity);
        }
    }

    fn packet_length(&self, _world: &World, _entity: EntityId) -> usize {
        3
    }

    fn add_to_packet(&self, world: &World, entity: EntityId, packet: &mut PacketWriter) {
        let projectile = world.components().guardian_projectile.get(entity);
        packet.write_f32(match projectile.kind {
            ProjectileKind::GemFragment => 0.0,
            ProjectileKind::Shockwave => 1.0,
        });
        packet.write_point(projectile.velocity);
    }
}
