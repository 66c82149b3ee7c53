use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::collision::HitboxCollision;
use crate::components::ai_helper::{AiHelperComponent, AiHelperSystem};
use crate::components::cow::{CowComponent, CowSystem};
use crate::components::guardian::{GuardianComponent, GuardianSystem};
use crate::components::guardian_projectile::{GuardianProjectileComponent, GuardianProjectileSystem};
use crate::components::guardian_spiky_ball::{GuardianSpikyBallComponent, GuardianSpikyBallSystem};
use crate::components::health::{HealthComponent, HealthSystem};
use crate::components::krumblid::{KrumblidComponent, KrumblidSystem};
use crate::components::player::{PlayerComponent, PlayerSystem};
use crate::components::serpent::{SerpentComponent, SerpentSystem};
use crate::components::slime::{SlimeComponent, SlimeSystem};
use crate::config::SimConfig;
use crate::entity::EntityId;
use crate::error::SimError;
use crate::snapshot::PacketWriter;
use crate::transform::{TransformComponent, TransformSystem};
use crate::world::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Transform,
    Health,
    Player,
    AiHelper,
    Slime,
    Cow,
    Krumblid,
    Serpent,
    Guardian,
    GuardianSpikyBall,
    GuardianProjectile,
}

/// Registration order. Joins, ticks, removal hooks and packets all follow it.
pub const COMPONENT_ORDER: [ComponentKind; 11] = [
    ComponentKind::Transform,
    ComponentKind::Health,
    ComponentKind::Player,
    ComponentKind::AiHelper,
    ComponentKind::Slime,
    ComponentKind::Cow,
    ComponentKind::Krumblid,
    ComponentKind::Serpent,
    ComponentKind::Guardian,
    ComponentKind::GuardianSpikyBall,
    ComponentKind::GuardianProjectile,
];

/// Lifecycle hooks for one component type.
///
/// Implementations are stateless; all state lives in the world's tables.
pub trait ComponentSystem {
    /// Ticks between `on_tick` calls. Entities are spread across phases.
    fn tick_interval(&self, _config: &SimConfig) -> u32 {
        1
    }

    fn on_join(&self, _world: &mut World, _entity: EntityId) {}

    fn on_tick(&self, _world: &mut World, _entity: EntityId) -> Result<(), SimError> {
        Ok(())
    }

    /// Runs while every sibling component is still readable.
    fn pre_remove(&self, _world: &mut World, _entity: EntityId) {}

    fn on_remove(&self, _world: &mut World, _entity: EntityId) {}

    fn on_hitbox_collision(&self, _world: &mut World, _collision: &HitboxCollision) {}

    fn on_wall_collision(&self, _world: &mut World, _entity: EntityId, _hitbox: usize) {}

    fn packet_length(&self, _world: &World, _entity: EntityId) -> usize {
        0
    }

    fn add_to_packet(&self, _world: &World, _entity: EntityId, _packet: &mut PacketWriter) {}
}

pub fn system_for(kind: ComponentKind) -> &'static dyn ComponentSystem {
    match kind {
        ComponentKind::Transform => &TransformSystem,
        ComponentKind::Health => &HealthSystem,
        ComponentKind::Player => &PlayerSystem,
        ComponentKind::AiHelper => &AiHelperSystem,
        ComponentKind::Slime => &SlimeSystem,
        ComponentKind::Cow => &CowSystem,
        ComponentKind::Krumblid => &KrumblidSystem,
        ComponentKind::Serpent => &SerpentSystem,
        ComponentKind::Guardian => &GuardianSystem,
        ComponentKind::GuardianSpikyBall => &GuardianSpikyBallSystem,
        ComponentKind::GuardianProjectile => &GuardianProjectileSystem,
    }
}

#[derive(Debug, Clone)]
struct TableEntry<T> {
    data: T,
    join_delay_remaining: u32,
    joined: bool,
    tick_phase: u32,
}

/// Sparse storage for one component type, keyed by entity id.
#[derive(Debug, Clone)]
pub struct ComponentTable<T> {
    kind: ComponentKind,
    entries: HashMap<EntityId, TableEntry<T>>,
    /// Joined entities in join order.
    active: Vec<EntityId>,
    next_tick_phase: u32,
}

impl<T> ComponentTable<T> {
    pub fn new(kind: ComponentKind) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
            active: Vec::new(),
            next_tick_phase: 0,
        }
    }

    pub fn add(&mut self, entity: EntityId, data: T, join_delay_ticks: u32) {
        if self.entries.contains_key(&entity) {
            self.active.retain(|id| *id != entity);
        }
        self.entries.insert(
            entity,
            TableEntry {
                data,
                join_delay_remaining: join_delay_ticks,
                joined: false,
                tick_phase: 0,
            },
        );
    }

    /// Fails fast: a missing component is an invariant violation.
    pub fn get(&self, entity: EntityId) -> &T {
        match self.entries.get(&entity) {
            Some(entry) => &entry.data,
            None => panic!("{}", self.missing(entity)),
        }
    }

    pub fn get_mut(&mut self, entity: EntityId) -> &mut T {
        let missing = self.missing(entity);
        match self.entries.get_mut(&entity) {
            Some(entry) => &mut entry.data,
            None => panic!("{missing}"),
        }
    }

    pub fn try_get(&self, entity: EntityId) -> Option<&T> {
        self.entries.get(&entity).map(|entry| &entry.data)
    }

    pub fn try_get_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        self.entries.get_mut(&entity).map(|entry| &mut entry.data)
    }

    pub fn has(&self, entity: EntityId) -> bool {
        self.entries.contains_key(&entity)
    }

    pub fn is_joined(&self, entity: EntityId) -> bool {
        self.entries.get(&entity).is_some_and(|entry| entry.joined)
    }

    /// Deletes the slot. Lifecycle hooks are the world's job.
    pub fn remove(&mut self, entity: EntityId) -> Option<T> {
        let entry = self.entries.remove(&entity)?;
        if entry.joined {
            self.active.retain(|id| *id != entity);
        }
        Some(entry.data)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Joined entities in join order.
    pub fn active(&self) -> &[EntityId] {
        &self.active
    }

    /// All entities with this component, ascending.
    pub fn entity_ids(&self) -> Vec<EntityId> {
        let mut ids = self.entries.keys().copied().collect::<Vec<_>>();
        ids.sort();
        ids
    }

    fn missing(&self, entity: EntityId) -> SimError {
        SimError::MissingComponent {
            entity: entity.0,
            component: self.kind,
        }
    }
}

/// Type-erased view used when iterating tables by [`ComponentKind`].
pub trait ErasedTable {
    fn kind(&self) -> ComponentKind;
    fn has(&self, entity: EntityId) -> bool;
    fn is_joined(&self, entity: EntityId) -> bool;
    fn tick_phase(&self, entity: EntityId) -> Option<u32>;
    fn active_entities(&self) -> Vec<EntityId>;
    /// Steps every pending entry and returns the entities that joined, ascending.
    fn advance_join_delays(&mut self) -> Vec<EntityId>;
    fn remove_slot(&mut self, entity: EntityId) -> bool;
    fn entry_count(&self) -> usize;
}

impl<T> ErasedTable for ComponentTable<T> {
    fn kind(&self) -> ComponentKind {
        self.kind
    }

    fn has(&self, entity: EntityId) -> bool {
        ComponentTable::has(self, entity)
    }

    fn is_joined(&self, entity: EntityId) -> bool {
        ComponentTable::is_joined(self, entity)
    }

    fn tick_phase(&self, entity: EntityId) -> Option<u32> {
        self.entries
            .get(&entity)
            .filter(|entry| entry.joined)
            .map(|entry| entry.tick_phase)
    }

    fn active_entities(&self) -> Vec<EntityId> {
        self.active.clone()
    }

    fn advance_join_delays(&mut self) -> Vec<EntityId> {
        let mut pending = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.joined)
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();
        pending.sort();

        let mut joined = Vec::new();
        for entity in pending {
            let Some(entry) = self.entries.get_mut(&entity) else {
                continue;
            };
            if entry.join_delay_remaining > 0 {
                entry.join_delay_remaining -= 1;
                continue;
            }
            entry.joined = true;
            entry.tick_phase = self.next_tick_phase;
            self.next_tick_phase = self.next_tick_phase.wrapping_add(1);
            self.active.push(entity);
            joined.push(entity);
        }
        joined
    }

    fn remove_slot(&mut self, entity: EntityId) -> bool {
        self.remove(entity).is_some()
    }

    fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

/// Every component table of a world.
#[derive(Debug)]
pub struct ComponentStore {
    pub transform: ComponentTable<TransformComponent>,
    pub health: ComponentTable<HealthComponent>,
    pub player: ComponentTable<PlayerComponent>,
    pub ai_helper: ComponentTable<AiHelperComponent>,
    pub slime: ComponentTable<SlimeComponent>,
    pub cow: ComponentTable<CowComponent>,
    pub krumblid: ComponentTable<KrumblidComponent>,
    pub serpent: ComponentTable<SerpentComponent>,
    pub guardian: ComponentTable<GuardianComponent>,
    pub guardian_spiky_ball: ComponentTable<GuardianSpikyBallComponent>,
    pub guardian_projectile: ComponentTable<GuardianProjectileComponent>,
}

impl Default for ComponentStore {
    fn default() -> Self {
        Self {
            transform: ComponentTable::new(ComponentKind::Transform),
            health: ComponentTable::new(ComponentKind::Health),
            player: ComponentTable::new(ComponentKind::Player),
            ai_helper: ComponentTable::new(ComponentKind::AiHelper),
            slime: ComponentTable::new(ComponentKind::Slime),
            cow: ComponentTable::new(ComponentKind::Cow),
            krumblid: ComponentTable::new(ComponentKind::Krumblid),
            serpent: ComponentTable::new(ComponentKind::Serpent),
            guardian: ComponentTable::new(ComponentKind::Guardian),
            guardian_spiky_ball: ComponentTable::new(ComponentKind::GuardianSpikyBall),
            guardian_projectile: ComponentTable::new(ComponentKind::GuardianProjectile),
        }
    }
}

impl ComponentStore {
    pub fn table(&self, kind: ComponentKind) -> &dyn ErasedTable {
        match kind {
            ComponentKind::Transform => &self.transform,
            ComponentKind::Health => &self.health,
            ComponentKind::Player => &self.player,
            ComponentKind::AiHelper => &self.ai_helper,
            ComponentKind::Slime => &self.slime,
            ComponentKind::Cow => &self.cow,
            ComponentKind::Krumblid => &self.krumblid,
            ComponentKind::Serpent => &self.serpent,
            ComponentKind::Guardian => &self.guardian,
            ComponentKind::GuardianSpikyBall => &self.guardian_spiky_ball,
            ComponentKind::GuardianProjectile => &self.guardian_projectile,
        }
    }

    pub fn table_mut(&mut self, kind: ComponentKind) -> &mut dyn ErasedTable {
        match kind {
            ComponentKind::Transform => &mut self.transform,
            ComponentKind::Health => &mut self.health,
            ComponentKind::Player => &mut self.player,
            ComponentKind::AiHelper => &mut self.ai_helper,
            ComponentKind::Slime => &mut self.slime,
            ComponentKind::Cow => &mut self.cow,
            ComponentKind::Krumblid => &mut self.krumblid,
            ComponentKind::Serpent => &mut self.serpent,
            ComponentKind::Guardian => &mut self.guardian,
            ComponentKind::GuardianSpikyBall => &mut self.guardian_spiky_ball,
            ComponentKind::GuardianProjectile => &mut self.guardian_projectile,
        }
    }

    /// Components attached to `entity`, in registration order.
    pub fn kinds_of(&self, entity: EntityId) -> Vec<ComponentKind> {
        COMPONENT_ORDER
            .into_iter()
            .filter(|kind| self.table(*kind).has(entity))
            .collect()
    }
}
