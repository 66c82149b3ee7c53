use std::collections::{BTreeSet, HashMap};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::commands::{CommandQueue, PlayerCommand};
use crate::component::ComponentStore;
use crate::config::SimConfig;
use crate::entities::EntityConfig;
use crate::entity::{EntityId, EntityIdAllocator, EntityType};
use crate::error::SimError;
use crate::events::{SimEvent, SimEventBus};
use crate::math::Point;
use crate::scheduler::{TickReport, TickScheduler};
use crate::spatial::{ChunkBounds, ChunkGrid};
use crate::terrain::{TerrainGrid, TerrainQuery};

/// Owns every entity, component table and shared resource of a simulation.
#[derive(Debug)]
pub struct World {
    config: SimConfig,
    tick: u64,
    allocator: EntityIdAllocator,
    pub(crate) terrain: TerrainGrid,
    pub(crate) chunks: ChunkGrid,
    pub(crate) components: ComponentStore,
    entity_types: HashMap<EntityId, EntityType>,
    pub(crate) removal_flags: BTreeSet<EntityId>,
    pub(crate) pending_dirty: BTreeSet<EntityId>,
    pub(crate) dirty_entities: BTreeSet<EntityId>,
    pub(crate) events: SimEventBus,
    pub(crate) commands: CommandQueue,
    rng: ChaCha8Rng,
    scheduler: TickScheduler,
}

impl World {
    pub fn new(config: SimConfig, terrain: TerrainGrid) -> Result<Self, SimError> {
        config.validate()?;
        let chunks = ChunkGrid::new(terrain.width_tiles(), terrain.height_tiles());
        info!(
            width_tiles = terrain.width_tiles(),
            height_tiles = terrain.height_tiles(),
            chunks_x = chunks.width(),
            chunks_y = chunks.height(),
            seed = config.seed,
            "world_created"
        );
        Ok(Self {
            config,
            tick: 0,
            allocator: EntityIdAllocator::default(),
            terrain,
            chunks,
            components: ComponentStore::default(),
            entity_types: HashMap::new(),
            removal_flags: BTreeSet::new(),
            pending_dirty: BTreeSet::new(),
            dirty_entities: BTreeSet::new(),
            events: SimEventBus::default(),
            commands: CommandQueue::default(),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            scheduler: TickScheduler::default(),
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub(crate) fn set_tick_count(&mut self, tick: u64) {
        self.tick = tick;
    }

    pub fn fixed_dt(&self) -> f32 {
        self.config.fixed_dt_seconds()
    }

    pub fn terrain(&self) -> &TerrainGrid {
        &self.terrain
    }

    pub fn chunks(&self) -> &ChunkGrid {
        &self.chunks
    }

    pub fn components(&self) -> &ComponentStore {
        &self.components
    }

    pub fn components_mut(&mut self) -> &mut ComponentStore {
        &mut self.components
    }

    pub fn events(&self) -> &SimEventBus {
        &self.events
    }

    pub fn commands(&self) -> &CommandQueue {
        &self.commands
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// Position of the RNG in its stream, saved with snapshots.
    pub fn rng_word_pos(&self) -> u128 {
        self.rng.get_word_pos()
    }

    pub(crate) fn set_rng(&mut self, rng: ChaCha8Rng) {
        self.rng = rng;
    }

    pub(crate) fn terrain_and_rng(&mut self) -> (&TerrainGrid, &mut ChaCha8Rng) {
        (&self.terrain, &mut self.rng)
    }

    pub fn emit(&mut self, event: SimEvent) {
        self.events.emit(event);
    }

    pub fn last_tick_report(&self) -> TickReport {
        self.scheduler.last_report()
    }

    /// Runs one fixed-timestep tick.
    pub fn tick(&mut self) -> TickReport {
        let mut scheduler = std::mem::take(&mut self.scheduler);
        let report = scheduler.run_tick(self);
        self.scheduler = scheduler;
        report
    }

    pub fn queue_command(&mut self, entity: EntityId, command: PlayerCommand) {
        self.commands.enqueue(entity, command);
    }

    /// Creates an entity from a component bundle. It becomes tick-eligible and
    /// visible once `join_delay_ticks` further ticks have elapsed.
    pub fn create_entity(&mut self, config: EntityConfig, join_delay_ticks: u32) -> Result<EntityId, SimError> {
        let position = config.transform.position();
        if !self.terrain.contains(position) {
            return Err(SimError::SpawnOutOfBounds {
                x: position.x,
                y: position.y,
            });
        }
        let id = self.allocator.allocate();
        self.insert_entity(id, config, join_delay_ticks);
        Ok(id)
    }

    /// Recreates an entity under a known id, used when restoring snapshots.
    pub(crate) fn create_entity_with_id(&mut self, id: EntityId, config: EntityConfig, join_delay_ticks: u32) {
        self.allocator.reserve_through(id);
        self.insert_entity(id, config, join_delay_ticks);
    }

    fn insert_entity(&mut self, id: EntityId, config: EntityConfig, join_delay_ticks: u32) {
        let entity_type = config.entity_type;
        let EntityConfig {
            transform,
            health,
            player,
            ai_helper,
            slime,
            cow,
            krumblid,
            serpent,
            guardian,
            guardian_spiky_ball,
            guardian_projectile,
            ..
        } = config;

        let store = &mut self.components;
        store.transform.add(id, transform, join_delay_ticks);
        if let Some(health) = health {
            store.health.add(id, health, join_delay_ticks);
        }
        if let Some(player) = player {
            store.player.add(id, player, join_delay_ticks);
        }
        if let Some(ai_helper) = ai_helper {
            store.ai_helper.add(id, ai_helper, join_delay_ticks);
        }
        if let Some(slime) = slime {
            store.slime.add(id, slime, join_delay_ticks);
        }
        if let Some(cow) = cow {
            store.cow.add(id, cow, join_delay_ticks);
        }
        if let Some(krumblid) = krumblid {
            store.krumblid.add(id, krumblid, join_delay_ticks);
        }
        if let Some(serpent) = serpent {
            store.serpent.add(id, serpent, join_delay_ticks);
        }
        if let Some(guardian) = guardian {
            store.guardian.add(id, guardian, join_delay_ticks);
        }
        if let Some(spiky_ball) = guardian_spiky_ball {
            store.guardian_spiky_ball.add(id, spiky_ball, join_delay_ticks);
        }
        if let Some(projectile) = guardian_projectile {
            store.guardian_projectile.add(id, projectile, join_delay_ticks);
        }

        self.entity_types.insert(id, entity_type);
        self.events.emit(SimEvent::EntityCreated {
            entity: id,
            entity_type,
        });
        debug!(
            entity = id.0,
            entity_type = entity_type.as_str(),
            join_delay_ticks,
            "entity_created"
        );
    }

    /// Flags an entity for removal at the end of the tick. Returns false for
    /// unknown entities.
    pub fn destroy_entity(&mut self, entity: EntityId) -> bool {
        if !self.entity_types.contains_key(&entity) {
            return false;
        }
        self.removal_flags.insert(entity);
        true
    }

    pub fn is_flagged_for_removal(&self, entity: EntityId) -> bool {
        self.removal_flags.contains(&entity)
    }

    pub fn entity_exists(&self, entity: EntityId) -> bool {
        self.entity_types.contains_key(&entity)
    }

    /// Exists, has joined and is not about to be removed.
    pub fn is_live(&self, entity: EntityId) -> bool {
        self.components.transform.is_joined(entity) && !self.removal_flags.contains(&entity)
    }

    pub fn entity_type(&self, entity: EntityId) -> Option<EntityType> {
        self.entity_types.get(&entity).copied()
    }

    pub fn entity_ids(&self) -> Vec<EntityId> {
        let mut ids = self.entity_types.keys().copied().collect::<Vec<_>>();
        ids.sort();
        ids
    }

    pub fn entity_count(&self) -> usize {
        self.entity_types.len()
    }

    pub(crate) fn forget_entity(&mut self, entity: EntityId) {
        self.entity_types.remove(&entity);
    }

    pub fn position_of(&self, entity: EntityId) -> Point {
        self.components.transform.get(entity).position()
    }

    pub fn try_position_of(&self, entity: EntityId) -> Option<Point> {
        self.components
            .transform
            .try_get(entity)
            .map(|transform| transform.position())
    }

    pub fn mark_dirty(&mut self, entity: EntityId) {
        self.pending_dirty.insert(entity);
    }

    /// Entities whose replicated state changed during the last completed tick.
    pub fn dirty_entities(&self) -> &BTreeSet<EntityId> {
        &self.dirty_entities
    }

    fn is_vision_candidate(entity_types: &HashMap<EntityId, EntityType>, viewer: EntityId, entity: EntityId) -> bool {
        entity != viewer
            && !entity_types
                .get(&entity)
                .is_some_and(|entity_type| entity_type.excluded_from_vision())
    }

    pub(crate) fn register_in_chunk(&mut self, entity: EntityId) {
        let position = self.position_of(entity);
        let coord = self.chunks.coord_at(position);
        let viewers = self.chunks.insert_entity(coord, entity);
        self.components.transform.get_mut(entity).chunk = Some(coord);
        for viewer in viewers {
            if !Self::is_vision_candidate(&self.entity_types, viewer, entity) {
                continue;
            }
            if let Some(helper) = self.components.ai_helper.try_get_mut(viewer) {
                helper.candidates.increment(entity);
            }
        }
    }

    pub(crate) fn unregister_from_chunk(&mut self, entity: EntityId) {
        let Some(coord) = self
            .components
            .transform
            .try_get_mut(entity)
            .and_then(|transform| transform.chunk.take())
        else {
            return;
        };
        let viewers = self.chunks.remove_entity(coord, entity);
        for viewer in viewers {
            if !Self::is_vision_candidate(&self.entity_types, viewer, entity) {
                continue;
            }
            if let Some(helper) = self.components.ai_helper.try_get_mut(viewer) {
                if helper.candidates.decrement(entity) {
                    helper.visible.retain(|visible| *visible != entity);
                }
            }
        }
    }

    /// Re-registers an entity whose representative point crossed a chunk border.
    pub(crate) fn update_chunk_membership(&mut self, entity: EntityId) {
        let transform = self.components.transform.get(entity);
        let Some(current) = transform.chunk() else {
            return;
        };
        if self.chunks.coord_at(transform.position()) == current {
            return;
        }
        self.unregister_from_chunk(entity);
        self.register_in_chunk(entity);
    }

    /// Moves a viewer's tracked chunks to `bounds`, updating its candidates.
    pub(crate) fn update_vision_bounds(&mut self, viewer: EntityId, bounds: Option<ChunkBounds>) {
        let old = self.components.ai_helper.get(viewer).vision_bounds;
        let diff = self.chunks.update_viewer(viewer, old, bounds);
        let entity_types = &self.entity_types;
        let helper = self.components.ai_helper.get_mut(viewer);
        helper
            .candidates
            .apply_diff(&diff, |entity| Self::is_vision_candidate(entity_types, viewer, entity));
        helper.vision_bounds = bounds;
        if bounds.is_none() {
            helper.candidates.clear();
            helper.visible.clear();
        } else {
            let candidates = &helper.candidates;
            helper.visible.retain(|entity| candidates.contains(*entity));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities;
    use crate::terrain::{Biome, TileType};

    fn test_world() -> World {
        World::new(
            SimConfig::default(),
            TerrainGrid::filled(32, 32, TileType::Grass, Biome::Grasslands),
        )
        .expect("world")
    }

    #[test]
    fn spawn_outside_world_is_rejected() {
        let mut world = test_world();
        let result = world.create_entity(entities::boulder(Point::new(-10.0, 5.0)), 0);
        assert!(matches!(result, Err(SimError::SpawnOutOfBounds { .. })));
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn destroy_is_deferred_to_end_of_tick() {
        let mut world = test_world();
        let id = world
            .create_entity(entities::boulder(Point::new(100.0, 100.0)), 0)
            .expect("spawn");
        world.tick();
        assert!(world.is_live(id));

        assert!(world.destroy_entity(id));
        assert!(world.destroy_entity(id));
        assert!(world.entity_exists(id));
        world.tick();
        assert!(!world.entity_exists(id));
        assert!(!world.components().transform.has(id));
        assert!(!world.destroy_entity(id));
    }

    #[test]
    fn ids_are_not_reused_after_removal() {
        let mut world = test_world();
        let first = world
            .create_entity(entities::boulder(Point::new(100.0, 100.0)), 0)
            .expect("spawn");
        world.destroy_entity(first);
        world.tick();
        let second = world
            .create_entity(entities::boulder(Point::new(100.0, 100.0)), 0)
            .expect("spawn");
        assert!(second > first);
    }

    #[test]
    fn join_delay_hides_entity_until_elapsed() {
        let mut world = test_world();
        let id = world
            .create_entity(entities::boulder(Point::new(300.0, 300.0)), 2)
            .expect("spawn");
        world.tick();
        world.tick();
        assert!(!world.is_live(id));
        assert!(world.components().transform.get(id).chunk().is_none());
        world.tick();
        assert!(world.is_live(id));
        assert!(world.components().transform.get(id).chunk().is_some());
    }
}
