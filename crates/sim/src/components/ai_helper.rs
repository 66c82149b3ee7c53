use tracing::debug;

use crate::ai::escape::EscapeAi;
use crate::ai::follow::FollowAi;
use crate::ai::guardian_attack::{GuardianAttackAi, GuardianAttackKind};
use crate::ai::herd::HerdAi;
use crate::ai::wander::WanderAi;
use crate::ai::AiType;
use crate::component::{ComponentKind, ComponentSystem};
use crate::config::SimConfig;
use crate::entity::EntityId;
use crate::error::SimError;
use crate::events::SimEvent;
use crate::math::Point;
use crate::snapshot::PacketWriter;
use crate::spatial::{ChunkBounds, VisionCandidates};
use crate::world::World;

/// Perception and behavior dispatch for an AI-driven entity.
#[derive(Debug, Clone, PartialEq)]
pub struct AiHelperComponent {
    pub vision_range: f32,
    pub(crate) vision_bounds: Option<ChunkBounds>,
    /// Tick of the last interval bounds check.
    pub(crate) bounds_checked_at: Option<u64>,
    /// Entities in the tracked chunks, with the number of chunks they appear in.
    pub(crate) candidates: VisionCandidates,
    /// Sorted subset of the candidates passing the precise range test.
    pub(crate) visible: Vec<EntityId>,
    pub wander: Option<WanderAi>,
    pub follow: Option<FollowAi>,
    pub escape: Option<EscapeAi>,
    pub herd: Option<HerdAi>,
    pub special_attacks: Vec<GuardianAttackAi>,
    pub(crate) active_special: Option<GuardianAttackKind>,
    pub current_ai: Option<AiType>,
}

impl AiHelperComponent {
    pub fn new(vision_range: f32) -> Self {
        Self {
            vision_range,
            vision_bounds: None,
            bounds_checked_at: None,
            candidates: VisionCandidates::default(),
            visible: Vec::new(),
            wander: None,
            follow: None,
            escape: None,
            herd: None,
            special_attacks: Vec::new(),
            active_special: None,
            current_ai: None,
        }
    }

    pub fn with_wander(mut self, wander: WanderAi) -> Self {
        self.wander = Some(wander);
        self
    }

    pub fn with_follow(mut self, follow: FollowAi) -> Self {
        self.follow = Some(follow);
        self
    }

    pub fn with_escape(mut self, escape: EscapeAi) -> Self {
        self.escape = Some(escape);
        self
    }

    pub fn with_herd(mut self, herd: HerdAi) -> Self {
        self.herd = Some(herd);
        self
    }

    pub fn with_special_attack(mut self, attack: GuardianAttackAi) -> Self {
        self.special_attacks.push(attack);
        self
    }

    pub fn visible_entities(&self) -> &[EntityId] {
        &self.visible
    }

    pub fn potential_visible_entities(&self) -> &VisionCandidates {
        &self.candidates
    }

    pub fn vision_bounds(&self) -> Option<ChunkBounds> {
        self.vision_bounds
    }

    pub fn can_see(&self, entity: EntityId) -> bool {
        self.visible.binary_search(&entity).is_ok()
    }

    pub fn active_special(&self) -> Option<GuardianAttackKind> {
        self.active_special
    }

    pub fn special_attack(&self, kind: GuardianAttackKind) -> Option<&GuardianAttackAi> {
        self.special_attacks.iter().find(|attack| attack.kind == kind)
    }

    pub(crate) fn special_attack_mut(&mut self, kind: GuardianAttackKind) -> Option<&mut GuardianAttackAi> {
        self.special_attacks.iter_mut().find(|attack| attack.kind == kind)
    }
}

pub struct AiHelperSystem;

impl ComponentSystem for AiHelperSystem {
    /// Chunk bounds are only rechecked on the configured interval. The precise
    /// visible set is refreshed every tick by the owning behavior component
    /// through [`begin_ai_tick`].
    fn tick_interval(&self, config: &SimConfig) -> u32 {
        config.vision_bounds_interval_ticks
    }

    fn on_join(&self, world: &mut World, entity: EntityId) {
        refresh_vision_bounds(world, entity);
        refresh_visible(world, entity);
    }

    fn on_tick(&self, world: &mut World, entity: EntityId) -> Result<(), SimError> {
        refresh_vision_bounds(world, entity);
        let tick = world.tick_count();
        world.components.ai_helper.get_mut(entity).bounds_checked_at = Some(tick);
        Ok(())
    }

    fn on_remove(&self, world: &mut World, entity: EntityId) {
        world.update_vision_bounds(entity, None);
    }

    fn packet_length(&self, _world: &World, _entity: EntityId) -> usize {
        4
    }

    fn add_to_packet(&self, world: &World, entity: EntityId, packet: &mut PacketWriter) {
        let helper = world.components().ai_helper.get(entity);
        packet.write_f32(helper.current_ai.map_or(-1.0, AiType::packet_index));
        let special = helper
            .active_special
            .and_then(|kind| helper.special_attack(kind));
        packet.write_f32(special.map_or(-1.0, |attack| attack.kind.packet_index()));
        packet.write_f32(special.map_or(-1.0, |attack| attack.stage().packet_index()));
        packet.write_f32(special.map_or(0.0, |attack| attack.progress_ticks() as f32));
    }
}

/// Recomputes the tracked chunk rectangle. Unchanged bounds leave the
/// candidate set alone.
pub fn refresh_vision_bounds(world: &mut World, entity: EntityId) {
    let range = world.components.ai_helper.get(entity).vision_range;
    let bounds = world.chunks.bounds_around(world.position_of(entity), range);
    if world.components.ai_helper.get(entity).vision_bounds == Some(bounds) {
        return;
    }
    world.update_vision_bounds(entity, Some(bounds));
}

/// Precise visibility: the entity's point is in range, or any of its hitboxes
/// touches the vision circle.
pub fn is_entity_visible(world: &World, origin: Point, range: f32, candidate: EntityId) -> bool {
    let Some(transform) = world.components.transform.try_get(candidate) else {
        return false;
    };
    if transform.position().distance_squared_to(origin) <= range * range {
        return true;
    }
    transform
        .hitboxes()
        .iter()
        .any(|hitbox| hitbox.placed().intersects_circle(origin, range))
}

/// First step of every behavior component's tick: refreshes the precise
/// visible set and returns a copy of it. An entity without a helper fails
/// its own update only.
pub fn begin_ai_tick(world: &mut World, entity: EntityId) -> Result<Vec<EntityId>, SimError> {
    if !world.components.ai_helper.has(entity) {
        return Err(SimError::MissingComponent {
            entity: entity.0,
            component: ComponentKind::AiHelper,
        });
    }
    refresh_visible(world, entity);
    Ok(world.components.ai_helper.get(entity).visible.clone())
}

pub fn refresh_visible(world: &mut World, entity: EntityId) {
    let origin = world.position_of(entity);
    let helper = world.components.ai_helper.get(entity);
    let range = helper.vision_range;
    let visible = helper
        .candidates
        .iter()
        .filter(|candidate| world.is_live(*candidate))
        .filter(|candidate| is_entity_visible(world, origin, range, *candidate))
        .collect::<Vec<_>>();
    world.components.ai_helper.get_mut(entity).visible = visible;
}

/// Runs the entity's wander behavior as its default AI. The state is taken
/// out of the helper for the duration of the call.
pub fn run_wander(world: &mut World, entity: EntityId) -> bool {
    let helper = world.components.ai_helper.get_mut(entity);
    let range = helper.vision_range;
    let Some(mut wander) = helper.wander.take() else {
        helper.current_ai = None;
        return false;
    };
    let moving = wander.tick(world, entity, range);
    let helper = world.components.ai_helper.get_mut(entity);
    helper.wander = Some(wander);
    helper.current_ai = moving.then_some(AiType::Wander);
    moving
}

pub fn clear_wander(world: &mut World, entity: EntityId) {
    if let Some(wander) = world.components.ai_helper.get_mut(entity).wander.as_mut() {
        wander.clear();
    }
}

/// Starts `kind` unless another special attack is already running.
pub fn start_special_attack(world: &mut World, entity: EntityId, kind: GuardianAttackKind) -> bool {
    let helper = world.components.ai_helper.get_mut(entity);
    if helper.active_special.is_some() {
        return false;
    }
    let Some(attack) = helper.special_attack_mut(kind) else {
        return false;
    };
    attack.start();
    helper.active_special = Some(kind);
    helper.current_ai = Some(AiType::GuardianSpecial);
    world.emit(SimEvent::SpecialAttackStarted {
        entity,
        attack: kind,
    });
    world.mark_dirty(entity);
    debug!(entity = entity.0, attack = kind.as_str(), "special_attack_started");
    true
}

/// Ends the running special attack and hands control back to default AI.
pub fn stop_special_attack(world: &mut World, entity: EntityId) {
    let helper = world.components.ai_helper.get_mut(entity);
    let Some(kind) = helper.active_special.take() else {
        return;
    };
    if let Some(attack) = helper.special_attack_mut(kind) {
        attack.stop();
    }
    helper.current_ai = None;
    world.emit(SimEvent::SpecialAttackFinished {
        entity,
        attack: kind,
    });
    world.mark_dirty(entity);
    debug!(entity = entity.0, attack = kind.as_str(), "special_attack_finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::entities;
    use crate::terrain::{Biome, TerrainGrid, TileType};

    fn test_world() -> World {
        World::new(
            SimConfig::default(),
            TerrainGrid::filled(32, 32, TileType::Grass, Biome::Grasslands),
        )
        .expect("world")
    }

    #[test]
    fn visible_is_subset_of_candidates() {
        let mut world = test_world();
        let viewer = world
            .create_entity(entities::krumblid(Point::new(1000.0, 1000.0)), 0)
            .expect("viewer");
        for offset in [100.0, 250.0, 400.0, 700.0] {
            world
                .create_entity(entities::player(Point::new(1000.0 + offset, 1000.0), "p"), 0)
                .expect("player");
        }
        for _ in 0..4 {
            world.tick();
            let helper = world.components().ai_helper.get(viewer);
            for entity in helper.visible_entities() {
                assert!(helper.potential_visible_entities().contains(*entity));
            }
        }
    }

    #[test]
    fn shrinking_range_never_adds_visible_entities() {
        let mut world = test_world();
        let config = *world.config();
        let origin = Point::new(1000.0, 1000.0);
        let mut candidates = Vec::new();
        for (index, offset) in [60.0, 180.0, 290.0, 410.0, 530.0].into_iter().enumerate() {
            let angle = index as f32 * 1.3;
            candidates.push(
                world
                    .create_entity(entities::cow(origin + Point::from_polar(offset, angle), &config), 0)
                    .expect("cow"),
            );
        }
        world.tick();

        let visible_at = |range: f32| -> Vec<EntityId> {
            candidates
                .iter()
                .copied()
                .filter(|candidate| is_entity_visible(&world, origin, range, *candidate))
                .collect()
        };
        let mut previous = visible_at(600.0);
        for range in [450.0, 300.0, 150.0, 20.0] {
            let current = visible_at(range);
            assert!(current.iter().all(|entity| previous.contains(entity)));
            previous = current;
        }
    }

    #[test]
    fn boulders_never_become_candidates() {
        let mut world = test_world();
        let viewer = world
            .create_entity(entities::krumblid(Point::new(500.0, 500.0)), 0)
            .expect("viewer");
        let boulder = world
            .create_entity(entities::boulder(Point::new(560.0, 500.0)), 0)
            .expect("boulder");
        world.tick();
        let helper = world.components().ai_helper.get(viewer);
        assert!(!helper.potential_visible_entities().contains(boulder));
        assert!(!helper.potential_visible_entities().contains(viewer));
    }

    #[test]
    fn removed_entities_leave_candidate_sets() {
        let mut world = test_world();
        let viewer = world
            .create_entity(entities::krumblid(Point::new(500.0, 500.0)), 0)
            .expect("viewer");
        let player = world
            .create_entity(entities::player(Point::new(600.0, 500.0), "p"), 0)
            .expect("player");
        world.tick();
        world.tick();
        assert!(world.components().ai_helper.get(viewer).can_see(player));

        world.destroy_entity(player);
        world.tick();
        let helper = world.components().ai_helper.get(viewer);
        assert!(!helper.potential_visible_entities().contains(player));
        assert!(!helper.can_see(player));
    }

    #[test]
    fn only_one_special_attack_runs_at_a_time() {
        let mut world = test_world();
        let config = *world.config();
        let guardian = world
            .create_entity(entities::guardian(Point::new(800.0, 800.0), &config), 0)
            .expect("guardian");
        world.tick();
        assert!(start_special_attack(&mut world, guardian, GuardianAttackKind::CrystalSlam));
        assert!(!start_special_attack(&mut world, guardian, GuardianAttackKind::CrystalBurst));
        stop_special_attack(&mut world, guardian);
        let helper = world.components().ai_helper.get(guardian);
        assert_eq!(helper.active_special(), None);
        let slam = helper
            .special_attack(GuardianAttackKind::CrystalSlam)
            .expect("slam");
        assert_eq!(slam.progress_ticks(), 0);
        assert!(!slam.is_running());
    }
}
