use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ai::{move_toward_point, nearest_entity, AiType};
use crate::collision::HitboxCollision;
use crate::component::ComponentSystem;
use crate::components::ai_helper::{begin_ai_tick, clear_wander, run_wander};
use crate::components::health;
use crate::entities;
use crate::entity::EntityId;
use crate::error::SimError;
use crate::events::SimEvent;
use crate::snapshot::PacketWriter;
use crate::world::World;

/// Seconds two slimes must touch before merging.
pub const SLIME_MERGE_TIME_SECONDS: f32 = 1.0;
pub const SLIME_ANGER_SECONDS: f32 = 8.0;
/// Anger handed to nearby slimes relative to the hit slime's.
pub const SLIME_ANGER_PROPAGATION: f32 = 0.5;
pub const SLIME_CONTACT_COOLDOWN_SECONDS: f32 = 1.0;
pub const SLIME_TURN_SPEED: f32 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlimeSize {
    Small,
    Medium,
    Large,
}

impl SlimeSize {
    pub fn merge_weight(self) -> u32 {
        match self {
            Self::Small => 2,
            Self::Medium => 5,
            Self::Large => 11,
        }
    }

    /// Size whose threshold a combined merge weight reaches.
    pub fn for_merge_weight(weight: u32) -> Self {
        if weight >= 10 {
            Self::Large
        } else if weight >= 4 {
            Self::Medium
        } else {
            Self::Small
        }
    }

    pub fn radius(self) -> f32 {
        match self {
            Self::Small => 32.0,
            Self::Medium => 44.0,
            Self::Large => 60.0,
        }
    }

    pub fn max_health(self) -> f32 {
        match self {
            Self::Small => 10.0,
            Self::Medium => 15.0,
            Self::Large => 25.0,
        }
    }

    pub fn vision_range(self) -> f32 {
        match self {
            Self::Small => 200.0,
            Self::Medium => 250.0,
            Self::Large => 300.0,
        }
    }

    pub fn acceleration(self) -> f32 {
        match self {
            Self::Small => 150.0,
            Self::Medium => 120.0,
            Self::Large => 90.0,
        }
    }

    pub fn contact_damage(self) -> f32 {
        match self {
            Self::Small => 1.0,
            Self::Medium => 2.0,
            Self::Large => 3.0,
        }
    }

    pub fn packet_index(self) -> f32 {
        match self {
            Self::Small => 0.0,
            Self::Medium => 1.0,
            Self::Large => 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngerEntry {
    pub amount: f32,
    pub remaining_ticks: u32,
    /// Slime that was originally attacked.
    pub source: EntityId,
}

/// Unbroken touching streak with one partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MergeContact {
    ticks: u32,
    last_tick: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlimeComponent {
    pub size: SlimeSize,
    /// Sizes of every slime merged or absorbed into this one.
    pub orbs: Vec<SlimeSize>,
    pub merge_weight: u32,
    merge_contacts: BTreeMap<EntityId, MergeContact>,
    anger: BTreeMap<EntityId, AngerEntry>,
    contact_cooldowns: BTreeMap<EntityId, u32>,
}

impl SlimeComponent {
    pub fn new(size: SlimeSize) -> Self {
        Self::with_state(size, Vec::new(), size.merge_weight())
    }

    pub fn with_state(size: SlimeSize, orbs: Vec<SlimeSize>, merge_weight: u32) -> Self {
        Self {
            size,
            orbs,
            merge_weight,
            merge_contacts: BTreeMap::new(),
            anger: BTreeMap::new(),
            contact_cooldowns: BTreeMap::new(),
        }
    }

    pub fn anger_toward(&self, target: EntityId) -> Option<&AngerEntry> {
        self.anger.get(&target)
    }

    pub fn is_angry(&self) -> bool {
        !self.anger.is_empty()
    }

    pub fn merge_contact_ticks(&self, partner: EntityId) -> u32 {
        self.merge_contacts.get(&partner).map_or(0, |contact| contact.ticks)
    }
}

pub struct SlimeSystem;

impl ComponentSystem for SlimeSystem {
    fn on_tick(&self, world: &mut World, entity: EntityId) -> Result<(), SimError> {
        begin_ai_tick(world, entity)?;
        let tick = world.tick_count();
        let slime = world.components.slime.get_mut(entity);
        // Streaks not continued last tick are broken.
        slime
            .merge_contacts
            .retain(|_, contact| contact.last_tick.saturating_add(1) >= tick);
        slime.anger.retain(|_, entry| {
            entry.remaining_ticks = entry.remaining_ticks.saturating_sub(1);
            entry.remaining_ticks > 0
        });
        slime.contact_cooldowns.retain(|_, ticks| {
            *ticks = ticks.saturating_sub(1);
            *ticks > 0
        });
        let acceleration = slime.size.acceleration();

        if let Some(target) = angry_target(world, entity) {
            let target_position = world.position_of(target);
            move_toward_point(world, entity, target_position, acceleration, SLIME_TURN_SPEED);
            clear_wander(world, entity);
            world.components.ai_helper.get_mut(entity).current_ai = Some(AiType::Chase);
            return Ok(());
        }

        if let Some(partner) = merge_target(world, entity) {
            let partner_position = world.position_of(partner);
            move_toward_point(world, entity, partner_position, acceleration, SLIME_TURN_SPEED);
            clear_wander(world, entity);
            world.components.ai_helper.get_mut(entity).current_ai = Some(AiType::Merge);
            return Ok(());
        }

        run_wander(world, entity);
        Ok(())
    }

    fn on_hitbox_collision(&self, world: &mut World, collision: &HitboxCollision) {
        let (entity, other) = (collision.entity, collision.other);
        if world.components.slime.has(other) {
            // The lower id owns the shared merge timer.
            if entity < other {
                register_merge_contact(world, entity, other);
            }
            return;
        }

        let slime = world.components.slime.get(entity);
        if !slime.anger.contains_key(&other) || slime.contact_cooldowns.contains_key(&other) {
            return;
        }
        if !world.components.health.has(other) {
            return;
        }
        let damage = slime.size.contact_damage();
        let cooldown = world.config().seconds_to_ticks(SLIME_CONTACT_COOLDOWN_SECONDS);
        world
            .components
            .slime
            .get_mut(entity)
            .contact_cooldowns
            .insert(other, cooldown);
        health::damage_entity(world, other, Some(entity), damage);
    }

    fn on_remove(&self, world: &mut World, entity: EntityId) {
        for partner in world.components.slime.entity_ids() {
            if let Some(slime) = world.components.slime.try_get_mut(partner) {
                slime.merge_contacts.remove(&entity);
            }
        }
    }

    fn packet_length(&self, world: &World, entity: EntityId) -> usize {
        4 + world.components().slime.get(entity).orbs.len()
    }

    fn add_to_packet(&self, world: &World, entity: EntityId, packet: &mut PacketWriter) {
        let slime = world.components().slime.get(entity);
        packet.write_f32(slime.size.packet_index());
        packet.write_f32(if slime.is_angry() { 1.0 } else { 0.0 });
        packet.write_f32(slime.merge_weight as f32);
        packet.write_f32(slime.orbs.len() as f32);
        for orb in &slime.orbs {
            packet.write_f32(orb.packet_index());
        }
    }
}

/// Strongest grudge among visible targets; ties go to the lower id.
fn angry_target(world: &World, entity: EntityId) -> Option<EntityId> {
    let slime = world.components.slime.get(entity);
    let helper = world.components.ai_helper.try_get(entity)?;
    let mut best: Option<(f32, EntityId)> = None;
    for (target, entry) in &slime.anger {
        if !helper.can_see(*target) || !world.is_live(*target) {
            continue;
        }
        if best.map_or(true, |(amount, _)| entry.amount > amount) {
            best = Some((entry.amount, *target));
        }
    }
    best.map(|(_, target)| target)
}

fn can_merge(world: &World, first: EntityId, second: EntityId) -> bool {
    if first == second || !world.is_live(first) || !world.is_live(second) {
        return false;
    }
    let (Some(a), Some(b)) = (
        world.components.slime.try_get(first),
        world.components.slime.try_get(second),
    ) else {
        return false;
    };
    a.size != SlimeSize::Large && b.size != SlimeSize::Large && !a.is_angry() && !b.is_angry()
}

fn merge_target(world: &World, entity: EntityId) -> Option<EntityId> {
    let helper = world.components.ai_helper.try_get(entity)?;
    let partners = helper
        .visible_entities()
        .iter()
        .copied()
        .filter(|other| can_merge(world, entity, *other))
        .collect::<Vec<_>>();
    nearest_entity(world, entity, partners)
}

fn register_merge_contact(world: &mut World, first: EntityId, second: EntityId) {
    if !can_merge(world, first, second) {
        return;
    }
    let tick = world.tick_count();
    let required = world.config().seconds_to_ticks(SLIME_MERGE_TIME_SECONDS);
    let slime = world.components.slime.get_mut(first);
    let contact = slime.merge_contacts.entry(second).or_insert(MergeContact {
        ticks: 0,
        last_tick: tick,
    });
    if contact.ticks > 0 && contact.last_tick == tick {
        return;
    }
    if contact.last_tick.saturating_add(1) < tick {
        contact.ticks = 0;
    }
    contact.last_tick = tick;
    contact.ticks += 1;
    if contact.ticks < required {
        return;
    }
    if let Err(error) = merge_slimes(world, first, second) {
        warn!(first = first.0, second = second.0, error = %error, "slime_merge_failed");
    }
}

/// Combines two slimes. Reaching the next size threshold replaces both with a
/// new slime at their midpoint; otherwise the heavier one absorbs the other.
pub fn merge_slimes(world: &mut World, first: EntityId, second: EntityId) -> Result<(), SimError> {
    let a = world.components.slime.get(first).clone();
    let b = world.components.slime.get(second).clone();
    let combined_weight = a.merge_weight + b.merge_weight;
    let merged_size = SlimeSize::for_merge_weight(combined_weight);

    if merged_size > a.size.max(b.size) {
        let midpoint = world.position_of(first).midpoint(world.position_of(second));
        let mut orbs = a.orbs;
        orbs.extend(b.orbs);
        orbs.push(a.size);
        orbs.push(b.size);
        let result = world.create_entity(
            entities::slime_with_state(midpoint, merged_size, orbs, combined_weight),
            0,
        )?;
        world.destroy_entity(first);
        world.destroy_entity(second);
        world.emit(SimEvent::SlimesMerged {
            first,
            second,
            result,
        });
        debug!(
            first = first.0,
            second = second.0,
            result = result.0,
            merge_weight = combined_weight,
            "slimes_merged"
        );
        return Ok(());
    }

    let (absorber, absorbed, absorbed_state) = if b.merge_weight > a.merge_weight {
        (second, first, a)
    } else {
        (first, second, b)
    };
    let slime = world.components.slime.get_mut(absorber);
    slime.merge_weight = combined_weight;
    slime.orbs.extend(absorbed_state.orbs);
    slime.orbs.push(absorbed_state.size);
    slime.merge_contacts.remove(&absorbed);
    world.destroy_entity(absorbed);
    world.mark_dirty(absorber);
    world.emit(SimEvent::SlimeAbsorbed { absorber, absorbed });
    debug!(absorber = absorber.0, absorbed = absorbed.0, "slime_absorbed");
    Ok(())
}

fn add_anger(world: &mut World, slime: EntityId, target: EntityId, amount: f32, source: EntityId) {
    let duration = world.config().seconds_to_ticks(SLIME_ANGER_SECONDS);
    let Some(state) = world.components.slime.try_get_mut(slime) else {
        return;
    };
    match state.anger.get_mut(&target) {
        Some(entry) => {
            if source == slime {
                entry.amount += amount;
            }
            entry.remaining_ticks = duration;
        }
        None => {
            state.anger.insert(
                target,
                AngerEntry {
                    amount,
                    remaining_ticks: duration,
                    source,
                },
            );
        }
    }
    world.mark_dirty(slime);
}

/// Hit slimes grow angry at the attacker and spread that anger to every
/// slime they can see, in ascending id order. An existing grudge keeps its
/// original source.
pub fn on_damaged(world: &mut World, slime: EntityId, attacker: EntityId) {
    if world.components.slime.has(attacker) || !world.entity_exists(attacker) {
        return;
    }
    add_anger(world, slime, attacker, 1.0, slime);

    let neighbours = world
        .components
        .ai_helper
        .try_get(slime)
        .map(|helper| helper.visible_entities().to_vec())
        .unwrap_or_default();
    for neighbour in neighbours {
        if neighbour == slime || !world.components.slime.has(neighbour) || !world.is_live(neighbour) {
            continue;
        }
        add_anger(world, neighbour, attacker, SLIME_ANGER_PROPAGATION, slime);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::math::Point;
    use crate::terrain::{Biome, TerrainGrid, TileType};

    fn test_world() -> World {
        World::new(
            SimConfig::default(),
            TerrainGrid::filled(32, 32, TileType::Grass, Biome::Swamp),
        )
        .expect("world")
    }

    #[test]
    fn merge_weight_thresholds() {
        assert_eq!(SlimeSize::for_merge_weight(2), SlimeSize::Small);
        assert_eq!(SlimeSize::for_merge_weight(4), SlimeSize::Medium);
        assert_eq!(SlimeSize::for_merge_weight(9), SlimeSize::Medium);
        assert_eq!(SlimeSize::for_merge_weight(10), SlimeSize::Large);
    }

    #[test]
    fn anger_spreads_in_id_order_and_keeps_first_source() {
        let mut world = test_world();
        let first = world
            .create_entity(entities::slime(Point::new(600.0, 600.0), SlimeSize::Small), 0)
            .expect("first");
        let second = world
            .create_entity(entities::slime(Point::new(700.0, 600.0), SlimeSize::Small), 0)
            .expect("second");
        let third = world
            .create_entity(entities::slime(Point::new(650.0, 690.0), SlimeSize::Small), 0)
            .expect("third");
        let player = world
            .create_entity(entities::player(Point::new(650.0, 400.0), "p"), 0)
            .expect("player");
        world.tick();

        health::damage_entity(&mut world, first, Some(player), 1.0);
        health::damage_entity(&mut world, second, Some(player), 1.0);

        let slimes = &world.components().slime;
        let entry = |slime: EntityId| *slimes.get(slime).anger_toward(player).expect("angry");
        assert_eq!(entry(first).source, first);
        assert_eq!(entry(second).source, first);
        assert_eq!(entry(third).source, first);
        assert!(entry(first).amount > entry(third).amount);
    }

    #[test]
    fn medium_absorbs_small_without_growing() {
        let mut world = test_world();
        let medium = world
            .create_entity(entities::slime(Point::new(600.0, 600.0), SlimeSize::Medium), 0)
            .expect("medium");
        let small = world
            .create_entity(entities::slime(Point::new(900.0, 900.0), SlimeSize::Small), 0)
            .expect("small");
        world.tick();

        merge_slimes(&mut world, small, medium).expect("merge");
        world.tick();

        assert!(!world.entity_exists(small));
        let slime = world.components().slime.get(medium);
        assert_eq!(slime.size, SlimeSize::Medium);
        assert_eq!(slime.merge_weight, 7);
        assert_eq!(slime.orbs, vec![SlimeSize::Small]);
    }

    #[test]
    fn broken_contact_restarts_the_merge_timer() {
        let mut world = test_world();
        let first = world
            .create_entity(entities::slime(Point::new(400.0, 400.0), SlimeSize::Small), 0)
            .expect("first");
        let second = world
            .create_entity(entities::slime(Point::new(1600.0, 1600.0), SlimeSize::Small), 0)
            .expect("second");
        world.tick();

        for _ in 0..10 {
            register_merge_contact(&mut world, first, second);
            world.tick();
        }
        assert_eq!(world.components().slime.get(first).merge_contact_ticks(second), 10);

        world.tick();
        world.tick();
        assert_eq!(world.components().slime.get(first).merge_contact_ticks(second), 0);

        register_merge_contact(&mut world, first, second);
        assert_eq!(world.components().slime.get(first).merge_contact_ticks(second), 1);

        world.destroy_entity(second);
        world.tick();
        assert_eq!(world.components().slime.get(first).merge_contact_ticks(second), 0);
        assert!(world.components().slime.get(first).merge_contacts.is_empty());
    }
}
