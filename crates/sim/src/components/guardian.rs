use std::f32::consts::TAU;

use rand::Rng;
use tracing::debug;

use crate::ai::guardian_attack::{AttackStage, AttackTick, GuardianAttackKind};
use crate::ai::{move_toward_point, nearest_entity, stop_moving, turn_toward_point, AiType};
use crate::component::ComponentSystem;
use crate::components::ai_helper::{self, run_wander};
use crate::components::guardian_projectile::ProjectileKind;
use crate::entities;
use crate::entity::EntityId;
use crate::error::SimError;
use crate::math::{smallest_positive_root, Point};
use crate::snapshot::PacketWriter;
use crate::world::World;

pub const GUARDIAN_ACCELERATION: f32 = 100.0;
pub const GUARDIAN_TURN_SPEED: f32 = 1.5;
/// Targets further than this from home are abandoned.
pub const GUARDIAN_LEASH_RANGE: f32 = 640.0;
pub const GUARDIAN_HOME_RADIUS: f32 = 160.0;
pub const GUARDIAN_ATTACK_RANGE: f32 = 360.0;
pub const GUARDIAN_ATTACK_COOLDOWN_SECONDS: f32 = 3.0;
pub const GUARDIAN_MAX_SPIKY_BALLS: usize = 3;
pub const SHOCKWAVE_COUNT: u32 = 6;
pub const SHOCKWAVE_SPEED: f32 = 300.0;
pub const GEM_FRAGMENT_SPEED: f32 = 520.0;
/// Random spread applied to gem fragment aim, in radians.
pub const GEM_FRAGMENT_SPREAD: f32 = 0.08;

#[derive(Debug, Clone, PartialEq)]
pub struct GuardianComponent {
    pub home: Point,
    pub target: Option<EntityId>,
    pub limb_gems_active: bool,
    pub limb_hitboxes: [usize; 2],
    pub limb_rest_offsets: [Point; 2],
    attack_cooldown_ticks: u32,
    next_attack: usize,
}

impl GuardianComponent {
    pub fn new(home: Point, limb_hitboxes: [usize; 2], limb_rest_offsets: [Point; 2]) -> Self {
        Self {
            home,
            target: None,
            limb_gems_active: false,
            limb_hitboxes,
            limb_rest_offsets,
            attack_cooldown_ticks: 0,
            next_attack: 0,
        }
    }

    pub fn attack_cooldown_ticks(&self) -> u32 {
        self.attack_cooldown_ticks
    }
}

/// Limb offsets at the peak of each attack, in the body's frame.
fn attack_pose(kind: GuardianAttackKind) -> [Point; 2] {
    match kind {
        GuardianAttackKind::CrystalSlam => [Point::new(-40.0, 90.0), Point::new(40.0, 90.0)],
        GuardianAttackKind::CrystalBurst => [Point::new(-30.0, 100.0), Point::new(30.0, 100.0)],
        GuardianAttackKind::SpikyBallSummon => [Point::new(-110.0, 0.0), Point::new(110.0, 0.0)],
    }
}

pub struct GuardianSystem;

impl ComponentSystem for GuardianSystem {
    fn on_tick(&self, world: &mut World, entity: EntityId) -> Result<(), SimError> {
        ai_helper::begin_ai_tick(world, entity)?;
        let guardian = world.components.guardian.get_mut(entity);
        guardian.attack_cooldown_ticks = guardian.attack_cooldown_ticks.saturating_sub(1);

        if let Some(kind) = world.components.ai_helper.get(entity).active_special() {
            run_special_attack(world, entity, kind);
            return Ok(());
        }

        let target = select_target(world, entity);
        world.components.guardian.get_mut(entity).target = target;

        if let Some(target) = target {
            let target_position = world.position_of(target);
            let distance = world.position_of(entity).distance_to(target_position);
            if distance <= GUARDIAN_ATTACK_RANGE && world.components.guardian.get(entity).attack_cooldown_ticks == 0 {
                let kind = next_attack_kind(world, entity);
                stop_moving(world, entity);
                turn_toward_point(world, entity, target_position, GUARDIAN_TURN_SPEED);
                if ai_helper::start_special_attack(world, entity, kind) {
                    return Ok(());
                }
            }
            if distance > GUARDIAN_ATTACK_RANGE * 0.5 {
                move_toward_point(world, entity, target_position, GUARDIAN_ACCELERATION, GUARDIAN_TURN_SPEED);
            } else {
                turn_toward_point(world, entity, target_position, GUARDIAN_TURN_SPEED);
            }
            world.components.ai_helper.get_mut(entity).current_ai = Some(AiType::Chase);
            return Ok(());
        }

        let home = world.components.guardian.get(entity).home;
        if world.position_of(entity).distance_to(home) > GUARDIAN_HOME_RADIUS {
            ai_helper::clear_wander(world, entity);
            move_toward_point(world, entity, home, GUARDIAN_ACCELERATION, GUARDIAN_TURN_SPEED);
            world.components.ai_helper.get_mut(entity).current_ai = Some(AiType::ReturnHome);
            return Ok(());
        }
        run_wander(world, entity);
        Ok(())
    }

    /// A guardian removed mid-attack still closes out its attack.
    fn pre_remove(&self, world: &mut World, entity: EntityId) {
        if world.components.ai_helper.has(entity) {
            ai_helper::stop_special_attack(world, entity);
        }
    }

    fn packet_length(&self, _world: &World, _entity: EntityId) -> usize {
        8
    }

    fn add_to_packet(&self, world: &World, entity: EntityId, packet: &mut PacketWriter) {
        let guardian = world.components().guardian.get(entity);
        let transform = world.components().transform.get(entity);
        packet.write_point(guardian.home);
        packet.write_f32(guardian.target.map_or(-1.0, |target| target.0 as f32));
        packet.write_f32(if guardian.limb_gems_active { 1.0 } else { 0.0 });
        for limb in guardian.limb_hitboxes {
            let offset = transform
                .hitbox(limb)
                .map_or(Point::ZERO, |hitbox| hitbox.offset);
            packet.write_point(offset);
        }
    }
}

/// Keeps a still-valid target, otherwise picks the nearest visible player
/// inside the leash.
fn select_target(world: &World, entity: EntityId) -> Option<EntityId> {
    let guardian = world.components.guardian.get(entity);
    let helper = world.components.ai_helper.get(entity);
    let home = guardian.home;
    let in_leash = |candidate: EntityId| {
        world.is_live(candidate)
            && helper.can_see(candidate)
            && world.position_of(candidate).distance_to(home) <= GUARDIAN_LEASH_RANGE
    };
    if let Some(target) = guardian.target.filter(|target| in_leash(*target)) {
        return Some(target);
    }
    let players = helper
        .visible_entities()
        .iter()
        .copied()
        .filter(|candidate| world.components.player.has(*candidate))
        .filter(|candidate| in_leash(*candidate))
        .collect::<Vec<_>>();
    nearest_entity(world, entity, players)
}

fn spiky_ball_count(world: &World, owner: EntityId) -> usize {
    world
        .components
        .guardian_spiky_ball
        .entity_ids()
        .into_iter()
        .filter(|ball| !world.is_flagged_for_removal(*ball))
        .filter(|ball| world.components.guardian_spiky_ball.get(*ball).owner == owner)
        .count()
}

/// Cycles through the attacks, skipping the summon while the ball limit is reached.
fn next_attack_kind(world: &mut World, entity: EntityId) -> GuardianAttackKind {
    let at_ball_limit = spiky_ball_count(world, entity) >= GUARDIAN_MAX_SPIKY_BALLS;
    let guardian = world.components.guardian.get_mut(entity);
    loop {
        let kind = GuardianAttackKind::ALL[guardian.next_attack % GuardianAttackKind::ALL.len()];
        guardian.next_attack = guardian.next_attack.wrapping_add(1);
        if kind != GuardianAttackKind::SpikyBallSummon || !at_ball_limit {
            return kind;
        }
    }
}

fn run_special_attack(world: &mut World, entity: EntityId, kind: GuardianAttackKind) {
    let outcome = world
        .components
        .ai_helper
        .get_mut(entity)
        .special_attack_mut(kind)
        .map(|attack| attack.advance());
    let Some(outcome) = outcome else {
        ai_helper::stop_special_attack(world, entity);
        return;
    };

    apply_limb_pose(world, entity, kind, &outcome);
    set_limb_gems(world, entity, !outcome.finished && outcome.stage != AttackStage::Return);
    for _ in 0..outcome.spawns {
        spawn_attack_hazard(world, entity, kind);
    }

    if outcome.finished {
        ai_helper::stop_special_attack(world, entity);
        let cooldown = world.config().seconds_to_ticks(GUARDIAN_ATTACK_COOLDOWN_SECONDS);
        world.components.guardian.get_mut(entity).attack_cooldown_ticks = cooldown;
    }
}

fn apply_limb_pose(world: &mut World, entity: EntityId, kind: GuardianAttackKind, outcome: &AttackTick) {
    let guardian = world.components.guardian.get(entity);
    let rest = guardian.limb_rest_offsets;
    let limbs = guardian.limb_hitboxes;
    let pose = attack_pose(kind);
    let transform = world.components.transform.get_mut(entity);
    for side in 0..2 {
        let offset = if outcome.finished {
            rest[side]
        } else {
            match outcome.stage {
                AttackStage::Windup => rest[side].lerp(pose[side], outcome.progress),
                AttackStage::Active => pose[side],
                AttackStage::Return => pose[side].lerp(rest[side], outcome.progress),
            }
        };
        transform.set_hitbox_offset(limbs[side], offset);
    }
    transform.update_poses();
}

fn set_limb_gems(world: &mut World, entity: EntityId, active: bool) {
    let guardian = world.components.guardian.get_mut(entity);
    if guardian.limb_gems_active == active {
        return;
    }
    guardian.limb_gems_active = active;
    world.mark_dirty(entity);
    debug!(entity = entity.0, active, "guardian_limb_gems_changed");
}

/// Aim point for a projectile of `speed` fired from `origin` at a target
/// moving with constant velocity. Approximate: projectile drag is ignored.
pub fn predict_intercept(origin: Point, target: Point, target_velocity: Point, speed: f32) -> Option<Point> {
    let offset = target - origin;
    let a = target_velocity.length_squared() - speed * speed;
    let b = 2.0 * offset.dot(target_velocity);
    let c = offset.length_squared();
    let time = smallest_positive_root(a, b, c)?;
    Some(target + target_velocity * time)
}

fn spawn_attack_hazard(world: &mut World, entity: EntityId, kind: GuardianAttackKind) {
    let config = *world.config();
    let transform = world.components.transform.get(entity);
    let body = transform.position();
    let facing = transform.rotation();
    let limbs = world.components.guardian.get(entity).limb_hitboxes;

    let spawned = match kind {
        GuardianAttackKind::CrystalSlam => {
            let origin = body + Point::from_polar(90.0, facing);
            let mut results = Vec::new();
            for index in 0..SHOCKWAVE_COUNT {
                let angle = facing + index as f32 * TAU / SHOCKWAVE_COUNT as f32;
                let bundle = entities::guardian_projectile(
                    origin + Point::from_polar(24.0, angle),
                    entity,
                    ProjectileKind::Shockwave,
                    Point::from_polar(SHOCKWAVE_SPEED, angle),
                    &config,
                );
                results.push(world.create_entity(bundle, 0));
            }
            results
        }
        GuardianAttackKind::CrystalBurst => {
            let limb = limbs[(world.tick_count() % 2) as usize];
            let origin = transform.hitbox(limb).map_or(body, |hitbox| hitbox.position);
            let aim = match world.components.guardian.get(entity).target {
                Some(target) if world.is_live(target) => {
                    let target_transform = world.components.transform.get(target);
                    predict_intercept(
                        origin,
                        target_transform.position(),
                        target_transform.velocity(),
                        GEM_FRAGMENT_SPEED,
                    )
                    .unwrap_or_else(|| target_transform.position())
                }
                _ => origin + Point::from_polar(1.0, facing),
            };
            let spread = world.rng().gen_range(-GEM_FRAGMENT_SPREAD..=GEM_FRAGMENT_SPREAD);
            let angle = origin.angle_to(aim) + spread;
            let bundle = entities::guardian_projectile(
                origin,
                entity,
                ProjectileKind::GemFragment,
                Point::from_polar(GEM_FRAGMENT_SPEED, angle),
                &config,
            );
            vec![world.create_entity(bundle, 0)]
        }
        GuardianAttackKind::SpikyBallSummon => {
            if spiky_ball_count(world, entity) >= GUARDIAN_MAX_SPIKY_BALLS {
                return;
            }
            let angle = facing + world.rng().gen_range(-1.0f32..=1.0);
            let bundle = entities::guardian_spiky_ball(body + Point::from_polar(130.0, angle), entity, &config);
            vec![world.create_entity(bundle, 0)]
        }
    };

    for result in spawned {
        match result {
            Ok(hazard) => debug!(guardian = entity.0, hazard = hazard.0, attack = kind.as_str(), "guardian_hazard_spawned"),
            Err(error) => debug!(guardian = entity.0, error = %error, "guardian_hazard_skipped"),
        }
    }
}

/// Guardians turn on players that hit them.
pub fn on_damaged(world: &mut World, guardian: EntityId, attacker: EntityId) {
    if !world.components.player.has(attacker) {
        return;
    }
    let state = world.components.guardian.get_mut(guardian);
    if state.target.is_none() {
        state.target = Some(attacker);
    }
}
