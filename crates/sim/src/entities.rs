//! Component bundles for every entity type the simulation spawns.

use std::f32::consts::PI;

use crate::ai::escape::EscapeAi;
use crate::ai::follow::FollowAi;
use crate::ai::guardian_attack::{GuardianAttackAi, GuardianAttackKind};
use crate::ai::herd::HerdAi;
use crate::ai::wander::{WanderAi, WanderPositionRule};
use crate::components::ai_helper::AiHelperComponent;
use crate::components::cow::{CowComponent, CowSpecies};
use crate::components::guardian::GuardianComponent;
use crate::components::guardian_projectile::{GuardianProjectileComponent, ProjectileKind};
use crate::components::guardian_spiky_ball::{GuardianSpikyBallComponent, SPIKY_BALL_LIFETIME_SECONDS};
use crate::components::health::HealthComponent;
use crate::components::krumblid::KrumblidComponent;
use crate::components::player::PlayerComponent;
use crate::components::serpent::SerpentComponent;
use crate::components::slime::{SlimeComponent, SlimeSize};
use crate::config::SimConfig;
use crate::entity::{EntityId, EntityType};
use crate::hitbox::{HitboxDef, HitboxFlag, COLLISION_BIT_DEFAULT, COLLISION_BIT_HAZARD, COLLISION_BIT_WALL};
use crate::math::Point;
use crate::terrain::Biome;
use crate::tether::{AngularTether, Tether};
use crate::transform::TransformComponent;

pub const PLAYER_RADIUS: f32 = 24.0;
pub const PLAYER_MAX_HEALTH: f32 = 20.0;
pub const SERPENT_SEGMENT_SPACING: f32 = 40.0;
pub const GUARDIAN_LIMB_REST_OFFSETS: [Point; 2] = [Point::new(-80.0, 20.0), Point::new(80.0, 20.0)];

/// Everything needed to create one entity. Absent components stay `None`.
#[derive(Debug, Clone)]
pub struct EntityConfig {
    pub entity_type: EntityType,
    pub transform: TransformComponent,
    pub health: Option<HealthComponent>,
    pub player: Option<PlayerComponent>,
    pub ai_helper: Option<AiHelperComponent>,
    pub slime: Option<SlimeComponent>,
    pub cow: Option<CowComponent>,
    pub krumblid: Option<KrumblidComponent>,
    pub serpent: Option<SerpentComponent>,
    pub guardian: Option<GuardianComponent>,
    pub guardian_spiky_ball: Option<GuardianSpikyBallComponent>,
    pub guardian_projectile: Option<GuardianProjectileComponent>,
}

impl EntityConfig {
    pub fn new(entity_type: EntityType, transform: TransformComponent) -> Self {
        Self {
            entity_type,
            transform,
            health: None,
            player: None,
            ai_helper: None,
            slime: None,
            cow: None,
            krumblid: None,
            serpent: None,
            guardian: None,
            guardian_spiky_ball: None,
            guardian_projectile: None,
        }
    }
}

/// Static obstacle with no behavior.
pub fn boulder(position: Point) -> EntityConfig {
    let root = HitboxDef::circle(32.0).mass(50.0);
    EntityConfig::new(EntityType::Boulder, TransformComponent::new(position, 0.0, root))
}

pub fn player(position: Point, username: &str) -> EntityConfig {
    let root = HitboxDef::circle(PLAYER_RADIUS);
    let mut config = EntityConfig::new(EntityType::Player, TransformComponent::new(position, 0.0, root));
    config.health = Some(HealthComponent::new(PLAYER_MAX_HEALTH));
    config.player = Some(PlayerComponent::new(username));
    config
}

pub fn slime(position: Point, size: SlimeSize) -> EntityConfig {
    slime_with_state(position, size, Vec::new(), size.merge_weight())
}

/// Slime carrying the orbs and weight of earlier merges.
pub fn slime_with_state(
    position: Point,
    size: SlimeSize,
    orbs: Vec<SlimeSize>,
    merge_weight: u32,
) -> EntityConfig {
    let root = HitboxDef::circle(size.radius()).mass(merge_weight.max(1) as f32);
    let mut bundle = EntityConfig::new(EntityType::Slime, TransformComponent::new(position, 0.0, root));
    bundle.health = Some(HealthComponent::new(size.max_health()).healing_on_slime());
    bundle.ai_helper = Some(
        AiHelperComponent::new(size.vision_range()).with_wander(WanderAi::new(
            size.acceleration(),
            3.0,
            0.25,
            WanderPositionRule::Land,
        )),
    );
    bundle.slime = Some(SlimeComponent::with_state(size, orbs, merge_weight));
    bundle
}

pub fn cow(position: Point, config: &SimConfig) -> EntityConfig {
    cow_of_species(position, CowSpecies::Brown, config)
}

pub fn cow_of_species(position: Point, species: CowSpecies, config: &SimConfig) -> EntityConfig {
    let root = HitboxDef::circle(28.0).mass(3.0);
    let mut bundle = EntityConfig::new(EntityType::Cow, TransformComponent::new(position, 0.0, root));
    bundle.health = Some(HealthComponent::new(10.0));
    bundle.ai_helper = Some(
        AiHelperComponent::new(320.0)
            .with_wander(WanderAi::new(80.0, 3.0, 0.3, WanderPositionRule::Land))
            .with_follow(FollowAi::new(
                90.0,
                3.0,
                120.0,
                config.seconds_to_ticks(10.0),
                config.seconds_to_ticks(8.0),
            ))
            .with_escape(EscapeAi::new(180.0, 5.0))
            .with_herd(HerdAi::new(60.0, 3.0, 90.0)),
    );
    bundle.cow = Some(CowComponent::new(species));
    bundle
}

pub fn krumblid(position: Point) -> EntityConfig {
    let root = HitboxDef::circle(20.0).mass(1.0);
    let mut bundle = EntityConfig::new(EntityType::Krumblid, TransformComponent::new(position, 0.0, root));
    bundle.health = Some(HealthComponent::new(6.0));
    bundle.ai_helper = Some(
        AiHelperComponent::new(300.0)
            .with_wander(WanderAi::new(120.0, 4.0, 0.4, WanderPositionRule::Land))
            .with_escape(EscapeAi::new(220.0, 6.0)),
    );
    bundle.krumblid = Some(KrumblidComponent);
    bundle
}

/// Head plus `segment_count` body roots chained by tethers, laid out behind
/// the head.
pub fn serpent(position: Point, segment_count: u32) -> EntityConfig {
    let head = HitboxDef::circle(26.0).mass(2.0).flag(HitboxFlag::SerpentHead);
    let mut transform = TransformComponent::new(position, 0.0, head);
    let mut previous = 0;
    for index in 1..=segment_count {
        let segment = HitboxDef::circle(20.0)
            .offset(Point::new(0.0, -SERPENT_SEGMENT_SPACING * index as f32))
            .flag(HitboxFlag::SerpentSegment);
        let current = transform.create_hitbox(None, segment);
        transform.add_tether(
            Tether::new(previous, current, SERPENT_SEGMENT_SPACING, 60.0, 6.0).with_angular(AngularTether {
                ideal_angle: PI,
                spring_constant: 4.0,
                damping: 1.0,
                padding: 0.4,
            }),
        );
        previous = current;
    }

    let mut bundle = EntityConfig::new(EntityType::Serpent, transform);
    bundle.health = Some(HealthComponent::new(30.0));
    bundle.ai_helper = Some(
        AiHelperComponent::new(300.0).with_wander(WanderAi::new(
            140.0,
            2.0,
            0.3,
            WanderPositionRule::Biome(Biome::Desert),
        )),
    );
    bundle.serpent = Some(SerpentComponent::new(segment_count, SERPENT_SEGMENT_SPACING));
    bundle
}

pub fn guardian(position: Point, config: &SimConfig) -> EntityConfig {
    let body = HitboxDef::circle(64.0).mass(10.0).flag(HitboxFlag::GuardianBody);
    let mut transform = TransformComponent::new(position, 0.0, body);
    let limbs = GUARDIAN_LIMB_REST_OFFSETS.map(|offset| {
        let limb = HitboxDef::circle(28.0)
            .mass(2.0)
            .offset(offset)
            .flag(HitboxFlag::Limb)
            .flag(HitboxFlag::GuardianLimbGem);
        transform.create_hitbox(Some(0), limb)
    });

    let mut helper = AiHelperComponent::new(500.0).with_wander(WanderAi::new(60.0, 1.5, 0.15, WanderPositionRule::Land));
    for kind in GuardianAttackKind::ALL {
        helper = helper.with_special_attack(GuardianAttackAi::for_kind(kind, config.ticks_per_second));
    }

    let mut bundle = EntityConfig::new(EntityType::Guardian, transform);
    bundle.health = Some(HealthComponent::new(60.0));
    bundle.ai_helper = Some(helper);
    bundle.guardian = Some(GuardianComponent::new(position, limbs, GUARDIAN_LIMB_REST_OFFSETS));
    bundle
}

fn hazard_hitbox(radius: f32, mass: f32) -> HitboxDef {
    HitboxDef::circle(radius)
        .mass(mass)
        .collision(COLLISION_BIT_HAZARD, COLLISION_BIT_DEFAULT | COLLISION_BIT_WALL)
        .flag(HitboxFlag::DamagesOnContact)
}

/// Rolling hazard bound to its guardian; removed together with it.
pub fn guardian_spiky_ball(position: Point, owner: EntityId, config: &SimConfig) -> EntityConfig {
    let transform = TransformComponent::new(position, 0.0, hazard_hitbox(22.0, 0.5)).attached(owner, true);
    let mut bundle = EntityConfig::new(EntityType::GuardianSpikyBall, transform);
    bundle.guardian_spiky_ball = Some(GuardianSpikyBallComponent::new(
        owner,
        config.seconds_to_ticks(SPIKY_BALL_LIFETIME_SECONDS),
    ));
    bundle
}

pub fn guardian_projectile(
    position: Point,
    owner: EntityId,
    kind: ProjectileKind,
    velocity: Point,
    config: &SimConfig,
) -> EntityConfig {
    let root = match kind {
        ProjectileKind::GemFragment => hazard_hitbox(8.0, 0.2),
        ProjectileKind::Shockwave => hazard_hitbox(26.0, 1.0).flag(HitboxFlag::IgnoresWallCollisions),
    };
    let mut transform = TransformComponent::new(position, velocity.angle(), root);
    transform.set_velocity(velocity);
    let mut bundle = EntityConfig::new(kind.entity_type(), transform);
    bundle.guardian_projectile = Some(GuardianProjectileComponent::new(
        kind,
        owner,
        velocity,
        config.seconds_to_ticks(kind.lifetime_seconds()),
    ));
    bundle
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serpent_segments_start_behind_head() {
        let bundle = serpent(Point::new(500.0, 500.0), 3);
        let hitboxes = bundle.transform.hitboxes();
        assert_eq!(hitboxes.len(), 4);
        assert_eq!(bundle.transform.tethers().len(), 3);
        for (index, hitbox) in hitboxes.iter().enumerate().skip(1) {
            assert!(hitbox.is_root());
            let expected = Point::new(500.0, 500.0 - SERPENT_SEGMENT_SPACING * index as f32);
            assert!(hitbox.position.distance_to(expected) < 1e-3);
        }
    }

    #[test]
    fn guardian_limbs_are_children_of_body() {
        let bundle = guardian(Point::new(800.0, 800.0), &SimConfig::default());
        let hitboxes = bundle.transform.hitboxes();
        assert_eq!(hitboxes.len(), 3);
        assert!(hitboxes[1..].iter().all(|limb| limb.parent == Some(0)));
        assert!(hitboxes[1..]
            .iter()
            .all(|limb| limb.has_flag(HitboxFlag::GuardianLimbGem)));
        let helper = bundle.ai_helper.expect("helper");
        assert_eq!(helper.special_attacks.len(), GuardianAttackKind::ALL.len());
    }

    #[test]
    fn hazards_do_not_collide_with_each_other() {
        let config = SimConfig::default();
        let a = guardian_projectile(Point::ZERO, EntityId(0), ProjectileKind::Shockwave, Point::ZERO, &config);
        let b = guardian_spiky_ball(Point::ZERO, EntityId(0), &config);
        let walker = player(Point::ZERO, "p");
        let a_box = &a.transform.hitboxes()[0];
        assert!(!a_box.can_collide_with(&b.transform.hitboxes()[0]));
        assert!(a_box.can_collide_with(&walker.transform.hitboxes()[0]));
    }
}
