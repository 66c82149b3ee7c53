use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ai::escape::choose_escape_entity;
use crate::ai::{nearest_entity, AiType};
use crate::component::ComponentSystem;
use crate::components::ai_helper::{begin_ai_tick, clear_wander, run_wander};
use crate::entity::{EntityId, EntityType};
use crate::error::SimError;
use crate::snapshot::PacketWriter;
use crate::world::World;

/// Chance per second that an idle cow takes interest in a visible player.
pub const COW_FOLLOW_CHANCE_PER_SECOND: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CowSpecies {
    Brown,
    Black,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CowComponent {
    pub species: CowSpecies,
}

impl CowComponent {
    pub fn new(species: CowSpecies) -> Self {
        Self { species }
    }
}

pub struct CowSystem;

impl ComponentSystem for CowSystem {
    fn on_tick(&self, world: &mut World, entity: EntityId) -> Result<(), SimError> {
        let visible = begin_ai_tick(world, entity)?;

        // Escape: anything but another cow.
        let threat = choose_escape_entity(world, entity, &visible, |world, candidate| {
            world.entity_type(candidate) != Some(EntityType::Cow)
        });
        let escape = world.components.ai_helper.get(entity).escape;
        if let (Some(threat), Some(escape)) = (threat, escape) {
            clear_wander(world, entity);
            let helper = world.components.ai_helper.get_mut(entity);
            if let Some(follow) = helper.follow.as_mut() {
                follow.stop_following();
            }
            escape.tick(world, entity, threat);
            world.components.ai_helper.get_mut(entity).current_ai = Some(AiType::Escape);
            return Ok(());
        }

        // Follow: keep an existing target or roll for a visible player.
        let follow = world.components.ai_helper.get_mut(entity).follow.take();
        if let Some(mut follow) = follow {
            follow.tick_cooldown();
            if follow.can_start_following() {
                let players = visible
                    .iter()
                    .copied()
                    .filter(|candidate| world.components.player.has(*candidate))
                    .collect::<Vec<_>>();
                let chance = f64::from((COW_FOLLOW_CHANCE_PER_SECOND * world.fixed_dt()).clamp(0.0, 1.0));
                if let Some(player) = nearest_entity(world, entity, players) {
                    if world.rng().gen_bool(chance) {
                        follow.start_following(player, true);
                    }
                }
            }
            let following = follow.tick(world, entity, &visible);
            let helper = world.components.ai_helper.get_mut(entity);
            helper.follow = Some(follow);
            if following {
                helper.current_ai = Some(AiType::Follow);
                clear_wander(world, entity);
                return Ok(());
            }
        }

        // Herd with visible cows.
        let herd_members = visible
            .iter()
            .copied()
            .filter(|candidate| world.components.cow.has(*candidate))
            .collect::<Vec<_>>();
        let herd = world.components.ai_helper.get(entity).herd;
        let wandering = world
            .components
            .ai_helper
            .get(entity)
            .wander
            .as_ref()
            .is_some_and(|wander| wander.is_wandering());
        if let Some(herd) = herd {
            if !wandering && herd.tick(world, entity, &herd_members) {
                world.components.ai_helper.get_mut(entity).current_ai = Some(AiType::Herd);
                return Ok(());
            }
        }

        run_wander(world, entity);
        Ok(())
    }

    fn packet_length(&self, _world: &World, _entity: EntityId) -> usize {
        1
    }

    fn add_to_packet(&self, world: &World, entity: EntityId, packet: &mut PacketWriter) {
        let species = match world.components().cow.get(entity).species {
            CowSpecies::Brown => 0.0,
            CowSpecies::Black => 1.0,
        };
        packet.write_f32(species);
    }
}
