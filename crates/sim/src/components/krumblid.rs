use crate::ai::escape::choose_escape_entity;
use crate::ai::AiType;
use crate::component::ComponentSystem;
use crate::components::ai_helper::{begin_ai_tick, clear_wander, run_wander};
use crate::entity::EntityId;
use crate::error::SimError;
use crate::world::World;

/// Krumblids only bolt from attackers this close.
pub const KRUMBLID_ESCAPE_RANGE: f32 = 260.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KrumblidComponent;

pub struct KrumblidSystem;

impl ComponentSystem for KrumblidSystem {
    fn on_tick(&self, world: &mut World, entity: EntityId) -> Result<(), SimError> {
        let visible = begin_ai_tick(world, entity)?;
        let origin = world.position_of(entity);

        let threat = choose_escape_entity(world, entity, &visible, |world, candidate| {
            world
                .try_position_of(candidate)
                .is_some_and(|position| position.distance_to(origin) <= KRUMBLID_ESCAPE_RANGE)
        });
        let escape = world.components.ai_helper.get(entity).escape;
        if let (Some(threat), Some(escape)) = (threat, escape) {
            clear_wander(world, entity);
            world.components.ai_helper.get_mut(entity).current_ai = Some(AiType::Escape);
            escape.tick(world, entity, threat);
            return Ok(());
        }

        run_wander(world, entity);
        Ok(())
    }
}
