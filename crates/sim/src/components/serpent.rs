use crate::component::ComponentSystem;
use crate::components::ai_helper::{begin_ai_tick, run_wander};
use crate::entity::EntityId;
use crate::error::SimError;
use crate::hitbox::HitboxFlag;
use crate::snapshot::PacketWriter;
use crate::world::World;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SerpentComponent {
    pub segment_count: u32,
    pub segment_spacing: f32,
}

impl SerpentComponent {
    pub fn new(segment_count: u32, segment_spacing: f32) -> Self {
        Self {
            segment_count,
            segment_spacing,
        }
    }
}

pub struct SerpentSystem;

impl ComponentSystem for SerpentSystem {
    fn on_tick(&self, world: &mut World, entity: EntityId) -> Result<(), SimError> {
        begin_ai_tick(world, entity)?;
        run_wander(world, entity);
        face_segments_forward(world, entity);
        Ok(())
    }

    fn packet_length(&self, _world: &World, _entity: EntityId) -> usize {
        2
    }

    fn add_to_packet(&self, world: &World, entity: EntityId, packet: &mut PacketWriter) {
        let serpent = world.components().serpent.get(entity);
        packet.write_f32(serpent.segment_count as f32);
        packet.write_f32(serpent.segment_spacing);
    }
}

/// Points every body segment at the root in front of it.
fn face_segments_forward(world: &mut World, entity: EntityId) {
    let transform = world.components.transform.get_mut(entity);
    let mut previous = 0;
    for index in 1..transform.hitboxes().len() {
        let hitbox = &transform.hitboxes()[index];
        if !hitbox.is_root() || !hitbox.has_flag(HitboxFlag::SerpentSegment) {
            continue;
        }
        let ahead = transform.hitboxes()[previous].position;
        let angle = hitbox.position.angle_to(ahead);
        transform.set_hitbox_angle(index, angle);
        previous = index;
    }
}
