use crate::component::ComponentSystem;
use crate::entity::EntityId;
use crate::geometry::Aabb;
use crate::hitbox::{Hitbox, HitboxDef};
use crate::math::{normalize_angle, Point};
use crate::snapshot::PacketWriter;
use crate::spatial::ChunkCoord;
use crate::tether::Tether;
use crate::world::World;

const MOVEMENT_EPSILON: f32 = 1e-3;

/// Physical state of an entity: a forest of hitboxes whose first root is the
/// entity origin, plus the tethers between its roots.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformComponent {
    hitboxes: Vec<Hitbox>,
    tethers: Vec<Tether>,
    next_local_id: u32,
    needs_pose_update: bool,
    pub move_speed_multiplier: f32,
    /// Ticks left until the next terrain effect proc.
    pub(crate) terrain_proc_ticks: u32,
    pub(crate) chunk: Option<ChunkCoord>,
    /// Logical, non-owning attachment to another entity.
    pub attached_to: Option<EntityId>,
    pub destroy_with_parent: bool,
    reported_position: Point,
    reported_angle: f32,
}

impl TransformComponent {
    pub fn new(position: Point, angle: f32, root: HitboxDef) -> Self {
        let mut transform = Self {
            hitboxes: Vec::new(),
            tethers: Vec::new(),
            next_local_id: 0,
            needs_pose_update: true,
            move_speed_multiplier: 1.0,
            terrain_proc_ticks: 0,
            chunk: None,
            attached_to: None,
            destroy_with_parent: false,
            reported_position: position,
            reported_angle: normalize_angle(angle),
        };
        let root = transform.create_hitbox(None, root);
        transform.hitboxes[root].position = position;
        transform.hitboxes[root].angle = normalize_angle(angle);
        transform
    }

    pub fn attached(mut self, parent: EntityId, destroy_with_parent: bool) -> Self {
        self.attached_to = Some(parent);
        self.destroy_with_parent = destroy_with_parent;
        self
    }

    /// Adds a hitbox. Parents must already exist, so children always follow them.
    pub fn create_hitbox(&mut self, parent: Option<usize>, def: HitboxDef) -> usize {
        let parent = parent.filter(|index| *index < self.hitboxes.len());
        let local_id = self.next_local_id;
        self.next_local_id += 1;
        let mut hitbox = Hitbox::from_def(local_id, parent, def);
        if parent.is_none() {
            // Extra roots are placed relative to the origin at creation.
            let origin = self.hitboxes.first().map(|root| root.position);
            if let Some(origin) = origin {
                hitbox.position = origin + def.offset;
            }
        }
        self.hitboxes.push(hitbox);
        self.needs_pose_update = true;
        self.update_poses();
        self.hitboxes.len() - 1
    }

    pub fn add_tether(&mut self, tether: Tether) {
        self.tethers.push(tether);
    }

    pub fn hitboxes(&self) -> &[Hitbox] {
        &self.hitboxes
    }

    pub fn hitbox(&self, index: usize) -> Option<&Hitbox> {
        self.hitboxes.get(index)
    }

    pub fn tethers(&self) -> &[Tether] {
        &self.tethers
    }

    pub fn position(&self) -> Point {
        self.hitboxes[0].position
    }

    pub fn rotation(&self) -> f32 {
        self.hitboxes[0].angle
    }

    pub fn velocity(&self) -> Point {
        self.hitboxes[0].velocity
    }

    pub fn chunk(&self) -> Option<ChunkCoord> {
        self.chunk
    }

    /// Moves every root so the origin lands on `position`.
    pub fn set_position(&mut self, position: Point) {
        let delta = position - self.position();
        for hitbox in self.hitboxes.iter_mut().filter(|hitbox| hitbox.is_root()) {
            hitbox.position += delta;
        }
        self.needs_pose_update = true;
    }

    pub fn set_rotation(&mut self, angle: f32) {
        self.hitboxes[0].angle = normalize_angle(angle);
        self.needs_pose_update = true;
    }

    /// Places one root directly. Used when restoring saved poses.
    pub(crate) fn set_root_pose(&mut self, index: usize, position: Point, angle: f32) {
        if let Some(hitbox) = self.hitboxes.get_mut(index).filter(|hitbox| hitbox.is_root()) {
            hitbox.position = position;
            hitbox.angle = normalize_angle(angle);
            self.needs_pose_update = true;
        }
    }

    pub fn set_hitbox_angle(&mut self, index: usize, angle: f32) {
        if let Some(hitbox) = self.hitboxes.get_mut(index) {
            hitbox.angle = normalize_angle(angle);
            self.needs_pose_update = true;
        }
    }

    pub fn set_velocity(&mut self, velocity: Point) {
        self.hitboxes[0].velocity = velocity;
    }

    /// Moves a child within its parent's frame.
    pub fn set_hitbox_offset(&mut self, index: usize, offset: Point) {
        if let Some(hitbox) = self.hitboxes.get_mut(index) {
            hitbox.offset = offset;
            self.needs_pose_update = true;
        }
    }

    pub fn set_hitbox_flags(&mut self, index: usize, flags: crate::hitbox::HitboxFlags) {
        if let Some(hitbox) = self.hitboxes.get_mut(index) {
            hitbox.flags = flags;
        }
    }

    /// Ground-driven acceleration, scaled by the current terrain multiplier.
    pub fn apply_acceleration_from_ground(&mut self, index: usize, acceleration: Point) {
        let multiplier = self.move_speed_multiplier;
        if let Some(hitbox) = self.hitboxes.get_mut(index).filter(|hitbox| hitbox.is_root()) {
            hitbox.acceleration += acceleration * multiplier;
        }
    }

    /// Drops whatever acceleration the origin accumulated this tick.
    pub fn clear_acceleration(&mut self) {
        self.hitboxes[0].acceleration = Point::ZERO;
    }

    pub fn add_velocity(&mut self, index: usize, velocity: Point) {
        if let Some(hitbox) = self.hitboxes.get_mut(index).filter(|hitbox| hitbox.is_root()) {
            hitbox.velocity += velocity;
        }
    }

    pub fn add_angular_velocity(&mut self, index: usize, angular_velocity: f32) {
        if let Some(hitbox) = self.hitboxes.get_mut(index).filter(|hitbox| hitbox.is_root()) {
            hitbox.angular_velocity += angular_velocity;
        }
    }

    /// Integrates root velocities and resets their accelerations.
    pub fn integrate(&mut self, dt: f32, drag: f32) {
        let drag_factor = (1.0 - drag * dt).clamp(0.0, 1.0);
        for hitbox in self.hitboxes.iter_mut().filter(|hitbox| hitbox.is_root()) {
            hitbox.velocity += hitbox.acceleration * dt;
            hitbox.velocity = hitbox.velocity * drag_factor;
            hitbox.position += hitbox.velocity * dt;
            if hitbox.angular_velocity != 0.0 {
                hitbox.angle = normalize_angle(hitbox.angle + hitbox.angular_velocity * dt);
                hitbox.angular_velocity *= drag_factor;
            }
            hitbox.acceleration = Point::ZERO;
        }
        self.needs_pose_update = true;
    }

    /// Recomputes world poses of every child from its parent chain.
    pub fn update_poses(&mut self) {
        if !self.needs_pose_update {
            return;
        }
        for index in 0..self.hitboxes.len() {
            let Some(parent) = self.hitboxes[index].parent else {
                continue;
            };
            let (parent_position, parent_angle) = {
                let parent = &self.hitboxes[parent];
                (parent.position, parent.angle)
            };
            let hitbox = &mut self.hitboxes[index];
            hitbox.position = parent_position + hitbox.offset.rotated(parent_angle);
            hitbox.angle = normalize_angle(parent_angle + hitbox.relative_angle);
        }
        self.needs_pose_update = false;
    }

    /// Applies every tether's spring-damper correction to root velocities.
    pub fn relax_tethers(&mut self, dt: f32) {
        for tether_index in 0..self.tethers.len() {
            let tether = self.tethers[tether_index];
            let (Some(a), Some(b)) = (
                self.hitboxes.get(tether.hitbox_a),
                self.hitboxes.get(tether.hitbox_b),
            ) else {
                continue;
            };
            let correction = tether.corrective_accelerations(a, b);
            if correction.is_zero() {
                continue;
            }
            self.add_velocity(tether.hitbox_a, correction.acceleration_a * dt);
            self.add_velocity(tether.hitbox_b, correction.acceleration_b * dt);
        }
    }

    /// Shifts the whole forest, used to resolve collisions.
    pub fn push_by(&mut self, root_index: usize, push: Point) {
        if let Some(hitbox) = self.hitboxes.get_mut(root_index) {
            if hitbox.is_root() {
                hitbox.position += push;
                self.needs_pose_update = true;
            }
        }
    }

    /// Walks up to the root owning `index`.
    pub fn root_of(&self, mut index: usize) -> usize {
        while let Some(parent) = self.hitboxes.get(index).and_then(|hitbox| hitbox.parent) {
            index = parent;
        }
        index
    }

    pub fn bounds(&self) -> Aabb {
        let mut bounds = self.hitboxes[0].placed().aabb();
        for hitbox in &self.hitboxes[1..] {
            let aabb = hitbox.placed().aabb();
            bounds.min.x = bounds.min.x.min(aabb.min.x);
            bounds.min.y = bounds.min.y.min(aabb.min.y);
            bounds.max.x = bounds.max.x.max(aabb.max.x);
            bounds.max.y = bounds.max.y.max(aabb.max.y);
        }
        bounds
    }

    pub(crate) fn take_moved_since_report(&mut self) -> bool {
        let position = self.position();
        let angle = self.rotation();
        let moved = position.distance_squared_to(self.reported_position) > MOVEMENT_EPSILON
            || (angle - self.reported_angle).abs() > MOVEMENT_EPSILON;
        if moved {
            self.reported_position = position;
            self.reported_angle = angle;
        }
        moved
    }
}

pub struct TransformSystem;

impl ComponentSystem for TransformSystem {
    fn on_join(&self, world: &mut World, entity: EntityId) {
        world.register_in_chunk(entity);
    }

    fn on_remove(&self, world: &mut World, entity: EntityId) {
        world.unregister_from_chunk(entity);
    }

    fn packet_length(&self, world: &World, entity: EntityId) -> usize {
        6 + world.components().transform.get(entity).hitboxes().len() * 4
    }

    fn add_to_packet(&self, world: &World, entity: EntityId, packet: &mut PacketWriter) {
        let transform = world.components().transform.get(entity);
        packet.write_point(transform.position());
        packet.write_f32(transform.rotation());
        packet.write_point(transform.velocity());
        packet.write_f32(transform.hitboxes().len() as f32);
        for hitbox in transform.hitboxes() {
            packet.write_f32(hitbox.local_id as f32);
            packet.write_point(hitbox.position);
            packet.write_f32(hitbox.angle);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;
    use crate::hitbox::HitboxFlag;

    fn assert_point_close(actual: Point, expected: Point) {
        assert!(
            actual.distance_to(expected) < 1e-3,
            "{actual:?} vs {expected:?}"
        );
    }

    #[test]
    fn children_follow_parent_chain_after_update() {
        let mut transform = TransformComponent::new(Point::new(100.0, 100.0), 0.0, HitboxDef::circle(20.0));
        let arm = transform.create_hitbox(
            Some(0),
            HitboxDef::circle(6.0)
                .offset(Point::new(0.0, 30.0))
                .flag(HitboxFlag::Limb),
        );
        let hand = transform.create_hitbox(Some(arm), HitboxDef::circle(3.0).offset(Point::new(0.0, 10.0)));

        transform.set_rotation(FRAC_PI_2);
        transform.add_velocity(0, Point::new(60.0, 0.0));
        transform.integrate(1.0 / 60.0, 0.0);
        transform.update_poses();

        let root = transform.hitboxes()[0].clone();
        for hitbox in transform.hitboxes().iter().skip(1) {
            let parent = &transform.hitboxes()[hitbox.parent.expect("child")];
            assert_point_close(hitbox.position, parent.position + hitbox.offset.rotated(parent.angle));
        }
        assert_point_close(transform.hitboxes()[arm].position, root.position + Point::new(30.0, 0.0));
        assert_point_close(transform.hitboxes()[hand].position, root.position + Point::new(40.0, 0.0));
    }

    #[test]
    fn ground_acceleration_respects_terrain_multiplier() {
        let mut transform = TransformComponent::new(Point::ZERO, 0.0, HitboxDef::circle(8.0));
        transform.move_speed_multiplier = 0.5;
        transform.apply_acceleration_from_ground(0, Point::new(0.0, 100.0));
        transform.integrate(1.0, 0.0);
        assert_point_close(transform.velocity(), Point::new(0.0, 50.0));
    }

    #[test]
    fn children_cannot_be_accelerated_directly() {
        let mut transform = TransformComponent::new(Point::ZERO, 0.0, HitboxDef::circle(8.0));
        let child = transform.create_hitbox(Some(0), HitboxDef::circle(2.0).offset(Point::new(0.0, 5.0)));
        transform.add_velocity(child, Point::new(10.0, 0.0));
        assert_eq!(transform.hitboxes()[child].velocity, Point::ZERO);
    }

    #[test]
    fn extra_roots_start_relative_to_origin() {
        let mut transform = TransformComponent::new(Point::new(50.0, 50.0), 0.0, HitboxDef::circle(8.0));
        let segment = transform.create_hitbox(None, HitboxDef::circle(6.0).offset(Point::new(0.0, -20.0)));
        assert_point_close(transform.hitboxes()[segment].position, Point::new(50.0, 30.0));
        assert_eq!(transform.root_of(segment), segment);
    }

    #[test]
    fn moved_since_report_latches() {
        let mut transform = TransformComponent::new(Point::ZERO, 0.0, HitboxDef::circle(8.0));
        assert!(!transform.take_moved_since_report());
        transform.set_position(Point::new(3.0, 0.0));
        assert!(transform.take_moved_since_report());
        assert!(!transform.take_moved_since_report());
    }
}
