use serde::{Deserialize, Serialize};

use crate::geometry::{BoxShape, PlacedBox};
use crate::math::Point;

pub const COLLISION_BIT_DEFAULT: u32 = 1 << 0;
pub const COLLISION_BIT_WALL: u32 = 1 << 1;
pub const COLLISION_BIT_HAZARD: u32 = 1 << 2;
pub const COLLISION_MASK_ALL: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionType {
    /// Pushed out of other solid hitboxes positionally.
    Solid,
    /// Only nudged apart through velocity.
    Soft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum HitboxFlag {
    IgnoresWallCollisions = 1 << 0,
    Limb = 1 << 1,
    GuardianLimbGem = 1 << 2,
    GuardianBody = 1 << 3,
    SerpentHead = 1 << 4,
    SerpentSegment = 1 << 5,
    DamagesOnContact = 1 << 6,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HitboxFlags(u16);

impl HitboxFlags {
    pub const EMPTY: HitboxFlags = HitboxFlags(0);

    pub fn from_flags(flags: &[HitboxFlag]) -> Self {
        flags
            .iter()
            .fold(Self::EMPTY, |set, flag| set.with(*flag))
    }

    pub fn with(mut self, flag: HitboxFlag) -> Self {
        self.insert(flag);
        self
    }

    pub fn insert(&mut self, flag: HitboxFlag) {
        self.0 |= flag as u16;
    }

    pub fn remove(&mut self, flag: HitboxFlag) {
        self.0 &= !(flag as u16);
    }

    pub fn contains(self, flag: HitboxFlag) -> bool {
        self.0 & flag as u16 != 0
    }

    pub fn bits(self) -> u16 {
        self.0
    }
}

/// Construction parameters for a hitbox.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitboxDef {
    pub shape: BoxShape,
    pub offset: Point,
    pub relative_angle: f32,
    pub mass: f32,
    pub collision_type: CollisionType,
    pub collision_bit: u32,
    pub collision_mask: u32,
    pub flags: HitboxFlags,
}

impl HitboxDef {
    pub fn circle(radius: f32) -> Self {
        Self::with_shape(BoxShape::Circular { radius })
    }

    pub fn rectangle(width: f32, height: f32) -> Self {
        Self::with_shape(BoxShape::Rectangular { width, height })
    }

    fn with_shape(shape: BoxShape) -> Self {
        Self {
            shape,
            offset: Point::ZERO,
            relative_angle: 0.0,
            mass: 1.0,
            collision_type: CollisionType::Solid,
            collision_bit: COLLISION_BIT_DEFAULT,
            collision_mask: COLLISION_MASK_ALL,
            flags: HitboxFlags::EMPTY,
        }
    }

    pub fn offset(mut self, offset: Point) -> Self {
        self.offset = offset;
        self
    }

    pub fn relative_angle(mut self, angle: f32) -> Self {
        self.relative_angle = angle;
        self
    }

    pub fn mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    pub fn collision_type(mut self, collision_type: CollisionType) -> Self {
        self.collision_type = collision_type;
        self
    }

    pub fn collision(mut self, bit: u32, mask: u32) -> Self {
        self.collision_bit = bit;
        self.collision_mask = mask;
        self
    }

    pub fn flag(mut self, flag: HitboxFlag) -> Self {
        self.flags.insert(flag);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hitbox {
    pub local_id: u32,
    pub parent: Option<usize>,
    pub shape: BoxShape,
    /// Offset from the parent in the parent's frame. Unused for roots.
    pub offset: Point,
    pub relative_angle: f32,
    pub mass: f32,
    pub collision_type: CollisionType,
    pub collision_bit: u32,
    pub collision_mask: u32,
    pub flags: HitboxFlags,
    /// World-space pose. Authoritative for roots, derived for children.
    pub position: Point,
    pub angle: f32,
    pub velocity: Point,
    pub acceleration: Point,
    pub angular_velocity: f32,
}

impl Hitbox {
    pub(crate) fn from_def(local_id: u32, parent: Option<usize>, def: HitboxDef) -> Self {
        Self {
            local_id,
            parent,
            shape: def.shape,
            offset: def.offset,
            relative_angle: def.relative_angle,
            mass: def.mass.max(f32::EPSILON),
            collision_type: def.collision_type,
            collision_bit: def.collision_bit,
            collision_mask: def.collision_mask,
            flags: def.flags,
            position: def.offset,
            angle: def.relative_angle,
            velocity: Point::ZERO,
            acceleration: Point::ZERO,
            angular_velocity: 0.0,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn placed(&self) -> PlacedBox {
        PlacedBox {
            shape: self.shape,
            position: self.position,
            rotation: self.angle,
        }
    }

    pub fn can_collide_with(&self, other: &Hitbox) -> bool {
        self.collision_mask & other.collision_bit != 0 && other.collision_mask & self.collision_bit != 0
    }

    pub fn collides_with_walls(&self) -> bool {
        self.collision_mask & COLLISION_BIT_WALL != 0
            && !self.flags.contains(HitboxFlag::IgnoresWallCollisions)
    }

    pub fn has_flag(&self, flag: HitboxFlag) -> bool {
        self.flags.contains(flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_set_membership() {
        let mut flags = HitboxFlags::from_flags(&[HitboxFlag::Limb, HitboxFlag::GuardianLimbGem]);
        assert!(flags.contains(HitboxFlag::Limb));
        assert!(!flags.contains(HitboxFlag::IgnoresWallCollisions));
        flags.remove(HitboxFlag::Limb);
        assert!(!flags.contains(HitboxFlag::Limb));
        assert!(flags.contains(HitboxFlag::GuardianLimbGem));
    }

    #[test]
    fn bit_and_mask_must_overlap_both_ways() {
        let a = Hitbox::from_def(0, None, HitboxDef::circle(5.0));
        let hazard = Hitbox::from_def(
            0,
            None,
            HitboxDef::circle(5.0).collision(COLLISION_BIT_HAZARD, COLLISION_BIT_DEFAULT),
        );
        let ghost = Hitbox::from_def(
            0,
            None,
            HitboxDef::circle(5.0).collision(COLLISION_BIT_HAZARD, COLLISION_BIT_HAZARD),
        );
        assert!(a.can_collide_with(&hazard));
        assert!(!a.can_collide_with(&ghost));
    }

    #[test]
    fn wall_flag_disables_wall_collisions() {
        let walker = Hitbox::from_def(0, None, HitboxDef::circle(4.0));
        let phaser = Hitbox::from_def(
            0,
            None,
            HitboxDef::circle(4.0).flag(HitboxFlag::IgnoresWallCollisions),
        );
        assert!(walker.collides_with_walls());
        assert!(!phaser.collides_with_walls());
    }
}
