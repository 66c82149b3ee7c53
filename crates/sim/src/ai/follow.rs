use crate::ai::{move_toward_point, stop_moving, turn_toward_point};
use crate::entity::EntityId;
use crate::world::World;

#[derive(Debug, Clone, PartialEq)]
pub struct FollowAi {
    pub acceleration: f32,
    pub turn_speed: f32,
    pub desired_distance: f32,
    pub cooldown_ticks: u32,
    /// How long a forgettable target holds interest.
    pub interest_ticks: u32,
    target: Option<EntityId>,
    forgettable: bool,
    cooldown_remaining: u32,
    interest_remaining: u32,
}

impl FollowAi {
    pub fn new(acceleration: f32, turn_speed: f32, desired_distance: f32, cooldown_ticks: u32, interest_ticks: u32) -> Self {
        Self {
            acceleration,
            turn_speed,
            desired_distance,
            cooldown_ticks,
            interest_ticks,
            target: None,
            forgettable: false,
            cooldown_remaining: 0,
            interest_remaining: 0,
        }
    }

    pub fn target(&self) -> Option<EntityId> {
        self.target
    }

    pub fn can_start_following(&self) -> bool {
        self.target.is_none() && self.cooldown_remaining == 0
    }

    pub fn tick_cooldown(&mut self) {
        if self.target.is_none() {
            self.cooldown_remaining = self.cooldown_remaining.saturating_sub(1);
        }
    }

    pub fn start_following(&mut self, target: EntityId, forgettable: bool) {
        self.target = Some(target);
        self.forgettable = forgettable;
        self.interest_remaining = self.interest_ticks;
    }

    pub fn stop_following(&mut self) {
        if self.target.take().is_some() {
            self.cooldown_remaining = self.cooldown_ticks;
        }
    }

    /// Keeps `desired_distance` from the target while it stays visible and
    /// interesting. Returns false once following has stopped.
    pub fn tick(&mut self, world: &mut World, entity: EntityId, visible: &[EntityId]) -> bool {
        let Some(target) = self.target else {
            return false;
        };
        if !world.is_live(target) || visible.binary_search(&target).is_err() {
            self.stop_following();
            return false;
        }
        if self.forgettable {
            if self.interest_remaining == 0 {
                self.stop_following();
                return false;
            }
            self.interest_remaining -= 1;
        }

        let target_position = world.position_of(target);
        let distance = world.position_of(entity).distance_to(target_position);
        if distance > self.desired_distance {
            move_toward_point(world, entity, target_position, self.acceleration, self.turn_speed);
        } else {
            stop_moving(world, entity);
            turn_toward_point(world, entity, target_position, self.turn_speed);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_starts_when_following_stops() {
        let mut follow = FollowAi::new(100.0, 2.0, 50.0, 3, 10);
        follow.start_following(EntityId(4), true);
        assert!(!follow.can_start_following());
        follow.stop_following();
        assert!(!follow.can_start_following());
        for _ in 0..3 {
            follow.tick_cooldown();
        }
        assert!(follow.can_start_following());
    }

    #[test]
    fn stopping_without_target_does_not_start_cooldown() {
        let mut follow = FollowAi::new(100.0, 2.0, 50.0, 3, 10);
        follow.stop_following();
        assert!(follow.can_start_following());
    }
}
