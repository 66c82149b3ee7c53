use crate::ai::guardian_attack::GuardianAttackKind;
use crate::entity::{EntityId, EntityType};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimEvent {
    EntityCreated {
        entity: EntityId,
        entity_type: EntityType,
    },
    EntityJoined {
        entity: EntityId,
    },
    EntityRemoved {
        entity: EntityId,
    },
    HitboxCollision {
        entity: EntityId,
        other: EntityId,
    },
    WallCollision {
        entity: EntityId,
        hitbox: usize,
        subtile: (u32, u32),
    },
    EntityDamaged {
        entity: EntityId,
        attacker: Option<EntityId>,
        amount: f32,
    },
    EntityDied {
        entity: EntityId,
    },
    SlimesMerged {
        first: EntityId,
        second: EntityId,
        result: EntityId,
    },
    SlimeAbsorbed {
        absorber: EntityId,
        absorbed: EntityId,
    },
    SpecialAttackStarted {
        entity: EntityId,
        attack: GuardianAttackKind,
    },
    SpecialAttackFinished {
        entity: EntityId,
        attack: GuardianAttackKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEventKind {
    EntityCreated,
    EntityJoined,
    EntityRemoved,
    HitboxCollision,
    WallCollision,
    EntityDamaged,
    EntityDied,
    SlimesMerged,
    SlimeAbsorbed,
    SpecialAttackStarted,
    SpecialAttackFinished,
}

impl SimEvent {
    pub fn kind(self) -> SimEventKind {
        match self {
            Self::EntityCreated { .. } => SimEventKind::EntityCreated,
            Self::EntityJoined { .. } => SimEventKind::EntityJoined,
            Self::EntityRemoved { .. } => SimEventKind::EntityRemoved,
            Self::HitboxCollision { .. } => SimEventKind::HitboxCollision,
            Self::WallCollision { .. } => SimEventKind::WallCollision,
            Self::EntityDamaged { .. } => SimEventKind::EntityDamaged,
            Self::EntityDied { .. } => SimEventKind::EntityDied,
            Self::SlimesMerged { .. } => SimEventKind::SlimesMerged,
            Self::SlimeAbsorbed { .. } => SimEventKind::SlimeAbsorbed,
            Self::SpecialAttackStarted { .. } => SimEventKind::SpecialAttackStarted,
            Self::SpecialAttackFinished { .. } => SimEventKind::SpecialAttackFinished,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimEventCounts {
    pub total: u32,
    pub entity_created: u32,
    pub entity_joined: u32,
    pub entity_removed: u32,
    pub hitbox_collision: u32,
    pub wall_collision: u32,
    pub entity_damaged: u32,
    pub entity_died: u32,
    pub slimes_merged: u32,
    pub slime_absorbed: u32,
    pub special_attack_started: u32,
    pub special_attack_finished: u32,
}

impl SimEventCounts {
    fn record(&mut self, kind: SimEventKind) {
        self.total = self.total.saturating_add(1);
        match kind {
            SimEventKind::EntityCreated => {
                self.entity_created = self.entity_created.saturating_add(1)
            }
            SimEventKind::EntityJoined => self.entity_joined = self.entity_joined.saturating_add(1),
            SimEventKind::EntityRemoved => {
                self.entity_removed = self.entity_removed.saturating_add(1)
            }
            SimEventKind::HitboxCollision => {
                self.hitbox_collision = self.hitbox_collision.saturating_add(1)
            }
            SimEventKind::WallCollision => {
                self.wall_collision = self.wall_collision.saturating_add(1)
            }
            SimEventKind::EntityDamaged => {
                self.entity_damaged = self.entity_damaged.saturating_add(1)
            }
            SimEventKind::EntityDied => self.entity_died = self.entity_died.saturating_add(1),
            SimEventKind::SlimesMerged => self.slimes_merged = self.slimes_merged.saturating_add(1),
            SimEventKind::SlimeAbsorbed => {
                self.slime_absorbed = self.slime_absorbed.saturating_add(1)
            }
            SimEventKind::SpecialAttackStarted => {
                self.special_attack_started = self.special_attack_started.saturating_add(1)
            }
            SimEventKind::SpecialAttackFinished => {
                self.special_attack_finished = self.special_attack_finished.saturating_add(1)
            }
        }
    }
}

/// Per-tick event log. Events emitted during a tick become readable as the
/// last tick's events once the tick rolls over.
#[derive(Debug, Default)]
pub struct SimEventBus {
    current_tick_events: Vec<SimEvent>,
    last_tick_events: Vec<SimEvent>,
    last_tick_counts: SimEventCounts,
}

impl SimEventBus {
    pub fn emit(&mut self, event: SimEvent) {
        self.current_tick_events.push(event);
    }

    pub fn iter_emitted_so_far(&self) -> impl Iterator<Item = &SimEvent> {
        self.current_tick_events.iter()
    }

    pub fn finish_tick_rollover(&mut self) {
        let mut counts = SimEventCounts::default();
        for event in &self.current_tick_events {
            counts.record(event.kind());
        }
        self.last_tick_counts = counts;
        self.last_tick_events = std::mem::take(&mut self.current_tick_events);
    }

    pub fn last_tick_events(&self) -> &[SimEvent] {
        &self.last_tick_events
    }

    pub fn last_tick_counts(&self) -> SimEventCounts {
        self.last_tick_counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollover_moves_events_and_counts() {
        let mut bus = SimEventBus::default();
        bus.emit(SimEvent::EntityJoined {
            entity: EntityId(1),
        });
        bus.emit(SimEvent::EntityDied {
            entity: EntityId(1),
        });
        assert_eq!(bus.iter_emitted_so_far().count(), 2);

        bus.finish_tick_rollover();
        assert_eq!(bus.iter_emitted_so_far().count(), 0);
        assert_eq!(bus.last_tick_events().len(), 2);
        let counts = bus.last_tick_counts();
        assert_eq!(counts.total, 2);
        assert_eq!(counts.entity_joined, 1);
        assert_eq!(counts.entity_died, 1);

        bus.finish_tick_rollover();
        assert_eq!(bus.last_tick_counts(), SimEventCounts::default());
    }
}
