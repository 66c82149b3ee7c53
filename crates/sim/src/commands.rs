use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::math::Point;

/// Player-originated intent, applied before any component ticks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerCommand {
    /// Desired movement direction. Zero stops the player.
    Move { direction: Point },
    Face { angle: f32 },
    Attack,
}

impl PlayerCommand {
    pub fn name(self) -> &'static str {
        match self {
            Self::Move { .. } => "move",
            Self::Face { .. } => "face",
            Self::Attack => "attack",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueuedCommand {
    pub entity: EntityId,
    pub command: PlayerCommand,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandApplyStats {
    pub total: u32,
    pub applied: u32,
    pub rejected: u32,
}

impl CommandApplyStats {
    pub(crate) fn record(&mut self, applied: bool) {
        self.total = self.total.saturating_add(1);
        if applied {
            self.applied = self.applied.saturating_add(1);
        } else {
            self.rejected = self.rejected.saturating_add(1);
        }
    }
}

#[derive(Debug, Default)]
pub struct CommandQueue {
    commands: Vec<QueuedCommand>,
    last_tick_apply_stats: CommandApplyStats,
}

impl CommandQueue {
    pub fn enqueue(&mut self, entity: EntityId, command: PlayerCommand) {
        self.commands.push(QueuedCommand { entity, command });
    }

    pub fn drain_current_tick(&mut self) -> Vec<QueuedCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn pending_len(&self) -> usize {
        self.commands.len()
    }

    pub(crate) fn set_last_tick_apply_stats(&mut self, stats: CommandApplyStats) {
        self.last_tick_apply_stats = stats;
    }

    pub fn last_tick_apply_stats(&self) -> CommandApplyStats {
        self.last_tick_apply_stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_queue_in_order() {
        let mut queue = CommandQueue::default();
        queue.enqueue(EntityId(1), PlayerCommand::Attack);
        queue.enqueue(EntityId(2), PlayerCommand::Face { angle: 1.0 });
        let drained = queue.drain_current_tick();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].entity, EntityId(1));
        assert_eq!(queue.pending_len(), 0);
    }

    #[test]
    fn commands_parse_from_tagged_json() {
        let command: PlayerCommand =
            serde_json::from_str(r#"{"type":"move","direction":{"x":1.0,"y":0.0}}"#).expect("parse");
        assert_eq!(
            command,
            PlayerCommand::Move {
                direction: Point::new(1.0, 0.0)
            }
        );
    }
}
