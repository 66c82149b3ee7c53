use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardianAttackKind {
    CrystalSlam,
    CrystalBurst,
    SpikyBallSummon,
}

impl GuardianAttackKind {
    pub const ALL: [GuardianAttackKind; 3] = [Self::CrystalSlam, Self::CrystalBurst, Self::SpikyBallSummon];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CrystalSlam => "crystal_slam",
            Self::CrystalBurst => "crystal_burst",
            Self::SpikyBallSummon => "spiky_ball_summon",
        }
    }

    pub fn packet_index(self) -> f32 {
        match self {
            Self::CrystalSlam => 0.0,
            Self::CrystalBurst => 1.0,
            Self::SpikyBallSummon => 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackStage {
    Windup,
    Active,
    Return,
}

impl AttackStage {
    pub fn packet_index(self) -> f32 {
        match self {
            Self::Windup => 0.0,
            Self::Active => 1.0,
            Self::Return => 2.0,
        }
    }
}

/// What one advance of an attack did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackTick {
    /// Stage the tick was spent in.
    pub stage: AttackStage,
    /// Fraction of that stage completed, in (0, 1].
    pub progress: f32,
    /// Hazards to spawn on this tick.
    pub spawns: u32,
    pub finished: bool,
}

/// Windup, active and return stages measured in ticks. Spawns fire at fixed
/// tick offsets inside the active stage.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardianAttackAi {
    pub kind: GuardianAttackKind,
    pub windup_ticks: u32,
    pub active_ticks: u32,
    pub return_ticks: u32,
    pub spawn_offsets: Vec<u32>,
    stage: AttackStage,
    progress_ticks: u32,
    running: bool,
}

impl GuardianAttackAi {
    pub fn new(kind: GuardianAttackKind, windup_ticks: u32, active_ticks: u32, return_ticks: u32, spawn_offsets: Vec<u32>) -> Self {
        Self {
            kind,
            windup_ticks: windup_ticks.max(1),
            active_ticks: active_ticks.max(1),
            return_ticks: return_ticks.max(1),
            spawn_offsets,
            stage: AttackStage::Windup,
            progress_ticks: 0,
            running: false,
        }
    }

    /// Stage timings in seconds, converted at `ticks_per_second`.
    pub fn for_kind(kind: GuardianAttackKind, ticks_per_second: u32) -> Self {
        let ticks = |seconds: f32| ((seconds * ticks_per_second as f32).round() as u32).max(1);
        match kind {
            GuardianAttackKind::CrystalSlam => {
                let active = ticks(0.4);
                Self::new(kind, ticks(1.0), active, ticks(0.6), vec![0])
            }
            GuardianAttackKind::CrystalBurst => {
                let active = ticks(1.5);
                let offsets = (0..5).map(|shot| shot * active / 5).collect();
                Self::new(kind, ticks(0.8), active, ticks(0.5), offsets)
            }
            GuardianAttackKind::SpikyBallSummon => {
                let active = ticks(1.0);
                Self::new(kind, ticks(1.2), active, ticks(0.8), vec![active / 2])
            }
        }
    }

    pub fn stage(&self) -> AttackStage {
        self.stage
    }

    pub fn progress_ticks(&self) -> u32 {
        self.progress_ticks
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn total_ticks(&self) -> u32 {
        self.windup_ticks + self.active_ticks + self.return_ticks
    }

    fn stage_ticks(&self, stage: AttackStage) -> u32 {
        match stage {
            AttackStage::Windup => self.windup_ticks,
            AttackStage::Active => self.active_ticks,
            AttackStage::Return => self.return_ticks,
        }
    }

    pub fn start(&mut self) {
        self.stage = AttackStage::Windup;
        self.progress_ticks = 0;
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.stage = AttackStage::Windup;
        self.progress_ticks = 0;
        self.running = false;
    }

    /// Spends one tick in the current stage, moving to the next stage once
    /// its tick count is used up.
    pub fn advance(&mut self) -> AttackTick {
        let stage = self.stage;
        let elapsed_before = self.progress_ticks;
        self.progress_ticks += 1;
        let duration = self.stage_ticks(stage);
        let spawns = if stage == AttackStage::Active {
            self.spawn_offsets
                .iter()
                .filter(|offset| **offset == elapsed_before)
                .count() as u32
        } else {
            0
        };
        let progress = self.progress_ticks as f32 / duration as f32;

        let mut finished = false;
        if self.progress_ticks >= duration {
            match stage {
                AttackStage::Windup => {
                    self.stage = AttackStage::Active;
                    self.progress_ticks = 0;
                }
                AttackStage::Active => {
                    self.stage = AttackStage::Return;
                    self.progress_ticks = 0;
                }
                AttackStage::Return => {
                    self.stop();
                    finished = true;
                }
            }
        }

        AttackTick {
            stage,
            progress,
            spawns,
            finished,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_change_at_configured_tick_counts() {
        let mut attack = GuardianAttackAi::new(GuardianAttackKind::CrystalSlam, 3, 2, 4, vec![]);
        attack.start();
        let mut stages = Vec::new();
        let mut finished_at = None;
        for tick in 0..9 {
            let outcome = attack.advance();
            stages.push(outcome.stage);
            if outcome.finished {
                finished_at = Some(tick);
            }
        }
        assert_eq!(
            stages,
            vec![
                AttackStage::Windup,
                AttackStage::Windup,
                AttackStage::Windup,
                AttackStage::Active,
                AttackStage::Active,
                AttackStage::Return,
                AttackStage::Return,
                AttackStage::Return,
                AttackStage::Return,
            ]
        );
        assert_eq!(finished_at, Some(8));
        assert!(!attack.is_running());
        assert_eq!(attack.progress_ticks(), 0);
    }

    #[test]
    fn spawns_fire_at_active_offsets() {
        let mut attack = GuardianAttackAi::new(GuardianAttackKind::CrystalBurst, 1, 4, 1, vec![0, 2, 2]);
        attack.start();
        let spawns = (0..6).map(|_| attack.advance().spawns).collect::<Vec<_>>();
        assert_eq!(spawns, vec![0, 1, 0, 2, 0, 0]);
    }

    #[test]
    fn stop_resets_progress_mid_attack() {
        let mut attack = GuardianAttackAi::for_kind(GuardianAttackKind::SpikyBallSummon, 60);
        attack.start();
        for _ in 0..attack.windup_ticks + 3 {
            attack.advance();
        }
        assert_eq!(attack.stage(), AttackStage::Active);
        assert_eq!(attack.progress_ticks(), 3);
        attack.stop();
        assert_eq!(attack.stage(), AttackStage::Windup);
        assert_eq!(attack.progress_ticks(), 0);
        assert!(!attack.is_running());
    }

    #[test]
    fn tick_counts_follow_rate() {
        let attack = GuardianAttackAi::for_kind(GuardianAttackKind::CrystalSlam, 20);
        assert_eq!(attack.windup_ticks, 20);
        assert_eq!(attack.active_ticks, 8);
        assert_eq!(attack.return_ticks, 12);
    }
}
