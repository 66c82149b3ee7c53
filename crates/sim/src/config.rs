use serde::{Deserialize, Serialize};

use crate::error::SimError;

pub const DEFAULT_TICKS_PER_SECOND: u32 = 60;
pub const DEFAULT_SEED: u64 = 1;
pub const DEFAULT_VISION_BOUNDS_INTERVAL_TICKS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    pub ticks_per_second: u32,
    pub seed: u64,
    /// How often an AI helper recomputes which chunks its vision covers.
    pub vision_bounds_interval_ticks: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
            seed: DEFAULT_SEED,
            vision_bounds_interval_ticks: DEFAULT_VISION_BOUNDS_INTERVAL_TICKS,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        if self.ticks_per_second == 0 {
            return Err(SimError::InvalidConfig(
                "ticks_per_second must be positive".to_string(),
            ));
        }
        if self.vision_bounds_interval_ticks == 0 {
            return Err(SimError::InvalidConfig(
                "vision_bounds_interval_ticks must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn fixed_dt_seconds(&self) -> f32 {
        1.0 / self.ticks_per_second as f32
    }

    /// Converts a duration to whole ticks, rounding to the nearest tick and never below one.
    pub fn seconds_to_ticks(&self, seconds: f32) -> u32 {
        ((seconds * self.ticks_per_second as f32).round() as u32).max(1)
    }
}
