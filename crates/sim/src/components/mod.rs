//! Gameplay components and their lifecycle systems.

pub mod ai_helper;
pub mod cow;
pub mod guardian;
pub mod guardian_projectile;
pub mod guardian_spiky_ball;
pub mod health;
pub mod krumblid;
pub mod player;
pub mod serpent;
pub mod slime;
