//! Deterministic, single-threaded entity simulation core: component tables,
//! hitbox physics and tethers, chunked vision, and creature AI.

pub mod ai;
pub mod collision;
pub mod commands;
pub mod component;
pub mod components;
pub mod config;
pub mod entities;
pub mod entity;
pub mod error;
pub mod events;
pub mod geometry;
pub mod hitbox;
pub mod math;
pub mod physics;
pub mod scheduler;
pub mod snapshot;
pub mod spatial;
pub mod terrain;
pub mod tether;
pub mod transform;
pub mod world;

#[cfg(test)]
mod tests;

pub use commands::{CommandApplyStats, PlayerCommand};
pub use component::{ComponentKind, ComponentSystem, COMPONENT_ORDER};
pub use config::SimConfig;
pub use entities::EntityConfig;
pub use entity::{EntityId, EntityType};
pub use error::SimError;
pub use events::{SimEvent, SimEventCounts, SimEventKind};
pub use math::Point;
pub use scheduler::{TickPhase, TickReport};
pub use snapshot::{encode_entity_packet, restore_world, state_digest, EntitySnapshot, WorldSnapshot};
pub use terrain::{Biome, TerrainGrid, TerrainQuery, TileType};
pub use world::World;
