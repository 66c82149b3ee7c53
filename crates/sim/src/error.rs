use std::path::PathBuf;

use thiserror::Error;

use crate::component::ComponentKind;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("entity {entity} has no {component:?} component")]
    MissingComponent {
        entity: u64,
        component: ComponentKind,
    },
    #[error("entity {0} does not exist")]
    UnknownEntity(u64),
    #[error("entity {entity} cannot accept a {command} command")]
    CommandRejected { entity: u64, command: &'static str },
    #[error("spawn position ({x}, {y}) is outside the world")]
    SpawnOutOfBounds { x: f32, y: f32 },
    #[error("{component:?} packet declared {declared} slots but wrote {written}")]
    PacketLengthMismatch {
        component: ComponentKind,
        declared: usize,
        written: usize,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("terrain {layer} count mismatch: expected {expected}, got {actual}")]
    TerrainSizeMismatch {
        layer: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("failed to access snapshot at {path}: {source}")]
    SnapshotIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode or decode snapshot: {0}")]
    SnapshotFormat(#[from] serde_json::Error),
    #[error("snapshot parse error at {path}: {message}")]
    SnapshotParse { path: String, message: String },
    #[error("unsupported snapshot version {found}, expected {expected}")]
    SnapshotVersion { found: u32, expected: u32 },
    #[error("snapshot entity {entity} cannot be restored: {reason}")]
    SnapshotEntity { entity: u64, reason: String },
}
