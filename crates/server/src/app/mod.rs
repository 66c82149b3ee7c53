mod bootstrap;
mod config;
mod loop_runner;
mod metrics;
mod scenario;

pub use bootstrap::{build_app, wire_from_overrides, ServerWiring};
pub use config::{
    ConfigError, EnvOverrides, MAX_TICKS_ENV_VAR, SCENARIO_ENV_VAR, SEED_ENV_VAR,
    SNAPSHOT_OUT_ENV_VAR, TPS_ENV_VAR,
};
pub use loop_runner::{
    replicated_bytes, run_server, run_server_with_metrics, FrameOutcome, LoopConfig, ServerError,
    ServerLoop, ServerSummary,
};
pub use metrics::{ServerMetricsSnapshot, ServerStats, ServerStatsHandle};
pub use scenario::{Scenario, SpawnEntry, SpawnKind, TerrainRect, WallRect};
