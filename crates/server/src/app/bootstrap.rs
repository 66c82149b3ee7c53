use frost_sim::{SimConfig, World};
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::config::EnvOverrides;
use super::loop_runner::{LoopConfig, ServerError};
use super::scenario::Scenario;

pub struct ServerWiring {
    pub config: LoopConfig,
    pub world: World,
}

pub fn build_app() -> Result<ServerWiring, ServerError> {
    init_tracing();
    info!("=== Frost Server Startup ===");

    let overrides = EnvOverrides::from_env()?;
    wire_from_overrides(&overrides)
}

/// Resolves the scenario and both configs, then builds the populated world.
pub fn wire_from_overrides(overrides: &EnvOverrides) -> Result<ServerWiring, ServerError> {
    let scenario = match &overrides.scenario_path {
        Some(path) => Scenario::load(path)?,
        None => {
            info!("no scenario configured; using builtin arena");
            Scenario::builtin()
        }
    };

    let defaults = LoopConfig::default();
    let target_tps = overrides.target_tps.unwrap_or(defaults.target_tps);
    let sim_config = SimConfig {
        ticks_per_second: target_tps,
        seed: overrides.seed.unwrap_or(SimConfig::default().seed),
        ..SimConfig::default()
    };
    sim_config.validate()?;

    let world = scenario.build_world(sim_config)?;
    let config = LoopConfig {
        target_tps,
        tick_limit: overrides.max_ticks,
        snapshot_out: overrides.snapshot_out.clone(),
        ..defaults
    };

    Ok(ServerWiring { config, world })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
