use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use frost_sim::{encode_entity_packet, state_digest, SimError, TickReport, World, WorldSnapshot};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::config::ConfigError;
use super::metrics::{MetricsAccumulator, ServerMetricsSnapshot, ServerStatsHandle};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    /// Stop after this many ticks. `None` runs until the process is killed.
    pub tick_limit: Option<u64>,
    /// Where to write a world snapshot on shutdown.
    pub snapshot_out: Option<PathBuf>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            tick_limit: None,
            snapshot_out: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("simulation failed: {0}")]
    Sim(#[from] SimError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerSummary {
    pub ticks_run: u64,
    pub entity_count: usize,
    pub state_digest: String,
    pub last_metrics: ServerMetricsSnapshot,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameOutcome {
    pub ticks_run: u32,
    pub dropped_backlog: Duration,
}

/// Owns the world and turns wall-clock frame deltas into fixed ticks.
pub struct ServerLoop {
    world: World,
    fixed_dt: Duration,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
    accumulator: Duration,
    tick_limit: Option<u64>,
    ticks_run: u64,
    metrics: MetricsAccumulator,
    metrics_handle: ServerStatsHandle,
}

impl ServerLoop {
    pub fn new(config: &LoopConfig, world: World, metrics_handle: ServerStatsHandle, start: Instant) -> Self {
        let target_tps = config.target_tps.max(1);
        let metrics_log_interval =
            normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
        Self {
            world,
            fixed_dt: Duration::from_secs_f64(1.0 / target_tps as f64),
            max_frame_delta: normalize_non_zero_duration(
                config.max_frame_delta,
                Duration::from_millis(250),
            ),
            max_ticks_per_frame: config.max_ticks_per_frame.max(1),
            accumulator: Duration::ZERO,
            tick_limit: config.tick_limit,
            ticks_run: 0,
            metrics: MetricsAccumulator::new(metrics_log_interval, start),
            metrics_handle,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn into_world(self) -> World {
        self.world
    }

    pub fn ticks_run(&self) -> u64 {
        self.ticks_run
    }

    pub fn is_finished(&self) -> bool {
        self.tick_limit.is_some_and(|limit| self.ticks_run >= limit)
    }

    pub fn time_until_next_tick(&self) -> Duration {
        self.fixed_dt.saturating_sub(self.accumulator)
    }

    pub fn advance(&mut self, raw_frame_dt: Duration) -> FrameOutcome {
        let frame_dt = clamp_frame_delta(raw_frame_dt, self.max_frame_delta);
        self.accumulator = self.accumulator.saturating_add(frame_dt);

        let step_plan = plan_sim_steps(self.accumulator, self.fixed_dt, self.max_ticks_per_frame);
        let remaining = self
            .tick_limit
            .map(|limit| limit.saturating_sub(self.ticks_run))
            .unwrap_or(u64::MAX);
        let ticks_to_run = (step_plan.ticks_to_run as u64).min(remaining) as u32;
        for _ in 0..ticks_to_run {
            self.run_tick();
        }
        self.accumulator = step_plan.remaining_accumulator;

        if step_plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame = self.max_ticks_per_frame,
                "sim_clamp_triggered"
            );
        }

        FrameOutcome {
            ticks_run: ticks_to_run,
            dropped_backlog: step_plan.dropped_backlog,
        }
    }

    fn run_tick(&mut self) {
        let started = Instant::now();
        let report = self.world.tick();
        let tick_time = started.elapsed();
        let bytes = replicated_bytes(&self.world);
        self.ticks_run = self.ticks_run.saturating_add(1);
        self.metrics
            .record_tick(tick_time, self.world.dirty_entities().len(), bytes);
        log_tick_report(&report);
    }

    pub fn maybe_publish_metrics(&mut self, now: Instant) -> Option<ServerMetricsSnapshot> {
        let snapshot = self.metrics.maybe_snapshot(now, self.world.entity_count())?;
        self.metrics_handle.publish(snapshot);
        info!(
            tps = snapshot.tps,
            tick_time_ms = snapshot.tick_time_ms,
            entity_count = snapshot.entity_count,
            dirty_entities_per_tick = snapshot.dirty_entities_per_tick,
            replicated_bytes_per_second = snapshot.replicated_bytes_per_second,
            tick = self.world.tick_count(),
            "loop_metrics"
        );
        Some(snapshot)
    }
}

fn log_tick_report(report: &TickReport) {
    if report.failed_updates > 0 || report.commands.rejected > 0 {
        warn!(
            tick = report.tick,
            failed_updates = report.failed_updates,
            rejected_commands = report.commands.rejected,
            "tick_had_failures"
        );
    } else {
        debug!(
            tick = report.tick,
            joined = report.joined,
            removed = report.removed,
            hitbox_collisions = report.hitbox_collisions,
            wall_collisions = report.wall_collisions,
            "tick_complete"
        );
    }
}

/// Bytes needed to send every entity dirtied by the last tick to one observer.
pub fn replicated_bytes(world: &World) -> usize {
    world
        .dirty_entities()
        .iter()
        .filter_map(|entity| match encode_entity_packet(world, *entity) {
            Ok(packet) => Some(packet.len()),
            Err(SimError::UnknownEntity(_)) => None,
            Err(error) => {
                warn!(entity = entity.0, error = %error, "packet_encode_failed");
                None
            }
        })
        .sum()
}

pub fn run_server(config: LoopConfig, world: World) -> Result<ServerSummary, ServerError> {
    run_server_with_metrics(config, world, ServerStatsHandle::default())
}

pub fn run_server_with_metrics(
    config: LoopConfig,
    world: World,
    metrics_handle: ServerStatsHandle,
) -> Result<ServerSummary, ServerError> {
    info!(
        target_tps = config.target_tps.max(1),
        max_frame_delta_ms = config.max_frame_delta.as_millis() as u64,
        max_ticks_per_frame = config.max_ticks_per_frame.max(1),
        metrics_log_interval_ms = config.metrics_log_interval.as_millis() as u64,
        tick_limit = ?config.tick_limit,
        "loop_config"
    );

    let mut last_frame_instant = Instant::now();
    let mut server = ServerLoop::new(&config, world, metrics_handle.clone(), last_frame_instant);
    while !server.is_finished() {
        let now = Instant::now();
        let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
        last_frame_instant = now;

        server.advance(raw_frame_dt);
        server.maybe_publish_metrics(now);
        if !server.is_finished() {
            thread::sleep(server.time_until_next_tick());
        }
    }

    let ticks_run = server.ticks_run();
    let world = server.into_world();
    let digest = state_digest(&world)?;
    if let Some(path) = &config.snapshot_out {
        WorldSnapshot::capture(&world).save(path)?;
    }
    info!(
        ticks_run,
        entity_count = world.entity_count(),
        state_digest = digest.as_str(),
        "shutdown"
    );

    Ok(ServerSummary {
        ticks_run,
        entity_count: world.entity_count(),
        state_digest: digest,
        last_metrics: metrics_handle.snapshot(),
    })
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use frost_sim::{SimConfig, WorldSnapshot};

    use super::super::scenario::Scenario;
    use super::*;

    fn test_world() -> World {
        Scenario::builtin()
            .build_world(SimConfig {
                ticks_per_second: 50,
                seed: 9,
                ..SimConfig::default()
            })
            .expect("world")
    }

    fn fifty_tps(tick_limit: Option<u64>) -> LoopConfig {
        LoopConfig {
            target_tps: 50,
            tick_limit,
            ..LoopConfig::default()
        }
    }

    #[test]
    fn frame_delta_is_clamped() {
        let max_frame_delta = Duration::from_millis(250);
        let raw_frame_dt = Duration::from_millis(600);

        assert_eq!(
            clamp_frame_delta(raw_frame_dt, max_frame_delta),
            max_frame_delta
        );
    }

    #[test]
    fn zero_durations_fall_back() {
        assert_eq!(
            normalize_non_zero_duration(Duration::ZERO, Duration::from_secs(1)),
            Duration::from_secs(1)
        );
        assert_eq!(
            normalize_non_zero_duration(Duration::from_millis(5), Duration::from_secs(1)),
            Duration::from_millis(5)
        );
    }

    #[test]
    fn plan_sim_steps_runs_expected_ticks_without_drop() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(48), fixed_dt, 5);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_keeps_partial_tick_in_accumulator() {
        let fixed_dt = Duration::from_millis(20);
        let result = plan_sim_steps(Duration::from_millis(50), fixed_dt, 5);

        assert_eq!(result.ticks_to_run, 2);
        assert_eq!(result.remaining_accumulator, Duration::from_millis(10));
        assert_eq!(result.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_drops_backlog_when_tick_cap_hit() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(120), fixed_dt, 3);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::from_millis(72));
    }

    #[test]
    fn advance_accumulates_partial_frames() {
        let mut server = ServerLoop::new(&fifty_tps(None), test_world(), ServerStatsHandle::default(), Instant::now());

        assert_eq!(server.advance(Duration::from_millis(10)).ticks_run, 0);
        assert_eq!(server.time_until_next_tick(), Duration::from_millis(10));
        assert_eq!(server.advance(Duration::from_millis(50)).ticks_run, 3);
        assert_eq!(server.world().tick_count(), 3);
    }

    #[test]
    fn advance_clamps_catch_up_and_drops_backlog() {
        let mut server = ServerLoop::new(&fifty_tps(None), test_world(), ServerStatsHandle::default(), Instant::now());

        let outcome = server.advance(Duration::from_millis(200));
        assert_eq!(outcome.ticks_run, 5);
        assert_eq!(outcome.dropped_backlog, Duration::from_millis(100));
        assert_eq!(server.time_until_next_tick(), Duration::from_millis(20));
    }

    #[test]
    fn tick_limit_stops_mid_frame() {
        let mut server = ServerLoop::new(&fifty_tps(Some(4)), test_world(), ServerStatsHandle::default(), Instant::now());

        assert_eq!(server.advance(Duration::from_millis(100)).ticks_run, 4);
        assert!(server.is_finished());
        assert_eq!(server.advance(Duration::from_millis(100)).ticks_run, 0);
        assert_eq!(server.ticks_run(), 4);
    }

    #[test]
    fn metrics_are_published_to_the_handle() {
        let start = Instant::now();
        let handle = ServerStatsHandle::default();
        let mut server = ServerLoop::new(&fifty_tps(None), test_world(), handle.clone(), start);
        server.advance(Duration::from_millis(100));

        assert!(server.maybe_publish_metrics(start + Duration::from_millis(500)).is_none());
        let snapshot = server
            .maybe_publish_metrics(start + Duration::from_secs(1))
            .expect("metrics");
        assert_eq!(snapshot.total_ticks, 5);
        assert_eq!(snapshot.entity_count, server.world().entity_count());
        assert_eq!(handle.snapshot(), snapshot);
        assert_eq!(handle.stats().intervals_published, 1);
    }

    #[test]
    fn dirty_entities_produce_replicated_bytes() {
        let mut world = test_world();
        assert_eq!(replicated_bytes(&world), 0);
        for _ in 0..300 {
            world.tick();
            if world.dirty_entities().is_empty() {
                continue;
            }
            let expected: usize = world
                .dirty_entities()
                .iter()
                .map(|entity| encode_entity_packet(&world, *entity).expect("packet").len())
                .sum();
            assert!(expected > 0);
            assert_eq!(replicated_bytes(&world), expected);
            return;
        }
        panic!("no entity became dirty");
    }

    #[test]
    fn run_server_stops_at_tick_limit_and_writes_snapshot() {
        let dir = tempfile::tempdir().expect("temp dir");
        let snapshot_path = dir.path().join("final.json");
        let config = LoopConfig {
            target_tps: 200,
            tick_limit: Some(20),
            snapshot_out: Some(snapshot_path.clone()),
            ..LoopConfig::default()
        };

        let summary = run_server(config, test_world()).expect("server run");
        assert_eq!(summary.ticks_run, 20);

        let saved = WorldSnapshot::load(&snapshot_path).expect("snapshot");
        assert_eq!(saved.tick, 20);
        assert_eq!(saved.digest().expect("digest"), summary.state_digest);
    }
}
