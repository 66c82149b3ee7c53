use std::sync::{Arc, LockResult, Mutex};
use std::time::{Duration, Instant};

use tracing::warn;

/// Per-interval server statistics. Rates and averages cover the last interval only.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ServerMetricsSnapshot {
    pub tps: f32,
    pub tick_time_ms: f32,
    pub entity_count: usize,
    pub dirty_entities_per_tick: f32,
    pub replicated_bytes_per_second: f32,
    pub total_ticks: u64,
}

/// Everything published so far: the latest interval plus running peaks.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ServerStats {
    pub latest: ServerMetricsSnapshot,
    pub intervals_published: u64,
    pub peak_tick_time_ms: f32,
    pub peak_entity_count: usize,
}

impl ServerStats {
    fn absorb(&mut self, snapshot: ServerMetricsSnapshot) {
        self.latest = snapshot;
        self.intervals_published = self.intervals_published.saturating_add(1);
        self.peak_tick_time_ms = self.peak_tick_time_ms.max(snapshot.tick_time_ms);
        self.peak_entity_count = self.peak_entity_count.max(snapshot.entity_count);
    }
}

/// Cloneable view of the loop's published stats, readable from other threads.
#[derive(Clone, Debug, Default)]
pub struct ServerStatsHandle {
    stats: Arc<Mutex<ServerStats>>,
}

impl ServerStatsHandle {
    pub fn stats(&self) -> ServerStats {
        *recover(self.stats.lock(), "read")
    }

    pub fn snapshot(&self) -> ServerMetricsSnapshot {
        self.stats().latest
    }

    pub(crate) fn publish(&self, snapshot: ServerMetricsSnapshot) {
        recover(self.stats.lock(), "publish").absorb(snapshot);
    }
}

/// Poisoned locks still hold a whole `ServerStats`.
fn recover<G>(result: LockResult<G>, operation: &'static str) -> G {
    result.unwrap_or_else(|poisoned| {
        warn!(operation, "server_stats_lock_poisoned");
        poisoned.into_inner()
    })
}

#[derive(Debug, Default)]
struct IntervalCounters {
    ticks: u32,
    tick_time: Duration,
    dirty_entities: u64,
    replicated_bytes: u64,
}

/// Folds per-tick measurements into one snapshot per interval.
#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval: Duration,
    interval_start: Instant,
    current: IntervalCounters,
    total_ticks: u64,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            interval_start: start,
            current: IntervalCounters::default(),
            total_ticks: 0,
        }
    }

    pub(crate) fn record_tick(&mut self, tick_time: Duration, dirty_entities: usize, replicated_bytes: usize) {
        let current = &mut self.current;
        current.ticks = current.ticks.saturating_add(1);
        current.tick_time = current.tick_time.saturating_add(tick_time);
        current.dirty_entities = current.dirty_entities.saturating_add(dirty_entities as u64);
        current.replicated_bytes = current.replicated_bytes.saturating_add(replicated_bytes as u64);
        self.total_ticks = self.total_ticks.saturating_add(1);
    }

    pub(crate) fn maybe_snapshot(&mut self, now: Instant, entity_count: usize) -> Option<ServerMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }
        self.interval_start = now;
        let finished = std::mem::take(&mut self.current);

        let seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let per_tick = |total: f32| {
            if finished.ticks == 0 {
                0.0
            } else {
                total / finished.ticks as f32
            }
        };
        Some(ServerMetricsSnapshot {
            tps: finished.ticks as f32 / seconds,
            tick_time_ms: per_tick(finished.tick_time.as_secs_f32() * 1000.0),
            entity_count,
            dirty_entities_per_tick: per_tick(finished.dirty_entities as f32),
            replicated_bytes_per_second: finished.replicated_bytes as f32 / seconds,
            total_ticks: self.total_ticks,
        })
    }
}
