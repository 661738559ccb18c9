use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

static METRICS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_metrics_lock_poison_once(operation: &'static str) {
    if METRICS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "metrics lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    /// Cycles completed per wall-clock second.
    pub cps: f32,
    /// Mean time spent in phases and rendering per cycle.
    pub cycle_time_ms: f32,
    /// Cycles whose work took longer than the cycle budget.
    pub overruns: u32,
    pub callback_failures: u32,
}

/// Latest loop metrics, readable from any thread.
#[derive(Clone, Debug)]
pub struct MetricsHandle {
    snapshot: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl Default for MetricsHandle {
    fn default() -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(LoopMetricsSnapshot::default())),
        }
    }
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                *guard = snapshot;
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval_start: Instant,
    interval: Duration,
    cycles: u32,
    overruns: u32,
    callback_failures: u32,
    work_time_sum: Duration,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval_start: Instant::now(),
            interval,
            cycles: 0,
            overruns: 0,
            callback_failures: 0,
            work_time_sum: Duration::ZERO,
        }
    }

    pub(crate) fn record_cycle(&mut self, work: Duration, budget: Duration, failures: usize) {
        self.cycles = self.cycles.saturating_add(1);
        self.work_time_sum = self.work_time_sum.saturating_add(work);
        if work > budget {
            self.overruns = self.overruns.saturating_add(1);
        }
        let failures = u32::try_from(failures).unwrap_or(u32::MAX);
        self.callback_failures = self.callback_failures.saturating_add(failures);
    }

    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let cycle_time_ms = if self.cycles == 0 {
            0.0
        } else {
            (self.work_time_sum.as_secs_f32() / self.cycles as f32) * 1000.0
        };

        let snapshot = LoopMetricsSnapshot {
            cps: self.cycles as f32 / elapsed_seconds,
            cycle_time_ms,
            overruns: self.overruns,
            callback_failures: self.callback_failures,
        };

        self.interval_start = now;
        self.cycles = 0;
        self.overruns = 0;
        self.callback_failures = 0;
        self.work_time_sum = Duration::ZERO;

        Some(snapshot)
    }
}
