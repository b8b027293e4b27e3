use std::time::Duration;

use serde::Serialize;

pub const FAST_POLL_INTERVAL: Duration = Duration::from_millis(5_000);
pub const SLOW_POLL_INTERVAL: Duration = Duration::from_millis(30_000);

/// Pool size at which polling backs off for good.
const SLOW_MODE_POOL_SIZE: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkMetrics {
    pub mixnode_pool_size: u64,
    pub lightpush_peers_count: u64,
    pub poll_interval_ms: u64,
    pub slow_mode_engaged: bool,
}

impl Default for NetworkMetrics {
    fn default() -> Self {
        Self {
            mixnode_pool_size: 0,
            lightpush_peers_count: 0,
            poll_interval_ms: FAST_POLL_INTERVAL.as_millis() as u64,
            slow_mode_engaged: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum PollState {
    Stopped,
    Fast,
    Slow,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(super) struct PoolSizeUpdate {
    pub(super) changed: bool,
    pub(super) engaged_slow_mode: bool,
}

/// Adaptive poll cadence plus the last values the backend reported.
/// Slow mode is a one-way latch.
pub(super) struct MetricsPoller {
    running: bool,
    metrics: NetworkMetrics,
}

impl MetricsPoller {
    pub(super) fn new() -> Self {
        Self {
            running: false,
            metrics: NetworkMetrics::default(),
        }
    }

    pub(super) fn start(&mut self) {
        if !self.running {
            self.running = true;
            log::debug!("Metrics polling started every {:?}", self.cadence());
        }
    }

    pub(super) fn stop(&mut self) {
        if self.running {
            self.running = false;
            log::debug!("Metrics polling stopped");
        }
    }

    pub(super) fn state(&self) -> PollState {
        match (self.running, self.metrics.slow_mode_engaged) {
            (false, _) => PollState::Stopped,
            (true, false) => PollState::Fast,
            (true, true) => PollState::Slow,
        }
    }

    /// Timer period while running, `None` when stopped.
    pub(super) fn interval(&self) -> Option<Duration> {
        match self.state() {
            PollState::Stopped => None,
            PollState::Fast | PollState::Slow => Some(self.cadence()),
        }
    }

    pub(super) fn metrics(&self) -> &NetworkMetrics {
        &self.metrics
    }

    pub(super) fn record_mixnode_pool_size(&mut self, size: u64) -> PoolSizeUpdate {
        let mut update = PoolSizeUpdate {
            changed: self.metrics.mixnode_pool_size != size,
            engaged_slow_mode: false,
        };
        self.metrics.mixnode_pool_size = size;

        if size >= SLOW_MODE_POOL_SIZE && !self.metrics.slow_mode_engaged {
            self.metrics.slow_mode_engaged = true;
            self.metrics.poll_interval_ms = SLOW_POLL_INTERVAL.as_millis() as u64;
            update.engaged_slow_mode = true;
        }
        update
    }

    /// Returns true when the stored count changed.
    pub(super) fn record_lightpush_peers_count(&mut self, count: u64) -> bool {
        let changed = self.metrics.lightpush_peers_count != count;
        self.metrics.lightpush_peers_count = count;
        changed
    }

    fn cadence(&self) -> Duration {
        if self.metrics.slow_mode_engaged {
            SLOW_POLL_INTERVAL
        } else {
            FAST_POLL_INTERVAL
        }
    }
}
