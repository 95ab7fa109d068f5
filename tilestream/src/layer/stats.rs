//! Per-layer request statistics.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;

/// Number of recent samples kept for each average.
pub const LATENCY_WINDOW: usize = 64;

/// Snapshot of a layer's statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LayerStatistics {
    pub requests: u64,
    pub cache_hits: u64,
    pub failures: u64,
    pub cancellations: u64,
    /// Mean of the last [`LATENCY_WINDOW`] completed fetches.
    pub average_request: Duration,
    /// Mean of the last [`LATENCY_WINDOW`] renders.
    pub average_render: Duration,
}

impl LayerStatistics {
    pub fn cache_hit_rate(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.requests as f64
        }
    }
}

#[derive(Debug, Default)]
struct Window(VecDeque<Duration>);

impl Window {
    fn push(&mut self, sample: Duration) {
        if self.0.len() == LATENCY_WINDOW {
            self.0.pop_front();
        }
        self.0.push_back(sample);
    }

    fn average(&self) -> Duration {
        if self.0.is_empty() {
            return Duration::ZERO;
        }
        self.0.iter().sum::<Duration>() / self.0.len() as u32
    }
}

#[derive(Debug, Default)]
struct Counters {
    requests: u64,
    cache_hits: u64,
    failures: u64,
    cancellations: u64,
    request_times: Window,
    render_times: Window,
}

#[derive(Debug, Default)]
pub(crate) struct LayerStats {
    inner: Mutex<Counters>,
}

impl LayerStats {
    pub(crate) fn record_request(&self) {
        self.inner.lock().requests += 1;
    }

    pub(crate) fn record_cache_hit(&self) {
        self.inner.lock().cache_hits += 1;
    }

    pub(crate) fn record_failure(&self) {
        self.inner.lock().failures += 1;
    }

    pub(crate) fn record_cancellation(&self) {
        self.inner.lock().cancellations += 1;
    }

    pub(crate) fn record_request_time(&self, elapsed: Duration) {
        self.inner.lock().request_times.push(elapsed);
    }

    pub(crate) fn record_render_time(&self, elapsed: Duration) {
        self.inner.lock().render_times.push(elapsed);
    }

    pub(crate) fn snapshot(&self) -> LayerStatistics {
        let inner = self.inner.lock();
        LayerStatistics {
            requests: inner.requests,
            cache_hits: inner.cache_hits,
            failures: inner.failures,
            cancellations: inner.cancellations,
            average_request: inner.request_times.average(),
            average_render: inner.render_times.average(),
        }
    }
}
