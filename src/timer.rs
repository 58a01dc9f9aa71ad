//! Performance measurement tools.

use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

/// A rolling average over the duration of recent inference cycles.
///
/// The dispatcher keeps one of these for whole cycles, and backends are expected to keep their
/// own for raw model execution, so both report the same statistic.
pub struct LatencyStats {
    state: Mutex<State>,
}

struct State {
    samples: [Duration; LatencyStats::WINDOW],
    next: usize,
    count: usize,
}

impl LatencyStats {
    /// Number of most recent samples contributing to the average.
    pub const WINDOW: usize = 10;

    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                samples: [Duration::ZERO; Self::WINDOW],
                next: 0,
                count: 0,
            }),
        }
    }

    /// Records the duration of one completed cycle.
    pub fn record(&self, duration: Duration) {
        let mut state = self.state.lock().unwrap();
        let slot = state.next;
        state.samples[slot] = duration;
        state.next = (slot + 1) % Self::WINDOW;
        state.count = state.count.saturating_add(1);
    }

    /// Invokes a closure, measuring and recording the time it takes.
    pub fn time<T>(&self, timee: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = timee();
        self.record(start.elapsed());
        result
    }

    /// Returns the mean duration of the last [`WINDOW`](Self::WINDOW) cycles, in milliseconds.
    ///
    /// Reports 0.0 until a full window of cycles has been recorded, so that early averages do
    /// not swing wildly.
    pub fn average_ms(&self) -> f32 {
        let state = self.state.lock().unwrap();
        if state.count < Self::WINDOW {
            return 0.0;
        }

        let total: Duration = state.samples.iter().sum();
        total.as_secs_f32() * 1000.0 / Self::WINDOW as f32
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}
