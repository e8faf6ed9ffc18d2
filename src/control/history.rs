//! Bounded performance history for online adaptation.
//!
//! Fixed-capacity FIFO (no heap); the oldest sample is evicted when a new
//! one arrives at capacity.

use heapless::Deque;
use serde::Serialize;

use super::Timestamp;

pub const HISTORY_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerformanceSample {
    pub time: Timestamp,
    pub abs_error: f32,
    /// Amount by which the measurement exceeded the setpoint (never negative).
    pub overshoot: f32,
}

/// Averages over the most recent samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSummary {
    pub avg_error: f32,
    pub avg_overshoot: f32,
}

#[derive(Debug, Default)]
pub struct PerformanceHistory {
    samples: Deque<PerformanceSample, HISTORY_CAPACITY>,
}

impl PerformanceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: PerformanceSample) {
        if self.samples.is_full() {
            self.samples.pop_front();
        }
        // Cannot fail: a slot was freed above.
        let _ = self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &PerformanceSample> {
        self.samples.iter()
    }

    /// Summary of the last `n` samples, or `None` while fewer are held.
    pub fn recent(&self, n: usize) -> Option<WindowSummary> {
        let len = self.samples.len();
        if n == 0 || len < n {
            return None;
        }
        let (err_sum, over_sum) = self
            .samples
            .iter()
            .skip(len - n)
            .fold((0.0_f32, 0.0_f32), |(e, o), s| (e + s.abs_error, o + s.overshoot));
        Some(WindowSummary {
            avg_error: err_sum / n as f32,
            avg_overshoot: over_sum / n as f32,
        })
    }

    /// Mean absolute error over everything held.
    pub fn average_error(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(|s| s.abs_error).sum::<f32>() / self.samples.len() as f32
    }

    pub fn max_overshoot(&self) -> f32 {
        self.samples
            .iter()
            .map(|s| s.overshoot)
            .fold(0.0, f32::max)
    }
}
