//! Self-tuning PID wrapper.
//!
//! [`AdaptivePidController`] owns a plain [`PidController`] plus a bounded
//! [`PerformanceHistory`].  After every update it hands a summary of the
//! most recent window to an [`AdaptationPolicy`], which may nudge the gains.
//! The default [`BoundedNudgePolicy`] changes each gain by a small fixed
//! fraction per cycle and keeps every gain inside a hard range, so a live
//! fixture never sees a large gain jump.

use log::debug;
use serde::Serialize;

use super::history::{PerformanceHistory, PerformanceSample, WindowSummary};
use super::pid::PidController;
use super::{Gains, Timestamp};
use crate::config::{AdaptiveConfig, PidConfig};

/// Strategy deciding new gains from recent performance.
pub trait AdaptationPolicy {
    fn adapt(&self, window: &WindowSummary, gains: Gains, deadband: f32) -> Gains;
}

/// Multiplicative nudges bounded to fixed gain ranges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundedNudgePolicy {
    pub rate: f32,
}

impl BoundedNudgePolicy {
    pub const KP_RANGE: (f32, f32) = (0.1, 10.0);
    pub const KI_RANGE: (f32, f32) = (0.0, 2.0);
    pub const KD_RANGE: (f32, f32) = (0.0, 1.0);

    pub fn new(rate: f32) -> Self {
        Self { rate }
    }
}

impl Default for BoundedNudgePolicy {
    fn default() -> Self {
        Self::new(AdaptiveConfig::default().adaptation_rate)
    }
}

impl AdaptationPolicy for BoundedNudgePolicy {
    fn adapt(&self, w: &WindowSummary, gains: Gains, deadband: f32) -> Gains {
        let up = 1.0 + self.rate;
        let down = 1.0 - self.rate;
        let mut next = gains;

        if w.avg_error > 2.0 * deadband {
            // Sluggish: push harder.
            next.kp *= up;
        } else if w.avg_overshoot > deadband {
            next.kp *= down;
        }
        if w.avg_error > deadband && w.avg_overshoot < deadband {
            // Persistent offset without overshoot.
            next.ki *= up;
        }
        if w.avg_overshoot > 2.0 * deadband {
            next.kd *= up;
        }

        next.kp = next.kp.clamp(Self::KP_RANGE.0, Self::KP_RANGE.1);
        next.ki = next.ki.clamp(Self::KI_RANGE.0, Self::KI_RANGE.1);
        next.kd = next.kd.clamp(Self::KD_RANGE.0, Self::KD_RANGE.1);
        next
    }
}

/// Snapshot of the adaptation loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdaptationMetrics {
    pub average_error: f32,
    pub max_overshoot: f32,
    pub current_gains: Gains,
    pub adaptation_enabled: bool,
    pub samples: usize,
    pub adjustments: u32,
}

pub struct AdaptivePidController<P: AdaptationPolicy = BoundedNudgePolicy> {
    pid: PidController,
    history: PerformanceHistory,
    policy: P,
    window: usize,
    enabled: bool,
    adjustments: u32,
}

impl AdaptivePidController<BoundedNudgePolicy> {
    pub fn new(config: PidConfig, adaptive: &AdaptiveConfig) -> Self {
        let mut this = Self::with_policy(
            config,
            BoundedNudgePolicy::new(adaptive.adaptation_rate),
            adaptive.window,
        );
        this.enabled = adaptive.enabled;
        this
    }
}

impl<P: AdaptationPolicy> AdaptivePidController<P> {
    pub fn with_policy(config: PidConfig, policy: P, window: usize) -> Self {
        Self {
            pid: PidController::new(config),
            history: PerformanceHistory::new(),
            policy,
            window,
            enabled: true,
            adjustments: 0,
        }
    }

    /// Run the base loop, record performance, then let the policy adapt.
    pub fn update(&mut self, measured: f32, now: Timestamp) -> f32 {
        let output = self.pid.update(measured, now);
        if !measured.is_finite() {
            return output;
        }

        let setpoint = self.pid.setpoint();
        self.history.push(PerformanceSample {
            time: now,
            abs_error: (setpoint - measured).abs(),
            overshoot: (measured - setpoint).max(0.0),
        });

        if self.enabled {
            if let Some(window) = self.history.recent(self.window) {
                let gains = self.pid.gains();
                let next = self.policy.adapt(&window, gains, self.pid.config().deadband);
                if next != gains {
                    debug!(
                        "adaptive: kp {:.3}->{:.3} ki {:.3}->{:.3} kd {:.3}->{:.3}",
                        gains.kp, next.kp, gains.ki, next.ki, gains.kd, next.kd
                    );
                    self.pid.adjust_gains(next);
                    self.adjustments = self.adjustments.saturating_add(1);
                }
            }
        }
        output
    }

    /// Toggle adaptation; the base loop keeps running either way.
    pub fn set_adaptation_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_adaptation_enabled(&self) -> bool {
        self.enabled
    }

    pub fn adaptation_metrics(&self) -> AdaptationMetrics {
        AdaptationMetrics {
            average_error: self.history.average_error(),
            max_overshoot: self.history.max_overshoot(),
            current_gains: self.pid.gains(),
            adaptation_enabled: self.enabled,
            samples: self.history.len(),
            adjustments: self.adjustments,
        }
    }

    pub fn controller(&self) -> &PidController {
        &self.pid
    }

    /// Setpoint, enable and manual tuning go through the base controller.
    pub fn controller_mut(&mut self) -> &mut PidController {
        &mut self.pid
    }

    pub fn history(&self) -> &PerformanceHistory {
        &self.history
    }
}
