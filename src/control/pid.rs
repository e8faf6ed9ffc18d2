//! PID controller for light intensity
//!
//! Incremental proportional-integral-derivative loop: each effective update
//! adds the P, I and D terms onto the previous command, so the dimmer level
//! ramps toward whatever holds the measured intensity at the setpoint.
//!
//! Updates closer together than `sample_time_ms`, errors inside the
//! deadband and non-finite measurements all leave the command untouched.

use log::{trace, warn};
use serde::Serialize;

use super::{GainUpdate, Gains, Timestamp};
use crate::config::PidConfig;

/// Mutable loop state, owned by exactly one controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PidState {
    pub last_error: f32,
    pub integral: f32,
    pub last_time: Option<Timestamp>,
    pub last_output: f32,
}

impl PidState {
    fn neutral(config: &PidConfig) -> Self {
        Self {
            last_error: 0.0,
            integral: 0.0,
            last_time: None,
            last_output: config.neutral_output(),
        }
    }
}

/// Read-only snapshot for monitoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PidStatus {
    pub enabled: bool,
    pub setpoint: f32,
    pub gains: Gains,
    pub output_min: f32,
    pub output_max: f32,
    pub deadband: f32,
    pub state: PidState,
    pub rejected_samples: u32,
}

/// PID controller
#[derive(Debug, Clone)]
pub struct PidController {
    config: PidConfig,
    state: PidState,
    enabled: bool,
    rejected_samples: u32,
}

impl PidController {
    pub fn new(config: PidConfig) -> Self {
        let state = PidState::neutral(&config);
        Self {
            config,
            state,
            enabled: true,
            rejected_samples: 0,
        }
    }

    /// Compute the dimmer command for `measured` at time `now`.
    ///
    /// The first update after construction or [`reset`](Self::reset) uses
    /// the nominal sample time as `dt`.
    pub fn update(&mut self, measured: f32, now: Timestamp) -> f32 {
        if !self.enabled {
            return self.state.last_output;
        }
        if !measured.is_finite() {
            self.rejected_samples = self.rejected_samples.saturating_add(1);
            warn!("PID: rejected non-finite measurement {measured}");
            return self.state.last_output;
        }

        let sample_time = u64::from(self.config.sample_time_ms);
        let elapsed_ms = match self.state.last_time {
            Some(last) => {
                let elapsed = now.saturating_sub(last);
                if elapsed < sample_time {
                    return self.state.last_output;
                }
                elapsed
            }
            None => sample_time,
        };

        let error = self.config.setpoint - measured;
        if error.abs() < self.config.deadband {
            self.state.last_time = Some(now);
            return self.state.last_output;
        }

        let dt = elapsed_ms as f32 / 1000.0;
        let guard = self.config.integral_windup_guard.abs();

        // Proportional
        let p = self.config.kp * error;

        // Integral (with anti-windup)
        self.state.integral = bound(self.state.integral + error * dt, -guard, guard);
        let i = self.config.ki * self.state.integral;

        // Derivative
        let d = if dt > 0.0 {
            self.config.kd * (error - self.state.last_error) / dt
        } else {
            0.0
        };

        let raw = self.state.last_output + p + i + d;
        let output = if raw.is_nan() {
            self.state.last_output
        } else {
            bound(raw, self.config.output_min, self.config.output_max)
        };

        trace!(
            "PID: sp={:.1} pv={:.1} e={:.2} P={:.2} I={:.2} D={:.2} out={:.2}",
            self.config.setpoint,
            measured,
            error,
            p,
            i,
            d,
            output
        );

        self.state.last_error = error;
        self.state.last_time = Some(now);
        self.state.last_output = output;
        output
    }

    /// Reset controller state; the command returns to the neutral midpoint.
    pub fn reset(&mut self) {
        self.state = PidState::neutral(&self.config);
    }

    /// Disabling resets the loop and freezes the command until re-enabled.
    pub fn set_enabled(&mut self, enabled: bool) {
        if !enabled {
            self.reset();
        }
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Change the target.  Only the integral is cleared.
    pub fn set_setpoint(&mut self, setpoint: f32) {
        self.config.setpoint = setpoint;
        self.state.integral = 0.0;
    }

    pub fn setpoint(&self) -> f32 {
        self.config.setpoint
    }

    /// Apply new gains and clear the integral.
    pub fn tune(&mut self, update: GainUpdate) {
        self.apply_gains(update);
        self.state.integral = 0.0;
    }

    /// Gain change that keeps the accumulated integral, for slow online
    /// adaptation where clearing it every cycle would disable integral action.
    pub(crate) fn adjust_gains(&mut self, gains: Gains) {
        self.apply_gains(GainUpdate::all(gains));
    }

    /// Start from a known command instead of the midpoint (bumpless hand-over
    /// from manual dimming).
    pub fn preload_output(&mut self, output: f32) {
        if output.is_finite() {
            self.state.last_output = bound(output, self.config.output_min, self.config.output_max);
        }
    }

    pub fn gains(&self) -> Gains {
        self.config.gains()
    }

    pub fn config(&self) -> &PidConfig {
        &self.config
    }

    pub fn state(&self) -> &PidState {
        &self.state
    }

    /// Most recent command.
    pub fn output(&self) -> f32 {
        self.state.last_output
    }

    pub fn status(&self) -> PidStatus {
        PidStatus {
            enabled: self.enabled,
            setpoint: self.config.setpoint,
            gains: self.gains(),
            output_min: self.config.output_min,
            output_max: self.config.output_max,
            deadband: self.config.deadband,
            state: self.state,
            rejected_samples: self.rejected_samples,
        }
    }

    fn apply_gains(&mut self, update: GainUpdate) {
        if let Some(kp) = update.kp {
            self.config.kp = kp;
        }
        if let Some(ki) = update.ki {
            self.config.ki = ki;
        }
        if let Some(kd) = update.kd {
            self.config.kd = kd;
        }
    }
}

/// `clamp` that never panics on an inverted range.
fn bound(value: f32, lo: f32, hi: f32) -> f32 {
    value.max(lo).min(hi)
}
