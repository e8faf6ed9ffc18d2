//! Control algorithms.
//!
//! Everything in here is pure computation over owned state.  Time is passed
//! in explicitly as a [`Timestamp`] on every call, so simulation, tests and
//! production share identical logic; the service layer obtains it from a
//! [`Clock`](crate::app::ports::Clock).

pub mod adaptive;
pub mod autotune;
pub mod history;
pub mod pid;
pub mod zones;

use serde::{Deserialize, Serialize};

/// Monotonic time in milliseconds.
pub type Timestamp = u64;

/// Proportional, integral and derivative gains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

/// Partial gain change for [`PidController::tune`](pid::PidController::tune).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GainUpdate {
    pub kp: Option<f32>,
    pub ki: Option<f32>,
    pub kd: Option<f32>,
}

impl GainUpdate {
    pub fn all(gains: Gains) -> Self {
        Self {
            kp: Some(gains.kp),
            ki: Some(gains.ki),
            kd: Some(gains.kd),
        }
    }
}

/// A single feedback loop that can back a zone.
pub trait ControlLoop {
    fn update(&mut self, measured: f32, now: Timestamp) -> f32;

    /// The underlying PID loop (setpoint, enable, status).
    fn pid(&self) -> &pid::PidController;

    fn pid_mut(&mut self) -> &mut pid::PidController;
}

impl ControlLoop for pid::PidController {
    fn update(&mut self, measured: f32, now: Timestamp) -> f32 {
        pid::PidController::update(self, measured, now)
    }

    fn pid(&self) -> &pid::PidController {
        self
    }

    fn pid_mut(&mut self) -> &mut pid::PidController {
        self
    }
}

impl<P: adaptive::AdaptationPolicy> ControlLoop for adaptive::AdaptivePidController<P> {
    fn update(&mut self, measured: f32, now: Timestamp) -> f32 {
        adaptive::AdaptivePidController::update(self, measured, now)
    }

    fn pid(&self) -> &pid::PidController {
        self.controller()
    }

    fn pid_mut(&mut self) -> &mut pid::PidController {
        self.controller_mut()
    }
}
