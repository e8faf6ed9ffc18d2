//! Ziegler-Nichols auto-tuner using gain escalation.
//!
//! The wrapped controller runs proportional-only, starting from a
//! conservative gain.  Peaks are recorded whenever the measurement moves
//! further than `peak_threshold` away from the last recorded peak; the time
//! between consecutive peaks is one oscillation period.  Once enough periods
//! are collected at one gain, that gain is taken as the critical gain `Ku`
//! and the classic relations are applied:
//!
//! ```text
//! kp = 0.6 * Ku      ki = 2 * kp / Tu      kd = kp * Tu / 8
//! ```
//!
//! Escalation only happens while no period has been recorded: if none shows
//! up within `escalation_timeout_ms` of the start (or of the previous
//! escalation), the gain is multiplied by `gain_step`.  Once oscillation has
//! been seen the gain is held, however long the next peak takes.  Escalating
//! past `max_gain` aborts the experiment and restores the previous gains.

use heapless::Vec;
use log::{info, warn};
use serde::Serialize;

use super::pid::PidController;
use super::{GainUpdate, Gains, Timestamp};
use crate::config::AutoTuneConfig;

/// Upper bound on `AutoTuneConfig::required_periods`.
pub const MAX_PERIODS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TuneState {
    Idle,
    Running,
    Converged,
    Failed(TuneFailure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TuneFailure {
    /// The gain ceiling was reached without sustained oscillation.
    GainCeiling,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Peak {
    value: f32,
    time: Timestamp,
}

/// Ephemeral experiment state, alive only while running.
#[derive(Debug, Clone)]
pub struct TuningSession {
    last_peak: Option<Peak>,
    /// Seconds between consecutive peaks at the current gain.
    periods: Vec<f32, MAX_PERIODS>,
    started_at: Timestamp,
    /// Start of the current escalation window.
    window_start: Timestamp,
    gain: f32,
    escalations: u32,
}

impl TuningSession {
    fn new(gain: f32, now: Timestamp) -> Self {
        Self {
            last_peak: None,
            periods: Vec::new(),
            started_at: now,
            window_start: now,
            gain,
            escalations: 0,
        }
    }

    /// Record `measured` as a peak if it diverged far enough.
    /// Returns `true` when a new period was recorded.
    fn observe(&mut self, measured: f32, now: Timestamp, threshold: f32) -> bool {
        match self.last_peak {
            None => {
                self.last_peak = Some(Peak {
                    value: measured,
                    time: now,
                });
                false
            }
            Some(peak) if (measured - peak.value).abs() > threshold => {
                self.last_peak = Some(Peak {
                    value: measured,
                    time: now,
                });
                let elapsed = now.saturating_sub(peak.time);
                if elapsed == 0 {
                    return false;
                }
                self.periods.push(elapsed as f32 / 1000.0).is_ok()
            }
            Some(_) => false,
        }
    }

    fn average_period(&self) -> f32 {
        self.periods.iter().sum::<f32>() / self.periods.len() as f32
    }
}

/// What the experiment measured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TuneOutcome {
    pub critical_gain: f32,
    pub average_period_s: f32,
    pub periods: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TuneResults {
    pub is_complete: bool,
    pub state: TuneState,
    /// Gains currently applied to the controller.
    pub gains: Gains,
    /// Oscillation periods recorded (so far, or at convergence).
    pub oscillation_count: usize,
    pub outcome: Option<TuneOutcome>,
}

pub struct AutoTuner {
    pid: PidController,
    config: AutoTuneConfig,
    state: TuneState,
    session: Option<TuningSession>,
    saved_gains: Gains,
    outcome: Option<TuneOutcome>,
}

impl AutoTuner {
    pub fn new(pid: PidController, config: AutoTuneConfig) -> Self {
        let saved_gains = pid.gains();
        Self {
            pid,
            config,
            state: TuneState::Idle,
            session: None,
            saved_gains,
            outcome: None,
        }
    }

    /// Begin a fresh experiment at the initial proportional gain.
    pub fn start(&mut self, now: Timestamp) {
        if self.state != TuneState::Running {
            self.saved_gains = self.pid.gains();
        }
        self.pid.tune(GainUpdate::all(Gains {
            kp: self.config.initial_gain,
            ki: 0.0,
            kd: 0.0,
        }));
        self.session = Some(TuningSession::new(self.config.initial_gain, now));
        self.outcome = None;
        self.state = TuneState::Running;
        info!("autotune: started at kp={:.3}", self.config.initial_gain);
    }

    /// Drive one cycle.  Returns `true` once the experiment has converged.
    pub fn update(&mut self, measured: f32, now: Timestamp) -> bool {
        let Some(session) = self.session.as_mut() else {
            return self.state == TuneState::Converged;
        };
        self.pid.update(measured, now);
        if !measured.is_finite() {
            return false;
        }

        if session.observe(measured, now, self.config.peak_threshold) {
            if session.periods.len() >= self.config.required_periods {
                self.converge();
                return true;
            }
        } else if session.periods.is_empty()
            && now.saturating_sub(session.window_start) > self.config.escalation_timeout_ms
        {
            self.escalate(now);
        }
        false
    }

    /// Abort unconditionally.  A running experiment hands back the gains
    /// that were active before [`start`](Self::start).
    pub fn stop(&mut self) {
        if self.state == TuneState::Running {
            self.pid.tune(GainUpdate::all(self.saved_gains));
            info!("autotune: stopped, gains restored");
        }
        self.session = None;
        self.state = TuneState::Idle;
    }

    pub fn results(&self) -> TuneResults {
        let oscillation_count = match (&self.session, &self.outcome) {
            (Some(s), _) => s.periods.len(),
            (None, Some(o)) => o.periods,
            (None, None) => 0,
        };
        TuneResults {
            is_complete: self.state == TuneState::Converged,
            state: self.state,
            gains: self.pid.gains(),
            oscillation_count,
            outcome: self.outcome,
        }
    }

    pub fn state(&self) -> TuneState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TuneState::Running
    }

    /// Proportional gain currently under test.
    pub fn current_gain(&self) -> Option<f32> {
        self.session.as_ref().map(|s| s.gain)
    }

    /// Milliseconds since [`start`](Self::start), while running.
    pub fn elapsed(&self, now: Timestamp) -> Option<u64> {
        self.session.as_ref().map(|s| now.saturating_sub(s.started_at))
    }

    pub fn output(&self) -> f32 {
        self.pid.output()
    }

    pub fn controller(&self) -> &PidController {
        &self.pid
    }

    pub fn controller_mut(&mut self) -> &mut PidController {
        &mut self.pid
    }

    pub fn into_controller(self) -> PidController {
        self.pid
    }

    fn converge(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let ku = session.gain;
        let tu = session.average_period();
        let kp = 0.6 * ku;
        let gains = Gains {
            kp,
            ki: 2.0 * kp / tu,
            kd: kp * tu / 8.0,
        };
        self.pid.tune(GainUpdate::all(gains));
        self.outcome = Some(TuneOutcome {
            critical_gain: ku,
            average_period_s: tu,
            periods: session.periods.len(),
        });
        self.state = TuneState::Converged;
        info!(
            "autotune: converged Ku={:.3} Tu={:.2}s -> kp={:.3} ki={:.3} kd={:.3} ({} escalations)",
            ku, tu, gains.kp, gains.ki, gains.kd, session.escalations
        );
    }

    fn escalate(&mut self, now: Timestamp) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let next = session.gain * self.config.gain_step;
        if next > self.config.max_gain {
            warn!(
                "autotune: no oscillation up to kp={:.3}, ceiling {:.3} reached; aborting",
                session.gain, self.config.max_gain
            );
            self.pid.tune(GainUpdate::all(self.saved_gains));
            self.session = None;
            self.state = TuneState::Failed(TuneFailure::GainCeiling);
            return;
        }
        warn!(
            "autotune: no oscillation within {} ms, kp {:.3} -> {:.3}",
            self.config.escalation_timeout_ms, session.gain, next
        );
        session.gain = next;
        session.escalations += 1;
        session.window_start = now;
        self.pid.tune(GainUpdate {
            kp: Some(next),
            ..GainUpdate::default()
        });
    }
}
