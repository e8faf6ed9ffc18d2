//! Outbound control events.
//!
//! The [`LightingService`](super::service::LightingService) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on the
//! other side decide what to do with them (log, dashboard push).

use serde::Serialize;

use crate::control::Gains;
use crate::control::autotune::TuneFailure;
use crate::error::ActuatorError;

/// Structured events emitted by the control core.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ControlEvent {
    /// The service has started (carries the number of zones).
    Started { zones: usize },

    /// A zone produced a new command this cycle.
    ZoneOutput {
        zone_id: String,
        measured: f32,
        output: f32,
    },

    /// A zone had no sensor readings and kept its previous command.
    ZoneSkipped { zone_id: String },

    /// Writing a zone's command to its dimmer failed.
    ActuatorFault {
        zone_id: String,
        error: ActuatorError,
    },

    TuningStarted { zone_id: String },

    TuningConverged {
        zone_id: String,
        gains: Gains,
        critical_gain: f32,
        average_period_s: f32,
    },

    TuningFailed {
        zone_id: String,
        failure: TuneFailure,
    },

    TuningStopped { zone_id: String },

    /// Periodic snapshot for monitoring.
    Telemetry(TelemetryData),
}

/// A point-in-time snapshot suitable for logging or transmission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryData {
    pub tick: u64,
    pub zones: Vec<ZoneTelemetry>,
    pub tuning_zone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneTelemetry {
    pub zone_id: String,
    pub enabled: bool,
    pub setpoint: f32,
    pub measured: Option<f32>,
    pub output: f32,
    pub gains: Gains,
}
