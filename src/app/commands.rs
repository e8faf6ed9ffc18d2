//! Inbound commands to the lighting service.
//!
//! These represent actions requested by the outside world (operator UI,
//! scheduler, remote API) that the
//! [`LightingService`](super::service::LightingService) interprets.

use crate::control::GainUpdate;

#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    /// Change a zone's target intensity.
    SetSetpoint { zone_id: String, setpoint: f32 },

    /// Manually retune a zone.
    Tune { zone_id: String, gains: GainUpdate },

    SetZoneEnabled { zone_id: String, enabled: bool },

    SetAllEnabled(bool),

    /// Toggle online adaptation for one zone, or every zone when `None`.
    SetAdaptation {
        zone_id: Option<String>,
        enabled: bool,
    },

    /// Run the gain-escalation experiment on one zone.
    StartAutoTune { zone_id: String },

    /// Abort a running experiment.
    StopAutoTune,
}
