//! Unified error types for the luxloop control core.
//!
//! The control loop itself never fails: every `update` returns a bounded
//! output.  Errors only arise at the edges (configuration loading and
//! validation, actuator writes, operator commands), and they all funnel into [`Error`].
//! All variants are `Copy` so they can be passed through the service layer
//! and event sinks without allocation.

use core::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Configuration is invalid or could not be decoded.
    Config(ConfigError),
    /// A dimmer write failed.
    Actuator(ActuatorError),
    /// A command named a zone that is not registered.
    UnknownZone,
    /// An auto-tune experiment is already running on another zone.
    TuningBusy,
    /// Auto-tune was requested on a disabled zone.
    ZoneDisabled,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::UnknownZone => write!(f, "unknown zone"),
            Self::TuningBusy => write!(f, "auto-tune already running"),
            Self::ZoneDisabled => write!(f, "zone is disabled"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `output_min` is greater than `output_max`, or a bound is not finite.
    InvalidOutputRange,
    /// `sample_time_ms` is zero.
    NonPositiveSampleTime,
    /// A gain is negative or not finite.
    InvalidGain,
    /// Deadband or windup guard is negative or not finite.
    InvalidTolerance,
    /// Zone weight is negative or not finite.
    InvalidWeight,
    /// Zone id is empty.
    EmptyZoneId,
    /// Two zones share an id.
    DuplicateZoneId,
    /// A zone lists no sensors.
    NoSensors,
    /// Auto-tuner settings are out of range.
    InvalidTuning(&'static str),
    /// The control interval is zero.
    InvalidInterval,
    /// The stored blob or document could not be decoded.
    Malformed,
    /// No configuration is stored.
    NotFound,
    /// The backing store could not be read or written.
    Io,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidOutputRange => write!(f, "output_min must not exceed output_max"),
            Self::NonPositiveSampleTime => write!(f, "sample time must be positive"),
            Self::InvalidGain => write!(f, "gains must be finite and non-negative"),
            Self::InvalidTolerance => {
                write!(f, "deadband and windup guard must be finite and non-negative")
            }
            Self::InvalidWeight => write!(f, "zone weight must be finite and non-negative"),
            Self::EmptyZoneId => write!(f, "zone id is empty"),
            Self::DuplicateZoneId => write!(f, "zone ids must be unique"),
            Self::NoSensors => write!(f, "zone has no sensors"),
            Self::InvalidTuning(msg) => write!(f, "auto-tune: {msg}"),
            Self::InvalidInterval => write!(f, "control interval must be positive"),
            Self::Malformed => write!(f, "malformed configuration"),
            Self::NotFound => write!(f, "configuration not found"),
            Self::Io => write!(f, "configuration store I/O failed"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActuatorError {
    /// PWM duty-cycle write failed.
    PwmWriteFailed,
    /// No dimmer channel is bound to the zone.
    UnknownChannel,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PwmWriteFailed => write!(f, "PWM write failed"),
            Self::UnknownChannel => write!(f, "no dimmer channel for zone"),
        }
    }
}

impl std::error::Error for ActuatorError {}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
