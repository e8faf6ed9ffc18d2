//! Port traits — the boundary between the control core and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ LightingService (domain)
//! ```
//!
//! Sensor acquisition, dimmer drivers, clocks, event consumers and
//! configuration stores all live outside this crate's scope; they plug in
//! by implementing these traits.  The service consumes them via generics,
//! so the control core never touches hardware or wall-clock time directly.

use crate::config::SystemConfig;
use crate::control::Timestamp;
use crate::control::zones::SensorReadings;
use crate::error::{ActuatorError, ConfigError};

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic time source.  Simulation and tests supply synthetic time.
pub trait Clock {
    fn now_ms(&self) -> Timestamp;
}

// ───────────────────────────────────────────────────────────────
// Sensor port (acquisition layer → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: one batch of intensity readings per control cycle.
pub trait SensorPort {
    /// Latest reading per sensor id.  Disconnected sensors are simply absent.
    fn read_all(&mut self) -> SensorReadings;
}

// ───────────────────────────────────────────────────────────────
// Dimmer port (domain → actuator driver)
// ───────────────────────────────────────────────────────────────

/// Write-side port: apply a zone's command (percent of full output).
pub trait DimmerPort {
    fn set_output(&mut self, zone_id: &str, percent: f32) -> Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging / monitoring)
// ───────────────────────────────────────────────────────────────

/// The service emits structured [`ControlEvent`](super::events::ControlEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::ControlEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (domain ↔ external store)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate before persisting; invalid ranges are
/// rejected with a [`ConfigError`], never silently clamped.
pub trait ConfigPort {
    /// Returns [`ConfigError::NotFound`] if nothing is stored yet.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    fn save(&mut self, config: &SystemConfig) -> Result<(), ConfigError>;
}
