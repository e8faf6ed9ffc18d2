//! Mock hardware adapter for integration tests.
//!
//! Serves scripted sensor readings and records every dimmer call so tests
//! can assert on the full command history without a plant model.

use std::collections::BTreeSet;

use luxloop::app::events::ControlEvent;
use luxloop::app::ports::{DimmerPort, EventSink, SensorPort};
use luxloop::control::zones::SensorReadings;
use luxloop::error::ActuatorError;

// ── Dimmer call record ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct DimmerCall {
    pub zone_id: String,
    pub percent: f32,
}

// ── MockHw ────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MockHw {
    pub readings: SensorReadings,
    pub calls: Vec<DimmerCall>,
    pub failing: BTreeSet<String>,
}

#[allow(dead_code)]
impl MockHw {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_readings(pairs: &[(&str, f32)]) -> Self {
        let mut hw = Self::new();
        hw.set_readings(pairs);
        hw
    }

    pub fn set_readings(&mut self, pairs: &[(&str, f32)]) {
        self.readings = pairs.iter().map(|(k, v)| ((*k).to_owned(), *v)).collect();
    }

    /// Most recent command written to `zone_id`.
    pub fn last_output(&self, zone_id: &str) -> Option<f32> {
        self.calls
            .iter()
            .rev()
            .find(|c| c.zone_id == zone_id)
            .map(|c| c.percent)
    }

    pub fn calls_for(&self, zone_id: &str) -> usize {
        self.calls.iter().filter(|c| c.zone_id == zone_id).count()
    }
}

impl SensorPort for MockHw {
    fn read_all(&mut self) -> SensorReadings {
        self.readings.clone()
    }
}

impl DimmerPort for MockHw {
    fn set_output(&mut self, zone_id: &str, percent: f32) -> Result<(), ActuatorError> {
        if self.failing.contains(zone_id) {
            return Err(ActuatorError::PwmWriteFailed);
        }
        self.calls.push(DimmerCall {
            zone_id: zone_id.to_owned(),
            percent,
        });
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<ControlEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&ControlEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &ControlEvent) {
        self.events.push(event.clone());
    }
}
