//! Multi-zone coordination.
//!
//! Each zone owns one control loop and a set of sensor ids.  On every
//! [`update_all`](MultiZoneController::update_all) the present readings of a
//! zone's sensors are averaged and fed to its loop.  A zone whose sensors
//! all went missing this cycle is skipped: it keeps its last command and
//! does not appear in the result map.  Zones share no state, so callers may
//! drive them in any order.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};
use serde::Serialize;

use super::pid::{PidController, PidStatus};
use super::{ControlLoop, Timestamp};
use crate::config::{PidConfig, ZoneConfig};

/// Sensor id → latest reading.
pub type SensorReadings = BTreeMap<String, f32>;

/// Zone id → dimmer command.
pub type ZoneOutputs = BTreeMap<String, f32>;

/// Mean of the finite readings present for `sensor_ids`.
/// Missing or non-finite readings are left out; `None` if nothing remains.
pub fn aggregate<'a>(
    sensor_ids: impl IntoIterator<Item = &'a String>,
    readings: &SensorReadings,
) -> Option<f32> {
    let (sum, count) = sensor_ids
        .into_iter()
        .filter_map(|id| readings.get(id))
        .filter(|v| v.is_finite())
        .fold((0.0_f32, 0_u32), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f32)
}

#[derive(Debug, Clone)]
pub struct Zone<L = PidController> {
    controller: L,
    sensor_ids: BTreeSet<String>,
    weight: f32,
    last_reading: Option<f32>,
}

impl<L: ControlLoop> Zone<L> {
    pub fn new(controller: L, sensor_ids: BTreeSet<String>, weight: f32) -> Self {
        Self {
            controller,
            sensor_ids,
            weight,
            last_reading: None,
        }
    }

    pub fn controller(&self) -> &L {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut L {
        &mut self.controller
    }

    pub fn sensor_ids(&self) -> &BTreeSet<String> {
        &self.sensor_ids
    }

    /// Reported and persisted for external consumers; aggregation ignores it.
    pub fn weight(&self) -> f32 {
        self.weight
    }

    /// Aggregated reading from the last cycle that had one.
    pub fn last_reading(&self) -> Option<f32> {
        self.last_reading
    }

    /// Mean of this zone's sensors in `readings`.
    pub fn reading(&self, readings: &SensorReadings) -> Option<f32> {
        aggregate(&self.sensor_ids, readings)
    }

    /// Record a reading obtained outside [`MultiZoneController::update_all`].
    pub fn record_reading(&mut self, measured: f32) {
        self.last_reading = Some(measured);
    }

    pub fn status(&self, zone_id: &str) -> ZoneStatus {
        ZoneStatus {
            zone_id: zone_id.to_owned(),
            sensor_ids: self.sensor_ids.iter().cloned().collect(),
            weight: self.weight,
            last_reading: self.last_reading,
            controller: self.controller.pid().status(),
        }
    }
}

/// Read-only zone snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneStatus {
    pub zone_id: String,
    pub sensor_ids: Vec<String>,
    pub weight: f32,
    pub last_reading: Option<f32>,
    pub controller: PidStatus,
}

#[derive(Debug, Clone)]
pub struct MultiZoneController<L = PidController> {
    zones: BTreeMap<String, Zone<L>>,
}

impl<L> Default for MultiZoneController<L> {
    fn default() -> Self {
        Self {
            zones: BTreeMap::new(),
        }
    }
}

impl MultiZoneController<PidController> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from zone configs (plain PID loops).
    pub fn from_configs(configs: &[ZoneConfig]) -> Self {
        let mut this = Self::new();
        for z in configs {
            this.add_zone(&z.id, z.pid.clone(), &z.sensor_ids, z.weight);
        }
        this
    }

    /// Register a zone with a fresh PID loop.  An existing zone with the
    /// same id is replaced.
    pub fn add_zone<S: AsRef<str>>(
        &mut self,
        zone_id: &str,
        config: PidConfig,
        sensor_ids: impl IntoIterator<Item = S>,
        weight: f32,
    ) {
        self.add_zone_with(zone_id, PidController::new(config), sensor_ids, weight);
    }
}

impl<L: ControlLoop> MultiZoneController<L> {
    /// Register a zone backed by an already-built loop (upsert).
    pub fn add_zone_with<S: AsRef<str>>(
        &mut self,
        zone_id: &str,
        controller: L,
        sensor_ids: impl IntoIterator<Item = S>,
        weight: f32,
    ) {
        let sensors: BTreeSet<String> = sensor_ids
            .into_iter()
            .map(|s| s.as_ref().to_owned())
            .collect();
        let zone = Zone::new(controller, sensors, weight);
        if self.zones.insert(zone_id.to_owned(), zone).is_some() {
            info!("zones: replaced zone '{zone_id}'");
        } else {
            info!("zones: registered zone '{zone_id}'");
        }
    }

    /// Put back a zone previously taken with [`take_zone`](Self::take_zone).
    pub fn insert_zone(&mut self, zone_id: &str, zone: Zone<L>) {
        self.zones.insert(zone_id.to_owned(), zone);
    }

    /// Detach a zone, e.g. while an experiment drives it directly.
    pub fn take_zone(&mut self, zone_id: &str) -> Option<Zone<L>> {
        self.zones.remove(zone_id)
    }

    pub fn remove_zone(&mut self, zone_id: &str) -> bool {
        self.zones.remove(zone_id).is_some()
    }

    /// Run every zone that has at least one reading this cycle.
    pub fn update_all(&mut self, readings: &SensorReadings, now: Timestamp) -> ZoneOutputs {
        let mut outputs = ZoneOutputs::new();
        for (id, zone) in &mut self.zones {
            let Some(measured) = zone.reading(readings) else {
                debug!("zones: '{id}' has no readings, skipped");
                continue;
            };
            zone.record_reading(measured);
            let output = zone.controller.update(measured, now);
            outputs.insert(id.clone(), output);
        }
        outputs
    }

    pub fn set_all_enabled(&mut self, enabled: bool) {
        for zone in self.zones.values_mut() {
            zone.controller.pid_mut().set_enabled(enabled);
        }
    }

    pub fn zone_status(&self, zone_id: &str) -> Option<ZoneStatus> {
        self.zones.get(zone_id).map(|z| z.status(zone_id))
    }

    pub fn zone(&self, zone_id: &str) -> Option<&Zone<L>> {
        self.zones.get(zone_id)
    }

    pub fn zone_mut(&mut self, zone_id: &str) -> Option<&mut Zone<L>> {
        self.zones.get_mut(zone_id)
    }

    pub fn zone_ids(&self) -> impl Iterator<Item = &str> {
        self.zones.keys().map(String::as_str)
    }

    pub fn zones(&self) -> impl Iterator<Item = (&str, &Zone<L>)> {
        self.zones.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}
