//! Simulated lighting installation.
//!
//! [`FirstOrderPlant`] models a dimmable fixture seen by an intensity
//! sensor: the reading relaxes exponentially towards
//! `ambient + gain · command` with time constant `tau_s`.
//!
//! [`SimulatedInstallation`] groups one plant per zone and implements both
//! [`SensorPort`] and [`DimmerPort`], so the [`LightingService`] can run
//! closed-loop on the host.  Sensors can be disconnected and dimmers made
//! to fail to exercise the degraded paths.
//!
//! [`LightingService`]: crate::app::service::LightingService

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::app::ports::{DimmerPort, SensorPort};
use crate::config::SystemConfig;
use crate::control::zones::SensorReadings;
use crate::error::ActuatorError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FirstOrderPlant {
    /// Reading with the fixture off.
    pub ambient: f32,
    /// Reading gained per percent of command.
    pub gain: f32,
    /// Time constant (seconds).
    pub tau_s: f32,
    intensity: f32,
}

impl FirstOrderPlant {
    pub fn new(ambient: f32, gain: f32, tau_s: f32) -> Self {
        Self {
            ambient,
            gain,
            tau_s,
            intensity: ambient,
        }
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    /// Steady-state reading for `command`.
    pub fn equilibrium(&self, command: f32) -> f32 {
        self.ambient + self.gain * command
    }

    /// Advance by `dt_s` seconds holding `command` (exact discretisation).
    pub fn step(&mut self, command: f32, dt_s: f32) -> f32 {
        let target = self.equilibrium(command);
        let alpha = if self.tau_s > 0.0 {
            1.0 - (-dt_s / self.tau_s).exp()
        } else {
            1.0
        };
        self.intensity += (target - self.intensity) * alpha;
        self.intensity
    }
}

impl Default for FirstOrderPlant {
    /// A bench fixture: 50 ambient, 850 at full power, 5 s lag.
    fn default() -> Self {
        Self::new(50.0, 8.0, 5.0)
    }
}

#[derive(Debug, Clone)]
struct SimZone {
    plant: FirstOrderPlant,
    sensors: Vec<String>,
    command: f32,
    dimmer_fault: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedInstallation {
    zones: BTreeMap<String, SimZone>,
    /// Per-sensor additive offset, to model unevenly lit benches.
    offsets: BTreeMap<String, f32>,
    disconnected: BTreeSet<String>,
}

impl SimulatedInstallation {
    pub fn new() -> Self {
        Self::default()
    }

    /// One default plant per configured zone, wired to its sensors.
    pub fn from_config(config: &SystemConfig) -> Self {
        let mut sim = Self::new();
        for z in &config.zones {
            sim.add_zone(&z.id, FirstOrderPlant::default(), &z.sensor_ids);
        }
        sim
    }

    pub fn add_zone<S: AsRef<str>>(
        &mut self,
        zone_id: &str,
        plant: FirstOrderPlant,
        sensors: impl IntoIterator<Item = S>,
    ) {
        self.zones.insert(
            zone_id.to_owned(),
            SimZone {
                plant,
                sensors: sensors.into_iter().map(|s| s.as_ref().to_owned()).collect(),
                command: 0.0,
                dimmer_fault: false,
            },
        );
    }

    pub fn set_sensor_offset(&mut self, sensor_id: &str, offset: f32) {
        self.offsets.insert(sensor_id.to_owned(), offset);
    }

    pub fn set_sensor_connected(&mut self, sensor_id: &str, connected: bool) {
        if connected {
            self.disconnected.remove(sensor_id);
        } else {
            self.disconnected.insert(sensor_id.to_owned());
        }
    }

    pub fn set_dimmer_fault(&mut self, zone_id: &str, fault: bool) {
        if let Some(z) = self.zones.get_mut(zone_id) {
            z.dimmer_fault = fault;
        }
    }

    /// Step every plant by `dt_ms` with its last accepted command.
    pub fn advance(&mut self, dt_ms: u64) {
        let dt_s = dt_ms as f32 / 1000.0;
        for (id, z) in &mut self.zones {
            let y = z.plant.step(z.command, dt_s);
            debug!("sim: '{id}' cmd={:.1}% -> {y:.1}", z.command);
        }
    }

    pub fn intensity(&self, zone_id: &str) -> Option<f32> {
        self.zones.get(zone_id).map(|z| z.plant.intensity())
    }

    pub fn command(&self, zone_id: &str) -> Option<f32> {
        self.zones.get(zone_id).map(|z| z.command)
    }
}

impl SensorPort for SimulatedInstallation {
    fn read_all(&mut self) -> SensorReadings {
        let mut readings = SensorReadings::new();
        for z in self.zones.values() {
            for s in &z.sensors {
                if self.disconnected.contains(s) {
                    continue;
                }
                let offset = self.offsets.get(s).copied().unwrap_or(0.0);
                readings.insert(s.clone(), z.plant.intensity() + offset);
            }
        }
        readings
    }
}

impl DimmerPort for SimulatedInstallation {
    fn set_output(&mut self, zone_id: &str, percent: f32) -> Result<(), ActuatorError> {
        let z = self
            .zones
            .get_mut(zone_id)
            .ok_or(ActuatorError::UnknownChannel)?;
        if z.dimmer_fault {
            return Err(ActuatorError::PwmWriteFailed);
        }
        z.command = percent;
        Ok(())
    }
}
