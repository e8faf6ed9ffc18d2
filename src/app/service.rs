//! Lighting service — the hexagonal core.
//!
//! [`LightingService`] owns the zone loops and at most one running
//! auto-tune experiment.  All I/O flows through port traits injected at
//! call sites, making the whole service testable with mock adapters.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!       Clock ──▶ │       LightingService         │
//!  DimmerPort ◀── │  zones · adaptive · autotune  │
//!                 └──────────────────────────────┘
//! ```
//!
//! A zone under auto-tune is detached from the multi-zone set; the tuner
//! drives its dimmer directly until the experiment converges, fails or is
//! stopped, then the zone is put back (with the derived gains on success).

use log::{info, warn};

use crate::config::{AutoTuneConfig, SystemConfig, ZoneConfig};
use crate::control::adaptive::{AdaptationMetrics, AdaptivePidController};
use crate::control::autotune::{AutoTuner, TuneResults, TuneState};
use crate::control::zones::{MultiZoneController, SensorReadings, Zone, ZoneOutputs, ZoneStatus};
use crate::control::{ControlLoop, GainUpdate, Timestamp};
use crate::error::{ConfigError, Error};

use super::commands::ControlCommand;
use super::events::{ControlEvent, TelemetryData, ZoneTelemetry};
use super::ports::{Clock, ConfigPort, DimmerPort, EventSink, SensorPort};

type ZoneLoop = AdaptivePidController;

struct ActiveTuning {
    zone_id: String,
    zone: Zone<ZoneLoop>,
    tuner: AutoTuner,
}

/// The application service orchestrates all zone loops.
pub struct LightingService {
    zones: MultiZoneController<ZoneLoop>,
    tuning: Option<ActiveTuning>,
    base_config: SystemConfig,
    tick_count: u64,
}

impl LightingService {
    /// Validate `config` and build one adaptive loop per zone.
    pub fn new(config: SystemConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut zones = MultiZoneController::default();
        for z in &config.zones {
            zones.add_zone_with(
                &z.id,
                AdaptivePidController::new(z.pid.clone(), &config.adaptive),
                &z.sensor_ids,
                z.weight,
            );
        }
        Ok(Self {
            zones,
            tuning: None,
            base_config: config,
            tick_count: 0,
        })
    }

    /// Load from an external store, falling back to defaults on first boot.
    pub fn from_store(store: &impl ConfigPort) -> Result<Self, ConfigError> {
        let config = match store.load() {
            Ok(c) => c,
            Err(ConfigError::NotFound) => {
                info!("No stored configuration, using defaults");
                SystemConfig::default()
            }
            Err(e) => return Err(e),
        };
        Self::new(config)
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        let zones = self.zone_count();
        sink.emit(&ControlEvent::Started { zones });
        info!("LightingService started with {zones} zone(s)");
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle: clock → sensors → loops → dimmers → events.
    ///
    /// `hw` serves readings and accepts commands for the same installation.
    /// Zones without readings are skipped and keep their last command.
    pub fn tick(
        &mut self,
        clock: &impl Clock,
        hw: &mut (impl SensorPort + DimmerPort),
        sink: &mut impl EventSink,
    ) -> ZoneOutputs {
        self.tick_count += 1;
        let now = clock.now_ms();

        // 1. Acquire
        let readings = hw.read_all();

        // 2. Regular zones
        let mut outputs = self.zones.update_all(&readings, now);
        let mut applied: Vec<(String, f32, f32)> = Vec::with_capacity(outputs.len() + 1);
        for (id, zone) in self.zones.zones() {
            match outputs.get(id) {
                Some(out) => applied.push((id.to_owned(), zone.last_reading().unwrap_or(f32::NAN), *out)),
                None => sink.emit(&ControlEvent::ZoneSkipped {
                    zone_id: id.to_owned(),
                }),
            }
        }

        // 3. Zone under auto-tune
        if let Some((id, measured, out)) = self.tick_tuning(&readings, now, sink) {
            outputs.insert(id.clone(), out);
            applied.push((id, measured, out));
        }

        // 4. Actuate
        for (zone_id, measured, output) in applied {
            match hw.set_output(&zone_id, output) {
                Ok(()) => sink.emit(&ControlEvent::ZoneOutput {
                    zone_id,
                    measured,
                    output,
                }),
                Err(error) => {
                    warn!("Dimmer write for '{zone_id}' failed: {error}");
                    sink.emit(&ControlEvent::ActuatorFault { zone_id, error });
                }
            }
        }
        outputs
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command (operator UI, scheduler, remote API).
    pub fn handle_command(
        &mut self,
        cmd: ControlCommand,
        clock: &impl Clock,
        sink: &mut impl EventSink,
    ) -> Result<(), Error> {
        match cmd {
            ControlCommand::SetSetpoint { zone_id, setpoint } => {
                self.loop_mut(&zone_id)?.pid_mut().set_setpoint(setpoint);
                if let Some(active) = self.tuning.as_mut().filter(|t| t.zone_id == zone_id) {
                    active.tuner.controller_mut().set_setpoint(setpoint);
                }
                info!("Zone '{zone_id}' setpoint -> {setpoint:.1}");
            }
            ControlCommand::Tune { zone_id, gains } => {
                self.loop_mut(&zone_id)?.pid_mut().tune(gains);
                info!("Zone '{zone_id}' retuned: {gains:?}");
            }
            ControlCommand::SetZoneEnabled { zone_id, enabled } => {
                self.loop_mut(&zone_id)?;
                if !enabled && self.tuning_zone() == Some(zone_id.as_str()) {
                    self.stop_autotune(sink);
                }
                self.loop_mut(&zone_id)?.pid_mut().set_enabled(enabled);
            }
            ControlCommand::SetAllEnabled(enabled) => {
                // A disabled zone cannot host an experiment.
                if !enabled {
                    self.stop_autotune(sink);
                }
                self.zones.set_all_enabled(enabled);
                if let Some(active) = self.tuning.as_mut() {
                    active.zone.controller_mut().pid_mut().set_enabled(enabled);
                }
            }
            ControlCommand::SetAdaptation { zone_id, enabled } => match zone_id {
                Some(id) => self.loop_mut(&id)?.set_adaptation_enabled(enabled),
                None => {
                    let ids: Vec<String> = self.zone_ids();
                    for id in ids {
                        self.loop_mut(&id)?.set_adaptation_enabled(enabled);
                    }
                }
            },
            ControlCommand::StartAutoTune { zone_id } => {
                self.start_autotune(&zone_id, clock.now_ms(), sink)?;
            }
            ControlCommand::StopAutoTune => self.stop_autotune(sink),
        }
        Ok(())
    }

    /// Detach `zone_id` and start the gain-escalation experiment on it.
    /// A disabled zone is refused with [`Error::ZoneDisabled`].
    pub fn start_autotune(
        &mut self,
        zone_id: &str,
        now: Timestamp,
        sink: &mut impl EventSink,
    ) -> Result<(), Error> {
        if let Some(active) = &self.tuning {
            return if active.zone_id == zone_id {
                Ok(())
            } else {
                Err(Error::TuningBusy)
            };
        }
        let zone = self.zone(zone_id).ok_or(Error::UnknownZone)?;
        if !zone.controller().pid().is_enabled() {
            return Err(Error::ZoneDisabled);
        }
        let zone = self.zones.take_zone(zone_id).ok_or(Error::UnknownZone)?;
        let mut tuner = AutoTuner::new(zone.controller().pid().clone(), self.tune_config().clone());
        tuner.start(now);
        self.tuning = Some(ActiveTuning {
            zone_id: zone_id.to_owned(),
            zone,
            tuner,
        });
        sink.emit(&ControlEvent::TuningStarted {
            zone_id: zone_id.to_owned(),
        });
        Ok(())
    }

    /// Abort a running experiment; the zone resumes with its previous gains.
    pub fn stop_autotune(&mut self, sink: &mut impl EventSink) {
        if let Some(mut active) = self.tuning.take() {
            active.tuner.stop();
            let output = active.tuner.output();
            active.zone.controller_mut().pid_mut().preload_output(output);
            self.zones.insert_zone(&active.zone_id, active.zone);
            sink.emit(&ControlEvent::TuningStopped {
                zone_id: active.zone_id,
            });
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn zone_status(&self, zone_id: &str) -> Option<ZoneStatus> {
        self.zones.zone_status(zone_id).or_else(|| {
            self.tuning
                .as_ref()
                .filter(|t| t.zone_id == zone_id)
                .map(|t| t.zone.status(zone_id))
        })
    }

    pub fn adaptation_metrics(&self, zone_id: &str) -> Option<AdaptationMetrics> {
        self.zone(zone_id).map(|z| z.controller().adaptation_metrics())
    }

    /// Results of the running experiment, if any.
    pub fn tuning_results(&self) -> Option<TuneResults> {
        self.tuning.as_ref().map(|t| t.tuner.results())
    }

    pub fn tuning_zone(&self) -> Option<&str> {
        self.tuning.as_ref().map(|t| t.zone_id.as_str())
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn zone_count(&self) -> usize {
        self.zones.len() + usize::from(self.tuning.is_some())
    }

    /// Sorted ids of every zone, including one under auto-tune.
    pub fn zone_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.zones.zone_ids().map(str::to_owned).collect();
        if let Some(active) = &self.tuning {
            ids.push(active.zone_id.clone());
            ids.sort();
        }
        ids
    }

    pub fn build_telemetry(&self) -> TelemetryData {
        let zones = self
            .zone_ids()
            .into_iter()
            .filter_map(|id| {
                let zone = self.zone(&id)?;
                let pid = zone.controller().controller();
                let output = match &self.tuning {
                    Some(t) if t.zone_id == id => t.tuner.output(),
                    _ => pid.output(),
                };
                Some(ZoneTelemetry {
                    enabled: pid.is_enabled(),
                    setpoint: pid.setpoint(),
                    measured: zone.last_reading(),
                    output,
                    gains: pid.gains(),
                    zone_id: id,
                })
            })
            .collect();
        TelemetryData {
            tick: self.tick_count,
            zones,
            tuning_zone: self.tuning_zone().map(str::to_owned),
        }
    }

    /// Configuration reflecting the live gains and setpoints.
    pub fn current_config(&self) -> SystemConfig {
        let mut config = self.base_config.clone();
        config.zones = self
            .zone_ids()
            .into_iter()
            .filter_map(|id| {
                let zone = self.zone(&id)?;
                Some(ZoneConfig {
                    pid: zone.controller().controller().config().clone(),
                    sensor_ids: zone.sensor_ids().iter().cloned().collect(),
                    weight: zone.weight(),
                    id,
                })
            })
            .collect();
        config
    }

    /// Hand the live configuration to an external store.
    pub fn save_config(&self, store: &mut impl ConfigPort) -> Result<(), ConfigError> {
        let config = self.current_config();
        config.validate()?;
        store.save(&config)
    }

    // ── Internal ──────────────────────────────────────────────

    fn tune_config(&self) -> &AutoTuneConfig {
        &self.base_config.autotune
    }

    fn zone(&self, zone_id: &str) -> Option<&Zone<ZoneLoop>> {
        self.zones.zone(zone_id).or_else(|| {
            self.tuning
                .as_ref()
                .filter(|t| t.zone_id == zone_id)
                .map(|t| &t.zone)
        })
    }

    fn loop_mut(&mut self, zone_id: &str) -> Result<&mut ZoneLoop, Error> {
        if let Some(active) = self.tuning.as_mut().filter(|t| t.zone_id == zone_id) {
            return Ok(active.zone.controller_mut());
        }
        self.zones
            .zone_mut(zone_id)
            .map(Zone::controller_mut)
            .ok_or(Error::UnknownZone)
    }

    /// Drive the experiment one cycle.  Returns `(zone, measured, output)`
    /// when the tuned zone had a reading.
    fn tick_tuning(
        &mut self,
        readings: &SensorReadings,
        now: Timestamp,
        sink: &mut impl EventSink,
    ) -> Option<(String, f32, f32)> {
        let active = self.tuning.as_mut()?;
        let Some(measured) = active.zone.reading(readings) else {
            sink.emit(&ControlEvent::ZoneSkipped {
                zone_id: active.zone_id.clone(),
            });
            return None;
        };
        active.zone.record_reading(measured);
        let converged = active.tuner.update(measured, now);
        let output = active.tuner.output();
        let zone_id = active.zone_id.clone();

        if converged {
            self.finish_tuning(sink);
        } else if let TuneState::Failed(failure) = active.tuner.state() {
            warn!("Auto-tune on '{zone_id}' failed: {failure:?}");
            sink.emit(&ControlEvent::TuningFailed {
                zone_id: zone_id.clone(),
                failure,
            });
            self.reattach(output);
        }
        Some((zone_id, measured, output))
    }

    fn finish_tuning(&mut self, sink: &mut impl EventSink) {
        let Some(active) = self.tuning.as_mut() else {
            return;
        };
        let results = active.tuner.results();
        active
            .zone
            .controller_mut()
            .pid_mut()
            .tune(GainUpdate::all(results.gains));
        if let Some(outcome) = results.outcome {
            info!(
                "Auto-tune on '{}' converged: {:?}",
                active.zone_id, results.gains
            );
            sink.emit(&ControlEvent::TuningConverged {
                zone_id: active.zone_id.clone(),
                gains: results.gains,
                critical_gain: outcome.critical_gain,
                average_period_s: outcome.average_period_s,
            });
        }
        let output = active.tuner.output();
        self.reattach(output);
    }

    fn reattach(&mut self, output: f32) {
        if let Some(mut active) = self.tuning.take() {
            active.zone.controller_mut().pid_mut().preload_output(output);
            self.zones.insert_zone(&active.zone_id, active.zone);
        }
    }
}
