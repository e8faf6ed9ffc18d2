//! Closed-loop flows on the simulated installation: auto-tune lifecycle,
//! sensor loss and long-run adaptation.

use luxloop::adapters::time::ManualClock;
use luxloop::app::commands::ControlCommand;
use luxloop::app::events::ControlEvent;
use luxloop::app::service::LightingService;
use luxloop::config::SystemConfig;
use luxloop::control::adaptive::BoundedNudgePolicy;
use luxloop::control::autotune::{TuneFailure, TuneState};
use luxloop::error::Error;
use luxloop::sim::{FirstOrderPlant, SimulatedInstallation};

use crate::mock_hw::RecordingSink;

const INTERVAL_MS: u64 = 1_000;

struct Rig {
    svc: LightingService,
    sim: SimulatedInstallation,
    clock: ManualClock,
    sink: RecordingSink,
}

impl Rig {
    fn new(config: SystemConfig) -> Self {
        let sim = SimulatedInstallation::from_config(&config);
        Self {
            svc: LightingService::new(config).unwrap(),
            sim,
            clock: ManualClock::new(0),
            sink: RecordingSink::new(),
        }
    }

    fn command(&mut self, cmd: ControlCommand) -> Result<(), Error> {
        self.svc.handle_command(cmd, &self.clock, &mut self.sink)
    }

    fn step(&mut self) {
        self.svc.tick(&self.clock, &mut self.sim, &mut self.sink);
        self.sim.advance(INTERVAL_MS);
        self.clock.advance(INTERVAL_MS);
    }

    /// Step until `done` holds or `max` ticks elapse; returns ticks taken.
    fn run_until(&mut self, max: usize, done: impl Fn(&Self) -> bool) -> Option<usize> {
        for i in 0..max {
            self.step();
            if done(self) {
                return Some(i + 1);
            }
        }
        None
    }
}

fn start_tune(zone_id: &str) -> ControlCommand {
    ControlCommand::StartAutoTune {
        zone_id: zone_id.into(),
    }
}

#[test]
fn autotune_converges_and_applies_gains() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.command(start_tune("bench-a")).unwrap();
    assert_eq!(rig.svc.tuning_zone(), Some("bench-a"));
    assert_eq!(rig.svc.tuning_results().unwrap().state, TuneState::Running);

    let ticks = rig.run_until(60, |r| r.svc.tuning_zone().is_none());
    assert!(ticks.is_some(), "auto-tune never finished");

    let converged = rig.sink.events.iter().find_map(|e| match e {
        ControlEvent::TuningConverged {
            gains,
            critical_gain,
            average_period_s,
            ..
        } => Some((*gains, *critical_gain, *average_period_s)),
        _ => None,
    });
    let (gains, ku, tu) = converged.expect("no TuningConverged event");
    assert!((gains.kp - 0.6 * ku).abs() < 1e-5);
    assert!((gains.ki - 2.0 * gains.kp / tu).abs() < 1e-4);
    assert!((gains.kd - gains.kp * tu / 8.0).abs() < 1e-4);

    // Zone is back in the regular set with the derived gains.
    let st = rig.svc.zone_status("bench-a").unwrap();
    assert_eq!(st.controller.gains, gains);
}

#[test]
fn tuned_zone_keeps_regulating_afterwards() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.command(start_tune("bench-a")).unwrap();
    rig.run_until(60, |r| r.svc.tuning_zone().is_none())
        .expect("auto-tune never finished");
    rig.sink.clear();

    rig.step();
    assert!(rig.sink.events.iter().any(|e| matches!(
        e,
        ControlEvent::ZoneOutput { zone_id, .. } if zone_id == "bench-a"
    )));
}

#[test]
fn dead_fixture_hits_gain_ceiling_and_restores() {
    let mut config = SystemConfig::default();
    config.autotune.escalation_timeout_ms = 2_000;
    config.autotune.max_gain = 2.0;
    let original = config.zones[0].pid.gains();
    let mut rig = Rig::new(config);
    // Output has no effect on the reading.
    rig.sim
        .add_zone("bench-a", FirstOrderPlant::new(50.0, 0.0, 5.0), ["ppfd-a1", "ppfd-a2"]);

    rig.command(start_tune("bench-a")).unwrap();
    rig.run_until(100, |r| r.svc.tuning_zone().is_none())
        .expect("auto-tune never gave up");

    assert!(rig.sink.events.contains(&ControlEvent::TuningFailed {
        zone_id: "bench-a".into(),
        failure: TuneFailure::GainCeiling,
    }));
    assert_eq!(
        rig.svc.zone_status("bench-a").unwrap().controller.gains,
        original
    );
}

#[test]
fn stop_hands_zone_back_untouched() {
    let mut rig = Rig::new(SystemConfig::default());
    let original = rig.svc.zone_status("bench-b").unwrap().controller.gains;

    rig.command(start_tune("bench-b")).unwrap();
    rig.step();
    rig.command(ControlCommand::StopAutoTune).unwrap();

    assert!(rig.svc.tuning_zone().is_none());
    assert!(rig.sink.events.contains(&ControlEvent::TuningStopped {
        zone_id: "bench-b".into()
    }));
    assert_eq!(
        rig.svc.zone_status("bench-b").unwrap().controller.gains,
        original
    );
}

#[test]
fn only_one_experiment_at_a_time() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.command(start_tune("bench-a")).unwrap();
    assert_eq!(rig.command(start_tune("bench-b")), Err(Error::TuningBusy));
    // Re-issuing for the same zone is a no-op.
    assert_eq!(rig.command(start_tune("bench-a")), Ok(()));
    assert_eq!(rig.command(start_tune("attic")), Err(Error::TuningBusy));
    assert_eq!(rig.svc.zone_count(), 2);
}

#[test]
fn zone_under_tune_still_answers_queries_and_commands() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.command(start_tune("bench-a")).unwrap();
    rig.command(ControlCommand::SetSetpoint {
        zone_id: "bench-a".into(),
        setpoint: 450.0,
    })
    .unwrap();
    assert_eq!(
        rig.svc.zone_status("bench-a").unwrap().controller.setpoint,
        450.0
    );
    assert_eq!(rig.svc.zone_ids(), vec!["bench-a", "bench-b"]);
    assert_eq!(rig.svc.build_telemetry().tuning_zone.as_deref(), Some("bench-a"));
}

#[test]
fn lost_sensor_skips_only_its_zone() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.sim.set_sensor_connected("ppfd-b1", false);
    for _ in 0..5 {
        rig.step();
    }
    let skipped = rig.sink.count(|e| {
        matches!(e, ControlEvent::ZoneSkipped { zone_id } if zone_id == "bench-b")
    });
    assert_eq!(skipped, 5);
    assert_eq!(rig.sim.command("bench-b"), Some(0.0));

    // One of two sensors gone: bench-a keeps running on the other.
    rig.sim.set_sensor_connected("ppfd-a2", false);
    rig.sink.clear();
    rig.step();
    assert!(rig.sink.events.iter().any(|e| matches!(
        e,
        ControlEvent::ZoneOutput { zone_id, .. } if zone_id == "bench-a"
    )));
}

#[test]
fn long_run_keeps_gains_in_bounds_and_output_in_range() {
    let mut rig = Rig::new(SystemConfig::default());
    for _ in 0..300 {
        rig.step();
        for id in ["bench-a", "bench-b"] {
            let st = rig.svc.zone_status(id).unwrap();
            let out = st.controller.state.last_output;
            assert!((0.0..=100.0).contains(&out), "{id} output {out}");
            let g = st.controller.gains;
            assert!(g.kp >= BoundedNudgePolicy::KP_RANGE.0 && g.kp <= BoundedNudgePolicy::KP_RANGE.1);
            assert!(g.ki >= BoundedNudgePolicy::KI_RANGE.0 && g.ki <= BoundedNudgePolicy::KI_RANGE.1);
            assert!(g.kd >= BoundedNudgePolicy::KD_RANGE.0 && g.kd <= BoundedNudgePolicy::KD_RANGE.1);
        }
    }
    let m = rig.svc.adaptation_metrics("bench-a").unwrap();
    assert_eq!(m.samples, 100);
}

#[test]
fn disabling_the_zone_aborts_its_experiment() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.command(start_tune("bench-a")).unwrap();
    rig.step();
    rig.command(ControlCommand::SetZoneEnabled {
        zone_id: "bench-a".into(),
        enabled: false,
    })
    .unwrap();

    assert!(rig.svc.tuning_zone().is_none());
    let st = rig.svc.zone_status("bench-a").unwrap();
    assert!(!st.controller.enabled);
    assert_eq!(st.controller.state.last_output, 50.0);
}

#[test]
fn disabled_zone_refuses_an_experiment() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.command(ControlCommand::SetZoneEnabled {
        zone_id: "bench-a".into(),
        enabled: false,
    })
    .unwrap();

    assert_eq!(rig.command(start_tune("bench-a")), Err(Error::ZoneDisabled));
    assert!(rig.svc.tuning_zone().is_none());
    assert_eq!(rig.svc.zone_count(), 2);

    for _ in 0..20 {
        rig.step();
    }
    assert_eq!(rig.sink.count(|e| matches!(e, ControlEvent::TuningStarted { .. })), 0);
    assert_eq!(rig.sink.count(|e| matches!(e, ControlEvent::TuningConverged { .. })), 0);
    let st = rig.svc.zone_status("bench-a").unwrap();
    assert!(!st.controller.enabled);
    assert_eq!(st.controller.state.last_output, 50.0);

    // Re-enabled, the same zone can be tuned.
    rig.command(ControlCommand::SetZoneEnabled {
        zone_id: "bench-a".into(),
        enabled: true,
    })
    .unwrap();
    assert_eq!(rig.command(start_tune("bench-a")), Ok(()));
    assert_eq!(rig.svc.tuning_zone(), Some("bench-a"));
}
