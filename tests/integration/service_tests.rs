//! LightingService integration tests.
//!
//! Drive the service through its ports with [`MockHw`] and a
//! [`RecordingSink`], asserting on dimmer writes and emitted events.

use luxloop::adapters::store::MemoryConfigStore;
use luxloop::adapters::time::ManualClock;
use luxloop::app::commands::ControlCommand;
use luxloop::app::events::ControlEvent;
use luxloop::app::ports::ConfigPort;
use luxloop::app::service::LightingService;
use luxloop::config::SystemConfig;
use luxloop::control::{GainUpdate, Gains};
use luxloop::error::{ActuatorError, ConfigError, Error};

use crate::mock_hw::{MockHw, RecordingSink};

fn service() -> LightingService {
    LightingService::new(SystemConfig::default()).unwrap()
}

fn nominal_hw() -> MockHw {
    MockHw::with_readings(&[("ppfd-a1", 400.0), ("ppfd-a2", 400.0), ("ppfd-b1", 400.0)])
}

// ── Lifecycle ─────────────────────────────────────────────────

#[test]
fn start_announces_zone_count() {
    let mut svc = service();
    let mut sink = RecordingSink::new();
    svc.start(&mut sink);
    assert_eq!(sink.events, vec![ControlEvent::Started { zones: 2 }]);
}

#[test]
fn tick_drives_every_zone() {
    let mut svc = service();
    let clock = ManualClock::new(0);
    let mut hw = nominal_hw();
    let mut sink = RecordingSink::new();

    let out = svc.tick(&clock, &mut hw, &mut sink);

    // bench-a: 100 below target saturates high; bench-b: 50 above saturates low.
    assert_eq!(out["bench-a"], 100.0);
    assert_eq!(out["bench-b"], 0.0);
    assert_eq!(hw.last_output("bench-a"), Some(100.0));
    assert_eq!(hw.last_output("bench-b"), Some(0.0));
    assert!(sink.events.contains(&ControlEvent::ZoneOutput {
        zone_id: "bench-a".into(),
        measured: 400.0,
        output: 100.0,
    }));
    assert_eq!(svc.tick_count(), 1);
}

#[test]
fn ticks_inside_sample_time_hold_output() {
    let mut svc = service();
    let clock = ManualClock::new(0);
    let mut hw = nominal_hw();
    let mut sink = RecordingSink::new();

    svc.tick(&clock, &mut hw, &mut sink);
    hw.set_readings(&[("ppfd-a1", 900.0), ("ppfd-a2", 900.0), ("ppfd-b1", 0.0)]);
    clock.advance(400);
    let out = svc.tick(&clock, &mut hw, &mut sink);
    assert_eq!(out["bench-a"], 100.0);
    assert_eq!(out["bench-b"], 0.0);
}

// ── Degraded inputs and outputs ───────────────────────────────

#[test]
fn zone_without_sensors_is_skipped() {
    let mut svc = service();
    let clock = ManualClock::new(0);
    let mut hw = MockHw::with_readings(&[("ppfd-a1", 400.0), ("ppfd-b1", f32::NAN)]);
    let mut sink = RecordingSink::new();

    let out = svc.tick(&clock, &mut hw, &mut sink);

    assert!(out.contains_key("bench-a"));
    assert!(!out.contains_key("bench-b"));
    assert_eq!(hw.calls_for("bench-b"), 0);
    assert!(sink.events.contains(&ControlEvent::ZoneSkipped {
        zone_id: "bench-b".into()
    }));
}

#[test]
fn dimmer_fault_is_reported_and_isolated() {
    let mut svc = service();
    let clock = ManualClock::new(0);
    let mut hw = nominal_hw();
    hw.failing.insert("bench-a".into());
    let mut sink = RecordingSink::new();

    svc.tick(&clock, &mut hw, &mut sink);

    assert!(sink.events.contains(&ControlEvent::ActuatorFault {
        zone_id: "bench-a".into(),
        error: ActuatorError::PwmWriteFailed,
    }));
    assert_eq!(hw.last_output("bench-b"), Some(0.0));
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn unknown_zone_is_rejected() {
    let mut svc = service();
    let clock = ManualClock::new(0);
    let mut sink = RecordingSink::new();
    let err = svc.handle_command(
        ControlCommand::SetSetpoint {
            zone_id: "attic".into(),
            setpoint: 10.0,
        },
        &clock,
        &mut sink,
    );
    assert_eq!(err, Err(Error::UnknownZone));
}

#[test]
fn setpoint_and_tune_commands_apply() {
    let mut svc = service();
    let clock = ManualClock::new(0);
    let mut sink = RecordingSink::new();

    svc.handle_command(
        ControlCommand::SetSetpoint {
            zone_id: "bench-b".into(),
            setpoint: 275.0,
        },
        &clock,
        &mut sink,
    )
    .unwrap();
    svc.handle_command(
        ControlCommand::Tune {
            zone_id: "bench-b".into(),
            gains: GainUpdate {
                kp: Some(1.25),
                ..GainUpdate::default()
            },
        },
        &clock,
        &mut sink,
    )
    .unwrap();

    let st = svc.zone_status("bench-b").unwrap();
    assert_eq!(st.controller.setpoint, 275.0);
    assert_eq!(
        st.controller.gains,
        Gains {
            kp: 1.25,
            ki: 0.5,
            kd: 0.1
        }
    );
}

#[test]
fn disabled_zones_freeze_at_neutral() {
    let mut svc = service();
    let clock = ManualClock::new(0);
    let mut hw = nominal_hw();
    let mut sink = RecordingSink::new();

    svc.tick(&clock, &mut hw, &mut sink);
    svc.handle_command(ControlCommand::SetAllEnabled(false), &clock, &mut sink)
        .unwrap();
    hw.set_readings(&[("ppfd-a1", 900.0), ("ppfd-a2", 900.0), ("ppfd-b1", 0.0)]);
    clock.advance(5_000);
    let out = svc.tick(&clock, &mut hw, &mut sink);

    // Disabling resets to the midpoint and freezes there.
    assert_eq!(out["bench-a"], 50.0);
    assert_eq!(out["bench-b"], 50.0);
    assert!(!svc.zone_status("bench-a").unwrap().controller.enabled);
}

#[test]
fn adaptation_toggle_reaches_every_zone() {
    let mut svc = service();
    let clock = ManualClock::new(0);
    let mut sink = RecordingSink::new();

    svc.handle_command(
        ControlCommand::SetAdaptation {
            zone_id: None,
            enabled: false,
        },
        &clock,
        &mut sink,
    )
    .unwrap();
    for id in svc.zone_ids() {
        assert!(!svc.adaptation_metrics(&id).unwrap().adaptation_enabled);
    }

    svc.handle_command(
        ControlCommand::SetAdaptation {
            zone_id: Some("bench-a".into()),
            enabled: true,
        },
        &clock,
        &mut sink,
    )
    .unwrap();
    assert!(svc.adaptation_metrics("bench-a").unwrap().adaptation_enabled);
    assert!(!svc.adaptation_metrics("bench-b").unwrap().adaptation_enabled);
}

#[test]
fn adaptation_stays_frozen_when_disabled() {
    let mut svc = service();
    let clock = ManualClock::new(0);
    let mut hw = nominal_hw();
    let mut sink = RecordingSink::new();
    svc.handle_command(
        ControlCommand::SetAdaptation {
            zone_id: None,
            enabled: false,
        },
        &clock,
        &mut sink,
    )
    .unwrap();

    for _ in 0..30 {
        svc.tick(&clock, &mut hw, &mut sink);
        clock.advance(1_000);
    }
    let m = svc.adaptation_metrics("bench-a").unwrap();
    assert_eq!(m.adjustments, 0);
    assert_eq!(m.samples, 30);
    assert_eq!(m.current_gains, SystemConfig::default().zones[0].pid.gains());
}

// ── Telemetry ─────────────────────────────────────────────────

#[test]
fn telemetry_reflects_last_tick() {
    let mut svc = service();
    let clock = ManualClock::new(0);
    let mut hw = nominal_hw();
    let mut sink = RecordingSink::new();

    svc.tick(&clock, &mut hw, &mut sink);
    let t = svc.build_telemetry();
    assert_eq!(t.tick, 1);
    let a = t.zones.iter().find(|z| z.zone_id == "bench-a").unwrap();
    assert_eq!(a.measured, Some(400.0));
    assert_eq!(a.output, 100.0);
    assert!(a.enabled);
}

// ── Configuration persistence ────────────────────────────────

#[test]
fn empty_store_falls_back_to_defaults() {
    let store = MemoryConfigStore::new();
    let svc = LightingService::from_store(&store).unwrap();
    assert_eq!(svc.current_config(), SystemConfig::default());
}

#[test]
fn corrupt_store_is_an_error() {
    let store = MemoryConfigStore::with_blob(vec![0xde, 0xad]);
    assert!(matches!(
        LightingService::from_store(&store),
        Err(ConfigError::Malformed)
    ));
}

#[test]
fn live_changes_survive_save_and_reload() {
    let mut svc = service();
    let clock = ManualClock::new(0);
    let mut sink = RecordingSink::new();
    svc.handle_command(
        ControlCommand::SetSetpoint {
            zone_id: "bench-a".into(),
            setpoint: 620.0,
        },
        &clock,
        &mut sink,
    )
    .unwrap();

    let mut store = MemoryConfigStore::new();
    svc.save_config(&mut store).unwrap();
    let reloaded = LightingService::from_store(&store).unwrap();

    assert_eq!(
        reloaded.zone_status("bench-a").unwrap().controller.setpoint,
        620.0
    );
    assert_eq!(store.load().unwrap(), svc.current_config());
}
