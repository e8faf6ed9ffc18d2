//! Fuzz target: PID and adaptive update on arbitrary measurement streams
//!
//! Every 6 input bytes become one `(measurement: f32, dt_ms: u16)` step, so
//! NaN, infinities and subnormals all show up.  Verifies:
//! - No panics
//! - Output always finite and within `[output_min, output_max]`
//! - Integral never exceeds the windup guard
//!
//! cargo fuzz run fuzz_pid_update

#![no_main]

use libfuzzer_sys::fuzz_target;
use luxloop::config::{AdaptiveConfig, PidConfig};
use luxloop::control::adaptive::AdaptivePidController;
use luxloop::control::pid::PidController;

fuzz_target!(|data: &[u8]| {
    let cfg = PidConfig::default();
    let (lo, hi, guard) = (cfg.output_min, cfg.output_max, cfg.integral_windup_guard);
    let mut pid = PidController::new(cfg.clone());
    let mut adaptive = AdaptivePidController::new(cfg, &AdaptiveConfig::default());

    let mut now = 0u64;
    for chunk in data.chunks_exact(6) {
        let measured = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        now += u64::from(u16::from_le_bytes([chunk[4], chunk[5]]));

        for out in [pid.update(measured, now), adaptive.update(measured, now)] {
            assert!(out.is_finite());
            assert!(out >= lo && out <= hi);
        }
        assert!(pid.state().integral.abs() <= guard);
        assert!(adaptive.controller().state().integral.abs() <= guard);
    }
});
