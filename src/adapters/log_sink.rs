//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured control events through
//! the `log` facade.  [`StderrLogger`] is the host backend for that facade;
//! a dashboard or MQTT adapter would implement the same trait instead.

use std::io::Write;

use log::{info, warn, Level, LevelFilter, Log, Metadata, Record};

use crate::app::events::ControlEvent;
use crate::app::ports::EventSink;

/// Environment variable holding the log level (`error` … `trace`).
pub const LOG_ENV: &str = "LUXLOOP_LOG";

/// Adapter that logs every [`ControlEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &ControlEvent) {
        match event {
            ControlEvent::Started { zones } => info!("START | zones={zones}"),
            ControlEvent::ZoneOutput {
                zone_id,
                measured,
                output,
            } => info!("ZONE  | {zone_id} | in={measured:.1} out={output:.1}%"),
            ControlEvent::ZoneSkipped { zone_id } => {
                warn!("ZONE  | {zone_id} | no readings, holding output");
            }
            ControlEvent::ActuatorFault { zone_id, error } => {
                warn!("FAULT | {zone_id} | {error}");
            }
            ControlEvent::TuningStarted { zone_id } => info!("TUNE  | {zone_id} | started"),
            ControlEvent::TuningConverged {
                zone_id,
                gains,
                critical_gain,
                average_period_s,
            } => info!(
                "TUNE  | {zone_id} | converged Ku={critical_gain:.3} Tu={average_period_s:.1}s \
                 -> kp={:.3} ki={:.3} kd={:.3}",
                gains.kp, gains.ki, gains.kd
            ),
            ControlEvent::TuningFailed { zone_id, failure } => {
                warn!("TUNE  | {zone_id} | failed: {failure:?}");
            }
            ControlEvent::TuningStopped { zone_id } => info!("TUNE  | {zone_id} | stopped"),
            ControlEvent::Telemetry(t) => {
                for z in &t.zones {
                    info!(
                        "TELEM | #{} {} | en={} sp={:.1} in={} out={:.1}% | kp={:.3} ki={:.3} kd={:.3}",
                        t.tick,
                        z.zone_id,
                        z.enabled,
                        z.setpoint,
                        z.measured.map_or_else(|| "--".to_owned(), |m| format!("{m:.1}")),
                        z.output,
                        z.gains.kp,
                        z.gains.ki,
                        z.gains.kd,
                    );
                }
            }
        }
    }
}

/// Minimal `log` backend writing `LEVEL target: message` lines to stderr.
pub struct StderrLogger {
    level: LevelFilter,
}

static LOGGER: StderrLogger = StderrLogger {
    level: LevelFilter::Trace,
};

impl StderrLogger {
    /// Install as the global logger.  The level comes from [`LOG_ENV`],
    /// defaulting to `info`.  Calling twice is harmless.
    pub fn init() {
        let level = std::env::var(LOG_ENV)
            .ok()
            .and_then(|v| parse_level(&v))
            .unwrap_or(LevelFilter::Info);
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(level);
        }
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut err = std::io::stderr().lock();
        let _ = writeln!(
            err,
            "{:<5} {}: {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn parse_level(s: &str) -> Option<LevelFilter> {
    match s.trim().to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        other => other.parse::<Level>().ok().map(|l| l.to_level_filter()),
    }
}
