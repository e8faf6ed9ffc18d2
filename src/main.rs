//! luxloop-sim — closed-loop run of the lighting service on simulated
//! fixtures.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  Adapters (outer ring)                   │
//! │                                                          │
//! │  SimulatedInstallation   LogEventSink   FileConfigStore  │
//! │  (Sensor+Dimmer)         (EventSink)    (ConfigPort)     │
//! │  ManualClock (Clock)                                     │
//! │                                                          │
//! │  ─────────────── Port Trait Boundary ──────────────      │
//! │                                                          │
//! │  ┌────────────────────────────────────────────────┐      │
//! │  │        LightingService (pure logic)            │      │
//! │  │  PID · adaptation · auto-tune · zones          │      │
//! │  └────────────────────────────────────────────────┘      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `luxloop-sim [CONFIG.json] [--ticks N] [--autotune ZONE] [--save]`
//!
//! Log level comes from `LUXLOOP_LOG`.  Final zone statuses are printed to
//! stdout as JSON.
#![deny(unused_must_use)]

use anyhow::{bail, Context, Result};
use log::info;

use luxloop::adapters::log_sink::{LogEventSink, StderrLogger};
use luxloop::adapters::store::FileConfigStore;
use luxloop::adapters::time::ManualClock;
use luxloop::app::commands::ControlCommand;
use luxloop::app::events::ControlEvent;
use luxloop::app::ports::EventSink;
use luxloop::app::service::LightingService;
use luxloop::config::SystemConfig;
use luxloop::sim::SimulatedInstallation;

const DEFAULT_TICKS: u64 = 120;
const TELEMETRY_EVERY: u64 = 10;

#[derive(Debug, Default)]
struct Args {
    config: Option<String>,
    ticks: Option<u64>,
    autotune: Option<String>,
    save: bool,
}

fn parse_args(mut it: impl Iterator<Item = String>) -> Result<Args> {
    let mut args = Args::default();
    while let Some(a) = it.next() {
        match a.as_str() {
            "--ticks" => {
                let n = it.next().context("--ticks needs a value")?;
                args.ticks = Some(n.parse().with_context(|| format!("bad tick count '{n}'"))?);
            }
            "--autotune" => {
                args.autotune = Some(it.next().context("--autotune needs a zone id")?);
            }
            "--save" => args.save = true,
            flag if flag.starts_with("--") => bail!("unknown option '{flag}'"),
            _ if args.config.is_none() => args.config = Some(a.clone()),
            _ => bail!("unexpected argument '{a}'"),
        }
    }
    Ok(args)
}

fn main() -> Result<()> {
    StderrLogger::init();
    let args = parse_args(std::env::args().skip(1))?;

    info!("luxloop-sim v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Configuration ──────────────────────────────────────
    let mut store = args.config.as_deref().map(FileConfigStore::new);
    let mut service = match &store {
        Some(s) => LightingService::from_store(s)
            .with_context(|| format!("loading {}", s.path().display()))?,
        None => LightingService::new(SystemConfig::default())?,
    };
    let interval = u64::from(service.current_config().control_interval_ms);

    // ── 2. Adapters ───────────────────────────────────────────
    let clock = ManualClock::new(0);
    let mut sim = SimulatedInstallation::from_config(&service.current_config());
    let mut sink = LogEventSink::new();

    service.start(&mut sink);
    if let Some(zone_id) = args.autotune {
        service
            .handle_command(ControlCommand::StartAutoTune { zone_id }, &clock, &mut sink)
            .context("starting auto-tune")?;
    }

    // ── 3. Control loop ───────────────────────────────────────
    for _ in 0..args.ticks.unwrap_or(DEFAULT_TICKS) {
        service.tick(&clock, &mut sim, &mut sink);
        if service.tick_count() % TELEMETRY_EVERY == 0 {
            sink.emit(&ControlEvent::Telemetry(service.build_telemetry()));
        }
        sim.advance(interval);
        clock.advance(interval);
    }

    // ── 4. Report ─────────────────────────────────────────────
    if args.save {
        match store.as_mut() {
            Some(s) => service.save_config(s)?,
            None => bail!("--save needs a config path"),
        }
    }
    let statuses: Vec<_> = service
        .zone_ids()
        .iter()
        .filter_map(|id| service.zone_status(id))
        .collect();
    println!("{}", serde_json::to_string_pretty(&statuses)?);
    Ok(())
}
