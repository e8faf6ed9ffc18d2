//! System configuration parameters
//!
//! All tunable parameters for the light-intensity control core.  The core
//! never persists anything: values arrive from JSON documents or compact
//! postcard blobs handed over by an external store (see
//! [`ConfigPort`](crate::app::ports::ConfigPort)).

use log::warn;
use serde::{Deserialize, Serialize};

use crate::control::Gains;
use crate::error::ConfigError;

/// Per-loop PID configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidConfig {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// Target intensity (e.g. PPFD in µmol/m²/s)
    pub setpoint: f32,
    /// Lower bound of the dimmer command (%)
    pub output_min: f32,
    /// Upper bound of the dimmer command (%)
    pub output_max: f32,
    /// Absolute bound on the accumulated integral
    pub integral_windup_guard: f32,
    /// Errors smaller than this produce no corrective action
    pub deadband: f32,
    /// Minimum spacing between two effective updates (milliseconds)
    pub sample_time_ms: u32,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            kp: 2.0,
            ki: 0.5,
            kd: 0.1,
            setpoint: 500.0,
            output_min: 0.0,
            output_max: 100.0,
            integral_windup_guard: 100.0,
            deadband: 5.0,
            sample_time_ms: 1000,
        }
    }
}

impl PidConfig {
    pub fn gains(&self) -> Gains {
        Gains {
            kp: self.kp,
            ki: self.ki,
            kd: self.kd,
        }
    }

    /// Midpoint of the output range, used as the neutral command.
    pub fn neutral_output(&self) -> f32 {
        (self.output_min + self.output_max) / 2.0
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.output_min.is_finite()
            || !self.output_max.is_finite()
            || self.output_min > self.output_max
        {
            return Err(ConfigError::InvalidOutputRange);
        }
        if self.sample_time_ms == 0 {
            return Err(ConfigError::NonPositiveSampleTime);
        }
        if [self.kp, self.ki, self.kd]
            .iter()
            .any(|g| !g.is_finite() || *g < 0.0)
        {
            return Err(ConfigError::InvalidGain);
        }
        if !self.deadband.is_finite()
            || self.deadband < 0.0
            || !self.integral_windup_guard.is_finite()
            || self.integral_windup_guard < 0.0
        {
            return Err(ConfigError::InvalidTolerance);
        }
        if !self.setpoint.is_finite() {
            return Err(ConfigError::InvalidTolerance);
        }
        Ok(())
    }
}

/// Gain-escalation experiment settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoTuneConfig {
    /// Proportional gain the experiment starts from
    pub initial_gain: f32,
    /// Divergence from the last peak that counts as a new peak
    pub peak_threshold: f32,
    /// Time without oscillation before the gain is escalated (milliseconds)
    pub escalation_timeout_ms: u64,
    /// Multiplier applied on each escalation
    pub gain_step: f32,
    /// Escalating beyond this gain aborts the experiment
    pub max_gain: f32,
    /// Oscillation periods needed before gains are derived
    pub required_periods: usize,
}

impl Default for AutoTuneConfig {
    fn default() -> Self {
        Self {
            initial_gain: 0.5,
            peak_threshold: 10.0,
            escalation_timeout_ms: 30_000,
            gain_step: 1.5,
            max_gain: 50.0,
            required_periods: 3,
        }
    }
}

impl AutoTuneConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.initial_gain.is_finite() || self.initial_gain <= 0.0 {
            return Err(ConfigError::InvalidTuning("initial gain must be positive"));
        }
        if !self.peak_threshold.is_finite() || self.peak_threshold <= 0.0 {
            return Err(ConfigError::InvalidTuning("peak threshold must be positive"));
        }
        if self.escalation_timeout_ms == 0 {
            return Err(ConfigError::InvalidTuning("timeout must be positive"));
        }
        if !self.gain_step.is_finite() || self.gain_step <= 1.0 {
            return Err(ConfigError::InvalidTuning("gain step must exceed 1.0"));
        }
        if !self.max_gain.is_finite() || self.max_gain < self.initial_gain {
            return Err(ConfigError::InvalidTuning("max gain below initial gain"));
        }
        if self.required_periods == 0 || self.required_periods > crate::control::autotune::MAX_PERIODS {
            return Err(ConfigError::InvalidTuning("required periods out of range"));
        }
        Ok(())
    }
}

/// Online gain adaptation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    pub enabled: bool,
    /// Fractional gain change per adjustment (0.01 = 1 %)
    pub adaptation_rate: f32,
    /// Number of recent samples evaluated per adjustment
    pub window: usize,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            adaptation_rate: 0.01,
            window: 10,
        }
    }
}

impl AdaptiveConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.adaptation_rate.is_finite()
            || self.adaptation_rate <= 0.0
            || self.adaptation_rate >= 1.0
        {
            return Err(ConfigError::InvalidTuning("adaptation rate must be in (0, 1)"));
        }
        if self.window == 0 || self.window > crate::control::history::HISTORY_CAPACITY {
            return Err(ConfigError::InvalidTuning("adaptation window out of range"));
        }
        Ok(())
    }
}

/// One independently regulated zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub id: String,
    #[serde(default)]
    pub pid: PidConfig,
    pub sensor_ids: Vec<String>,
    #[serde(default = "default_weight")]
    pub weight: f32,
}

fn default_weight() -> f32 {
    1.0
}

impl ZoneConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.is_empty() {
            return Err(ConfigError::EmptyZoneId);
        }
        if self.sensor_ids.is_empty() {
            return Err(ConfigError::NoSensors);
        }
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(ConfigError::InvalidWeight);
        }
        self.pid.validate()
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Scheduler period driving `LightingService::tick` (milliseconds)
    pub control_interval_ms: u32,
    pub adaptive: AdaptiveConfig,
    pub autotune: AutoTuneConfig,
    pub zones: Vec<ZoneConfig>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            control_interval_ms: 1000, // 1 Hz
            adaptive: AdaptiveConfig::default(),
            autotune: AutoTuneConfig::default(),
            zones: vec![
                ZoneConfig {
                    id: "bench-a".into(),
                    pid: PidConfig::default(),
                    sensor_ids: vec!["ppfd-a1".into(), "ppfd-a2".into()],
                    weight: 1.0,
                },
                ZoneConfig {
                    id: "bench-b".into(),
                    pid: PidConfig {
                        setpoint: 350.0,
                        ..PidConfig::default()
                    },
                    sensor_ids: vec!["ppfd-b1".into()],
                    weight: 0.5,
                },
            ],
        }
    }
}

impl SystemConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.control_interval_ms == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        self.adaptive.validate()?;
        self.autotune.validate()?;
        let mut seen = std::collections::BTreeSet::new();
        for zone in &self.zones {
            zone.validate()?;
            if !seen.insert(zone.id.as_str()) {
                return Err(ConfigError::DuplicateZoneId);
            }
        }
        Ok(())
    }

    /// Parse and validate a JSON document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|e| {
            warn!("config JSON rejected: {e}");
            ConfigError::Malformed
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|_| ConfigError::Malformed)
    }

    /// Compact binary snapshot for external stores.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        postcard::to_allocvec(self).map_err(|_| ConfigError::Malformed)
    }

    /// Decode and validate a snapshot produced by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = postcard::from_bytes(bytes).map_err(|e| {
            warn!("config blob rejected: {e}");
            ConfigError::Malformed
        })?;
        config.validate()?;
        Ok(config)
    }
}
