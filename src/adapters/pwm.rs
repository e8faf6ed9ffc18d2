//! PWM dimmer adapter.
//!
//! Maps each zone to one `embedded-hal` PWM channel and converts the
//! controller's percent command to a duty cycle.  Works with any HAL whose
//! channels implement [`SetDutyCycle`].

use std::collections::BTreeMap;

use embedded_hal::pwm::SetDutyCycle;
use log::{debug, warn};

use crate::app::ports::DimmerPort;
use crate::error::ActuatorError;

pub struct PwmDimmer<P> {
    channels: BTreeMap<String, P>,
}

impl<P> Default for PwmDimmer<P> {
    fn default() -> Self {
        Self {
            channels: BTreeMap::new(),
        }
    }
}

impl<P: SetDutyCycle> PwmDimmer<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `channel` to `zone_id`, returning any channel it replaces.
    pub fn bind(&mut self, zone_id: &str, channel: P) -> Option<P> {
        self.channels.insert(zone_id.to_owned(), channel)
    }

    pub fn channel(&self, zone_id: &str) -> Option<&P> {
        self.channels.get(zone_id)
    }
}

/// Duty value for `percent` on a channel with `max` resolution.
fn duty_for(percent: f32, max: u16) -> u16 {
    let p = if percent.is_finite() {
        percent.clamp(0.0, 100.0)
    } else {
        0.0
    };
    (p / 100.0 * f32::from(max)).round() as u16
}

impl<P: SetDutyCycle> DimmerPort for PwmDimmer<P> {
    fn set_output(&mut self, zone_id: &str, percent: f32) -> Result<(), ActuatorError> {
        let ch = self
            .channels
            .get_mut(zone_id)
            .ok_or(ActuatorError::UnknownChannel)?;
        let duty = duty_for(percent, ch.max_duty_cycle());
        ch.set_duty_cycle(duty).map_err(|e| {
            warn!("pwm: '{zone_id}' duty write failed: {e:?}");
            ActuatorError::PwmWriteFailed
        })?;
        debug!("pwm: '{zone_id}' duty={duty}");
        Ok(())
    }
}
