use crate::config::FanThresholds;
use crate::error::{ConfigError, RelayError};
use crate::types::{FanState, SensorReading};

pub trait FanRelay {
    fn set_fan(&mut self, state: FanState) -> Result<(), RelayError>;
}

#[derive(Debug, Clone)]
pub struct ThermostatController {
    thresholds: FanThresholds,
    fan: FanState,
}

impl ThermostatController {
    pub fn new(thresholds: FanThresholds) -> Result<Self, ConfigError> {
        thresholds.validate()?;
        Ok(Self {
            thresholds,
            fan: FanState::Off,
        })
    }

    pub fn fan_state(&self) -> FanState {
        self.fan
    }

    pub fn thresholds(&self) -> FanThresholds {
        self.thresholds
    }

    // Hysteresis: the fan latches on at on_temp_f and stays on until the
    // temperature drops to off_temp_f. Anything between the two holds the
    // current state, as does an invalid reading.
    pub fn evaluate(&mut self, reading: &SensorReading) -> FanState {
        if !reading.valid {
            return self.fan;
        }

        let temp = reading.temperature_f;
        self.fan = match self.fan {
            FanState::Off if temp >= self.thresholds.on_temp_f => FanState::On,
            FanState::On if temp <= self.thresholds.off_temp_f => FanState::Off,
            held => held,
        };
        self.fan
    }
}
