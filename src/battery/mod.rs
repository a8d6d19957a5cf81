//! Battery charge estimation from the supply-rail voltage divider.
//!
//! ```text
//! ADC ──► calibration curve ──► mean of N reads ──► running average ──► divider ──► (mV, %)
//! ```

pub mod calibration;
pub mod estimator;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::hal::{AdcWidth, Attenuation, ChannelId, HalError};

pub use calibration::AdcCalibration;
pub use estimator::{battery_state, BatteryEstimator, BatteryState};

#[derive(Debug, thiserror::Error)]
pub enum BatteryError {
    #[error("Hardware error: {0}")]
    Hardware(#[from] HalError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BatteryConfig {
    pub channel: ChannelId,
    /// Raw reads averaged per estimate.
    pub sample_count: u8,
    /// Upper divider resistor, ohms.
    pub divider_r1: f32,
    /// Lower divider resistor (the one the ADC measures across), ohms.
    pub divider_r2: f32,
    pub voltage_empty: f32,
    pub voltage_full: f32,
    pub vref_mv: u32,
    pub width: AdcWidth,
    pub attenuation: Attenuation,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            channel: 0,
            sample_count: 4,
            divider_r1: 10000.0,
            divider_r2: 10000.0,
            voltage_empty: 3.5,
            voltage_full: 4.2,
            vref_mv: 1100,
            width: AdcWidth::Bits12,
            attenuation: Attenuation::Db11,
        }
    }
}

impl BatteryConfig {
    /// Rejects settings that would leave the voltage window or the divider
    /// undefined. Non-finite values never pass.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_count == 0 {
            return Err(ConfigError::Invalid("battery.sample_count must be positive".into()));
        }
        let floats = [
            ("divider_r1", self.divider_r1),
            ("divider_r2", self.divider_r2),
            ("voltage_empty", self.voltage_empty),
            ("voltage_full", self.voltage_full),
        ];
        for (name, value) in floats {
            if !value.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "battery.{} must be a finite number, got {}",
                    name, value
                )));
            }
        }
        if self.divider_r2 <= 0.0 || self.divider_r1 < 0.0 {
            return Err(ConfigError::Invalid("battery divider resistors must be positive".into()));
        }
        if self.voltage_full <= self.voltage_empty {
            return Err(ConfigError::Invalid(
                "battery.voltage_full must be above battery.voltage_empty".into(),
            ));
        }
        Ok(())
    }
}
