//! Peripheral access used by the sampler and the battery estimator.
//!
//! Two backends implement these traits:
//!
//! - [`rpi`] - Raspberry Pi GPIO, an MCP3008 ADC on SPI and a NES/SNES pad
//! - [`sim`] - a shared in-memory board for tests and bench runs
//!
//! Reads are infallible by contract. A backend that hits an I/O error logs
//! it and returns the idle value (high level, zero sample, empty pad).

pub mod pin_bank;
pub mod rpi;
pub mod sim;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{BackendKind, HardwareConfig};
use crate::input::keys::KeyMask;

pub use pin_bank::{AudioSink, PinBankArbiter, PinBankOwner};

/// BCM pin number.
pub type PinId = u8;

/// ADC input channel.
pub type ChannelId = u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pull {
    #[default]
    Up,
    Down,
    Floating,
}

/// Sample width of an analog channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdcWidth {
    Bits9,
    Bits10,
    Bits11,
    #[default]
    Bits12,
}

impl AdcWidth {
    pub const fn bits(self) -> u8 {
        match self {
            AdcWidth::Bits9 => 9,
            AdcWidth::Bits10 => 10,
            AdcWidth::Bits11 => 11,
            AdcWidth::Bits12 => 12,
        }
    }

    pub const fn max_raw(self) -> u16 {
        (1u16 << self.bits()) - 1
    }
}

/// Input attenuation; selects the measurable voltage range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attenuation {
    Db0,
    Db2_5,
    Db6,
    #[default]
    Db11,
}

#[derive(Debug, thiserror::Error)]
pub enum HalError {
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[error("SPI error: {0}")]
    Spi(#[from] rppal::spi::Error),

    #[error("Invalid ADC channel: {0}")]
    InvalidChannel(ChannelId),

    #[error("Invalid SPI bus or slave select: {0}")]
    InvalidSpi(String),
}

pub trait DigitalPins: Send {
    fn configure_input(&mut self, pin: PinId, pull: Pull) -> Result<(), HalError>;

    /// Current level of `pin`; `true` is high.
    fn is_high(&mut self, pin: PinId) -> bool;
}

pub trait AnalogChannels: Send {
    fn configure(
        &mut self,
        channel: ChannelId,
        width: AdcWidth,
        attenuation: Attenuation,
    ) -> Result<(), HalError>;

    /// Raw sample in `0..=width.max_raw()` for the configured width.
    fn read_raw(&mut self, channel: ChannelId) -> u16;
}

/// An external controller sharing its pins with the audio DAC.
pub trait ExternalPad: Send {
    fn read(&mut self) -> KeyMask;
}

/// Every peripheral handle the crate needs, opened from configuration.
pub struct Board {
    pub pins: Box<dyn DigitalPins>,
    pub input_adc: Box<dyn AnalogChannels>,
    pub battery_adc: Box<dyn AnalogChannels>,
    pub external_pad: Option<Box<dyn ExternalPad>>,
}

impl Board {
    pub fn open(config: &HardwareConfig) -> Result<Self, HalError> {
        match config.backend {
            BackendKind::Rpi => {
                info!("Opening Raspberry Pi backend");
                rpi::open(config)
            }
            BackendKind::Sim => {
                info!("Opening simulated backend");
                Ok(sim::SimBoard::new().board(config.external_pad.is_some()))
            }
        }
    }
}
