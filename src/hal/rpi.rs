//! Raspberry Pi backend.
//!
//! - Buttons on BCM GPIO lines, active low
//! - Direction ladders and battery divider on an MCP3008 (10-bit, SPI)
//! - NES/SNES pad on three GPIO lines: latch, clock, serial data

use rppal::gpio::{Gpio, InputPin, OutputPin};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{
    AdcWidth, AnalogChannels, Attenuation, Board, ChannelId, DigitalPins, ExternalPad, HalError,
    PinId, Pull,
};
use crate::config::{ExternalPadConfig, HardwareConfig, SpiConfig};
use crate::input::keys::{GamepadKey, KeyMask};

pub fn open(config: &HardwareConfig) -> Result<Board, HalError> {
    let gpio = Gpio::new()?;
    let pins = RpiPins::new(gpio.clone());
    let input_adc = Mcp3008::open(&config.spi)?;
    let battery_adc = Mcp3008::open(&config.spi)?;

    let external_pad: Option<Box<dyn ExternalPad>> = match &config.external_pad {
        Some(pad) => Some(Box::new(ShiftRegisterPad::open(&gpio, pad)?)),
        None => None,
    };

    Ok(Board {
        pins: Box::new(pins),
        input_adc: Box::new(input_adc),
        battery_adc: Box::new(battery_adc),
        external_pad,
    })
}

pub struct RpiPins {
    gpio: Gpio,
    inputs: HashMap<PinId, InputPin>,
}

impl RpiPins {
    pub fn new(gpio: Gpio) -> Self {
        Self {
            gpio,
            inputs: HashMap::new(),
        }
    }
}

impl DigitalPins for RpiPins {
    fn configure_input(&mut self, pin: PinId, pull: Pull) -> Result<(), HalError> {
        let raw = self.gpio.get(pin)?;
        let input = match pull {
            Pull::Up => raw.into_input_pullup(),
            Pull::Down => raw.into_input_pulldown(),
            Pull::Floating => raw.into_input(),
        };
        debug!("GPIO{} configured as input ({:?})", pin, pull);
        self.inputs.insert(pin, input);
        Ok(())
    }

    fn is_high(&mut self, pin: PinId) -> bool {
        match self.inputs.get(&pin) {
            Some(input) => input.is_high(),
            None => true,
        }
    }
}

const MCP3008_CHANNELS: u8 = 8;
const MCP3008_BITS: u8 = 10;

/// MCP3008 single-ended reads, rescaled to the width each channel was
/// configured with. The chip has no attenuation stage; that setting only
/// matters to calibration.
pub struct Mcp3008 {
    spi: Spi,
    widths: HashMap<ChannelId, AdcWidth>,
}

impl Mcp3008 {
    pub fn open(config: &SpiConfig) -> Result<Self, HalError> {
        let bus = match config.bus {
            0 => Bus::Spi0,
            1 => Bus::Spi1,
            2 => Bus::Spi2,
            other => return Err(HalError::InvalidSpi(format!("bus {}", other))),
        };
        let slave_select = match config.slave_select {
            0 => SlaveSelect::Ss0,
            1 => SlaveSelect::Ss1,
            2 => SlaveSelect::Ss2,
            other => return Err(HalError::InvalidSpi(format!("slave select {}", other))),
        };
        let spi = Spi::new(bus, slave_select, config.clock_hz, Mode::Mode0)?;
        info!(
            "MCP3008 opened on SPI{} CE{} at {} Hz",
            config.bus, config.slave_select, config.clock_hz
        );
        Ok(Self {
            spi,
            widths: HashMap::new(),
        })
    }
}

impl AnalogChannels for Mcp3008 {
    fn configure(
        &mut self,
        channel: ChannelId,
        width: AdcWidth,
        attenuation: Attenuation,
    ) -> Result<(), HalError> {
        if channel >= MCP3008_CHANNELS {
            return Err(HalError::InvalidChannel(channel));
        }
        debug!(
            "ADC channel {} configured: {:?}, {:?}",
            channel, width, attenuation
        );
        self.widths.insert(channel, width);
        Ok(())
    }

    fn read_raw(&mut self, channel: ChannelId) -> u16 {
        if channel >= MCP3008_CHANNELS {
            warn!("Read from invalid ADC channel {}", channel);
            return 0;
        }

        // Start bit, single-ended mode + channel, then clock out 10 bits.
        let tx = [0x01, (0x08 | channel) << 4, 0x00];
        let mut rx = [0u8; 3];
        if let Err(e) = self.spi.transfer(&mut rx, &tx) {
            warn!("SPI transfer for channel {} failed: {}", channel, e);
            return 0;
        }
        let value = (u16::from(rx[1] & 0x03) << 8) | u16::from(rx[2]);

        let bits = self
            .widths
            .get(&channel)
            .copied()
            .unwrap_or(AdcWidth::Bits10)
            .bits();
        if bits >= MCP3008_BITS {
            value << (bits - MCP3008_BITS)
        } else {
            value >> (MCP3008_BITS - bits)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PadProtocol {
    Nes,
    #[default]
    Snes,
}

impl PadProtocol {
    /// Keys in the order the shift register clocks them out.
    fn key_order(self) -> &'static [Option<GamepadKey>] {
        use GamepadKey::*;
        match self {
            PadProtocol::Nes => &[
                Some(A),
                Some(B),
                Some(Select),
                Some(Start),
                Some(Up),
                Some(Down),
                Some(Left),
                Some(Right),
            ],
            // B Y Select Start Up Down Left Right A X L R, then four idle bits.
            PadProtocol::Snes => &[
                Some(B),
                None,
                Some(Select),
                Some(Start),
                Some(Up),
                Some(Down),
                Some(Left),
                Some(Right),
                Some(A),
                None,
                Some(Menu),
                Some(Volume),
                None,
                None,
                None,
                None,
            ],
        }
    }
}

const LATCH_PULSE: Duration = Duration::from_micros(12);
const CLOCK_HALF_PERIOD: Duration = Duration::from_micros(6);

pub struct ShiftRegisterPad {
    protocol: PadProtocol,
    latch: OutputPin,
    clock: OutputPin,
    data: InputPin,
}

impl ShiftRegisterPad {
    pub fn open(gpio: &Gpio, config: &ExternalPadConfig) -> Result<Self, HalError> {
        let mut latch = gpio.get(config.latch_pin)?.into_output();
        let mut clock = gpio.get(config.clock_pin)?.into_output();
        let data = gpio.get(config.data_pin)?.into_input_pullup();
        latch.set_low();
        clock.set_high();
        info!(
            "{:?} pad on latch GPIO{}, clock GPIO{}, data GPIO{}",
            config.protocol, config.latch_pin, config.clock_pin, config.data_pin
        );
        Ok(Self {
            protocol: config.protocol,
            latch,
            clock,
            data,
        })
    }
}

impl ExternalPad for ShiftRegisterPad {
    fn read(&mut self) -> KeyMask {
        let mut keys = KeyMask::EMPTY;

        self.latch.set_high();
        spin_for(LATCH_PULSE);
        self.latch.set_low();
        spin_for(CLOCK_HALF_PERIOD);

        for slot in self.protocol.key_order() {
            // Data is active low and valid before the falling clock edge.
            if let Some(key) = slot {
                if self.data.is_low() {
                    keys = keys.with(*key);
                }
            }
            self.clock.set_low();
            spin_for(CLOCK_HALF_PERIOD);
            self.clock.set_high();
            spin_for(CLOCK_HALF_PERIOD);
        }

        keys
    }
}

// Sleeping would overshoot these microsecond pulses by far.
fn spin_for(duration: Duration) {
    let start = Instant::now();
    while start.elapsed() < duration {
        std::hint::spin_loop();
    }
}
