//! In-memory board. All handles share one state, so a test can press a
//! button on the [`SimBoard`] while the sampler task reads through its own
//! [`SimPins`] handle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{
    AdcWidth, AnalogChannels, Attenuation, Board, ChannelId, DigitalPins, ExternalPad, HalError,
    PinId, Pull,
};
use crate::input::keys::KeyMask;

#[derive(Debug, Default)]
struct SimState {
    levels: HashMap<PinId, bool>,
    pulls: HashMap<PinId, Pull>,
    analog: HashMap<ChannelId, u16>,
    channels: HashMap<ChannelId, (AdcWidth, Attenuation)>,
    analog_reads: HashMap<ChannelId, usize>,
    pad: KeyMask,
    pad_reads: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SimBoard {
    state: Arc<Mutex<SimState>>,
}

impl SimBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drives `pin` low, the active level of the buttons.
    pub fn press(&self, pin: PinId) {
        self.set_level(pin, false);
    }

    pub fn release(&self, pin: PinId) {
        self.set_level(pin, true);
    }

    pub fn set_level(&self, pin: PinId, high: bool) {
        self.lock().levels.insert(pin, high);
    }

    pub fn set_analog(&self, channel: ChannelId, raw: u16) {
        self.lock().analog.insert(channel, raw);
    }

    pub fn set_pad(&self, keys: KeyMask) {
        self.lock().pad = keys;
    }

    pub fn pull(&self, pin: PinId) -> Option<Pull> {
        self.lock().pulls.get(&pin).copied()
    }

    pub fn channel_config(&self, channel: ChannelId) -> Option<(AdcWidth, Attenuation)> {
        self.lock().channels.get(&channel).copied()
    }

    pub fn analog_reads(&self, channel: ChannelId) -> usize {
        self.lock().analog_reads.get(&channel).copied().unwrap_or(0)
    }

    pub fn pad_reads(&self) -> usize {
        self.lock().pad_reads
    }

    pub fn pins(&self) -> SimPins {
        SimPins {
            board: self.clone(),
        }
    }

    pub fn adc(&self) -> SimAdc {
        SimAdc {
            board: self.clone(),
        }
    }

    pub fn pad(&self) -> SimPad {
        SimPad {
            board: self.clone(),
        }
    }

    pub fn board(&self, with_pad: bool) -> Board {
        Board {
            pins: Box::new(self.pins()),
            input_adc: Box::new(self.adc()),
            battery_adc: Box::new(self.adc()),
            external_pad: if with_pad {
                Some(Box::new(self.pad()))
            } else {
                None
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimPins {
    board: SimBoard,
}

impl DigitalPins for SimPins {
    fn configure_input(&mut self, pin: PinId, pull: Pull) -> Result<(), HalError> {
        self.board.lock().pulls.insert(pin, pull);
        Ok(())
    }

    fn is_high(&mut self, pin: PinId) -> bool {
        let state = self.board.lock();
        match state.levels.get(&pin) {
            Some(level) => *level,
            None => !matches!(state.pulls.get(&pin), Some(Pull::Down)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimAdc {
    board: SimBoard,
}

impl AnalogChannels for SimAdc {
    fn configure(
        &mut self,
        channel: ChannelId,
        width: AdcWidth,
        attenuation: Attenuation,
    ) -> Result<(), HalError> {
        self.board
            .lock()
            .channels
            .insert(channel, (width, attenuation));
        Ok(())
    }

    fn read_raw(&mut self, channel: ChannelId) -> u16 {
        let mut state = self.board.lock();
        *state.analog_reads.entry(channel).or_insert(0) += 1;
        let max = state
            .channels
            .get(&channel)
            .map(|(width, _)| width.max_raw())
            .unwrap_or(AdcWidth::Bits12.max_raw());
        state.analog.get(&channel).copied().unwrap_or(0).min(max)
    }
}

#[derive(Debug, Clone)]
pub struct SimPad {
    board: SimBoard,
}

impl ExternalPad for SimPad {
    fn read(&mut self) -> KeyMask {
        let mut state = self.board.lock();
        state.pad_reads += 1;
        state.pad
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_pins_follow_their_pull() {
        let board = SimBoard::new();
        let mut pins = board.pins();
        pins.configure_input(4, Pull::Up).unwrap();
        pins.configure_input(5, Pull::Down).unwrap();
        assert!(pins.is_high(4));
        assert!(!pins.is_high(5));

        board.press(4);
        assert!(!pins.is_high(4));
        board.release(4);
        assert!(pins.is_high(4));
    }

    #[test]
    fn analog_reads_are_counted_and_clamped() {
        let board = SimBoard::new();
        let mut adc = board.adc();
        adc.configure(1, AdcWidth::Bits10, Attenuation::Db11).unwrap();
        board.set_analog(1, 4000);
        assert_eq!(adc.read_raw(1), 1023);
        assert_eq!(adc.read_raw(2), 0);
        assert_eq!(board.analog_reads(1), 1);
        assert_eq!(board.analog_reads(2), 1);
    }
}
