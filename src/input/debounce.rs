//! Per-key shift-register debounce.
//!
//! Every key owns a small window holding its last `depth` raw observations.
//! A full window of ones commits "pressed", an empty window commits
//! "released", and any mixed window keeps whatever was committed before.
//! That gives hysteresis rather than a majority vote: a single contrary
//! sample never flips a committed key.

use super::keys::{GamepadKey, KeyMask};

/// Smallest and largest supported window, in ticks.
pub const MIN_DEPTH: u8 = 1;
pub const MAX_DEPTH: u8 = 8;

#[derive(Debug, Clone)]
pub struct DebounceBank {
    counters: [u8; GamepadKey::COUNT],
    window: u8,
    state: KeyMask,
}

impl DebounceBank {
    /// Creates a bank with every key released and every window empty.
    /// `depth` is clamped into `MIN_DEPTH..=MAX_DEPTH`.
    pub fn new(depth: u8) -> Self {
        let depth = depth.clamp(MIN_DEPTH, MAX_DEPTH);
        let window = ((1u16 << depth) - 1) as u8;
        Self {
            counters: [0; GamepadKey::COUNT],
            window,
            state: KeyMask::EMPTY,
        }
    }

    pub fn depth(&self) -> u8 {
        self.window.count_ones() as u8
    }

    /// Shifts one raw sample into every window and returns the committed state.
    pub fn update(&mut self, raw: KeyMask) -> KeyMask {
        for key in GamepadKey::ALL {
            let i = key.index();
            let bit = ((raw.bits() >> i) & 1) as u8;
            let counter = ((self.counters[i] << 1) | bit) & self.window;
            self.counters[i] = counter;

            if counter == self.window {
                self.state.set(key, true);
            } else if counter == 0 {
                self.state.set(key, false);
            }
        }
        self.state
    }

    pub fn state(&self) -> KeyMask {
        self.state
    }

    /// Raw window of one key; always within `0..2^depth`.
    pub fn counter(&self, key: GamepadKey) -> u8 {
        self.counters[key.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(bank: &mut DebounceBank, key: GamepadKey, raw: &[bool]) -> Vec<bool> {
        raw.iter()
            .map(|&on| {
                let sample = if on { key.mask() } else { KeyMask::EMPTY };
                bank.update(sample).contains(key)
            })
            .collect()
    }

    #[test]
    fn two_bit_window_matches_shift_register_timing() {
        let mut bank = DebounceBank::new(2);
        let published = feed(&mut bank, GamepadKey::A, &[true, true, false, false]);
        assert_eq!(published, vec![false, true, true, false]);
    }

    #[test]
    fn single_tick_glitch_never_changes_state() {
        let mut bank = DebounceBank::new(2);
        let published = feed(&mut bank, GamepadKey::B, &[true, false, true, false, true, false]);
        assert!(published.iter().all(|p| !p));

        // Once pressed, isolated zeros don't release it.
        feed(&mut bank, GamepadKey::B, &[true, true]);
        let published = feed(&mut bank, GamepadKey::B, &[false, true, false, true]);
        assert!(published.iter().all(|p| *p));
    }

    #[test]
    fn deeper_window_needs_longer_runs() {
        let mut bank = DebounceBank::new(4);
        let published = feed(
            &mut bank,
            GamepadKey::Start,
            &[true, true, true, true, false, false, false, false],
        );
        assert_eq!(
            published,
            vec![false, false, false, true, true, true, true, false]
        );
    }

    #[test]
    fn keys_debounce_independently() {
        let mut bank = DebounceBank::new(2);
        let up = GamepadKey::Up.mask();
        let both = up | GamepadKey::Menu.mask();

        bank.update(up);
        bank.update(both);
        let state = bank.state();
        assert!(state.contains(GamepadKey::Up));
        assert!(!state.contains(GamepadKey::Menu));

        let state = bank.update(GamepadKey::Menu.mask());
        assert!(state.contains(GamepadKey::Up));
        assert!(state.contains(GamepadKey::Menu));
    }

    #[test]
    fn counters_stay_inside_window() {
        let mut bank = DebounceBank::new(3);
        for n in 0..64u32 {
            bank.update(KeyMask(n.wrapping_mul(0x9E37_79B9) & KeyMask::ALL.bits()));
            for key in GamepadKey::ALL {
                assert!(bank.counter(key) < 8);
            }
        }
    }

    #[test]
    fn depth_is_clamped() {
        assert_eq!(DebounceBank::new(0).depth(), 1);
        assert_eq!(DebounceBank::new(2).depth(), 2);
        assert_eq!(DebounceBank::new(12).depth(), 8);
    }
}
