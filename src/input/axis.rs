//! Three-zone decoding of the resistor-ladder direction axes.
//!
//! Each axis reads near zero at rest. Pressing one direction pulls it to
//! the middle of the ADC range, the other direction to the top. The decode
//! yields at most one of the two direction keys per axis.

use serde::{Deserialize, Serialize};

use super::keys::{GamepadKey, KeyMask};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisThresholds {
    /// Readings strictly above this are at least a mid deflection.
    pub mid_threshold: u16,
    /// Readings strictly above this are a full deflection.
    pub full_threshold: u16,
}

impl Default for AxisThresholds {
    fn default() -> Self {
        // 12-bit range, centre 2048 with a margin of 1024 either side.
        Self {
            mid_threshold: 1024,
            full_threshold: 2048 + 1024,
        }
    }
}

/// A physical axis and the keys its two deflection zones map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisKeys {
    pub full: GamepadKey,
    pub mid: GamepadKey,
}

pub const Y_AXIS: AxisKeys = AxisKeys {
    full: GamepadKey::Up,
    mid: GamepadKey::Down,
};

pub const X_AXIS: AxisKeys = AxisKeys {
    full: GamepadKey::Left,
    mid: GamepadKey::Right,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisZone {
    Neutral,
    Mid,
    Full,
}

impl AxisThresholds {
    pub fn zone(&self, raw: u16) -> AxisZone {
        if raw > self.full_threshold {
            AxisZone::Full
        } else if raw > self.mid_threshold {
            AxisZone::Mid
        } else {
            AxisZone::Neutral
        }
    }

    pub fn decode(&self, raw: u16, keys: AxisKeys) -> KeyMask {
        match self.zone(raw) {
            AxisZone::Full => keys.full.mask(),
            AxisZone::Mid => keys.mid.mask(),
            AxisZone::Neutral => KeyMask::EMPTY,
        }
    }
}
