//! Logical key set and the bitmask word shared between the sampler and readers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical keys of the handheld, in bit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GamepadKey {
    Up,
    Down,
    Left,
    Right,
    Select,
    Start,
    A,
    B,
    Menu,
    Volume,
}

impl GamepadKey {
    pub const COUNT: usize = 10;

    pub const ALL: [GamepadKey; Self::COUNT] = [
        GamepadKey::Up,
        GamepadKey::Down,
        GamepadKey::Left,
        GamepadKey::Right,
        GamepadKey::Select,
        GamepadKey::Start,
        GamepadKey::A,
        GamepadKey::B,
        GamepadKey::Menu,
        GamepadKey::Volume,
    ];

    /// Bit position of this key inside a [`KeyMask`].
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn mask(self) -> KeyMask {
        KeyMask(1 << self.index())
    }

    pub const fn name(self) -> &'static str {
        match self {
            GamepadKey::Up => "Up",
            GamepadKey::Down => "Down",
            GamepadKey::Left => "Left",
            GamepadKey::Right => "Right",
            GamepadKey::Select => "Select",
            GamepadKey::Start => "Start",
            GamepadKey::A => "A",
            GamepadKey::B => "B",
            GamepadKey::Menu => "Menu",
            GamepadKey::Volume => "Volume",
        }
    }
}

impl fmt::Display for GamepadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One bit per [`GamepadKey`]. Used both for a raw tick sample and for the
/// debounced state that gets published.
///
/// The width is fixed to `u32` so the published word always fits a single
/// atomic load/store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct KeyMask(pub u32);

impl KeyMask {
    pub const EMPTY: KeyMask = KeyMask(0);

    /// Every defined key set.
    pub const ALL: KeyMask = KeyMask((1 << GamepadKey::COUNT) - 1);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, key: GamepadKey) -> bool {
        self.0 & key.mask().0 != 0
    }

    pub fn set(&mut self, key: GamepadKey, active: bool) {
        if active {
            self.0 |= key.mask().0;
        } else {
            self.0 &= !key.mask().0;
        }
    }

    pub const fn with(self, key: GamepadKey) -> KeyMask {
        KeyMask(self.0 | key.mask().0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn pressed(self) -> impl Iterator<Item = GamepadKey> {
        GamepadKey::ALL.into_iter().filter(move |k| self.contains(*k))
    }
}

impl std::ops::BitOr for KeyMask {
    type Output = KeyMask;

    fn bitor(self, rhs: KeyMask) -> KeyMask {
        KeyMask(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for KeyMask {
    fn bitor_assign(&mut self, rhs: KeyMask) {
        self.0 |= rhs.0;
    }
}

impl From<GamepadKey> for KeyMask {
    fn from(key: GamepadKey) -> Self {
        key.mask()
    }
}

impl fmt::Display for KeyMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("[]");
        }
        f.write_str("[")?;
        for (i, key) in self.pressed().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(key.name())?;
        }
        f.write_str("]")
    }
}
