//! Input subsystem for the handheld's buttons and direction pad
//!
//! 1. [`sampler`] - fixed-rate sampling and debounce, one background task
//! 2. [`key_state`] - the published key word and its read-only handles
//! 3. [`input_handle`] - lifecycle (init/deinit/shutdown) and queries
//!
//! # Architecture
//!
//! ```text
//! GPIO ─┐
//! ADC ──┼─► raw KeyMask ──► DebounceBank ──► StateWriter ══► StateReader (any task)
//! Pad ──┘   (every tick)                     (AtomicU32)
//! ```

pub mod axis;
pub mod debounce;
pub mod input_handle;
pub mod key_state;
pub mod keys;
pub mod sampler;

pub use input_handle::{InputError, InputSubsystem};
pub use key_state::StateReader;
pub use keys::{GamepadKey, KeyMask};
pub use sampler::SamplerParts;
