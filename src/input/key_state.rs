//! Published key state shared between the sampler task and its readers.
//!
//! The sampler holds the only [`StateWriter`]; every other holder gets a
//! cloneable [`StateReader`]. The state is one `AtomicU32`, so a reader
//! sees either the previous or the next tick's word, never a mix.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::keys::{GamepadKey, KeyMask};

#[derive(Debug)]
struct KeyStateCell {
    state: AtomicU32,
    // Nanoseconds since `origin`; 0 means no read has happened yet.
    last_read: AtomicU64,
    origin: Instant,
}

/// Creates the cell and its two handles. Only the input module may call
/// this, which keeps the writer in the sampler's hands.
pub(in crate::input) fn channel() -> (StateWriter, StateReader) {
    let cell = Arc::new(KeyStateCell {
        state: AtomicU32::new(KeyMask::EMPTY.bits()),
        last_read: AtomicU64::new(0),
        origin: Instant::now(),
    });
    (
        StateWriter { cell: cell.clone() },
        StateReader {
            cell,
            poll_interval: DEFAULT_POLL_INTERVAL,
        },
    )
}

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Write side of the published state. Not `Clone`.
#[derive(Debug)]
pub struct StateWriter {
    cell: Arc<KeyStateCell>,
}

impl StateWriter {
    pub fn publish(&self, state: KeyMask) {
        self.cell.state.store(state.bits(), Ordering::Release);
    }
}

/// Read side of the published state.
///
/// Cheap to clone; every clone observes the same word and shares the
/// last-read timestamp. Obtained from [`crate::input::InputSubsystem::reader`].
///
/// # Examples
///
/// ```rust,no_run
/// use handheld_input::input::{GamepadKey, StateReader};
///
/// async fn menu_loop(reader: StateReader) {
///     loop {
///         reader.wait_for_key(GamepadKey::Menu, true).await;
///         println!("menu opened, keys held: {}", reader.read_gamepad());
///         reader.wait_for_key(GamepadKey::Menu, false).await;
///     }
/// }
/// ```
///
/// # Performance Impact
///
/// A read is one atomic load plus one atomic store, so polling from a UI
/// frame loop costs nothing measurable. `wait_for_key` wakes once per poll
/// interval for as long as it waits.
#[derive(Debug, Clone)]
pub struct StateReader {
    cell: Arc<KeyStateCell>,
    poll_interval: Duration,
}

impl StateReader {
    /// Interval used by [`StateReader::wait_for_key`] between polls.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Last published state. Records the time of this read.
    pub fn read_gamepad(&self) -> KeyMask {
        let now = self.cell.origin.elapsed().as_nanos() as u64;
        self.cell.last_read.store(now.max(1), Ordering::Relaxed);
        KeyMask(self.cell.state.load(Ordering::Acquire))
    }

    pub fn is_pressed(&self, key: GamepadKey) -> bool {
        self.read_gamepad().contains(key)
    }

    /// Time since the most recent [`StateReader::read_gamepad`] from any
    /// reader sharing this cell. Zero if nobody has read yet.
    pub fn last_read_elapsed(&self) -> Duration {
        match self.cell.last_read.load(Ordering::Relaxed) {
            0 => Duration::ZERO,
            nanos => self
                .cell
                .origin
                .elapsed()
                .saturating_sub(Duration::from_nanos(nanos)),
        }
    }

    /// Waits until `key` is pressed (`pressed == true`) or released.
    ///
    /// Polls the published state, sleeping between polls. There is no
    /// timeout; wrap the future in `tokio::time::timeout` for a bounded wait.
    pub async fn wait_for_key(&self, key: GamepadKey, pressed: bool) {
        debug!("Waiting for {} to be {}", key, if pressed { "pressed" } else { "released" });
        while self.is_pressed(key) != pressed {
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
