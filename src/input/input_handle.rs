//! Input Handle - lifecycle and query API of the input subsystem
//!
//! Owns the sampler while it is idle and its task while it runs. Every
//! query goes through a [`StateReader`], so handing readers to other tasks
//! never gives them a way to write the state.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::key_state::{self, StateReader};
use super::keys::{GamepadKey, KeyMask};
use super::sampler::{Configuring, InputSampler, SamplerParts, Sampling};
use crate::config::{Config, ConfigError};
use crate::hal::{HalError, PinBankArbiter};

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Hardware error: {0}")]
    Hardware(#[from] HalError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

struct SamplerTask {
    cancel: CancellationToken,
    handle: JoinHandle<InputSampler<Sampling>>,
}

enum SamplerSlot {
    Idle(Box<InputSampler<Sampling>>),
    Running(SamplerTask),
    // The task panicked and took the hardware with it.
    Lost,
}

/// Handle to the input sampler and its published key state.
///
/// Built once from the board's peripherals; afterwards the sampler can be
/// started and stopped any number of times. Queries work in every state and
/// return the last word the sampler published (all released before the first
/// tick).
///
/// # Examples
///
/// ```rust,no_run
/// use handheld_input::config::Config;
/// use handheld_input::hal::{Board, PinBankArbiter};
/// use handheld_input::input::{GamepadKey, InputSubsystem, SamplerParts};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::load().await?;
/// let board = Board::open(&config.hardware)?;
/// let parts = SamplerParts {
///     pins: board.pins,
///     adc: board.input_adc,
///     external_pad: board.external_pad,
/// };
/// let arbiter = PinBankArbiter::for_sink(config.hardware.audio_sink);
/// let mut input = InputSubsystem::new(parts, &config, arbiter)?;
/// input.init().await;
///
/// if input.is_pressed(GamepadKey::Start) {
///     println!("Start held at boot");
/// }
/// input.shutdown().await;
/// # Ok(())
/// # }
/// ```
///
/// # Performance Notes
///
/// Dropping the handle cancels the sampler but cannot wait for it. Prefer
/// `shutdown().await` when the hardware must be quiet afterwards.
pub struct InputSubsystem {
    slot: SamplerSlot,
    reader: StateReader,
    arbiter: PinBankArbiter,
}

impl InputSubsystem {
    /// Configures the hardware. The sampler doesn't run until [`InputSubsystem::init`].
    pub fn new(
        parts: SamplerParts,
        config: &Config,
        arbiter: PinBankArbiter,
    ) -> Result<Self, InputError> {
        config.validate()?;

        let (writer, reader) = key_state::channel();
        let reader = reader.with_poll_interval(config.sampler.wait_poll());
        let sampler = InputSampler::<Configuring>::create(parts, config, arbiter.clone(), writer)
            .configure()?;

        Ok(Self {
            slot: SamplerSlot::Idle(Box::new(sampler)),
            reader,
            arbiter,
        })
    }

    /// Starts the background sampler. Must be called inside a tokio runtime.
    ///
    /// Calling it while the sampler runs logs a warning and changes nothing.
    /// After [`InputSubsystem::deinit`] the stopped loop is joined first and
    /// a fresh one is started, so `deinit`/`init` pairs can repeat freely.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use handheld_input::config::Config;
    /// use handheld_input::hal::sim::SimBoard;
    /// use handheld_input::hal::PinBankArbiter;
    /// use handheld_input::input::{GamepadKey, InputSubsystem, SamplerParts};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let board = SimBoard::new();
    /// let parts = SamplerParts {
    ///     pins: Box::new(board.pins()),
    ///     adc: Box::new(board.adc()),
    ///     external_pad: None,
    /// };
    /// let mut input = InputSubsystem::new(parts, &Config::default(), PinBankArbiter::default())?;
    /// input.init().await;
    ///
    /// input.wait_for_key(GamepadKey::A, true).await;
    ///
    /// input.deinit();
    /// input.init().await; // picks up where it left off
    /// input.shutdown().await;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn init(&mut self) {
        if matches!(&self.slot, SamplerSlot::Running(task) if !task.cancel.is_cancelled()) {
            warn!("Input already initialized");
            return;
        }

        // A deinit() that nobody awaited leaves the stopped task in the slot.
        self.reclaim().await;

        match std::mem::replace(&mut self.slot, SamplerSlot::Lost) {
            SamplerSlot::Idle(sampler) => {
                let sampler = *sampler;
                let cancel = CancellationToken::new();
                let handle = tokio::spawn(sampler.run(cancel.clone()));
                info!("Input subsystem initialized");
                self.slot = SamplerSlot::Running(SamplerTask { cancel, handle });
            }
            SamplerSlot::Lost => {
                error!("Input sampler was lost after a task failure, cannot initialize");
            }
            running @ SamplerSlot::Running(_) => self.slot = running,
        }
    }

    /// Asks the sampler to stop at its next tick boundary. Does not wait.
    pub fn deinit(&self) {
        match &self.slot {
            SamplerSlot::Running(task) => {
                info!("Stopping input sampler");
                task.cancel.cancel();
            }
            _ => debug!("Input sampler not running"),
        }
    }

    /// Stops the sampler and waits until its loop has exited.
    pub async fn shutdown(&mut self) {
        if let SamplerSlot::Running(task) = &self.slot {
            task.cancel.cancel();
        } else {
            debug!("Input sampler not running");
        }
        self.reclaim().await;
    }

    /// Joins a cancelled task and puts its sampler back in the idle slot.
    async fn reclaim(&mut self) {
        match std::mem::replace(&mut self.slot, SamplerSlot::Lost) {
            SamplerSlot::Running(task) if task.cancel.is_cancelled() => {
                match task.handle.await {
                    Ok(sampler) => {
                        info!("Input sampler shut down");
                        self.slot = SamplerSlot::Idle(Box::new(sampler));
                    }
                    Err(e) => error!("Input sampler task failed: {}", e),
                }
            }
            other => self.slot = other,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(&self.slot, SamplerSlot::Running(task) if !task.cancel.is_cancelled())
    }

    /// A read-only handle that can be moved to other tasks.
    pub fn reader(&self) -> StateReader {
        self.reader.clone()
    }

    pub fn arbiter(&self) -> &PinBankArbiter {
        &self.arbiter
    }

    pub fn read_gamepad(&self) -> KeyMask {
        self.reader.read_gamepad()
    }

    pub fn is_pressed(&self, key: GamepadKey) -> bool {
        self.reader.is_pressed(key)
    }

    pub fn last_read_elapsed(&self) -> Duration {
        self.reader.last_read_elapsed()
    }

    pub async fn wait_for_key(&self, key: GamepadKey, pressed: bool) {
        self.reader.wait_for_key(key, pressed).await
    }
}

impl Drop for InputSubsystem {
    fn drop(&mut self) {
        if let SamplerSlot::Running(task) = &self.slot {
            task.cancel.cancel();
        }
    }
}
