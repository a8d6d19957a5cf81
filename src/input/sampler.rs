//! Fixed-rate input sampler.
//!
//! ```text
//! Configuring ──configure()──► Sampling ──run(token)──► (cancelled) ──► Sampling
//! ```
//!
//! Each tick reads the button lines, the two ladder axes and, when it owns
//! the pin bank, the external pad. The raw word goes through the debounce
//! bank and the committed word is published to every reader.

use chrono::Local;
use statum::{machine, state};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::axis::{AxisThresholds, X_AXIS, Y_AXIS};
use super::debounce::DebounceBank;
use super::key_state::StateWriter;
use super::keys::KeyMask;
use crate::config::{Config, HardwareConfig, SamplerConfig};
use crate::hal::{AnalogChannels, DigitalPins, ExternalPad, HalError, PinBankArbiter};

/// Peripheral handles the sampler takes ownership of.
pub struct SamplerParts {
    pub pins: Box<dyn DigitalPins>,
    pub adc: Box<dyn AnalogChannels>,
    pub external_pad: Option<Box<dyn ExternalPad>>,
}

#[state]
#[derive(Debug, Clone)]
pub enum SamplerState {
    Configuring,
    Sampling,
}

#[machine]
pub struct InputSampler<S: SamplerState> {
    pins: Box<dyn DigitalPins>,
    adc: Box<dyn AnalogChannels>,
    external_pad: Option<Box<dyn ExternalPad>>,
    arbiter: PinBankArbiter,
    hardware: HardwareConfig,
    thresholds: AxisThresholds,
    settings: SamplerConfig,
    debounce: DebounceBank,
    writer: StateWriter,
}

impl<S: SamplerState> InputSampler<S> {
    pub fn settings(&self) -> &SamplerConfig {
        &self.settings
    }

    /// Last committed (debounced) state.
    pub fn committed(&self) -> KeyMask {
        self.debounce.state()
    }
}

impl InputSampler<Configuring> {
    pub fn create(
        parts: SamplerParts,
        config: &Config,
        arbiter: PinBankArbiter,
        writer: StateWriter,
    ) -> Self {
        debug!(
            "Creating input sampler: {} keys, debounce depth {}",
            config.hardware.keys.len(),
            config.sampler.debounce_depth
        );
        Self::new(
            parts.pins,
            parts.adc,
            parts.external_pad,
            arbiter,
            config.hardware.clone(),
            config.axes,
            config.sampler.clone(),
            DebounceBank::new(config.sampler.debounce_depth),
            writer,
        )
    }

    /// Configures every key line and both axis channels.
    pub fn configure(mut self) -> Result<InputSampler<Sampling>, HalError> {
        for key_pin in &self.hardware.keys {
            self.pins.configure_input(key_pin.pin, key_pin.pull)?;
            debug!("{} on GPIO{} ({:?})", key_pin.key, key_pin.pin, key_pin.pull);
        }

        let hw = &self.hardware;
        for channel in [hw.x_channel, hw.y_channel] {
            self.adc
                .configure(channel, hw.adc_width, hw.adc_attenuation)?;
        }

        info!(
            "Input sampler configured ({} keys, axes on channels {}/{}, external pad: {})",
            hw.keys.len(),
            hw.x_channel,
            hw.y_channel,
            self.external_pad.is_some()
        );
        Ok(self.transition())
    }
}

impl InputSampler<Sampling> {
    /// One raw observation of every input source.
    pub fn read_raw(&mut self) -> KeyMask {
        let mut raw = KeyMask::EMPTY;

        let y = self.adc.read_raw(self.hardware.y_channel);
        let x = self.adc.read_raw(self.hardware.x_channel);
        raw |= self.thresholds.decode(y, Y_AXIS);
        raw |= self.thresholds.decode(x, X_AXIS);

        for key_pin in &self.hardware.keys {
            // Buttons pull their line low when pressed.
            if !self.pins.is_high(key_pin.pin) {
                raw = raw.with(key_pin.key);
            }
        }

        if let Some(pad) = self.external_pad.as_mut() {
            if self.arbiter.controller_available() {
                raw |= pad.read();
            }
        }

        raw
    }

    /// Samples, debounces and publishes once. Returns the published state.
    pub fn tick(&mut self) -> KeyMask {
        let raw = self.read_raw();
        let previous = self.debounce.state();
        let state = self.debounce.update(raw);
        self.writer.publish(state);

        if state != previous {
            debug!("Key state {} -> {} (raw {})", previous, state, raw);
        }
        state
    }

    /// Ticks at the configured period until `cancel` fires, then hands the
    /// sampler back so it can be started again.
    ///
    /// Backend reads block (bit-banged pad clocking, SPI transfers). On a
    /// multi-thread runtime each tick runs under `block_in_place` so the
    /// worker's other tasks move elsewhere while the hardware is busy.
    pub async fn run(mut self, cancel: CancellationToken) -> Self {
        let period = self.settings.tick_period();
        let offload = matches!(Handle::current().runtime_flavor(), RuntimeFlavor::MultiThread);
        info!(
            "Starting input sampler loop with {}ms period (blocking reads offloaded: {})",
            period.as_millis(),
            offload
        );

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Stats for performance monitoring
        let mut ticks: u64 = 0;
        let mut changes: u64 = 0;
        let mut last_stats_time = Local::now();
        let stats_interval = chrono::Duration::from_std(self.settings.stats_interval())
            .unwrap_or_else(|_| chrono::Duration::seconds(30));

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            let previous = self.debounce.state();
            let state = if offload {
                tokio::task::block_in_place(|| self.tick())
            } else {
                self.tick()
            };
            if state != previous {
                changes += 1;
            }
            ticks += 1;

            let now = Local::now();
            if now - last_stats_time > stats_interval {
                info!(
                    "Input sampler stats: {} ticks, {} state changes in {} seconds",
                    ticks,
                    changes,
                    (now - last_stats_time).num_seconds()
                );
                ticks = 0;
                changes = 0;
                last_stats_time = now;
            }
        }

        info!("Input sampler loop stopped");
        self
    }
}
