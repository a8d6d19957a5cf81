//! TOML configuration.
//!
//! Every field has a default, so a missing file or a partial file both
//! yield a usable [`Config`]. The file lives at
//! `<config dir>/handheld-input/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::battery::BatteryConfig;
use crate::hal::rpi::PadProtocol;
use crate::hal::{AdcWidth, Attenuation, AudioSink, ChannelId, PinId, Pull};
use crate::input::axis::AxisThresholds;
use crate::input::debounce::{MAX_DEPTH, MIN_DEPTH};
use crate::input::keys::GamepadKey;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub sampler: SamplerConfig,
    pub axes: AxisThresholds,
    pub battery: BatteryConfig,
    pub hardware: HardwareConfig,
}

/// Timing of the input sampler, the `[sampler]` table.
///
/// The effective debounce latency is `tick_period_ms * debounce_depth`: with
/// the defaults a press shows up 20 ms after the contact settles.
///
/// - `tick_period_ms`: Lower values react faster but wake the runtime more often
/// - `debounce_depth`: Higher values reject longer glitches at the cost of latency
/// - `wait_poll_ms`: Only affects `wait_for_key`; the sampler ignores it
///
/// # Examples
///
/// ```rust
/// use handheld_input::config::SamplerConfig;
/// use std::time::Duration;
///
/// // Noisy membrane buttons: 5 ms ticks, 4-deep window, still 20 ms latency
/// let membrane = SamplerConfig {
///     tick_period_ms: 5,
///     debounce_depth: 4,
///     ..SamplerConfig::default()
/// };
/// assert_eq!(membrane.tick_period(), Duration::from_millis(5));
/// ```
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct SamplerConfig {
    /// Sampling period in milliseconds. Must be positive.
    pub tick_period_ms: u64,

    /// Consecutive identical samples needed to commit a key change
    ///
    /// Accepted range is 1..=8; every key's shift register holds this many bits.
    pub debounce_depth: u8,

    /// Poll interval of `wait_for_key` in milliseconds.
    pub wait_poll_ms: u64,

    /// Window of the periodic "ticks / state changes" log line, in seconds.
    pub stats_interval_secs: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 10,
            debounce_depth: 2,
            wait_poll_ms: 10,
            stats_interval_secs: 30,
        }
    }
}

impl SamplerConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    pub fn wait_poll(&self) -> Duration {
        Duration::from_millis(self.wait_poll_ms)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Rpi,
    Sim,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyPin {
    pub key: GamepadKey,
    pub pin: PinId,
    #[serde(default)]
    pub pull: Pull,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct SpiConfig {
    pub bus: u8,
    pub slave_select: u8,
    pub clock_hz: u32,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            bus: 0,
            slave_select: 0,
            clock_hz: 1_000_000,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct ExternalPadConfig {
    pub protocol: PadProtocol,
    pub latch_pin: PinId,
    pub clock_pin: PinId,
    pub data_pin: PinId,
}

impl Default for ExternalPadConfig {
    fn default() -> Self {
        Self {
            protocol: PadProtocol::Snes,
            latch_pin: 17,
            clock_pin: 27,
            data_pin: 22,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct HardwareConfig {
    pub backend: BackendKind,
    pub x_channel: ChannelId,
    pub y_channel: ChannelId,
    pub adc_width: AdcWidth,
    pub adc_attenuation: Attenuation,
    /// Audio sink at startup; decides who owns the shared pin bank.
    pub audio_sink: AudioSink,
    pub spi: SpiConfig,
    pub external_pad: Option<ExternalPadConfig>,
    pub keys: Vec<KeyPin>,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        // Volume and Start have external pull-ups on the board.
        let keys = vec![
            KeyPin { key: GamepadKey::Menu, pin: 5, pull: Pull::Up },
            KeyPin { key: GamepadKey::Volume, pin: 6, pull: Pull::Floating },
            KeyPin { key: GamepadKey::Select, pin: 13, pull: Pull::Up },
            KeyPin { key: GamepadKey::Start, pin: 19, pull: Pull::Floating },
            KeyPin { key: GamepadKey::A, pin: 26, pull: Pull::Up },
            KeyPin { key: GamepadKey::B, pin: 21, pull: Pull::Up },
        ];
        Self {
            backend: BackendKind::Rpi,
            x_channel: 1,
            y_channel: 2,
            adc_width: AdcWidth::Bits12,
            adc_attenuation: Attenuation::Db11,
            audio_sink: AudioSink::Speaker,
            spi: SpiConfig::default(),
            external_pad: Some(ExternalPadConfig::default()),
            keys,
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("handheld-input").join("config.toml"))
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Loads `path`, falling back to defaults when the file doesn't exist.
    pub async fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => {
                debug!("Loaded config from {}", path.display());
                Self::from_toml_str(&text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path).await,
            None => {
                info!("No config directory on this system, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Writes the default configuration to `path` unless a file is already there.
    pub async fn ensure_default_config(path: &Path) -> Result<(), ConfigError> {
        if tokio::fs::try_exists(path).await? {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, Self::default().to_toml_string()?).await?;
        info!("Wrote default config to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sampler = &self.sampler;
        if sampler.tick_period_ms == 0 {
            return Err(ConfigError::Invalid("tick_period_ms must be positive".into()));
        }
        if !(MIN_DEPTH..=MAX_DEPTH).contains(&sampler.debounce_depth) {
            return Err(ConfigError::Invalid(format!(
                "debounce_depth must be within {}..={}, got {}",
                MIN_DEPTH, MAX_DEPTH, sampler.debounce_depth
            )));
        }
        if self.axes.full_threshold <= self.axes.mid_threshold {
            return Err(ConfigError::Invalid(
                "axes.full_threshold must be above axes.mid_threshold".into(),
            ));
        }

        self.battery.validate()?;
        Ok(())
    }
}
