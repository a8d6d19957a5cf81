use color_eyre::{eyre::eyre, Result};
use handheld_input::battery::{BatteryEstimator, BatteryState};
use handheld_input::config::Config;
use handheld_input::hal::{Board, PinBankArbiter};
use handheld_input::input::{GamepadKey, InputSubsystem, KeyMask, SamplerParts};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const REPORT_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_LOG_FILTER: &str = "info";

/// One line of the periodic status log.
#[derive(Debug)]
struct StatusReport {
    keys: KeyMask,
    battery: BatteryState,
    since_last_read: Duration,
}

impl StatusReport {
    /// Samples the read age before the keys, since reading them resets it.
    fn collect(input: &InputSubsystem, battery: BatteryState) -> Self {
        let since_last_read = input.last_read_elapsed();
        Self {
            keys: input.read_gamepad(),
            battery,
            since_last_read,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = load_config().await?;
    info!("Using {:?} backend", config.hardware.backend);

    let board = Board::open(&config.hardware).map_err(|e| eyre!("Failed to open board: {}", e))?;
    let arbiter = PinBankArbiter::for_sink(config.hardware.audio_sink);

    let parts = SamplerParts {
        pins: board.pins,
        adc: board.input_adc,
        external_pad: board.external_pad,
    };
    let mut input = InputSubsystem::new(parts, &config, arbiter)?;
    input.init().await;

    let mut battery = BatteryEstimator::new(board.battery_adc, config.battery.clone())
        .map_err(|e| eyre!("Failed to set up battery estimator: {}", e))?;

    // Log every Menu press from a separate task
    let reader = input.reader();
    let menu_watch = tokio::spawn(async move {
        loop {
            reader.wait_for_key(GamepadKey::Menu, true).await;
            info!("Menu pressed");
            reader.wait_for_key(GamepadKey::Menu, false).await;
        }
    });

    let mut report = tokio::time::interval(REPORT_INTERVAL);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, shutting down");
                break;
            }
            _ = report.tick() => {
                let report = StatusReport::collect(
                    &input,
                    tokio::task::block_in_place(|| battery.read()),
                );
                info!(
                    "Keys: {} | Battery: {} mV, {}% | last read {:?} ago",
                    report.keys,
                    report.battery.millivolts,
                    report.battery.percentage,
                    report.since_last_read
                );
            }
        }
    }

    menu_watch.abort();
    input.shutdown().await;
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok()))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

/// `RUST_LOG` directives when set, `info` otherwise.
fn log_filter(directives: Option<String>) -> EnvFilter {
    match directives {
        Some(directives) if !directives.trim().is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::new(DEFAULT_LOG_FILTER),
    }
}

async fn load_config() -> Result<Config> {
    if let Some(path) = Config::default_path() {
        Config::ensure_default_config(&path).await?;
    }
    Ok(Config::load().await?)
}
