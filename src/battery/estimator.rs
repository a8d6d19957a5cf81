use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::calibration::AdcCalibration;
use super::{BatteryConfig, BatteryError};
use crate::hal::AnalogChannels;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatteryState {
    /// Sensed supply voltage, not clamped.
    pub millivolts: i32,
    /// Charge estimate in `0..=100`.
    pub percentage: i32,
}

/// Converts a smoothed divider-node voltage into a battery estimate.
pub fn battery_state(node_volts: f32, config: &BatteryConfig) -> BatteryState {
    let vs = node_volts / config.divider_r2 * (config.divider_r1 + config.divider_r2);
    let clamped = vs.clamp(config.voltage_empty, config.voltage_full);
    let fraction =
        (clamped - config.voltage_empty) / (config.voltage_full - config.voltage_empty);

    BatteryState {
        millivolts: (vs * 1000.0) as i32,
        percentage: (fraction * 100.0) as i32,
    }
}

/// On-demand battery reader.
///
/// Reads take `&mut self`: the smoothing accumulator is updated in place and
/// callers sharing an estimator across tasks must wrap it in a lock.
///
/// # Examples
///
/// ```rust
/// use handheld_input::battery::{BatteryConfig, BatteryEstimator};
/// use handheld_input::hal::sim::SimBoard;
///
/// let board = SimBoard::new();
/// let mut battery = BatteryEstimator::new(Box::new(board.adc()), BatteryConfig::default())?;
///
/// board.set_analog(0, 4095);
/// assert_eq!(battery.read().percentage, 100);
/// # Ok::<(), handheld_input::battery::BatteryError>(())
/// ```
///
/// # Performance Impact
///
/// Each call takes `sample_count` ADC reads. The average moves halfway to
/// the new sample per call, so how fast it settles depends on how often the
/// caller reads, not on wall time.
pub struct BatteryEstimator {
    adc: Box<dyn AnalogChannels>,
    calibration: AdcCalibration,
    config: BatteryConfig,
    smoothed: Option<f32>,
}

impl BatteryEstimator {
    /// Validates `config`, configures the battery channel and characterizes
    /// its curve.
    ///
    /// # Errors
    ///
    /// * [`BatteryError::Config`] - the voltage window or divider is unusable
    /// * [`BatteryError::Hardware`] - the channel could not be configured
    pub fn new(
        mut adc: Box<dyn AnalogChannels>,
        config: BatteryConfig,
    ) -> Result<Self, BatteryError> {
        config.validate()?;
        adc.configure(config.channel, config.width, config.attenuation)?;
        let calibration =
            AdcCalibration::characterize(config.attenuation, config.width, config.vref_mv);
        info!(
            "Battery estimator ready on channel {} ({:?}, {:?}, vref {} mV)",
            config.channel, config.width, config.attenuation, config.vref_mv
        );
        Ok(Self {
            adc,
            calibration,
            config,
            smoothed: None,
        })
    }

    pub fn read(&mut self) -> BatteryState {
        let sample = self.sample_volts();

        // Weight 0.5 per call; settling follows the call rate, not wall time.
        let smoothed = match self.smoothed {
            None => sample,
            Some(previous) => (previous + sample) / 2.0,
        };
        self.smoothed = Some(smoothed);

        let state = battery_state(smoothed, &self.config);
        debug!(
            "Battery sample {:.3} V, smoothed {:.3} V -> {} mV, {}%",
            sample, smoothed, state.millivolts, state.percentage
        );
        state
    }

    /// Average of `sample_count` consecutive reads, in volts.
    fn sample_volts(&mut self) -> f32 {
        let count = self.config.sample_count.max(1);
        let mut total = 0.0f32;
        for _ in 0..count {
            let raw = self.adc.read_raw(self.config.channel);
            total += self.calibration.raw_to_volts(raw);
        }
        total / f32::from(count)
    }

    /// Current accumulator, `None` before the first read.
    pub fn smoothed_volts(&self) -> Option<f32> {
        self.smoothed
    }

    pub fn calibration(&self) -> &AdcCalibration {
        &self.calibration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::sim::SimBoard;
    use crate::hal::{AdcWidth, Attenuation};

    fn estimator(board: &SimBoard) -> BatteryEstimator {
        BatteryEstimator::new(Box::new(board.adc()), BatteryConfig::default()).unwrap()
    }

    #[test]
    fn new_configures_the_channel() {
        let board = SimBoard::new();
        let est = estimator(&board);
        assert_eq!(
            board.channel_config(0),
            Some((AdcWidth::Bits12, Attenuation::Db11))
        );
        assert_eq!(est.smoothed_volts(), None);
    }

    #[test]
    fn new_rejects_unusable_config() {
        let board = SimBoard::new();
        let inverted = BatteryConfig {
            voltage_empty: 4.2,
            voltage_full: 3.5,
            ..BatteryConfig::default()
        };
        assert!(matches!(
            BatteryEstimator::new(Box::new(board.adc()), inverted),
            Err(BatteryError::Config(_))
        ));

        let nan = BatteryConfig {
            voltage_full: f32::NAN,
            ..BatteryConfig::default()
        };
        assert!(BatteryEstimator::new(Box::new(board.adc()), nan).is_err());
        assert_eq!(board.channel_config(0), None);
    }

    #[test]
    fn first_read_seeds_then_each_read_halves_the_error() {
        let board = SimBoard::new();
        let mut est = estimator(&board);

        board.set_analog(0, 1000);
        est.read();
        let start = est.smoothed_volts().unwrap();
        assert!((start - est.calibration().raw_to_volts(1000)).abs() < 1e-6);

        board.set_analog(0, 2500);
        let target = est.calibration().raw_to_volts(2500);
        let mut error = (start - target).abs();
        for _ in 0..10 {
            est.read();
            let acc = est.smoothed_volts().unwrap();
            let next = (acc - target).abs();
            assert!((next - error / 2.0).abs() < 1e-4, "{next} vs {error}");
            assert!(acc <= target);
            error = next;
        }
        assert!(error < 2e-3);
    }

    #[test]
    fn each_read_averages_sample_count_reads() {
        let board = SimBoard::new();
        let mut est = estimator(&board);
        board.set_analog(0, 2048);
        est.read();
        assert_eq!(board.analog_reads(0), 4);
        est.read();
        assert_eq!(board.analog_reads(0), 8);
    }

    #[test]
    fn percentage_clamps_but_millivolts_do_not() {
        let config = BatteryConfig::default();

        // Divider halves the voltage, so the node sits at Vs / 2.
        let low = battery_state(1.0, &config);
        assert_eq!(low.percentage, 0);
        assert!((low.millivolts - 2000).abs() <= 1);

        let high = battery_state(2.5, &config);
        assert_eq!(high.percentage, 100);
        assert!((high.millivolts - 5000).abs() <= 1);

        let above_full = battery_state(2.2, &config);
        assert_eq!(above_full.percentage, 100);

        let mid = battery_state(1.925, &config);
        assert!((49..=50).contains(&mid.percentage));
        assert!((mid.millivolts - 3850).abs() <= 1);
    }

    #[test]
    fn divider_ratio_is_applied() {
        let config = BatteryConfig {
            divider_r1: 20000.0,
            divider_r2: 10000.0,
            ..BatteryConfig::default()
        };
        let state = battery_state(1.3, &config);
        assert!((state.millivolts - 3900).abs() <= 1);
    }
}
