//! Linear raw-to-millivolt curve for an attenuated ADC channel.
//!
//! The curve is characterized once from the attenuation, the sample width
//! and the reference voltage of the converter:
//!
//! ```text
//! mV = (coeff_a * raw12 + 2^15) / 2^16 + coeff_b
//! coeff_a = vref_mv * ATTEN_SCALE[atten] / 4096
//! coeff_b = ATTEN_OFFSET[atten]
//! ```
//!
//! where `raw12` is the sample widened to 12 bits.

use crate::hal::{AdcWidth, Attenuation};

const COEFF_A_SCALE: u64 = 65536;
const COEFF_A_ROUND: u64 = COEFF_A_SCALE / 2;
const FULL_SCALE_12: u64 = 4096;

const ATTEN_SCALE: [u64; 4] = [57431, 76236, 105481, 196602];
const ATTEN_OFFSET: [u32; 4] = [75, 78, 88, 142];

const fn atten_index(attenuation: Attenuation) -> usize {
    match attenuation {
        Attenuation::Db0 => 0,
        Attenuation::Db2_5 => 1,
        Attenuation::Db6 => 2,
        Attenuation::Db11 => 3,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcCalibration {
    coeff_a: u64,
    coeff_b: u32,
    width: AdcWidth,
    attenuation: Attenuation,
    vref_mv: u32,
}

impl AdcCalibration {
    pub fn characterize(attenuation: Attenuation, width: AdcWidth, vref_mv: u32) -> Self {
        let i = atten_index(attenuation);
        Self {
            coeff_a: u64::from(vref_mv) * ATTEN_SCALE[i] / FULL_SCALE_12,
            coeff_b: ATTEN_OFFSET[i],
            width,
            attenuation,
            vref_mv,
        }
    }

    pub fn raw_to_millivolts(&self, raw: u16) -> u32 {
        let raw = u64::from(raw.min(self.width.max_raw()));
        let reading = raw << (12 - self.width.bits());
        ((self.coeff_a * reading + COEFF_A_ROUND) / COEFF_A_SCALE) as u32 + self.coeff_b
    }

    pub fn raw_to_volts(&self, raw: u16) -> f32 {
        self.raw_to_millivolts(raw) as f32 * 0.001
    }

    pub fn width(&self) -> AdcWidth {
        self.width
    }

    pub fn attenuation(&self) -> Attenuation {
        self.attenuation
    }

    pub fn vref_mv(&self) -> u32 {
        self.vref_mv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eleven_db_curve_at_nominal_vref() {
        let cal = AdcCalibration::characterize(Attenuation::Db11, AdcWidth::Bits12, 1100);
        assert_eq!(cal.raw_to_millivolts(0), 142);
        assert_eq!(cal.raw_to_millivolts(2048), 1792);
        assert_eq!(cal.raw_to_millivolts(4095), 3441);
    }

    #[test]
    fn narrower_widths_are_widened_before_conversion() {
        let cal12 = AdcCalibration::characterize(Attenuation::Db11, AdcWidth::Bits12, 1100);
        let cal10 = AdcCalibration::characterize(Attenuation::Db11, AdcWidth::Bits10, 1100);
        assert_eq!(cal10.raw_to_millivolts(512), cal12.raw_to_millivolts(2048));
        // Out-of-range samples saturate at the width's maximum.
        assert_eq!(cal10.raw_to_millivolts(5000), cal10.raw_to_millivolts(1023));
    }

    #[test]
    fn curve_is_monotonic() {
        for atten in [
            Attenuation::Db0,
            Attenuation::Db2_5,
            Attenuation::Db6,
            Attenuation::Db11,
        ] {
            let cal = AdcCalibration::characterize(atten, AdcWidth::Bits12, 1100);
            let mut last = 0;
            for raw in 0..=4095 {
                let mv = cal.raw_to_millivolts(raw);
                assert!(mv >= last);
                last = mv;
            }
        }
    }
}
