//! CT clamp current sensing via ADC2.
//!
//! The clamp's burden output rides on a midpoint bias, so every reading
//! takes two ADC channels: the signal and the reference.  The conversion
//! from the millivolt pair to amps is pure arithmetic over the
//! [`CurrentCalibration`] coefficients and is fully host-tested.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads both ADC2 channels via hw_init.
//! On host/test: reads a pair of static `AtomicU32`s for injection.

use core::sync::atomic::AtomicU32;
#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::Ordering;

use crate::app::ports::SampleSource;
use crate::config::CurrentCalibration;
use crate::error::SensorError;

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;
#[cfg(target_os = "espidf")]
use crate::pins;

static SIM_CT_SIGNAL_MV: AtomicU32 = AtomicU32::new(0);
static SIM_CT_REF_MV: AtomicU32 = AtomicU32::new(0);

/// Inject the clamp millivolt pair for host tests.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_ct_mv(signal_mv: f32, ref_mv: f32) {
    SIM_CT_SIGNAL_MV.store(signal_mv.to_bits(), Ordering::Relaxed);
    SIM_CT_REF_MV.store(ref_mv.to_bits(), Ordering::Relaxed);
}

/// Convert a signal/reference millivolt pair to amps.
///
/// The reference channel sits behind a half divider, hence the doubling
/// before the offset subtraction.  Current direction is not observable
/// through the clamp, so the magnitude is returned.
pub fn amps_from_mv(signal_mv: f32, ref_mv: f32, cal: &CurrentCalibration) -> f32 {
    let signal_v = signal_mv / 1000.0;
    let ref_v = ref_mv * 2.0 / 1000.0;
    let amps = (signal_v - ref_v) / (cal.ratio * cal.volts_per_amp);
    amps.abs()
}

pub struct CurrentSensor {
    cal: CurrentCalibration,
}

impl CurrentSensor {
    pub fn new(cal: CurrentCalibration) -> Self {
        Self { cal }
    }

    #[cfg(target_os = "espidf")]
    fn read_pair_mv(&self) -> Result<(f32, f32), SensorError> {
        let signal = hw_init::adc2_read_mv(pins::CT_ADC_CHANNEL)?;
        let reference = hw_init::adc2_read_mv(pins::CT_REF_ADC_CHANNEL)?;
        Ok((signal as f32, reference as f32))
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_pair_mv(&self) -> Result<(f32, f32), SensorError> {
        Ok((
            f32::from_bits(SIM_CT_SIGNAL_MV.load(Ordering::Relaxed)),
            f32::from_bits(SIM_CT_REF_MV.load(Ordering::Relaxed)),
        ))
    }
}

impl SampleSource for CurrentSensor {
    fn sample(&self) -> Result<f32, SensorError> {
        let (signal_mv, ref_mv) = self.read_pair_mv()?;
        Ok(amps_from_mv(signal_mv, ref_mv, &self.cal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_clamp_reads_zero() {
        let cal = CurrentCalibration::default();
        // Signal equals the doubled reference: no current flowing.
        assert!(amps_from_mv(1650.0, 825.0, &cal).abs() < 1e-6);
    }

    #[test]
    fn known_offset_converts_to_amps() {
        let cal = CurrentCalibration::default();
        // 0.5 V above the bias with ratio 4 and 12.5 mV/A: 10 A.
        let amps = amps_from_mv(2150.0, 825.0, &cal);
        assert!((amps - 10.0).abs() < 1e-3);
    }

    #[test]
    fn magnitude_ignores_direction() {
        let cal = CurrentCalibration::default();
        let forward = amps_from_mv(2150.0, 825.0, &cal);
        let reverse = amps_from_mv(1150.0, 825.0, &cal);
        assert!((forward - reverse).abs() < 1e-3);
    }

    #[test]
    fn sim_injection_reaches_sample() {
        sim_set_ct_mv(2150.0, 825.0);
        let sensor = CurrentSensor::new(CurrentCalibration::default());
        assert!((sensor.sample().unwrap() - 10.0).abs() < 1e-3);
    }
}
