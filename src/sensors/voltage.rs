//! Battery voltage sensing via ADC1.
//!
//! The vendor driver hands back calibrated millivolts at the divider tap;
//! a configurable linear correction maps that to the pack terminal
//! voltage.  The correction curve differs between board revisions, which
//! is why it lives in [`VoltageCalibration`] rather than here.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads the ADC1 oneshot unit via hw_init.
//! On host/test: reads from a static `AtomicU32` for injection.

use core::sync::atomic::AtomicU32;
#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::Ordering;

use crate::app::ports::SampleSource;
use crate::config::VoltageCalibration;
use crate::error::SensorError;

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;
#[cfg(target_os = "espidf")]
use crate::pins;

static SIM_VBAT_MV: AtomicU32 = AtomicU32::new(0);

/// Inject the raw divider reading for host tests (f32 millivolts).
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_vbat_mv(mv: f32) {
    SIM_VBAT_MV.store(mv.to_bits(), Ordering::Relaxed);
}

/// Apply the board's linear correction to a calibrated divider reading.
pub fn corrected_mv(raw_mv: f32, cal: &VoltageCalibration) -> f32 {
    raw_mv * cal.scale + cal.offset_mv
}

pub struct VoltageSensor {
    cal: VoltageCalibration,
}

impl VoltageSensor {
    pub fn new(cal: VoltageCalibration) -> Self {
        Self { cal }
    }

    #[cfg(target_os = "espidf")]
    fn read_mv(&self) -> Result<f32, SensorError> {
        hw_init::adc1_read_mv(pins::VBAT_ADC_CHANNEL).map(|mv| mv as f32)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_mv(&self) -> Result<f32, SensorError> {
        Ok(f32::from_bits(SIM_VBAT_MV.load(Ordering::Relaxed)))
    }
}

impl SampleSource for VoltageSensor {
    fn sample(&self) -> Result<f32, SensorError> {
        Ok(corrected_mv(self.read_mv()?, &self.cal))
    }
}
