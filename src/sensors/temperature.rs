//! DS18B20 probe pair on the shared one-wire bus.
//!
//! The bus transaction protocol (convert-all, conversion wait, per-ROM
//! read) belongs to the vendor driver wrapped in
//! [`crate::drivers::onewire`]; this module only shapes its output into a
//! [`TempReading`].  A board normally carries two probes — with one probe
//! the second reading reports zero, with none every read is a
//! [`SensorError::NoProbes`] fault rather than a crash.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads through the one-wire driver initialised at boot.
//! On host/test: reads a pair of static `AtomicU32`s for injection.

use core::sync::atomic::AtomicU32;
#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::Ordering;

use crate::app::ports::{TempReading, TemperatureProbe};
use crate::error::SensorError;

#[cfg(target_os = "espidf")]
use crate::drivers::onewire;

static SIM_TEMP_FIRST: AtomicU32 = AtomicU32::new(0);
static SIM_TEMP_SECOND: AtomicU32 = AtomicU32::new(0);

/// Inject both probe readings for host tests (Celsius).
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_temps(first: f32, second: f32) {
    SIM_TEMP_FIRST.store(first.to_bits(), Ordering::Relaxed);
    SIM_TEMP_SECOND.store(second.to_bits(), Ordering::Relaxed);
}

pub struct Ds18b20Pair;

impl Ds18b20Pair {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Ds18b20Pair {
    fn default() -> Self {
        Self::new()
    }
}

impl TemperatureProbe for Ds18b20Pair {
    #[cfg(target_os = "espidf")]
    fn convert_and_read(&self) -> Result<TempReading, SensorError> {
        let readings = onewire::convert_and_read()?;
        Ok(TempReading {
            first: readings.first().copied().unwrap_or(0.0),
            second: readings.get(1).copied().unwrap_or(0.0),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn convert_and_read(&self) -> Result<TempReading, SensorError> {
        Ok(TempReading {
            first: f32::from_bits(SIM_TEMP_FIRST.load(Ordering::Relaxed)),
            second: f32::from_bits(SIM_TEMP_SECOND.load(Ordering::Relaxed)),
        })
    }
}
