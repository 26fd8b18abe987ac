//! Relay GPIO output adapter.

use crate::app::ports::RelayOutput;
use crate::drivers::hw_init;
use crate::error::ActuatorError;

pub struct GpioRelay;

impl GpioRelay {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GpioRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayOutput for GpioRelay {
    fn write(&mut self, on: bool) -> Result<(), ActuatorError> {
        hw_init::relay_write(on)
    }
}
