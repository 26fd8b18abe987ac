//! Sensor subsystem — one driver per measured quantity.
//!
//! Each driver implements a port trait from [`crate::app::ports`]
//! ([`SampleSource`](crate::app::ports::SampleSource) for the scalar
//! quantities, [`TemperatureProbe`](crate::app::ports::TemperatureProbe)
//! for the probe pair) and carries its own host-side injection hooks, so
//! the sampling core tests without hardware.

pub mod current;
pub mod temperature;
pub mod voltage;
