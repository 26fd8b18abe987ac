//! Port traits — the boundary between the sampling/actuation core and the
//! vendor peripherals.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService / workers (domain)
//! ```
//!
//! Driven adapters (ADC sources, the one-wire probe pair, LEDC, the relay
//! GPIO, the BLE notify path) implement these traits.  The domain consumes
//! them via generics or trait objects, so the sampling loops and the
//! actuation state machine never touch hardware directly and run unchanged
//! on the host.

use crate::broker::Channel;
use crate::error::{ActuatorError, SensorError};

// ───────────────────────────────────────────────────────────────
// Sample sources (driven adapters: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// One calibrated physical reading per call (millivolts or amps,
/// depending on the instantiating channel).
///
/// Shared between the dispatcher's synchronous read path and a session
/// worker thread, hence `&self` + `Send + Sync`.
pub trait SampleSource: Send + Sync {
    fn sample(&self) -> Result<f32, SensorError>;
}

/// Both DS18B20 probes read in one bus transaction.
///
/// The conversion protocol (convert-all, wait, read per ROM code) is the
/// vendor driver's business; the domain only sees the finished pair.
pub trait TemperatureProbe: Send + Sync {
    fn convert_and_read(&self) -> Result<TempReading, SensorError>;
}

/// Celsius readings from the two probes on the bus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempReading {
    pub first: f32,
    pub second: f32,
}

// ───────────────────────────────────────────────────────────────
// Actuator outputs (domain → hardware)
// ───────────────────────────────────────────────────────────────

/// LEDC output primitive.  Every call reports hardware failure so the
/// actuation state machine can refuse to enter `Active` on a bad apply.
pub trait PwmOutput {
    /// Apply a duty cycle in percent (0–100).
    fn set_duty_pct(&mut self, pct: u32) -> Result<(), ActuatorError>;

    /// Apply an output frequency in hertz.
    fn set_freq_hz(&mut self, hz: u32) -> Result<(), ActuatorError>;

    /// Stop the output (duty forced to idle level).
    fn stop(&mut self) -> Result<(), ActuatorError>;
}

/// Single GPIO level write behind the relay coil driver.
pub trait RelayOutput {
    fn write(&mut self, on: bool) -> Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// Notify sink (domain → transport)
// ───────────────────────────────────────────────────────────────

/// Outbound notification primitive for one named channel.
///
/// The registry calls this fire-and-forget: a failure is logged by the
/// caller, never retried, and never fails the publishing sampling loop.
pub trait NotifySink: Send + Sync {
    fn notify(&self, channel: Channel, payload: &[u8]) -> Result<(), NotifyError>;
}

/// Errors from [`NotifySink::notify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyError {
    /// No remote peer is currently subscribed.
    NotConnected,
    /// The transport rejected the payload.
    Io,
}

impl core::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "no subscribed peer"),
            Self::Io => write!(f, "transport I/O error"),
        }
    }
}
