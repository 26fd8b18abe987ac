//! Unified error types for the battmon firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! dispatcher's error handling uniform.  All variants are `Copy` so they can
//! be passed through worker threads and the command router without
//! allocation.
//!
//! Propagation policy:
//!
//! - duplicate channel registration is a boot-time programming error and
//!   panics in [`crate::broker::CharacteristicRegistry::register`] before
//!   any traffic is processed — it never appears here;
//! - a sensor fault during a one-shot read fails that operation;
//! - a sensor fault inside a running session is logged per tick and the
//!   session continues;
//! - `InvalidCommand` and `Busy` are absorbed at the dispatch boundary with
//!   a diagnostic only — neither command surface has an error channel back
//!   to the caller.

use core::fmt;

use crate::broker::Channel;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sensor could not be read or returned out-of-range data.
    Sensor(SensorError),
    /// An actuator command failed.
    Actuator(ActuatorError),
    /// A command surface delivered a payload that does not decode.
    InvalidCommand,
    /// The channel already has an active sampling session.
    Busy(Channel),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::InvalidCommand => write!(f, "invalid command"),
            Self::Busy(ch) => write!(f, "session already running on {}", ch.name()),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// ADC read returned an error or timed out.
    AdcReadFailed,
    /// ADC calibration handle is unavailable (eFuse not burnt).
    CalibrationUnavailable,
    /// One-wire transaction failed (CRC, presence, timeout).
    BusFault,
    /// No probes were discovered on the one-wire bus.
    NoProbes,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdcReadFailed => write!(f, "ADC read failed"),
            Self::CalibrationUnavailable => write!(f, "ADC calibration unavailable"),
            Self::BusFault => write!(f, "one-wire bus fault"),
            Self::NoProbes => write!(f, "no probes on one-wire bus"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// LEDC duty or frequency write failed.
    PwmWriteFailed,
    /// Relay GPIO set failed.
    GpioWriteFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PwmWriteFailed => write!(f, "PWM write failed"),
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
