//! GPIO / peripheral channel assignments for the battmon board.
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.
//!
//! Plain ESP32 (dual-core Xtensa LX6): the battery divider feeds ADC1, the
//! CT clamp and its midpoint reference feed ADC2, and both DS18B20 probes
//! share a single one-wire GPIO.

// ---------------------------------------------------------------------------
// Sensors — Analog
// ---------------------------------------------------------------------------

/// Battery voltage divider — ADC1 channel 6 (GPIO 34).
pub const VBAT_ADC_CHANNEL: u32 = 6;

/// CT clamp signal — ADC2 channel 8 (GPIO 25).
pub const CT_ADC_CHANNEL: u32 = 8;

/// CT clamp midpoint reference — ADC2 channel 7 (GPIO 27).
/// Both units run at 11 dB attenuation (0 – 3.1 V range).
pub const CT_REF_ADC_CHANNEL: u32 = 7;

// ---------------------------------------------------------------------------
// Sensors — One-wire
// ---------------------------------------------------------------------------

/// Shared one-wire bus for the DS18B20 temperature probes.
pub const ONEWIRE_GPIO: i32 = 26;

// ---------------------------------------------------------------------------
// Actuators
// ---------------------------------------------------------------------------

/// PWM output (LEDC channel 0).
pub const PWM_GPIO: i32 = 33;

/// Relay coil driver pin (active HIGH).
pub const RELAY_GPIO: i32 = 14;

// ---------------------------------------------------------------------------
// PWM configuration
// ---------------------------------------------------------------------------

/// LEDC timer resolution (bits).  13-bit gives 0 – 8191 duty steps.
pub const PWM_RESOLUTION_BITS: u32 = 13;
