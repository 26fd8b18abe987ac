//! System configuration parameters
//!
//! All tunable parameters for the battmon firmware: sampling cadences,
//! sensor conversion coefficients, and actuator defaults.  Calibration
//! coefficients are deliberately configuration data rather than code —
//! boards in the field carry different correction curves.

use serde::{Deserialize, Serialize};

/// Linear correction applied on top of the ADC driver's calibrated
/// millivolt output: `corrected = raw_mv * scale + offset_mv`.
///
/// The identity curve is the default; boards with a different divider
/// tolerance override it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VoltageCalibration {
    pub scale: f32,
    pub offset_mv: f32,
}

impl Default for VoltageCalibration {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset_mv: 0.0,
        }
    }
}

/// CT clamp conversion coefficients.
///
/// The clamp output is biased around a midpoint reference; amps are
/// recovered as `|signal_v - ref_v * 2| / (ratio * volts_per_amp)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CurrentCalibration {
    /// Burden winding ratio.
    pub ratio: f32,
    /// Clamp sensitivity in volts per amp.
    pub volts_per_amp: f32,
    /// Largest current the clamp can represent, in amps.
    pub max_current_a: f32,
}

impl Default for CurrentCalibration {
    fn default() -> Self {
        Self {
            ratio: 4.0,
            volts_per_amp: 0.0125,
            max_current_a: 50.0,
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Read-now aggregation ---
    /// Number of samples averaged by a synchronous read.
    pub read_now_samples: u32,
    /// Delay between read-now samples (milliseconds).
    pub read_now_step_ms: u32,

    // --- Duration sampling sessions ---
    /// Interval between samples within a bounded-duration session (ms).
    pub session_interval_ms: u32,

    // --- Sensor conversion ---
    pub vbat_cal: VoltageCalibration,
    pub ct_cal: CurrentCalibration,

    // --- PWM ---
    /// LEDC base frequency applied at init, before any trigger command.
    pub pwm_default_freq_hz: u32,

    // --- Identity / timing ---
    /// GATT device name used in advertising.
    pub device_name: heapless::String<32>,
    /// Main control loop interval (milliseconds).
    pub control_loop_interval_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        let mut device_name = heapless::String::new();
        // Infallible: the literal is shorter than the capacity.
        let _ = device_name.push_str("battmon");

        Self {
            read_now_samples: 100,
            read_now_step_ms: 10,
            session_interval_ms: 1000,
            vbat_cal: VoltageCalibration::default(),
            ct_cal: CurrentCalibration::default(),
            pwm_default_freq_hz: 1000,
            device_name,
            control_loop_interval_ms: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = SystemConfig::default();
        assert!(c.read_now_samples > 0);
        assert!(c.read_now_step_ms > 0);
        assert!(c.session_interval_ms > 0);
        assert!(c.ct_cal.ratio > 0.0);
        assert!(c.ct_cal.volts_per_amp > 0.0);
        assert!(c.ct_cal.max_current_a > 0.0);
        assert!(c.pwm_default_freq_hz > 0);
        assert!(!c.device_name.is_empty());
    }

    #[test]
    fn serde_roundtrip() {
        let c = SystemConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: SystemConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c.read_now_samples, c2.read_now_samples);
        assert_eq!(c.session_interval_ms, c2.session_interval_ms);
        assert!((c.ct_cal.volts_per_amp - c2.ct_cal.volts_per_amp).abs() < 1e-6);
        assert_eq!(c.device_name, c2.device_name);
    }

    #[test]
    fn timing_ratios_make_sense() {
        let c = SystemConfig::default();
        assert!(
            c.read_now_step_ms < c.session_interval_ms,
            "read-now bursts should finish well inside one session interval"
        );
        assert!(
            c.control_loop_interval_ms <= c.session_interval_ms,
            "actuation deadlines must tick at least as fast as sessions publish"
        );
    }

    #[test]
    fn postcard_roundtrip() {
        let c = SystemConfig::default();
        let bytes = postcard::to_allocvec(&c).unwrap();
        let c2: SystemConfig = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(c.read_now_samples, c2.read_now_samples);
        assert!((c.vbat_cal.scale - c2.vbat_cal.scale).abs() < 1e-6);
    }
}
