//! One-shot hardware peripheral initialization.
//!
//! Configures both ADC oneshot units with their calibration schemes, the
//! LEDC timer/channel for the PWM output, and the relay GPIO, using raw
//! ESP-IDF sys calls. Called once from `main()` before any task starts.
//!
//! Read/write helpers in here are the HAL primitives the port adapters
//! wrap: calibrated millivolt reads, LEDC duty/freq writes, one GPIO
//! level write.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::{info, warn};

use crate::error::{ActuatorError, SensorError};
#[cfg(target_os = "espidf")]
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
    LedcInitFailed,
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::LedcInitFailed => write!(f, "LEDC timer/channel config failed"),
        }
    }
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals(pwm_default_freq_hz: u32) -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before any worker task spawns;
    // single-threaded at this point.
    unsafe {
        init_adc_units()?;
        init_relay_gpio()?;
        init_ledc(pwm_default_freq_hz)?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals(_pwm_default_freq_hz: u32) -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── ADC (oneshot + calibration) ───────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();
#[cfg(target_os = "espidf")]
static mut ADC2_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();
#[cfg(target_os = "espidf")]
static mut ADC1_CALI: adc_cali_handle_t = core::ptr::null_mut();
#[cfg(target_os = "espidf")]
static mut ADC2_CALI: adc_cali_handle_t = core::ptr::null_mut();

/// SAFETY: Handles are written once during `init_adc_units()` before any
/// reader task exists; afterwards they are read-only.
#[cfg(target_os = "espidf")]
unsafe fn adc_handles(unit: u32) -> (adc_oneshot_unit_handle_t, adc_cali_handle_t) {
    unsafe {
        if unit == adc_unit_t_ADC_UNIT_1 as u32 {
            (ADC1_HANDLE, ADC1_CALI)
        } else {
            (ADC2_HANDLE, ADC2_CALI)
        }
    }
}

#[cfg(target_os = "espidf")]
unsafe fn init_adc_units() -> Result<(), HwInitError> {
    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_11,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_DEFAULT,
    };

    // Unit 1: battery divider.
    let init1 = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ..Default::default()
    };
    let ret = unsafe { adc_oneshot_new_unit(&init1, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK {
        return Err(HwInitError::AdcInitFailed(ret));
    }
    let ret =
        unsafe { adc_oneshot_config_channel(ADC1_HANDLE, pins::VBAT_ADC_CHANNEL, &chan_cfg) };
    if ret != ESP_OK {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    // Unit 2: CT clamp signal + midpoint reference.
    let init2 = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_2,
        ..Default::default()
    };
    let ret = unsafe { adc_oneshot_new_unit(&init2, &raw mut ADC2_HANDLE) };
    if ret != ESP_OK {
        return Err(HwInitError::AdcInitFailed(ret));
    }
    for ch in [pins::CT_ADC_CHANNEL, pins::CT_REF_ADC_CHANNEL] {
        let ret = unsafe { adc_oneshot_config_channel(ADC2_HANDLE, ch, &chan_cfg) };
        if ret != ESP_OK {
            return Err(HwInitError::AdcInitFailed(ret));
        }
    }

    // Calibration — line fitting on plain ESP32. Failure here is not
    // fatal: reads report CalibrationUnavailable instead of guessing.
    unsafe {
        init_cali(adc_unit_t_ADC_UNIT_1, &raw mut ADC1_CALI);
        init_cali(adc_unit_t_ADC_UNIT_2, &raw mut ADC2_CALI);
    }

    info!("hw_init: ADC1 (vbat) + ADC2 (ct signal/ref) configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
unsafe fn init_cali(unit: adc_unit_t, out: *mut adc_cali_handle_t) {
    let cfg = adc_cali_line_fitting_config_t {
        unit_id: unit,
        atten: adc_atten_t_ADC_ATTEN_DB_11,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_DEFAULT,
        ..Default::default()
    };
    let ret = unsafe { adc_cali_create_scheme_line_fitting(&cfg, out) };
    if ret == ESP_OK {
        info!("hw_init: ADC unit {} calibrated (line fitting)", unit + 1);
    } else {
        warn!(
            "hw_init: eFuse not burnt on unit {}, software calibration skipped",
            unit + 1
        );
    }
}

#[cfg(target_os = "espidf")]
fn adc_read_mv(unit: u32, channel: u32) -> Result<i32, SensorError> {
    // SAFETY: handles were written once during init before any reader
    // task existed; the oneshot driver serialises concurrent reads.
    let (handle, cali) = unsafe { adc_handles(unit) };
    if cali.is_null() {
        return Err(SensorError::CalibrationUnavailable);
    }

    let mut raw: i32 = 0;
    let ret = unsafe { adc_oneshot_read(handle, channel, &mut raw) };
    if ret != ESP_OK {
        return Err(SensorError::AdcReadFailed);
    }

    let mut mv: i32 = 0;
    let ret = unsafe { adc_cali_raw_to_voltage(cali, raw, &mut mv) };
    if ret != ESP_OK {
        return Err(SensorError::AdcReadFailed);
    }
    Ok(mv)
}

/// Calibrated millivolt read on ADC1.
#[cfg(target_os = "espidf")]
pub fn adc1_read_mv(channel: u32) -> Result<i32, SensorError> {
    adc_read_mv(adc_unit_t_ADC_UNIT_1 as u32, channel)
}

/// Calibrated millivolt read on ADC2.
#[cfg(target_os = "espidf")]
pub fn adc2_read_mv(channel: u32) -> Result<i32, SensorError> {
    adc_read_mv(adc_unit_t_ADC_UNIT_2 as u32, channel)
}

#[cfg(not(target_os = "espidf"))]
pub fn adc1_read_mv(_channel: u32) -> Result<i32, SensorError> {
    Ok(0)
}

#[cfg(not(target_os = "espidf"))]
pub fn adc2_read_mv(_channel: u32) -> Result<i32, SensorError> {
    Ok(0)
}

// ── Relay GPIO ────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_relay_gpio() -> Result<(), HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::RELAY_GPIO,
        mode: gpio_mode_t_GPIO_MODE_OUTPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK {
        return Err(HwInitError::GpioConfigFailed(ret));
    }
    unsafe { gpio_set_level(pins::RELAY_GPIO, 0) };
    info!("hw_init: relay GPIO configured");
    Ok(())
}

/// Drive the relay pin.
#[cfg(target_os = "espidf")]
pub fn relay_write(on: bool) -> Result<(), ActuatorError> {
    // SAFETY: writes to an output pin configured in init_relay_gpio().
    let ret = unsafe { gpio_set_level(pins::RELAY_GPIO, u32::from(on)) };
    if ret != ESP_OK {
        return Err(ActuatorError::GpioWriteFailed);
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn relay_write(_on: bool) -> Result<(), ActuatorError> {
    Ok(())
}

// ── LEDC PWM ─────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_ledc(freq_hz: u32) -> Result<(), HwInitError> {
    let timer = ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_HIGH_SPEED_MODE,
        timer_num: ledc_timer_t_LEDC_TIMER_0,
        duty_resolution: pins::PWM_RESOLUTION_BITS,
        freq_hz,
        clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
        ..Default::default()
    };
    if unsafe { ledc_timer_config(&timer) } != ESP_OK {
        return Err(HwInitError::LedcInitFailed);
    }

    let channel = ledc_channel_config_t {
        gpio_num: pins::PWM_GPIO,
        speed_mode: ledc_mode_t_LEDC_HIGH_SPEED_MODE,
        channel: ledc_channel_t_LEDC_CHANNEL_0,
        intr_type: ledc_intr_type_t_LEDC_INTR_DISABLE,
        timer_sel: ledc_timer_t_LEDC_TIMER_0,
        duty: 0,
        hpoint: 0,
        ..Default::default()
    };
    if unsafe { ledc_channel_config(&channel) } != ESP_OK {
        return Err(HwInitError::LedcInitFailed);
    }

    info!("hw_init: LEDC configured ({} Hz, {}-bit)", freq_hz, pins::PWM_RESOLUTION_BITS);
    Ok(())
}

/// Apply a duty value in timer resolution steps.
#[cfg(target_os = "espidf")]
pub fn ledc_set_steps(steps: u32) -> Result<(), ActuatorError> {
    // SAFETY: channel configured in init_ledc(); the LEDC driver
    // serialises duty register updates.
    unsafe {
        if ledc_set_duty(
            ledc_mode_t_LEDC_HIGH_SPEED_MODE,
            ledc_channel_t_LEDC_CHANNEL_0,
            steps,
        ) != ESP_OK
        {
            return Err(ActuatorError::PwmWriteFailed);
        }
        if ledc_update_duty(
            ledc_mode_t_LEDC_HIGH_SPEED_MODE,
            ledc_channel_t_LEDC_CHANNEL_0,
        ) != ESP_OK
        {
            return Err(ActuatorError::PwmWriteFailed);
        }
    }
    Ok(())
}

/// Apply an output frequency.
#[cfg(target_os = "espidf")]
pub fn ledc_set_freq_hz(hz: u32) -> Result<(), ActuatorError> {
    // SAFETY: timer configured in init_ledc().
    let ret = unsafe {
        ledc_set_freq(
            ledc_mode_t_LEDC_HIGH_SPEED_MODE,
            ledc_timer_t_LEDC_TIMER_0,
            hz,
        )
    };
    if ret != ESP_OK {
        return Err(ActuatorError::PwmWriteFailed);
    }
    Ok(())
}

/// Stop the PWM output at idle level low.
#[cfg(target_os = "espidf")]
pub fn ledc_stop_output() -> Result<(), ActuatorError> {
    // SAFETY: channel configured in init_ledc().
    let ret = unsafe {
        ledc_stop(
            ledc_mode_t_LEDC_HIGH_SPEED_MODE,
            ledc_channel_t_LEDC_CHANNEL_0,
            0,
        )
    };
    if ret != ESP_OK {
        return Err(ActuatorError::PwmWriteFailed);
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn ledc_set_steps(_steps: u32) -> Result<(), ActuatorError> {
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn ledc_set_freq_hz(_hz: u32) -> Result<(), ActuatorError> {
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn ledc_stop_output() -> Result<(), ActuatorError> {
    Ok(())
}
