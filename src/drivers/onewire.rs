//! DS18B20 one-wire bus driver wrapper.
//!
//! The bus transaction protocol lives in the vendored `esp32-ds18b20` /
//! `esp32-owb` IDF components (RMT timeslot driver); this module owns the
//! bus handle and probe table and exposes one primitive:
//! [`convert_and_read`].  Probe discovery happens once at boot in
//! [`init_bus`]; a bus with no probes is reported per read as
//! [`SensorError::NoProbes`], never as a crash.

#[cfg(not(target_os = "espidf"))]
use crate::error::SensorError;

/// Most probes the bus will enumerate.
pub const MAX_PROBES: usize = 8;

/// Per-read output: one Celsius value per discovered probe.
pub type ProbeReadings = heapless::Vec<f32, MAX_PROBES>;

#[cfg(target_os = "espidf")]
mod esp {
    use super::{ProbeReadings, MAX_PROBES};
    use crate::error::SensorError;
    use crate::pins;
    use esp_idf_svc::sys::*;
    use log::{error, info, warn};

    static mut BUS: *mut OneWireBus = core::ptr::null_mut();
    static mut RMT_DRIVER: owb_rmt_driver_info = unsafe { core::mem::zeroed() };
    static mut PROBES: [*mut DS18B20_Info; MAX_PROBES] = [core::ptr::null_mut(); MAX_PROBES];
    static mut PROBE_COUNT: usize = 0;

    /// SAFETY: BUS/PROBES/PROBE_COUNT are written once in `init_bus()`
    /// before any sampling task exists; afterwards read-only.  Bus
    /// transactions themselves are serialised by the session-per-channel
    /// rule — only the temperature worker touches the bus.
    pub fn init_bus() -> Result<usize, SensorError> {
        unsafe {
            BUS = owb_rmt_initialize(
                &raw mut RMT_DRIVER,
                pins::ONEWIRE_GPIO,
                rmt_channel_t_RMT_CHANNEL_1,
                rmt_channel_t_RMT_CHANNEL_0,
            );
            if BUS.is_null() {
                error!("onewire: bus initialisation failed");
                return Err(SensorError::BusFault);
            }
            owb_use_crc(BUS, true);

            // Probes need a settling period after power-up before the
            // first search is reliable.
            std::thread::sleep(core::time::Duration::from_millis(2000));

            let mut search_state: OneWireBus_SearchState = core::mem::zeroed();
            let mut found = false;
            let mut rom_codes: [OneWireBus_ROMCode; MAX_PROBES] = core::mem::zeroed();
            owb_search_first(BUS, &mut search_state, &mut found);
            while found && PROBE_COUNT < MAX_PROBES {
                rom_codes[PROBE_COUNT] = search_state.rom_code;
                PROBE_COUNT += 1;
                owb_search_next(BUS, &mut search_state, &mut found);
            }
            info!("onewire: found {} probe(s)", PROBE_COUNT);

            for i in 0..PROBE_COUNT {
                let probe = ds18b20_malloc();
                if probe.is_null() {
                    error!("onewire: probe allocation failed");
                    PROBE_COUNT = 0;
                    return Err(SensorError::BusFault);
                }
                if PROBE_COUNT == 1 {
                    ds18b20_init_solo(probe, BUS);
                } else {
                    ds18b20_init(probe, BUS, rom_codes[i]);
                }
                ds18b20_use_crc(probe, true);
                ds18b20_set_resolution(probe, DS18B20_RESOLUTION_DS18B20_RESOLUTION_12_BIT);
                PROBES[i] = probe;
            }

            // Parasitic-powered probes cannot signal conversion-complete;
            // the driver falls back to a fixed wait.
            let mut parasitic = false;
            ds18b20_check_for_parasite_power(BUS, &mut parasitic);
            if parasitic {
                warn!("onewire: parasitic-powered probe(s) detected");
            }
            owb_use_parasitic_power(BUS, parasitic);

            Ok(PROBE_COUNT)
        }
    }

    pub fn convert_and_read() -> Result<ProbeReadings, SensorError> {
        // SAFETY: init_bus() contract — handles are boot-written, and only
        // one task performs bus transactions at a time.
        unsafe {
            if BUS.is_null() || PROBE_COUNT == 0 {
                return Err(SensorError::NoProbes);
            }

            // One conversion started on all probes at once; the first
            // probe's resolution bounds the wait for all of them.
            ds18b20_convert_all(BUS);
            ds18b20_wait_for_conversion(PROBES[0]);

            let mut readings = ProbeReadings::new();
            for i in 0..PROBE_COUNT {
                let mut celsius: f32 = 0.0;
                let err = ds18b20_read_temp(PROBES[i], &mut celsius);
                if err != DS18B20_ERROR_DS18B20_OK {
                    warn!("onewire: probe {} read error ({})", i, err);
                    return Err(SensorError::BusFault);
                }
                let _ = readings.push(celsius);
            }
            Ok(readings)
        }
    }
}

#[cfg(target_os = "espidf")]
pub use esp::{convert_and_read, init_bus};

#[cfg(not(target_os = "espidf"))]
pub fn init_bus() -> Result<usize, SensorError> {
    log::info!("onewire(sim): bus init skipped");
    Ok(0)
}

#[cfg(not(target_os = "espidf"))]
pub fn convert_and_read() -> Result<ProbeReadings, SensorError> {
    Ok(ProbeReadings::new())
}
