//! battmon firmware — main entry point.
//!
//! Bring-up order matters: peripherals first, then the broker wiring
//! (write handlers + notify sink, both single-registration), then the
//! surfaces, and finally the dispatch loop on the main task.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                   │
//! │                                                            │
//! │  console REPL      BLE GATT server     LEDC / GPIO / ADC   │
//! │  (UART task)       (Bluedroid task)    (hw_init helpers)   │
//! │                                                            │
//! │  ─────────────── Port trait boundary ──────────────────    │
//! │                                                            │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │  AppService — dispatch · sessions · actuation        │  │
//! │  │  CharacteristicRegistry — snapshots · notify fanout  │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```

#![deny(unused_must_use)]

use std::sync::Arc;

use anyhow::Result;
use log::{info, warn};

use battmon::adapters::ble::{BleAdapter, BleNotifySink};
use battmon::adapters::console;
use battmon::app::service::{register_wire_handlers, AppService};
use battmon::broker::CharacteristicRegistry;
use battmon::config::SystemConfig;
use battmon::drivers::pwm_out::LedcPwm;
use battmon::drivers::relay_out::GpioRelay;
use battmon::drivers::{hw_init, onewire};
use battmon::sensors::current::CurrentSensor;
use battmon::sensors::temperature::Ds18b20Pair;
use battmon::sensors::voltage::VoltageSensor;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("battmon v{}", env!("CARGO_PKG_VERSION"));

    let config = SystemConfig::default();

    // ── 2. Peripherals ────────────────────────────────────────
    if let Err(e) = hw_init::init_peripherals(config.pwm_default_freq_hz) {
        // Peripheral init failure is critical — log and halt.
        // In production the watchdog resets the board after timeout.
        log::error!("HAL init failed: {} — halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }

    match onewire::init_bus() {
        Ok(0) => warn!("no temperature probes found, ds reads will fault"),
        Ok(n) => info!("{} temperature probe(s) ready", n),
        Err(e) => warn!("one-wire bus init failed: {e}"),
    }

    // ── 3. Broker wiring ──────────────────────────────────────
    let registry = Arc::new(CharacteristicRegistry::new());
    register_wire_handlers(&registry);
    registry.set_notify_sink(Box::new(BleNotifySink));

    // ── 4. Dispatcher ─────────────────────────────────────────
    let mut service = AppService::new(
        Arc::clone(&registry),
        config.clone(),
        LedcPwm::new(),
        GpioRelay::new(),
        Arc::new(VoltageSensor::new(config.vbat_cal)),
        Arc::new(CurrentSensor::new(config.ct_cal)),
        Arc::new(Ds18b20Pair::new()),
    );

    // ── 5. Command surfaces ───────────────────────────────────
    if let Err(e) = console::start() {
        warn!("console unavailable: {e}");
    }

    let mut ble = BleAdapter::new(config.device_name.clone(), Arc::clone(&registry));
    ble.start();

    info!("system ready, entering dispatch loop");

    // ── 6. Dispatch loop ──────────────────────────────────────
    let tick_ms = u64::from(config.control_loop_interval_ms);
    loop {
        service.poll();
        service.tick(tick_ms);
        std::thread::sleep(core::time::Duration::from_millis(tick_ms));
    }
}
