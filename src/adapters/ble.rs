//! BLE GATT adapter — the wireless command/telemetry surface.
//!
//! One primary service exposes a write-only control characteristic and a
//! notify-only measurement characteristic per sampled quantity, plus
//! write-only PWM and relay controls:
//!
//! | Characteristic   | UUID     | Perms  | Channel      |
//! |------------------|----------|--------|--------------|
//! | Current control  | `0x5001` | Write       | current      |
//! | Current measure  | `0x5002` | Read+Notify | current      |
//! | Voltage control  | `0x5003` | Write       | voltage      |
//! | Voltage measure  | `0x5004` | Read+Notify | voltage      |
//! | PWM control      | `0x5005` | Write       | pwm          |
//! | Relay control    | `0x5006` | Write       | relay        |
//! | Temp control     | `0x5007` | Write       | temperature  |
//! | Temp measure     | `0x5008` | Read+Notify | temperature  |
//!
//! Inbound writes are handed straight to
//! [`CharacteristicRegistry::dispatch_write`] on the Bluedroid task
//! context — the registered handlers only parse and enqueue, so nothing
//! blocks the stack.  Outbound traffic flows the other way through
//! [`BleNotifySink`], the registry's notify primitive; synchronous GATT
//! reads on a measurement characteristic answer from the registry
//! snapshot.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: Bluedroid GATT server via raw
//!   `esp_idf_svc::sys` calls; advertising restarts on disconnect.
//! - **all other targets**: simulation stubs for host-side tests.

use std::sync::Arc;
use std::sync::OnceLock;

use log::info;

use crate::app::ports::{NotifyError, NotifySink};
use crate::broker::{Channel, CharacteristicRegistry};

// ───────────────────────────────────────────────────────────────
// Constants
// ───────────────────────────────────────────────────────────────

pub const SERVICE_UUID: u16 = 0x5000;
pub const CHAR_CURRENT_CTRL: u16 = 0x5001;
pub const CHAR_CURRENT_MEASURE: u16 = 0x5002;
pub const CHAR_VOLTAGE_CTRL: u16 = 0x5003;
pub const CHAR_VOLTAGE_MEASURE: u16 = 0x5004;
pub const CHAR_PWM: u16 = 0x5005;
pub const CHAR_RELAY: u16 = 0x5006;
pub const CHAR_TEMP_CTRL: u16 = 0x5007;
pub const CHAR_TEMP_MEASURE: u16 = 0x5008;

/// GATT attribute handles the service needs beyond the service handle
/// itself (8 characteristics, each one declaration + one value).
#[cfg(target_os = "espidf")]
const SERVICE_NUM_HANDLES: u16 = 20;

// ───────────────────────────────────────────────────────────────
// Adapter state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleState {
    Idle,
    Advertising,
    Failed,
}

/// The registry the GATTS write callback dispatches into.  Bluedroid
/// callbacks are C function pointers and cannot capture; this is the one
/// bridge from callback context back into the broker.
static REGISTRY: OnceLock<Arc<CharacteristicRegistry>> = OnceLock::new();

pub struct BleAdapter {
    device_name: heapless::String<32>,
    state: BleState,
}

impl BleAdapter {
    /// `registry` becomes the dispatch target for every inbound
    /// characteristic write.
    pub fn new(device_name: heapless::String<32>, registry: Arc<CharacteristicRegistry>) -> Self {
        if REGISTRY.set(registry).is_err() {
            panic!("BLE adapter constructed twice");
        }
        Self {
            device_name,
            state: BleState::Idle,
        }
    }

    /// Bring up the stack and start advertising.
    pub fn start(&mut self) {
        self.platform_start();
    }

    pub fn state(&self) -> BleState {
        self.state
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(&mut self) {
        use esp_idf_svc::sys::*;
        use log::error;

        unsafe {
            // Bluedroid persists bonding state in NVS; bring it up first.
            let mut ret = nvs_flash_init();
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                nvs_flash_erase();
                ret = nvs_flash_init();
            }
            if ret != ESP_OK {
                error!("BLE: NVS init failed ({})", ret);
                self.state = BleState::Failed;
                return;
            }

            // Release classic BT memory (BLE-only mode saves ~30 KB).
            esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

            let mut bt_cfg = esp_bt_controller_config_t::default();
            let ret = esp_bt_controller_init(&mut bt_cfg);
            if ret != ESP_OK {
                error!("BLE: bt_controller_init failed ({})", ret);
                self.state = BleState::Failed;
                return;
            }

            let ret = esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE);
            if ret != ESP_OK {
                error!("BLE: bt_controller_enable failed ({})", ret);
                self.state = BleState::Failed;
                return;
            }

            if esp_bluedroid_init() != ESP_OK || esp_bluedroid_enable() != ESP_OK {
                error!("BLE: bluedroid bring-up failed");
                self.state = BleState::Failed;
                return;
            }

            esp_ble_gap_register_callback(Some(esp::ble_gap_event_handler));
            esp_ble_gatts_register_callback(Some(esp::ble_gatts_event_handler));
            esp_ble_gatts_app_register(0);

            // The GAP API wants a null-terminated C string.
            let mut name_z: heapless::Vec<u8, 33> = heapless::Vec::new();
            let _ = name_z.extend_from_slice(self.device_name.as_bytes());
            let _ = name_z.push(0);
            esp_ble_gap_set_device_name(name_z.as_ptr() as *const _);

            esp::start_advertising();
        }

        self.state = BleState::Advertising;
        info!("BLE: stack initialized, advertising as '{}'", self.device_name);
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self) {
        self.state = BleState::Advertising;
        info!(
            "BLE(sim): advertising '{}' (service 0x{:04x})",
            self.device_name, SERVICE_UUID
        );
    }
}

// ───────────────────────────────────────────────────────────────
// Notify sink
// ───────────────────────────────────────────────────────────────

/// The registry's outbound primitive: pushes a published payload to the
/// subscribed peer as a GATT notification on the channel's measurement
/// characteristic.
pub struct BleNotifySink;

impl NotifySink for BleNotifySink {
    #[cfg(target_os = "espidf")]
    fn notify(&self, channel: Channel, payload: &[u8]) -> Result<(), NotifyError> {
        esp::send_notify(channel, payload)
    }

    #[cfg(not(target_os = "espidf"))]
    fn notify(&self, channel: Channel, payload: &[u8]) -> Result<(), NotifyError> {
        log::debug!(
            "BLE(sim): notify '{}' {} bytes",
            channel,
            payload.len()
        );
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF Bluedroid plumbing
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod esp {
    use super::*;
    use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use esp_idf_svc::sys::*;

    pub(super) static GATTS_IF: AtomicU32 = AtomicU32::new(0);
    pub(super) static CONN_ID: AtomicU32 = AtomicU32::new(0);
    pub(super) static CONNECTED: AtomicBool = AtomicBool::new(false);
    static SVC_HANDLE: AtomicU32 = AtomicU32::new(0);
    static CHAR_STEP: AtomicU32 = AtomicU32::new(0);

    /// Write-characteristic handle per channel, filled during the
    /// sequential ADD_CHAR walk.
    static WRITE_HANDLES: [AtomicU32; Channel::COUNT] = [const { AtomicU32::new(0) }; Channel::COUNT];
    /// Notify-characteristic handle per channel (zero where the channel
    /// has no measurement stream).
    static NOTIFY_HANDLES: [AtomicU32; Channel::COUNT] = [const { AtomicU32::new(0) }; Channel::COUNT];

    fn uuid16(uuid: u16) -> esp_bt_uuid_t {
        let mut t: esp_bt_uuid_t = unsafe { core::mem::zeroed() };
        t.len = 2;
        t.uuid.uuid16 = uuid;
        t
    }

    unsafe fn add_char(svc_handle: u16, uuid: u16, perm: u32, prop: u32) {
        let mut char_uuid = uuid16(uuid);
        unsafe {
            esp_ble_gatts_add_char(
                svc_handle,
                &mut char_uuid,
                perm as esp_gatt_perm_t,
                prop as esp_gatt_char_prop_t,
                core::ptr::null_mut(),
                core::ptr::null_mut(),
            );
        }
    }

    pub(super) fn start_advertising() {
        // SAFETY: plain parameter struct passed to the GAP API.
        unsafe {
            let mut adv_params = esp_ble_adv_params_t {
                adv_int_min: 0x20,
                adv_int_max: 0x40,
                adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
                own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
                channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
                adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
                ..core::mem::zeroed()
            };
            esp_ble_gap_start_advertising(&mut adv_params);
        }
    }

    pub(super) fn send_notify(channel: Channel, payload: &[u8]) -> Result<(), NotifyError> {
        if !CONNECTED.load(Ordering::Acquire) {
            return Err(NotifyError::NotConnected);
        }
        let handle = NOTIFY_HANDLES[channel as usize].load(Ordering::Relaxed);
        if handle == 0 {
            return Err(NotifyError::Io);
        }

        // SAFETY: send_indicate copies the payload before returning;
        // need_confirm=false makes this a notification.
        let ret = unsafe {
            esp_ble_gatts_send_indicate(
                GATTS_IF.load(Ordering::Relaxed) as u8,
                CONN_ID.load(Ordering::Relaxed) as u16,
                handle as u16,
                payload.len() as u16,
                payload.as_ptr() as *mut u8,
                false,
            )
        };
        if ret != ESP_OK {
            return Err(NotifyError::Io);
        }
        Ok(())
    }

    pub(super) unsafe extern "C" fn ble_gap_event_handler(
        event: esp_gap_ble_cb_event_t,
        _param: *mut esp_ble_gap_cb_param_t,
    ) {
        match event {
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
                log::info!("BLE GAP: advertising started");
            }
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_STOP_COMPLETE_EVT => {
                log::info!("BLE GAP: advertising stopped");
            }
            _ => {}
        }
    }

    /// The characteristic creation walk: each ADD_CHAR completion queues
    /// the next one and records the finished handle for its channel.
    /// Order matches the table in the module docs.
    const CHAR_SEQUENCE: [(u16, Option<Channel>, bool); 8] = [
        (CHAR_CURRENT_CTRL, Some(Channel::Current), false),
        (CHAR_CURRENT_MEASURE, Some(Channel::Current), true),
        (CHAR_VOLTAGE_CTRL, Some(Channel::Voltage), false),
        (CHAR_VOLTAGE_MEASURE, Some(Channel::Voltage), true),
        (CHAR_PWM, Some(Channel::Pwm), false),
        (CHAR_RELAY, Some(Channel::Relay), false),
        (CHAR_TEMP_CTRL, Some(Channel::Temperature), false),
        (CHAR_TEMP_MEASURE, Some(Channel::Temperature), true),
    ];

    unsafe fn add_char_at(step: usize, svc_handle: u16) {
        let (uuid, _, is_notify) = CHAR_SEQUENCE[step];
        let (perm, prop) = if is_notify {
            (
                ESP_GATT_PERM_READ,
                ESP_GATT_CHAR_PROP_BIT_READ | ESP_GATT_CHAR_PROP_BIT_NOTIFY,
            )
        } else {
            (ESP_GATT_PERM_WRITE, ESP_GATT_CHAR_PROP_BIT_WRITE)
        };
        unsafe { add_char(svc_handle, uuid, perm, prop) };
    }

    pub(super) unsafe extern "C" fn ble_gatts_event_handler(
        event: esp_gatts_cb_event_t,
        gatts_if: esp_gatt_if_t,
        param: *mut esp_ble_gatts_cb_param_t,
    ) {
        GATTS_IF.store(gatts_if as u32, Ordering::Relaxed);

        match event {
            esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
                log::info!("BLE GATTS: app registered (if={})", gatts_if);
                let mut svc_id = esp_gatt_srvc_id_t {
                    id: esp_gatt_id_t {
                        uuid: uuid16(SERVICE_UUID),
                        inst_id: 0,
                    },
                    is_primary: true,
                };
                unsafe { esp_ble_gatts_create_service(gatts_if, &mut svc_id, SERVICE_NUM_HANDLES) };
            }

            esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
                let p = unsafe { &(*param).create };
                let svc_handle = p.service_handle;
                SVC_HANDLE.store(svc_handle as u32, Ordering::Relaxed);
                log::info!("BLE GATTS: service created (handle={})", svc_handle);
                unsafe {
                    esp_ble_gatts_start_service(svc_handle);
                    CHAR_STEP.store(0, Ordering::Relaxed);
                    add_char_at(0, svc_handle);
                }
            }

            esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
                let p = unsafe { &(*param).add_char };
                let handle = p.attr_handle;
                let step = CHAR_STEP.load(Ordering::Relaxed) as usize;
                let svc_handle = SVC_HANDLE.load(Ordering::Relaxed) as u16;

                if let Some(&(uuid, channel, is_notify)) = CHAR_SEQUENCE.get(step) {
                    if let Some(ch) = channel {
                        let table = if is_notify {
                            &NOTIFY_HANDLES
                        } else {
                            &WRITE_HANDLES
                        };
                        table[ch as usize].store(handle as u32, Ordering::Relaxed);
                    }
                    log::debug!(
                        "BLE GATTS: char 0x{:04x} registered (handle={})",
                        uuid,
                        handle
                    );

                    let next = step + 1;
                    CHAR_STEP.store(next as u32, Ordering::Relaxed);
                    if next < CHAR_SEQUENCE.len() {
                        unsafe { add_char_at(next, svc_handle) };
                    } else {
                        log::info!("BLE GATTS: all characteristics registered");
                    }
                }
            }

            esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
                let p = unsafe { &(*param).connect };
                CONN_ID.store(p.conn_id as u32, Ordering::Relaxed);
                CONNECTED.store(true, Ordering::Release);
                log::info!("BLE GATTS: client connected (conn_id={})", p.conn_id);
            }

            esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
                CONNECTED.store(false, Ordering::Release);
                log::info!("BLE GATTS: client disconnected");
                // The device must stay reachable: advertise again.
                start_advertising();
            }

            esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
                let p = unsafe { &(*param).write };
                let handle = p.handle as u32;
                let data = unsafe { core::slice::from_raw_parts(p.value, p.len as usize) };

                for idx in 0..Channel::COUNT {
                    if WRITE_HANDLES[idx].load(Ordering::Relaxed) == handle {
                        if let Some(registry) = REGISTRY.get() {
                            registry.dispatch_write(Channel::from_index(idx), data);
                        }
                        break;
                    }
                }
            }

            esp_gatts_cb_event_t_ESP_GATTS_READ_EVT => {
                let p = unsafe { &(*param).read };
                let handle = p.handle as u32;

                for idx in 0..Channel::COUNT {
                    if NOTIFY_HANDLES[idx].load(Ordering::Relaxed) == handle {
                        let Some(registry) = REGISTRY.get() else {
                            break;
                        };
                        let snap = registry.read_snapshot(Channel::from_index(idx));
                        // SAFETY: plain response struct handed to the
                        // GATTS API, which copies it before returning.
                        unsafe {
                            let mut rsp: esp_gatt_rsp_t = core::mem::zeroed();
                            rsp.attr_value.handle = p.handle;
                            rsp.attr_value.len = snap.len() as u16;
                            rsp.attr_value.value[..snap.len()].copy_from_slice(&snap);
                            esp_ble_gatts_send_response(
                                gatts_if,
                                p.conn_id,
                                p.trans_id,
                                esp_gatt_status_t_ESP_GATT_OK,
                                &mut rsp,
                            );
                        }
                        break;
                    }
                }
            }

            _ => {}
        }
    }
}
