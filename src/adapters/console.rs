//! Console command surface.
//!
//! Registers one command per module with the ESP-IDF console REPL and
//! funnels every invocation through [`dispatch_line`], which parses the
//! argument list and enqueues the resulting requests.  Line editing,
//! history and prompt handling belong to the REPL component — this module
//! only sees `argv`.
//!
//! Every handler reports success to the shell regardless of whether the
//! action was accepted: rejected commands surface in the log only, the
//! same contract the wireless surface follows.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: UART REPL via `esp_console` raw sys calls.
//! - **all other targets**: [`dispatch_line`] is exercised directly by
//!   tests; no REPL is started.

use log::{info, warn};

use crate::app::channels::{self, CommandRequest, Origin};
use crate::app::parser;
use crate::broker::Channel;

/// Console command table: name and registered help text.
pub const COMMANDS: [(&str, &str); 6] = [
    ("adc", "[now] [duration <time>]"),
    ("ct", "[now] [duration <time>]"),
    ("ds", "[now] [duration <time>]"),
    ("pwm", "[force] [duration <time>] [duty <duty>] [freq <frequency>]"),
    ("pwm-update", "[duty <duty>] [freq <frequency>]"),
    ("relay", "[on] [off]"),
];

/// Parse one console invocation and enqueue its requests.
///
/// Returns the number of requests enqueued (zero for malformed or unknown
/// input — the shell still sees success either way).
pub fn dispatch_line(name: &str, args: &[&str]) -> usize {
    let (channel, commands) = match name {
        "adc" => (Channel::Voltage, parser::parse_cli_measure(args)),
        "ct" => (Channel::Current, parser::parse_cli_measure(args)),
        "ds" => (Channel::Temperature, parser::parse_cli_measure(args)),
        "pwm" => (Channel::Pwm, parser::parse_cli_pwm(args)),
        "pwm-update" => (Channel::Pwm, parser::parse_cli_pwm_update(args)),
        "relay" => (Channel::Relay, parser::parse_cli_relay(args)),
        other => {
            warn!("unknown console command '{other}'");
            return 0;
        }
    };

    let mut submitted = 0;
    for command in commands {
        if channels::submit(CommandRequest {
            channel,
            command,
            origin: Origin::Console,
        }) {
            submitted += 1;
        }
    }
    submitted
}

/// Start the UART REPL and register the command table.
#[cfg(target_os = "espidf")]
pub fn start() -> Result<(), crate::error::Error> {
    esp::start_repl()
}

#[cfg(not(target_os = "espidf"))]
pub fn start() -> Result<(), crate::error::Error> {
    info!("console(sim): REPL not started");
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF REPL plumbing
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod esp {
    use super::*;
    use crate::error::Error;
    use core::ffi::{c_char, c_int, CStr};
    use esp_idf_svc::sys::*;

    /// Null-terminated names/help for registration; indices match
    /// [`COMMANDS`].
    const C_NAMES: [&[u8]; 6] = [
        b"adc\0",
        b"ct\0",
        b"ds\0",
        b"pwm\0",
        b"pwm-update\0",
        b"relay\0",
    ];
    const C_HELP: [&[u8]; 6] = [
        b"[now] [duration <time>]\0",
        b"[now] [duration <time>]\0",
        b"[now] [duration <time>]\0",
        b"[force] [duration <time>] [duty <duty>] [freq <frequency>]\0",
        b"[duty <duty>] [freq <frequency>]\0",
        b"[on] [off]\0",
    ];

    /// Shared handler for every registered command: `argv[0]` carries the
    /// command name.  Always returns 0 — failures are log-only.
    unsafe extern "C" fn command_cb(argc: c_int, argv: *mut *mut c_char) -> c_int {
        if argc < 1 || argv.is_null() {
            return 0;
        }

        let mut tokens: heapless::Vec<&str, 16> = heapless::Vec::new();
        for i in 0..argc as usize {
            // SAFETY: the console guarantees argc null-terminated strings.
            let raw = unsafe { *argv.add(i) };
            if raw.is_null() {
                break;
            }
            match unsafe { CStr::from_ptr(raw) }.to_str() {
                Ok(s) => {
                    if tokens.push(s).is_err() {
                        warn!("console: too many arguments, extras ignored");
                        break;
                    }
                }
                Err(_) => {
                    warn!("console: non-UTF8 argument ignored");
                    return 0;
                }
            }
        }

        if let Some((name, args)) = tokens.split_first() {
            dispatch_line(name, args);
        }
        0
    }

    pub(super) fn start_repl() -> Result<(), Error> {
        // SAFETY: one-shot init from the main task before the event loop.
        unsafe {
            let repl_cfg = esp_console_repl_config_t {
                max_history_len: 32,
                history_save_path: core::ptr::null(),
                task_stack_size: 4096,
                task_priority: 2,
                prompt: b"battmon> \0".as_ptr() as *const _,
                max_cmdline_length: 256,
                ..Default::default()
            };
            let uart_cfg = esp_console_dev_uart_config_t {
                channel: 0,
                baud_rate: 115_200,
                tx_gpio_num: -1,
                rx_gpio_num: -1,
                ..Default::default()
            };

            let mut repl: *mut esp_console_repl_t = core::ptr::null_mut();
            if esp_console_new_repl_uart(&uart_cfg, &repl_cfg, &mut repl) != ESP_OK {
                return Err(Error::Init("console REPL creation failed"));
            }

            for i in 0..COMMANDS.len() {
                let cmd = esp_console_cmd_t {
                    command: C_NAMES[i].as_ptr() as *const _,
                    help: C_HELP[i].as_ptr() as *const _,
                    hint: core::ptr::null(),
                    func: Some(command_cb),
                    argtable: core::ptr::null_mut(),
                    ..Default::default()
                };
                if esp_console_cmd_register(&cmd) != ESP_OK {
                    return Err(Error::Init("console command registration failed"));
                }
            }

            if esp_console_start_repl(repl) != ESP_OK {
                return Err(Error::Init("console REPL start failed"));
            }
        }

        info!("console: REPL started ({} commands)", COMMANDS.len());
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // dispatch_line feeds the shared command queue; drain it so parallel
    // test binaries in this process don't observe each other.  All queue
    // assertions live in this single test.
    #[test]
    fn dispatch_routes_names_to_channels() {
        while channels::try_next().is_some() {}

        assert_eq!(dispatch_line("adc", &["now"]), 1);
        let req = channels::try_next().unwrap();
        assert_eq!(req.channel, Channel::Voltage);
        assert_eq!(req.origin, Origin::Console);

        assert_eq!(dispatch_line("relay", &["on"]), 1);
        let req = channels::try_next().unwrap();
        assert_eq!(req.channel, Channel::Relay);

        assert_eq!(
            dispatch_line("pwm", &["force", "duration", "2", "freq", "100", "duty", "10"]),
            2
        );
        assert_eq!(channels::try_next().unwrap().channel, Channel::Pwm);
        assert_eq!(channels::try_next().unwrap().channel, Channel::Pwm);

        // Unknown names and malformed arguments enqueue nothing.
        assert_eq!(dispatch_line("bogus", &["now"]), 0);
        assert_eq!(dispatch_line("adc", &["duration", "5x"]), 0);
        assert!(channels::try_next().is_none());
    }

    #[test]
    fn command_table_matches_dispatch() {
        for (name, _help) in COMMANDS {
            // Empty argument lists parse to nothing but the name must be
            // recognized (no "unknown command" path).
            dispatch_line(name, &[]);
        }
    }
}
