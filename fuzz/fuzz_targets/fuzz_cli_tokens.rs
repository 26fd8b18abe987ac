//! Fuzz target: console argument parsing
//!
//! Splits arbitrary UTF-8 into tokens and runs every console grammar over
//! them.  Asserts that malformed argument lists never panic.
//!
//! cargo fuzz run fuzz_cli_tokens

#![no_main]

use battmon::app::parser::{
    parse_cli_measure, parse_cli_pwm, parse_cli_pwm_update, parse_cli_relay,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    let args: Vec<&str> = text.split_whitespace().collect();

    let _ = parse_cli_measure(&args);
    let _ = parse_cli_pwm(&args);
    let _ = parse_cli_pwm_update(&args);
    let _ = parse_cli_relay(&args);
});
