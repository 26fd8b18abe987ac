//! Fuzz target: `parser::parse_wire`
//!
//! Drives arbitrary byte buffers through the wire parser on every channel
//! and asserts it never panics and never yields more than the two
//! independent commands the grammar allows.
//!
//! cargo fuzz run fuzz_wire_parser

#![no_main]

use battmon::app::parser::parse_wire;
use battmon::broker::Channel;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    for idx in 0..Channel::COUNT {
        let channel = Channel::from_index(idx);
        let commands = parse_wire(channel, data);
        assert!(commands.len() <= 2, "wire grammar allows at most 2 commands");
    }
});
