//! The normalized command type both surfaces decode into.
//!
//! A console line and a BLE characteristic write land in completely
//! different shapes; everything downstream of the parser handles only this
//! tagged union, dispatched exhaustively in
//! [`AppService`](super::service::AppService).

use core::fmt::Write as _;

/// One typed operation, independent of which surface produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Fixed-count synchronous read returning a single aggregate.
    ReadNow,
    /// Start a bounded-duration sampling session.
    ReadFor { duration_s: u32 },
    /// Live duty update, deadline untouched.
    SetDuty { pct: u32 },
    /// Live frequency update, deadline untouched.
    SetFreq { hz: u32 },
    /// Timed actuation: apply freq/duty, auto-stop after the duration.
    TriggerFor {
        duration_s: u32,
        freq_hz: u32,
        duty_pct: u32,
    },
    /// Immediate actuation stop, cancelling any pending deadline.
    Force,
    /// Relay on/off.
    SetState { on: bool },
}

impl Command {
    /// Wire-text encoding for the variants that have one, in the grammar of
    /// the channel that carries them (`None` for console-only operations).
    ///
    /// The text form is not byte-stable across firmware versions; only the
    /// parse round-trip is guaranteed.
    pub fn to_wire(&self) -> Option<heapless::String<48>> {
        let mut out = heapless::String::new();
        match *self {
            Self::ReadFor { duration_s } => {
                let _ = write!(out, "{duration_s}");
            }
            Self::TriggerFor {
                duration_s,
                freq_hz,
                duty_pct,
            } => {
                let _ = write!(out, "0,{duration_s},{freq_hz},{duty_pct}");
            }
            Self::Force => {
                let _ = write!(out, "1,0,0,0");
            }
            Self::SetState { on } => {
                let _ = out.push_str(if on { "on" } else { "off" });
            }
            Self::ReadNow | Self::SetDuty { .. } | Self::SetFreq { .. } => return None,
        }
        Some(out)
    }
}
