//! Inter-task command queue.
//!
//! Uses an `embassy-sync` bounded MPMC channel to bridge the inbound
//! surfaces (console thread, BLE GATT write context) with the dispatcher
//! running on the main task. Both sides share one static channel without
//! heap allocation.
//!
//! ```text
//! ┌──────────────┐                 ┌───────────────┐
//! │ console task │─┐ CommandRequest │               │
//! └──────────────┘ ├──────────────▶│  AppService    │
//! ┌──────────────┐ │               │  (main task)   │
//! │ BLE write ctx │─┘               └───────────────┘
//! └──────────────┘
//! ```
//!
//! Submission never blocks — a full queue drops the request with a
//! warning, which is the same absence-of-output signal every other
//! rejected command produces.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel as CommandQueue;
use log::warn;

use super::command::Command;
use crate::broker::Channel;

/// Where a request entered the system, for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Console,
    Ble,
}

/// One normalized operation addressed to a channel.
#[derive(Debug, Clone, Copy)]
pub struct CommandRequest {
    pub channel: Channel,
    pub command: Command,
    pub origin: Origin,
}

/// Queue depth for pending requests.
const CMD_DEPTH: usize = 8;

/// Inbound command queue: surfaces → dispatcher.
static CMD_CHANNEL: CommandQueue<CriticalSectionRawMutex, CommandRequest, CMD_DEPTH> =
    CommandQueue::new();

/// Enqueue a request from any surface.  Returns `false` if the queue was
/// full and the request dropped.
pub fn submit(request: CommandRequest) -> bool {
    if CMD_CHANNEL.try_send(request).is_err() {
        warn!(
            "command queue full, dropping {:?} for '{}'",
            request.command, request.channel
        );
        return false;
    }
    true
}

/// Drain one pending request, if any.  Called by the main task each loop
/// iteration.
pub fn try_next() -> Option<CommandRequest> {
    CMD_CHANNEL.try_receive().ok()
}
