//! Characteristic broker — the name-keyed channel table every subsystem
//! talks through.
//!
//! ```text
//!  SamplingWorker ──publish──▶ ┌──────────────────────┐ ──notify──▶ transport
//!                              │ CharacteristicRegistry │
//!  transport ──dispatch_write─▶└──────────────────────┘ ──callback──▶ parser
//! ```
//!
//! Sensors publish readings here without knowing who transports them, and
//! the wire format can evolve without touching sampling logic.  Each
//! channel's snapshot sits behind its own mutex so a sampling thread's
//! publish and the transport task's read never interleave destructively.
//!
//! Write callbacks and the notify sink are registered once during startup
//! and never replaced; a second registration is a programming error and
//! panics before any traffic is processed.

use std::sync::{Mutex, OnceLock};

use log::warn;

use crate::app::ports::NotifySink;

// ---------------------------------------------------------------------------
// Channel identity
// ---------------------------------------------------------------------------

/// Every physical quantity or actuator exposed to the command surfaces.
/// Closed enumeration, known at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Channel {
    Voltage = 0,
    Current = 1,
    Temperature = 2,
    Pwm = 3,
    Relay = 4,
}

impl Channel {
    /// Total number of channels — used to size the slot array.
    pub const COUNT: usize = 5;

    /// Convert a slot index back to a `Channel`.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Voltage,
            1 => Self::Current,
            2 => Self::Temperature,
            3 => Self::Pwm,
            4 => Self::Relay,
            _ => {
                debug_assert!(false, "invalid channel index: {idx}");
                Self::Voltage
            }
        }
    }

    /// Short lowercase name used in logs and task names.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Voltage => "voltage",
            Self::Current => "current",
            Self::Temperature => "temperature",
            Self::Pwm => "pwm",
            Self::Relay => "relay",
        }
    }
}

impl core::fmt::Display for Channel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Upper bound on a channel's serialized snapshot: the widest wire form is
/// the `"<now>,<max>,<min>,<avg>"` measurement quad.
pub const MAX_SNAPSHOT: usize = 44;

/// A channel's last-published value, bounded and copy-out readable.
pub type Snapshot = heapless::Vec<u8, MAX_SNAPSHOT>;

/// Inbound-write handler: receives the raw payload on the transport's
/// delivery context.  Bodies must not block — starting a sampling session
/// is a quick handle submission, never inline work.
pub type WriteCallback = Box<dyn Fn(&[u8]) + Send + Sync>;

/// The channel table.  One instance lives for the whole firmware run,
/// shared by reference between the transports, the dispatcher, and every
/// sampling worker.
pub struct CharacteristicRegistry {
    snapshots: [Mutex<Snapshot>; Channel::COUNT],
    write_cbs: [OnceLock<WriteCallback>; Channel::COUNT],
    sink: OnceLock<Box<dyn NotifySink>>,
}

impl CharacteristicRegistry {
    pub fn new() -> Self {
        Self {
            snapshots: core::array::from_fn(|_| Mutex::new(Snapshot::new())),
            write_cbs: core::array::from_fn(|_| OnceLock::new()),
            sink: OnceLock::new(),
        }
    }

    /// Register the inbound-write handler for `channel`.
    ///
    /// Startup-time only.  There is exactly one owner of a channel's
    /// semantics; a duplicate registration is a programming error and
    /// panics immediately rather than silently overwriting.
    pub fn register(&self, channel: Channel, callback: WriteCallback) {
        if self.write_cbs[channel as usize].set(callback).is_err() {
            panic!("duplicate write callback registered for channel '{channel}'");
        }
    }

    /// Install the outbound notify sink.  Startup-time only, same
    /// single-owner rule as [`register`](Self::register).
    pub fn set_notify_sink(&self, sink: Box<dyn NotifySink>) {
        if self.sink.set(sink).is_err() {
            panic!("duplicate notify sink registered");
        }
    }

    /// Overwrite `channel`'s snapshot and forward the bytes to the
    /// transport.  Fire-and-forget: a transport failure is logged, never
    /// propagated to the publishing sampling loop.
    pub fn publish(&self, channel: Channel, payload: &[u8]) {
        {
            let mut snap = lock_recovering(&self.snapshots[channel as usize]);
            snap.clear();
            let take = payload.len().min(MAX_SNAPSHOT);
            if take < payload.len() {
                warn!(
                    "publish on '{channel}' truncated {} -> {MAX_SNAPSHOT} bytes",
                    payload.len()
                );
            }
            // Cannot fail: `take` is bounded by the capacity.
            let _ = snap.extend_from_slice(&payload[..take]);
        }

        if let Some(sink) = self.sink.get() {
            if let Err(e) = sink.notify(channel, payload) {
                warn!("notify on '{channel}' failed: {e}");
            }
        }
    }

    /// Deliver an inbound write to `channel`'s handler, synchronously on
    /// the caller's execution context.
    pub fn dispatch_write(&self, channel: Channel, payload: &[u8]) {
        match self.write_cbs[channel as usize].get() {
            Some(cb) => cb(payload),
            None => warn!("write on '{channel}' ignored: no handler registered"),
        }
    }

    /// Copy out the last published value, used to answer synchronous read
    /// requests over the wire.
    pub fn read_snapshot(&self, channel: Channel) -> Snapshot {
        lock_recovering(&self.snapshots[channel as usize]).clone()
    }
}

impl Default for CharacteristicRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Take a slot lock, recovering the data if a worker panicked while
/// holding it.  A snapshot is always internally consistent — writes are
/// a single clear+extend under the lock — so recovery is safe.
fn lock_recovering<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::NotifyError;
    use std::sync::Arc;

    struct RecordingSink {
        sent: Mutex<Vec<(Channel, Vec<u8>)>>,
    }

    impl NotifySink for RecordingSink {
        fn notify(&self, channel: Channel, payload: &[u8]) -> Result<(), NotifyError> {
            self.sent
                .lock()
                .unwrap()
                .push((channel, payload.to_vec()));
            Ok(())
        }
    }

    struct FailingSink;

    impl NotifySink for FailingSink {
        fn notify(&self, _channel: Channel, _payload: &[u8]) -> Result<(), NotifyError> {
            Err(NotifyError::NotConnected)
        }
    }

    #[test]
    fn publish_then_read_snapshot() {
        let reg = CharacteristicRegistry::new();
        reg.publish(Channel::Voltage, b"12450.00,12460.00,12440.00,12450.00");
        let snap = reg.read_snapshot(Channel::Voltage);
        assert_eq!(&snap[..], b"12450.00,12460.00,12440.00,12450.00");
    }

    #[test]
    fn snapshot_is_per_channel() {
        let reg = CharacteristicRegistry::new();
        reg.publish(Channel::Voltage, b"1.00");
        reg.publish(Channel::Current, b"2.00");
        assert_eq!(&reg.read_snapshot(Channel::Voltage)[..], b"1.00");
        assert_eq!(&reg.read_snapshot(Channel::Current)[..], b"2.00");
    }

    #[test]
    fn oversize_publish_is_truncated_not_dropped() {
        let reg = CharacteristicRegistry::new();
        let big = [b'x'; MAX_SNAPSHOT + 7];
        reg.publish(Channel::Temperature, &big);
        assert_eq!(reg.read_snapshot(Channel::Temperature).len(), MAX_SNAPSHOT);
    }

    #[test]
    fn dispatch_invokes_registered_callback() {
        let reg = CharacteristicRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        reg.register(
            Channel::Relay,
            Box::new(move |bytes| seen2.lock().unwrap().push(bytes.to_vec())),
        );

        reg.dispatch_write(Channel::Relay, b"on");
        assert_eq!(seen.lock().unwrap().as_slice(), &[b"on".to_vec()]);
    }

    #[test]
    fn dispatch_without_callback_is_a_noop() {
        let reg = CharacteristicRegistry::new();
        reg.dispatch_write(Channel::Pwm, b"1,2,3,4");
    }

    #[test]
    #[should_panic(expected = "duplicate write callback")]
    fn duplicate_registration_panics() {
        let reg = CharacteristicRegistry::new();
        reg.register(Channel::Voltage, Box::new(|_| {}));
        reg.register(Channel::Voltage, Box::new(|_| {}));
    }

    #[test]
    #[should_panic(expected = "duplicate notify sink")]
    fn duplicate_sink_panics() {
        let reg = CharacteristicRegistry::new();
        reg.set_notify_sink(Box::new(FailingSink));
        reg.set_notify_sink(Box::new(FailingSink));
    }

    #[test]
    fn publish_forwards_to_sink() {
        let reg = CharacteristicRegistry::new();
        let sink = Arc::new(RecordingSink {
            sent: Mutex::new(Vec::new()),
        });
        struct Fwd(Arc<RecordingSink>);
        impl NotifySink for Fwd {
            fn notify(&self, ch: Channel, p: &[u8]) -> Result<(), NotifyError> {
                self.0.notify(ch, p)
            }
        }
        reg.set_notify_sink(Box::new(Fwd(Arc::clone(&sink))));

        reg.publish(Channel::Current, b"1.25,2.00,0.50,1.10");
        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, Channel::Current);
        assert_eq!(sent[0].1, b"1.25,2.00,0.50,1.10");
    }

    #[test]
    fn sink_failure_does_not_poison_snapshot() {
        let reg = CharacteristicRegistry::new();
        reg.set_notify_sink(Box::new(FailingSink));
        reg.publish(Channel::Voltage, b"3.30");
        assert_eq!(&reg.read_snapshot(Channel::Voltage)[..], b"3.30");
    }

    #[test]
    fn channel_index_roundtrip() {
        for i in 0..Channel::COUNT {
            assert_eq!(Channel::from_index(i) as usize, i);
        }
    }
}
