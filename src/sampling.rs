//! Bounded-duration sampling sessions and the synchronous read-now path.
//!
//! One reusable worker template serves every measurement quantity: sample
//! at a fixed cadence until the duration elapses, fold each reading into a
//! running min/max/avg aggregate, and publish every tick to the
//! [`CharacteristicRegistry`](crate::broker::CharacteristicRegistry).
//!
//! ```text
//!  ReadFor ──▶ SessionSupervisor ──spawn──▶ worker thread
//!                   │                          │ per tick: sample → fold → publish
//!                   │ at most one live         │ sleep(interval)
//!                   │ handle per channel       ▼
//!                   └────────── reaped on completion
//! ```
//!
//! Sessions are supervised, not detached: the supervisor owns one handle
//! per channel, rejects a second start while one is live, and can request
//! a cooperative stop.  Cancellation and expiry are both flag/counter
//! checks inside the worker loop — never an external kill — so aggregate
//! state is always left consistent.

use core::fmt::Write as _;
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use log::{info, warn};

use crate::app::ports::{SampleSource, TemperatureProbe};
use crate::broker::{Channel, CharacteristicRegistry, MAX_SNAPSHOT};
use crate::drivers::task_pin;
use crate::error::{Error, SensorError};

// ───────────────────────────────────────────────────────────────
// Running aggregate
// ───────────────────────────────────────────────────────────────

/// Running min/max/mean over observed samples.
///
/// The first recorded sample seeds `min` and `max`, so no
/// hardware-dependent sentinel can suppress a real extreme.
#[derive(Debug, Clone, Copy)]
pub struct Aggregate {
    min: f32,
    max: f32,
    sum: f64,
    count: u32,
}

impl Aggregate {
    pub const fn new() -> Self {
        Self {
            min: 0.0,
            max: 0.0,
            sum: 0.0,
            count: 0,
        }
    }

    pub fn record(&mut self, value: f32) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            if value < self.min {
                self.min = value;
            }
            if value > self.max {
                self.max = value;
            }
        }
        self.sum += f64::from(value);
        self.count += 1;
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    /// Simple running mean (not exponentially weighted).
    pub fn avg(&self) -> f32 {
        if self.count == 0 {
            0.0
        } else {
            (self.sum / f64::from(self.count)) as f32
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl Default for Aggregate {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// Wire formatting
// ───────────────────────────────────────────────────────────────

/// `"<now>,<max>,<min>,<avg>"` — 2-decimal fixed point, fits the
/// registry's bounded snapshot.
pub fn format_measurement(now: f32, agg: &Aggregate) -> heapless::String<MAX_SNAPSHOT> {
    let mut out = heapless::String::new();
    let _ = write!(
        out,
        "{:.2},{:.2},{:.2},{:.2}",
        now,
        agg.max(),
        agg.min(),
        agg.avg()
    );
    out
}

/// `"<t1>,<t2>"` probe pair text.
pub fn format_pair(first: f32, second: f32) -> heapless::String<MAX_SNAPSHOT> {
    let mut out = heapless::String::new();
    let _ = write!(out, "{first:.2},{second:.2}");
    out
}

// ───────────────────────────────────────────────────────────────
// Synchronous read-now
// ───────────────────────────────────────────────────────────────

/// Fixed-count aggregate read: `samples` readings `step_ms` apart.
///
/// Unlike a session, a hardware fault here fails the whole operation —
/// the caller asked for a single answer, not a window.
pub fn read_now(
    source: &dyn SampleSource,
    samples: u32,
    step_ms: u32,
) -> Result<Aggregate, SensorError> {
    let mut agg = Aggregate::new();
    for i in 0..samples {
        agg.record(source.sample()?);
        if i + 1 < samples {
            std::thread::sleep(core::time::Duration::from_millis(u64::from(step_ms)));
        }
    }
    Ok(agg)
}

// ───────────────────────────────────────────────────────────────
// Session feeds
// ───────────────────────────────────────────────────────────────

/// What a session does on each tick: produce one publishable payload.
///
/// The worker template owns the loop (cadence, duration, stop flag,
/// per-tick fault tolerance); the feed owns the channel-specific read,
/// aggregation and formatting.
pub trait SamplingFeed: Send {
    fn next_payload(&mut self) -> Result<heapless::String<MAX_SNAPSHOT>, SensorError>;

    /// Called once when the session ends, for the final log line.
    fn finish(&mut self);
}

/// Scalar quantity (voltage, current): aggregates and publishes the
/// measurement quad each tick.
pub struct ScalarFeed {
    channel: Channel,
    unit: &'static str,
    source: Arc<dyn SampleSource>,
    agg: Aggregate,
}

impl ScalarFeed {
    pub fn new(channel: Channel, unit: &'static str, source: Arc<dyn SampleSource>) -> Self {
        Self {
            channel,
            unit,
            source,
            agg: Aggregate::new(),
        }
    }
}

impl SamplingFeed for ScalarFeed {
    fn next_payload(&mut self) -> Result<heapless::String<MAX_SNAPSHOT>, SensorError> {
        let now = self.source.sample()?;
        self.agg.record(now);
        Ok(format_measurement(now, &self.agg))
    }

    fn finish(&mut self) {
        if self.agg.is_empty() {
            warn!("{}: session ended with no samples", self.channel);
            return;
        }
        info!(
            "{}: [avg {:.2} {u}] [max {:.2} {u}] [min {:.2} {u}]",
            self.channel,
            self.agg.avg(),
            self.agg.max(),
            self.agg.min(),
            u = self.unit
        );
    }
}

/// Probe pair (temperature): publishes both readings each tick.
pub struct PairFeed {
    channel: Channel,
    probe: Arc<dyn TemperatureProbe>,
    ticks: u32,
}

impl PairFeed {
    pub fn new(channel: Channel, probe: Arc<dyn TemperatureProbe>) -> Self {
        Self {
            channel,
            probe,
            ticks: 0,
        }
    }
}

impl SamplingFeed for PairFeed {
    fn next_payload(&mut self) -> Result<heapless::String<MAX_SNAPSHOT>, SensorError> {
        let reading = self.probe.convert_and_read()?;
        self.ticks += 1;
        Ok(format_pair(reading.first, reading.second))
    }

    fn finish(&mut self) {
        info!("{}: session ended after {} readings", self.channel, self.ticks);
    }
}

// ───────────────────────────────────────────────────────────────
// Session spec + supervisor
// ───────────────────────────────────────────────────────────────

/// One bounded-duration sampling run.
#[derive(Debug, Clone, Copy)]
pub struct SessionSpec {
    pub channel: Channel,
    pub duration_ms: u64,
    pub interval_ms: u64,
}

impl SessionSpec {
    /// Number of sample/publish iterations: `ceil(duration / interval)`.
    pub fn ticks(&self) -> u64 {
        debug_assert!(self.interval_ms > 0);
        self.duration_ms.div_ceil(self.interval_ms.max(1))
    }
}

struct SessionHandle {
    thread: JoinHandle<()>,
    stop: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
}

/// Owns at most one live session handle per channel.
///
/// Replaces the original firmware's detached self-deleting tasks: every
/// worker is held by a handle the supervisor can query, stop, and join,
/// and a second `ReadFor` on a busy channel is rejected instead of racing
/// two workers on one aggregate.
pub struct SessionSupervisor {
    slots: [Mutex<Option<SessionHandle>>; Channel::COUNT],
}

impl SessionSupervisor {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| Mutex::new(None)),
        }
    }

    /// Spawn a session worker for `spec.channel`.
    ///
    /// Returns [`Error::Busy`] if a session is already running there; a
    /// finished-but-unreaped handle is joined and replaced.
    pub fn start(
        &self,
        spec: SessionSpec,
        feed: impl SamplingFeed + 'static,
        registry: Arc<CharacteristicRegistry>,
    ) -> Result<(), Error> {
        let mut slot = lock(&self.slots[spec.channel as usize]);

        if let Some(handle) = slot.as_ref() {
            if !handle.done.load(Ordering::Acquire) {
                return Err(Error::Busy(spec.channel));
            }
        }
        if let Some(handle) = slot.take() {
            // Finished worker: the flag is set as its last action, so the
            // join returns immediately.
            let _ = handle.thread.join();
        }

        let stop = Arc::new(AtomicBool::new(false));
        let done = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);
        let worker_done = Arc::clone(&done);

        let thread = task_pin::spawn_on_core(
            task_pin::Core::App,
            5,
            4,
            task_name(spec.channel),
            move || {
                run_session(spec, feed, &registry, &worker_stop);
                worker_done.store(true, Ordering::Release);
            },
        );

        *slot = Some(SessionHandle { thread, stop, done });
        Ok(())
    }

    /// Whether a session is currently running on `channel`.
    pub fn is_active(&self, channel: Channel) -> bool {
        lock(&self.slots[channel as usize])
            .as_ref()
            .is_some_and(|h| !h.done.load(Ordering::Acquire))
    }

    /// Request a cooperative stop; the worker exits at its next tick.
    pub fn stop(&self, channel: Channel) {
        if let Some(handle) = lock(&self.slots[channel as usize]).as_ref() {
            handle.stop.store(true, Ordering::Release);
        }
    }

    /// Block until `channel`'s session (if any) has finished, reaping the
    /// handle.
    pub fn join(&self, channel: Channel) {
        let handle = lock(&self.slots[channel as usize]).take();
        if let Some(handle) = handle {
            let _ = handle.thread.join();
        }
    }
}

impl Default for SessionSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Null-terminated FreeRTOS task name per channel.
fn task_name(channel: Channel) -> &'static str {
    match channel {
        Channel::Voltage => "smp-voltage\0",
        Channel::Current => "smp-current\0",
        Channel::Temperature => "smp-temp\0",
        Channel::Pwm => "smp-pwm\0",
        Channel::Relay => "smp-relay\0",
    }
}

/// The worker loop: one sample, one publish, repeat until the duration
/// elapses or a stop is requested.
///
/// A failed tick is logged and skipped — a momentary sensor hiccup must
/// not truncate the aggregate window.
fn run_session(
    spec: SessionSpec,
    mut feed: impl SamplingFeed,
    registry: &CharacteristicRegistry,
    stop: &AtomicBool,
) {
    let ticks = spec.ticks();
    info!(
        "{}: session started ({} ticks at {} ms)",
        spec.channel, ticks, spec.interval_ms
    );

    for tick in 0..ticks {
        if stop.load(Ordering::Acquire) {
            info!("{}: session stopped early", spec.channel);
            break;
        }

        match feed.next_payload() {
            Ok(payload) => registry.publish(spec.channel, payload.as_bytes()),
            Err(e) => warn!("{}: sample tick failed: {e}", spec.channel),
        }

        if tick + 1 < ticks {
            std::thread::sleep(core::time::Duration::from_millis(spec.interval_ms));
        }
    }

    feed.finish();
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
