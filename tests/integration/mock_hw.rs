//! Mock hardware for integration tests.
//!
//! Records every actuator call and scripts every sensor reading so tests
//! can assert on the full command history without touching real
//! peripherals.  The recording halves are `Arc`-shared: clone the handle
//! before moving the mock into the service.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use battmon::app::ports::{
    NotifyError, NotifySink, PwmOutput, RelayOutput, SampleSource, TempReading, TemperatureProbe,
};
use battmon::broker::Channel;
use battmon::config::SystemConfig;
use battmon::error::{ActuatorError, SensorError};

// ── PWM output ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmCall {
    Duty(u32),
    Freq(u32),
    Stop,
}

pub type PwmLog = Arc<Mutex<Vec<PwmCall>>>;

pub struct MockPwm {
    pub calls: PwmLog,
}

impl MockPwm {
    pub fn new() -> (Self, PwmLog) {
        let log = PwmLog::default();
        (
            Self {
                calls: Arc::clone(&log),
            },
            log,
        )
    }
}

impl PwmOutput for MockPwm {
    fn set_duty_pct(&mut self, pct: u32) -> Result<(), ActuatorError> {
        self.calls.lock().unwrap().push(PwmCall::Duty(pct));
        Ok(())
    }

    fn set_freq_hz(&mut self, hz: u32) -> Result<(), ActuatorError> {
        self.calls.lock().unwrap().push(PwmCall::Freq(hz));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ActuatorError> {
        self.calls.lock().unwrap().push(PwmCall::Stop);
        Ok(())
    }
}

// ── Relay output ─────────────────────────────────────────────

pub type RelayLog = Arc<Mutex<Vec<bool>>>;

pub struct MockRelay {
    pub writes: RelayLog,
}

impl MockRelay {
    pub fn new() -> (Self, RelayLog) {
        let log = RelayLog::default();
        (
            Self {
                writes: Arc::clone(&log),
            },
            log,
        )
    }
}

impl RelayOutput for MockRelay {
    fn write(&mut self, on: bool) -> Result<(), ActuatorError> {
        self.writes.lock().unwrap().push(on);
        Ok(())
    }
}

// ── Sample sources ───────────────────────────────────────────

/// Cycles through a scripted value sequence.
pub struct SeqSource {
    values: Vec<f32>,
    next: AtomicUsize,
}

impl SeqSource {
    pub fn new(values: &[f32]) -> Self {
        Self {
            values: values.to_vec(),
            next: AtomicUsize::new(0),
        }
    }
}

impl SampleSource for SeqSource {
    fn sample(&self) -> Result<f32, SensorError> {
        let i = self.next.fetch_add(1, Ordering::Relaxed);
        Ok(self.values[i % self.values.len()])
    }
}

pub struct FixedProbe {
    pub first: f32,
    pub second: f32,
}

impl TemperatureProbe for FixedProbe {
    fn convert_and_read(&self) -> Result<TempReading, SensorError> {
        Ok(TempReading {
            first: self.first,
            second: self.second,
        })
    }
}

// ── Notify sink ──────────────────────────────────────────────

pub type SinkLog = Arc<Mutex<Vec<(Channel, Vec<u8>)>>>;

pub struct RecordingSink {
    pub sent: SinkLog,
}

impl RecordingSink {
    pub fn new() -> (Self, SinkLog) {
        let log = SinkLog::default();
        (
            Self {
                sent: Arc::clone(&log),
            },
            log,
        )
    }
}

impl NotifySink for RecordingSink {
    fn notify(&self, channel: Channel, payload: &[u8]) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((channel, payload.to_vec()));
        Ok(())
    }
}

// ── Config ───────────────────────────────────────────────────

/// Test configuration: tiny cadences so sessions finish in milliseconds.
pub fn test_config() -> SystemConfig {
    SystemConfig {
        read_now_samples: 4,
        read_now_step_ms: 0,
        session_interval_ms: 5,
        ..SystemConfig::default()
    }
}
