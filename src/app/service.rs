//! Application service — the command dispatcher.
//!
//! [`AppService`] owns the session supervisor, the actuation controller
//! and the relay, and is the single consumer of the command queue.  Both
//! surfaces are normalized into [`CommandRequest`]s before they get here,
//! so dispatch is one exhaustive match over the closed `(Channel, Command)`
//! space — no function-pointer tables.
//!
//! ```text
//!  console ─┐                       ┌─▶ SessionSupervisor ─▶ registry
//!           ├─▶ queue ─▶ AppService ┼─▶ PwmController
//!  BLE ─────┘                       └─▶ RelayController
//! ```
//!
//! Rejections (`Busy`, invalid pairings, hardware failures) are absorbed
//! here with a diagnostic: neither surface has a structured error channel
//! back to the caller, so absence of output is the only failure signal.

use std::sync::Arc;

use log::{info, warn};

use super::channels::{self, CommandRequest, Origin};
use super::command::Command;
use super::parser;
use super::ports::{PwmOutput, RelayOutput, SampleSource, TemperatureProbe};
use crate::actuation::PwmController;
use crate::broker::{Channel, CharacteristicRegistry};
use crate::config::SystemConfig;
use crate::relay::RelayController;
use crate::sampling::{
    self, PairFeed, ScalarFeed, SessionSpec, SessionSupervisor,
};

/// Wire every channel's inbound-write handler into the registry.
///
/// Each handler parses on the transport's delivery context and only
/// enqueues — the blocking work happens on the main task.  Called once at
/// startup; duplicate wiring panics inside the registry.
pub fn register_wire_handlers(registry: &CharacteristicRegistry) {
    for idx in 0..Channel::COUNT {
        let channel = Channel::from_index(idx);
        registry.register(
            channel,
            Box::new(move |payload| {
                for command in parser::parse_wire(channel, payload) {
                    channels::submit(CommandRequest {
                        channel,
                        command,
                        origin: Origin::Ble,
                    });
                }
            }),
        );
    }
}

/// Unit string per scalar measurement channel, for log lines.
fn unit_of(channel: Channel) -> &'static str {
    match channel {
        Channel::Voltage => "mV",
        Channel::Current => "A",
        _ => "",
    }
}

pub struct AppService<P: PwmOutput, R: RelayOutput> {
    registry: Arc<CharacteristicRegistry>,
    supervisor: SessionSupervisor,
    pwm: PwmController<P>,
    relay: RelayController<R>,
    voltage: Arc<dyn SampleSource>,
    current: Arc<dyn SampleSource>,
    temperature: Arc<dyn TemperatureProbe>,
    config: SystemConfig,
}

impl<P: PwmOutput, R: RelayOutput> AppService<P, R> {
    pub fn new(
        registry: Arc<CharacteristicRegistry>,
        config: SystemConfig,
        pwm_out: P,
        relay_out: R,
        voltage: Arc<dyn SampleSource>,
        current: Arc<dyn SampleSource>,
        temperature: Arc<dyn TemperatureProbe>,
    ) -> Self {
        let pwm = PwmController::new(pwm_out, config.pwm_default_freq_hz);
        let relay = RelayController::new(relay_out);
        Self {
            registry,
            supervisor: SessionSupervisor::new(),
            pwm,
            relay,
            voltage,
            current,
            temperature,
            config,
        }
    }

    /// Drain and execute everything currently queued.
    pub fn poll(&mut self) {
        while let Some(request) = channels::try_next() {
            self.execute(request);
        }
    }

    /// Execute one normalized request.
    pub fn execute(&mut self, request: CommandRequest) {
        let CommandRequest {
            channel, command, ..
        } = request;

        match (channel, command) {
            // ── Synchronous aggregate reads ───────────────────
            (Channel::Voltage | Channel::Current, Command::ReadNow) => {
                self.read_scalar_now(channel);
            }
            (Channel::Temperature, Command::ReadNow) => match self.temperature.convert_and_read()
            {
                Ok(t) => {
                    let payload = sampling::format_pair(t.first, t.second);
                    self.registry.publish(channel, payload.as_bytes());
                    info!(
                        "temperature: first {:.2} C, second {:.2} C",
                        t.first, t.second
                    );
                }
                Err(e) => warn!("temperature: read failed: {e}"),
            },

            // ── Bounded-duration sessions ─────────────────────
            (
                Channel::Voltage | Channel::Current | Channel::Temperature,
                Command::ReadFor { duration_s },
            ) => self.start_session(channel, duration_s),

            // ── Timed actuation ───────────────────────────────
            (
                Channel::Pwm,
                Command::TriggerFor {
                    duration_s,
                    freq_hz,
                    duty_pct,
                },
            ) => {
                let ongoing = self.pwm.trigger_for(duration_s, freq_hz, duty_pct);
                info!("pwm: {}", if ongoing { "ongoing" } else { "errors occur" });
            }
            (Channel::Pwm, Command::Force) => self.pwm.force_stop(),
            (Channel::Pwm, Command::SetDuty { pct }) => {
                self.pwm.set_duty(pct);
            }
            (Channel::Pwm, Command::SetFreq { hz }) => {
                self.pwm.set_freq(hz);
            }

            // ── Relay ─────────────────────────────────────────
            (Channel::Relay, Command::SetState { on }) => {
                self.relay.set_state(on);
            }

            // ── Everything else is a surface bug ──────────────
            (channel, command) => {
                warn!("{channel}: command {command:?} not applicable, ignored");
            }
        }
    }

    /// Advance time-based state (the actuation deadline).  Call once per
    /// control loop iteration.
    pub fn tick(&mut self, elapsed_ms: u64) {
        self.pwm.tick(elapsed_ms);
    }

    // ── Queries (used by the console status path and tests) ──

    pub fn pwm_phase(&self) -> crate::actuation::Phase {
        self.pwm.phase()
    }

    pub fn relay_state(&self) -> bool {
        self.relay.last_state()
    }

    pub fn is_sampling(&self, channel: Channel) -> bool {
        self.supervisor.is_active(channel)
    }

    pub fn supervisor(&self) -> &SessionSupervisor {
        &self.supervisor
    }

    // ── Internal ──────────────────────────────────────────────

    fn scalar_source(&self, channel: Channel) -> Arc<dyn SampleSource> {
        match channel {
            Channel::Current => Arc::clone(&self.current),
            _ => Arc::clone(&self.voltage),
        }
    }

    fn read_scalar_now(&mut self, channel: Channel) {
        let source = self.scalar_source(channel);
        match sampling::read_now(
            source.as_ref(),
            self.config.read_now_samples,
            self.config.read_now_step_ms,
        ) {
            Ok(agg) => {
                let payload = sampling::format_measurement(agg.avg(), &agg);
                self.registry.publish(channel, payload.as_bytes());
                info!("{channel}: {:.2} {} (avg)", agg.avg(), unit_of(channel));
            }
            Err(e) => warn!("{channel}: read failed: {e}"),
        }
    }

    fn start_session(&mut self, channel: Channel, duration_s: u32) {
        let spec = SessionSpec {
            channel,
            duration_ms: u64::from(duration_s) * 1000,
            interval_ms: u64::from(self.config.session_interval_ms),
        };

        let result = match channel {
            Channel::Temperature => self.supervisor.start(
                spec,
                PairFeed::new(channel, Arc::clone(&self.temperature)),
                Arc::clone(&self.registry),
            ),
            _ => self.supervisor.start(
                spec,
                ScalarFeed::new(channel, unit_of(channel), self.scalar_source(channel)),
                Arc::clone(&self.registry),
            ),
        };

        if let Err(e) = result {
            warn!("{channel}: session rejected: {e}");
        }
    }
}
