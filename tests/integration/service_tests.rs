//! End-to-end dispatcher tests against mock hardware.
//!
//! Each test builds a full `AppService` with recording actuators and
//! scripted sensors, executes normalized requests (or drives the real
//! wire path through the registry), and asserts on the observable
//! hardware call history and notification stream.

use std::sync::Arc;

use battmon::actuation::Phase;
use battmon::app::channels::{CommandRequest, Origin};
use battmon::app::command::Command;
use battmon::app::service::{register_wire_handlers, AppService};
use battmon::broker::{Channel, CharacteristicRegistry};

use crate::mock_hw::{
    test_config, FixedProbe, MockPwm, MockRelay, PwmCall, PwmLog, RecordingSink, RelayLog,
    SeqSource, SinkLog,
};

struct Harness {
    service: AppService<MockPwm, MockRelay>,
    registry: Arc<CharacteristicRegistry>,
    pwm_log: PwmLog,
    relay_log: RelayLog,
    sink_log: SinkLog,
}

fn build(voltage: &[f32], current: &[f32]) -> Harness {
    let registry = Arc::new(CharacteristicRegistry::new());
    let (sink, sink_log) = RecordingSink::new();
    registry.set_notify_sink(Box::new(sink));

    let (pwm, pwm_log) = MockPwm::new();
    let (relay, relay_log) = MockRelay::new();

    let service = AppService::new(
        Arc::clone(&registry),
        test_config(),
        pwm,
        relay,
        Arc::new(SeqSource::new(voltage)),
        Arc::new(SeqSource::new(current)),
        Arc::new(FixedProbe {
            first: 21.5,
            second: 22.0,
        }),
    );

    Harness {
        service,
        registry,
        pwm_log,
        relay_log,
        sink_log,
    }
}

fn request(channel: Channel, command: Command) -> CommandRequest {
    CommandRequest {
        channel,
        command,
        origin: Origin::Ble,
    }
}

#[test]
fn relay_commands_drive_the_gpio() {
    let mut h = build(&[1.0], &[1.0]);

    h.service
        .execute(request(Channel::Relay, Command::SetState { on: true }));
    h.service
        .execute(request(Channel::Relay, Command::SetState { on: false }));

    // First write is the boot-time off.
    assert_eq!(*h.relay_log.lock().unwrap(), vec![false, true, false]);
    assert!(!h.service.relay_state());
}

#[test]
fn read_now_publishes_the_aggregate() {
    let mut h = build(&[1.0, 2.0, 3.0, 4.0], &[0.0]);

    h.service
        .execute(request(Channel::Voltage, Command::ReadNow));

    let snap = h.registry.read_snapshot(Channel::Voltage);
    assert_eq!(core::str::from_utf8(&snap).unwrap(), "2.50,4.00,1.00,2.50");

    let sent = h.sink_log.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, Channel::Voltage);
    assert_eq!(sent[0].1, b"2.50,4.00,1.00,2.50");
}

#[test]
fn temperature_read_now_publishes_the_pair() {
    let mut h = build(&[0.0], &[0.0]);

    h.service
        .execute(request(Channel::Temperature, Command::ReadNow));

    let snap = h.registry.read_snapshot(Channel::Temperature);
    assert_eq!(core::str::from_utf8(&snap).unwrap(), "21.50,22.00");
}

/// The full wireless path for `"1,5,1000,75"` (force flag + trigger):
/// characteristic write → registry dispatch → parse → queue → dispatcher,
/// then Idle → Active → Idle across five simulated seconds.
#[test]
fn pwm_wire_write_runs_idle_active_idle() {
    let mut h = build(&[0.0], &[0.0]);
    register_wire_handlers(&h.registry);

    h.registry.dispatch_write(Channel::Pwm, b"1,5,1000,75");
    h.service.poll();

    assert_eq!(h.service.pwm_phase(), Phase::Active);
    assert_eq!(
        *h.pwm_log.lock().unwrap(),
        vec![PwmCall::Freq(1000), PwmCall::Duty(75)]
    );

    for _ in 0..4 {
        h.service.tick(1000);
        assert_eq!(h.service.pwm_phase(), Phase::Active);
    }
    h.service.tick(1000);
    assert_eq!(h.service.pwm_phase(), Phase::Idle);
    assert_eq!(h.pwm_log.lock().unwrap().last(), Some(&PwmCall::Stop));
}

#[test]
fn pwm_force_while_idle_touches_no_hardware() {
    let mut h = build(&[0.0], &[0.0]);

    h.service.execute(request(Channel::Pwm, Command::Force));

    assert_eq!(h.service.pwm_phase(), Phase::Idle);
    assert!(h.pwm_log.lock().unwrap().is_empty());
}

#[test]
fn pwm_updates_apply_without_touching_deadline() {
    let mut h = build(&[0.0], &[0.0]);

    h.service.execute(request(
        Channel::Pwm,
        Command::TriggerFor {
            duration_s: 10,
            freq_hz: 1000,
            duty_pct: 20,
        },
    ));
    h.service.tick(4000);
    h.service
        .execute(request(Channel::Pwm, Command::SetFreq { hz: 2000 }));
    h.service
        .execute(request(Channel::Pwm, Command::SetDuty { pct: 60 }));

    // Still active: live updates must not rearm or cancel the deadline.
    h.service.tick(5000);
    assert_eq!(h.service.pwm_phase(), Phase::Active);
    h.service.tick(1000);
    assert_eq!(h.service.pwm_phase(), Phase::Idle);
}

#[test]
fn second_session_is_rejected_and_first_completes_intact() {
    let mut h = build(&[5.0], &[0.0]);

    h.service.execute(request(
        Channel::Voltage,
        Command::ReadFor { duration_s: 1 },
    ));
    assert!(h.service.is_sampling(Channel::Voltage));

    // Rejected: no second worker starts.
    h.service.execute(request(
        Channel::Voltage,
        Command::ReadFor { duration_s: 1 },
    ));

    h.service.supervisor().join(Channel::Voltage);
    assert!(!h.service.is_sampling(Channel::Voltage));

    // 1 s at the 5 ms test interval: exactly 200 publishes.  A second
    // concurrent session would have doubled this.
    let count = h
        .sink_log
        .lock()
        .unwrap()
        .iter()
        .filter(|(ch, _)| *ch == Channel::Voltage)
        .count();
    assert_eq!(count, 200);
}

#[test]
fn mismatched_command_is_absorbed() {
    let mut h = build(&[0.0], &[0.0]);

    h.service
        .execute(request(Channel::Voltage, Command::SetState { on: true }));
    h.service
        .execute(request(Channel::Relay, Command::ReadNow));

    // Nothing actuated beyond the boot-time relay off.
    assert_eq!(*h.relay_log.lock().unwrap(), vec![false]);
    assert!(h.pwm_log.lock().unwrap().is_empty());
}
