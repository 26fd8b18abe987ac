//! Timed PWM actuation state machine.
//!
//! ```text
//!            TriggerFor(duration, freq, duty)
//!   ┌──────┐ ─────────────────────────────────▶ ┌────────┐
//!   │ Idle │                                    │ Active │──┐ SetDuty /
//!   └──────┘ ◀───────────────────────────────── └────────┘◀─┘ SetFreq
//!            deadline elapsed │ Force(stop)
//! ```
//!
//! The deadline is an owned value, not a detached timer: exactly one can
//! be live per controller, it is taken and dropped on every stop, and a
//! re-trigger while `Active` performs a full stop first
//! (stop-then-retrigger).  Expiry is cooperative — the main loop calls
//! [`PwmController::tick`] with the elapsed time and the controller counts
//! its own deadline down, so nothing ever fires on a stale timer.
//!
//! Hardware apply failures are reported synchronously and never leave the
//! controller `Active` over a dead output.

use log::{info, warn};

use crate::app::ports::PwmOutput;

/// Actuation phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Active,
}

/// Remaining lifetime of the current activation, in milliseconds.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    remaining_ms: u64,
}

/// The PWM output controller.  Single-writer: only the owner mutates
/// phase and deadline; both command surfaces reach it through the
/// dispatcher's queue.
pub struct PwmController<P: PwmOutput> {
    out: P,
    phase: Phase,
    duty_pct: u32,
    freq_hz: u32,
    deadline: Option<Deadline>,
}

impl<P: PwmOutput> PwmController<P> {
    pub fn new(out: P, default_freq_hz: u32) -> Self {
        Self {
            out,
            phase: Phase::Idle,
            duty_pct: 0,
            freq_hz: default_freq_hz,
            deadline: None,
        }
    }

    /// Start a timed activation.
    ///
    /// If already `Active`, the running output is stopped and its deadline
    /// cancelled before the new parameters are applied.  Returns `false`
    /// (and stays `Idle`) if any hardware apply fails.
    pub fn trigger_for(&mut self, duration_s: u32, freq_hz: u32, duty_pct: u32) -> bool {
        if self.phase == Phase::Active {
            info!("pwm: retrigger while active, stopping previous run");
            self.stop_output();
        }

        if self.out.set_freq_hz(freq_hz).is_err() {
            warn!("pwm: frequency apply failed, staying idle");
            return false;
        }
        let duty_pct = clamp_duty(duty_pct);
        if self.out.set_duty_pct(duty_pct).is_err() {
            warn!("pwm: duty apply failed, stopping output");
            self.stop_output();
            return false;
        }

        self.freq_hz = freq_hz;
        self.duty_pct = duty_pct;
        self.deadline = Some(Deadline {
            remaining_ms: u64::from(duration_s) * 1000,
        });
        self.phase = Phase::Active;
        info!("pwm: active for {duration_s}s ({freq_hz} Hz, {duty_pct}%)");
        true
    }

    /// Advance the deadline by `elapsed_ms`.  Call once per control tick.
    pub fn tick(&mut self, elapsed_ms: u64) {
        if self.phase != Phase::Active {
            return;
        }
        let Some(deadline) = self.deadline.as_mut() else {
            // Active without a deadline cannot happen through the public
            // API; recover to idle rather than run forever.
            debug_assert!(false, "active phase without deadline");
            self.stop_output();
            return;
        };

        deadline.remaining_ms = deadline.remaining_ms.saturating_sub(elapsed_ms);
        if deadline.remaining_ms == 0 {
            info!("pwm: duration elapsed, output stopped");
            self.stop_output();
        }
    }

    /// Immediate stop.  `Idle` is a no-op; `Active` stops the output and
    /// releases the deadline.
    pub fn force_stop(&mut self) {
        match self.phase {
            Phase::Idle => {}
            Phase::Active => {
                info!("pwm: forced stop");
                self.stop_output();
            }
        }
    }

    /// Live duty update; the running deadline is untouched.
    pub fn set_duty(&mut self, pct: u32) -> bool {
        let pct = clamp_duty(pct);
        if self.out.set_duty_pct(pct).is_err() {
            warn!("pwm: duty update failed");
            return false;
        }
        self.duty_pct = pct;
        true
    }

    /// Live frequency update; the running deadline is untouched.
    pub fn set_freq(&mut self, hz: u32) -> bool {
        if self.out.set_freq_hz(hz).is_err() {
            warn!("pwm: frequency update failed");
            return false;
        }
        self.freq_hz = hz;
        true
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn duty_pct(&self) -> u32 {
        self.duty_pct
    }

    pub fn freq_hz(&self) -> u32 {
        self.freq_hz
    }

    /// Milliseconds left on the current activation (0 when idle).
    pub fn remaining_ms(&self) -> u64 {
        self.deadline.map_or(0, |d| d.remaining_ms)
    }

    /// Stop the hardware output and drop the deadline — the single place
    /// both are released together.
    fn stop_output(&mut self) {
        if self.out.stop().is_err() {
            warn!("pwm: hardware stop failed, output may still be driving");
        }
        self.deadline = None;
        self.duty_pct = 0;
        self.phase = Phase::Idle;
    }
}

/// Duty cycles above 100 % are readjusted, matching the board's historical
/// behavior.
fn clamp_duty(pct: u32) -> u32 {
    if pct > 100 {
        warn!("pwm: duty {pct}% out of range, readjusted to 100%");
        100
    } else {
        pct
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
