//! Relay control — a stateless binary actuator.
//!
//! No state machine here: one GPIO write per command, with a last-known
//! state mirror kept only for the log line.  The relay earns its place in
//! the channel table by sharing the registry/parser contract, not by any
//! internal complexity.

use log::{info, warn};

use crate::app::ports::RelayOutput;

pub struct RelayController<R: RelayOutput> {
    out: R,
    last_state: bool,
}

impl<R: RelayOutput> RelayController<R> {
    /// The relay is driven off at construction so the board never boots
    /// with the load engaged.
    pub fn new(out: R) -> Self {
        let mut ctl = Self {
            out,
            last_state: false,
        };
        ctl.set_state(false);
        ctl
    }

    /// Drive the coil.  Returns `false` on a hardware failure; the mirror
    /// keeps the previous value in that case.
    pub fn set_state(&mut self, on: bool) -> bool {
        if let Err(e) = self.out.write(on) {
            warn!("relay: pin write failed: {e}");
            return false;
        }
        self.last_state = on;
        info!("relay: {}", if on { "on" } else { "off" });
        true
    }

    /// Last successfully applied state.
    pub fn last_state(&self) -> bool {
        self.last_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ActuatorError;

    struct MockRelay {
        writes: Vec<bool>,
        fail: bool,
    }

    impl RelayOutput for MockRelay {
        fn write(&mut self, on: bool) -> Result<(), ActuatorError> {
            if self.fail {
                return Err(ActuatorError::GpioWriteFailed);
            }
            self.writes.push(on);
            Ok(())
        }
    }

    #[test]
    fn starts_driven_off() {
        let ctl = RelayController::new(MockRelay {
            writes: Vec::new(),
            fail: false,
        });
        assert_eq!(ctl.out.writes, vec![false]);
        assert!(!ctl.last_state());
    }

    #[test]
    fn set_state_mirrors_success() {
        let mut ctl = RelayController::new(MockRelay {
            writes: Vec::new(),
            fail: false,
        });
        assert!(ctl.set_state(true));
        assert!(ctl.last_state());
        assert!(ctl.set_state(false));
        assert!(!ctl.last_state());
        assert_eq!(ctl.out.writes, vec![false, true, false]);
    }

    #[test]
    fn failed_write_keeps_previous_mirror() {
        let mut ctl = RelayController::new(MockRelay {
            writes: Vec::new(),
            fail: false,
        });
        ctl.set_state(true);
        ctl.out.fail = true;
        assert!(!ctl.set_state(false));
        assert!(ctl.last_state(), "mirror must not flip on a failed write");
    }
}
