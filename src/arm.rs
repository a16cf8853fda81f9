//! Armed/disarmed transitions, annunciator effects, and log start/stop.
//! Motor commands themselves are never touched here — the ISR does that on
//! its next tick, avoiding a race between an arm/disarm request and the
//! in-flight tick.

use crate::error::ArmError;
use crate::traits::{Annunciator, LedColor, LogSink};

/// `{ARMED, DISARMED}`. Initial: `DISARMED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum ArmState {
    Disarmed,
    Armed,
}

/// Owns the current `ArmState` and drives the annunciator/log-sink side
/// effects of a transition. Flight-control side effects of arming (resetting
/// compensators, re-anchoring the yaw unwrapper) are the caller's
/// responsibility — see `Controller::arm` in `feedback_loop`, which calls
/// `FeedbackLoop::zero_out` around this state machine's `arm`.
#[derive(Debug, Clone, Copy)]
pub struct ArmStateMachine {
    state: ArmState,
    logging_enabled: bool,
}

impl ArmStateMachine {
    pub fn new(logging_enabled: bool) -> Self {
        Self { state: ArmState::Disarmed, logging_enabled }
    }

    pub fn get(&self) -> ArmState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        self.state == ArmState::Armed
    }

    /// If already `ARMED`, reports `ArmError::AlreadyArmed` and does not
    /// change state. Otherwise starts the log manager (if enabled), sets
    /// annunciators (red off, green on), and transitions to `ARMED`.
    pub fn arm<A: Annunciator, L: LogSink>(
        &mut self,
        annunciator: &mut A,
        log_sink: &mut L,
    ) -> Result<(), ArmError> {
        if self.state == ArmState::Armed {
            return Err(ArmError::AlreadyArmed);
        }
        if self.logging_enabled {
            log_sink.start();
        }
        annunciator.set_led(LedColor::Red, false);
        annunciator.set_led(LedColor::Green, true);
        self.state = ArmState::Armed;
        Ok(())
    }

    /// Stops the log manager and sets annunciators (red on, green off).
    /// A no-op state-wise if already disarmed, but the annunciator/log side
    /// effects still run — matching the teacher firmware's idempotent
    /// disarm path.
    pub fn disarm<A: Annunciator, L: LogSink>(&mut self, annunciator: &mut A, log_sink: &mut L) {
        if self.logging_enabled {
            log_sink.stop();
        }
        annunciator.set_led(LedColor::Red, true);
        annunciator.set_led(LedColor::Green, false);
        self.state = ArmState::Disarmed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::LogEntry;

    #[derive(Default)]
    struct FakeAnnunciator {
        red: bool,
        green: bool,
    }
    impl Annunciator for FakeAnnunciator {
        fn set_led(&mut self, color: LedColor, on: bool) {
            match color {
                LedColor::Red => self.red = on,
                LedColor::Green => self.green = on,
            }
        }
    }

    #[derive(Default)]
    struct FakeLogSink {
        running: bool,
        starts: u32,
        stops: u32,
    }
    impl LogSink for FakeLogSink {
        fn push(&mut self, _entry: LogEntry) {}
        fn start(&mut self) {
            self.running = true;
            self.starts += 1;
        }
        fn stop(&mut self) {
            self.running = false;
            self.stops += 1;
        }
    }

    #[test]
    fn initial_state_is_disarmed() {
        let sm = ArmStateMachine::new(true);
        assert_eq!(sm.get(), ArmState::Disarmed);
    }

    #[test]
    fn arm_starts_log_and_sets_leds() {
        let mut sm = ArmStateMachine::new(true);
        let mut led = FakeAnnunciator::default();
        let mut log = FakeLogSink::default();
        sm.arm(&mut led, &mut log).unwrap();
        assert_eq!(sm.get(), ArmState::Armed);
        assert!(led.green && !led.red);
        assert!(log.running);
    }

    #[test]
    fn arming_twice_is_a_no_op_with_warning() {
        let mut sm = ArmStateMachine::new(true);
        let mut led = FakeAnnunciator::default();
        let mut log = FakeLogSink::default();
        sm.arm(&mut led, &mut log).unwrap();
        let result = sm.arm(&mut led, &mut log);
        assert_eq!(result, Err(ArmError::AlreadyArmed));
        assert_eq!(sm.get(), ArmState::Armed);
        assert_eq!(log.starts, 1);
    }

    #[test]
    fn disarm_when_already_disarmed_is_idempotent() {
        let mut sm = ArmStateMachine::new(true);
        let mut led = FakeAnnunciator::default();
        let mut log = FakeLogSink::default();
        sm.disarm(&mut led, &mut log);
        assert_eq!(sm.get(), ArmState::Disarmed);
        sm.disarm(&mut led, &mut log);
        assert_eq!(sm.get(), ArmState::Disarmed);
    }

    #[test]
    fn arm_disarm_arm_cycle_restores_armed_state() {
        let mut sm = ArmStateMachine::new(true);
        let mut led = FakeAnnunciator::default();
        let mut log = FakeLogSink::default();
        sm.arm(&mut led, &mut log).unwrap();
        sm.disarm(&mut led, &mut log);
        sm.arm(&mut led, &mut log).unwrap();
        assert_eq!(sm.get(), ArmState::Armed);
        assert_eq!(log.starts, 2);
        assert_eq!(log.stops, 1);
    }
}
