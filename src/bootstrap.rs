//! One-shot wiring: validates `Settings` from a `SettingsProvider` and builds
//! the single owned `Controller` the board application hands to its IMU
//! interrupt handler. No global mutables — the pattern this module replaces
//! is "register a function pointer as the IMU ISR"; here the ISR closes over
//! a `Controller` value instead.

use crate::arm::ArmStateMachine;
use crate::error::ConfigError;
use crate::feedback_loop::{Controller, FeedbackLoop};
use crate::mixer::{Axis, MAX_ROTORS};
use crate::settings::CompensatorSpec;
use crate::traits::SettingsProvider;

/// A spec with zero gain is inert: it can never produce a nonzero output no
/// matter the error, which means no compensator was actually configured for
/// that axis. Caught here rather than left to silently fly with a dead loop.
fn is_missing(spec: &CompensatorSpec) -> bool {
    spec.gain == 0.0
}

pub struct Bootstrap;

impl Bootstrap {
    /// Validates the provider's settings and constructs a `Controller`.
    /// Fails closed: a misconfigured board refuses to arm rather than
    /// panicking at boot.
    pub fn build<P: SettingsProvider>(provider: &P) -> Result<Controller, ConfigError> {
        let settings = provider.settings();

        if settings.num_rotors == 0 {
            return Err(ConfigError::ZeroRotors);
        }
        if settings.num_rotors as usize > MAX_ROTORS {
            return Err(ConfigError::TooManyRotors(settings.num_rotors));
        }
        if is_missing(&settings.roll_controller) {
            return Err(ConfigError::MissingCompensatorSpec(Axis::Roll));
        }
        if is_missing(&settings.pitch_controller) {
            return Err(ConfigError::MissingCompensatorSpec(Axis::Pitch));
        }
        if is_missing(&settings.yaw_controller) {
            return Err(ConfigError::MissingCompensatorSpec(Axis::Yaw));
        }

        let feedback_loop = FeedbackLoop::new(&settings);
        let arm_state_machine = ArmStateMachine::new(settings.enable_logging);

        Ok(Controller::new(feedback_loop, arm_state_machine))
    }
}
