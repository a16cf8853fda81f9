//! Contracts for the external collaborators named in §6: everything the core
//! depends on but does not itself implement. All driver-facing methods are
//! infallible (`()` return) by design — a transient hardware fault must not
//! unwind through the ISR tick; an implementation that can fail internally is
//! responsible for swallowing and logging that failure itself.

use crate::settings::Settings;
use crate::state::{Setpoint, TaitBryan};

/// Supplies one attitude sample per tick. The IMU interrupt handler in the
/// board application calls this to obtain the sample that drives `tick`.
pub trait ImuSource {
    fn tait_bryan(&mut self) -> TaitBryan;
    /// Battery voltage, volts. Read alongside the attitude sample so gain
    /// scheduling always sees a value from the same instant as the tick.
    fn v_batt(&mut self) -> f32;
}

/// Supplies the pilot/autonomy target. The feedback loop is allowed to write
/// back `yaw` and (under `altitude_hold`) `altitude`; implementations must
/// tolerate that.
pub trait SetpointSource {
    fn setpoint(&mut self) -> &mut Setpoint;
}

/// Loads configuration once, at `Bootstrap::build` time.
pub trait SettingsProvider {
    fn settings(&self) -> Settings;
}

/// Drives one ESC channel.
pub trait EscDriver {
    /// `channel` is 1-indexed, `1..=num_rotors`. `value` is normalized,
    /// `[-1, 1]`; `-0.1` commands idle-awake.
    fn send_esc_pulse_normalized(&mut self, channel: u8, value: f32);
}

/// Annunciator LED color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum LedColor {
    Red,
    Green,
}

/// Drives the arm/disarm/tipover status indicators.
pub trait Annunciator {
    fn set_led(&mut self, color: LedColor, on: bool);
}

/// Consumes `LogEntry` records. Implementations must not block the ISR;
/// the board application wires this to a bounded queue (`crate::log`).
pub trait LogSink {
    fn push(&mut self, entry: crate::log::LogEntry);
    fn start(&mut self);
    fn stop(&mut self);
}
