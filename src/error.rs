//! No-heap error enums for the core's three fallible boundaries: config load,
//! arm request, and filter prefill. Mirrors how the teacher firmware's own enums
//! (`ArmStatus`, `AltType`) are defined — plain `Copy` types, no `thiserror`.

use crate::mixer::Axis;

/// Failure loading or validating `Settings` at `Bootstrap::build`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum ConfigError {
    /// `num_rotors == 0`.
    ZeroRotors,
    /// `num_rotors > MAX_ROTORS`.
    TooManyRotors(u8),
    /// No compensator spec was supplied for this axis.
    MissingCompensatorSpec(Axis),
}

/// Failure requesting a state transition from `ArmStateMachine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum ArmError {
    /// `arm()` was called while already `ARMED`. Non-fatal: the state machine did
    /// not change state.
    AlreadyArmed,
}
