#![cfg_attr(not(test), no_std)]
//! Flight feedback controller core.
//!
//! This crate holds the hard-real-time part of a small multirotor autopilot: state
//! estimation from an IMU sample, a bank of discrete compensators for throttle,
//! roll, pitch, and yaw (plus optional lateral axes), mixing into per-rotor
//! commands, and the arm/disarm and tipover safety gates around all of it.
//!
//! Everything here is pure and hardware-agnostic; the on-target wiring (RTIC
//! application, peripheral drivers) lives in `src/main.rs` behind the `board`
//! feature and is not required to build or test this crate.

pub mod arm;
pub mod bootstrap;
pub mod error;
pub mod feedback_loop;
pub mod filter;
pub mod log;
pub mod mixer;
pub mod settings;
pub mod state;
pub mod traits;
pub mod yaw;

pub use arm::{ArmState, ArmStateMachine};
pub use bootstrap::Bootstrap;
pub use error::{ArmError, ConfigError};
pub use feedback_loop::{Controller, FeedbackLoop, RunState};
pub use filter::DiscreteFilter;
pub use log::LogEntry;
pub use mixer::{Axis, Mixer, MAX_ROTORS, NUM_AXES};
pub use settings::{CompensatorSpec, Settings};
pub use state::{CoreState, Setpoint, TaitBryan};
pub use traits::{Annunciator, EscDriver, LedColor, LogSink, SettingsProvider};
pub use yaw::YawUnwrapper;

/// Idle ESC pulse: awake, not spinning. Sent whenever the craft is disarmed or the
/// system run state is paused.
pub const IDLE_PULSE: f32 = -0.1;
