//! Immutable-after-init configuration, loaded once through a `SettingsProvider`
//! at `Bootstrap::build` time. Mirrors the shape of the teacher firmware's
//! `UserCfg`, trimmed to what this core actually consumes.

use crate::mixer::{MAX_ROTORS, NUM_AXES};

/// Coefficients and initial gain for one `DiscreteFilter`. `b2`/`a2` are zero
/// for a first-order or pure-gain compensator.
#[derive(Debug, Clone, Copy)]
pub struct CompensatorSpec {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
    pub gain: f32,
}

impl CompensatorSpec {
    pub const fn new(b0: f32, b1: f32, b2: f32, a1: f32, a2: f32, gain: f32) -> Self {
        Self { b0, b1, b2, a1, a2, gain }
    }

    /// A pure proportional compensator: `y = gain * err`.
    pub const fn proportional(gain: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0, 0.0, gain)
    }
}

/// Validated, immutable configuration for one `Controller`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub num_rotors: u8,
    pub v_nominal: f32,
    pub enable_logging: bool,

    pub roll_controller: CompensatorSpec,
    pub pitch_controller: CompensatorSpec,
    pub yaw_controller: CompensatorSpec,
    #[cfg(feature = "altitude_hold")]
    pub altitude_controller: CompensatorSpec,

    pub mixing_matrix: [[f32; MAX_ROTORS]; NUM_AXES],

    pub soft_start_seconds: f32,
    pub tip_angle: f32,

    pub min_thrust_component: f32,
    pub max_thrust_component: f32,
    pub max_roll_component: f32,
    pub max_pitch_component: f32,
    pub max_yaw_component: f32,
    pub max_lateral_component: f32,

    #[cfg(feature = "altitude_hold")]
    pub alt_bound_u: f32,
    #[cfg(feature = "altitude_hold")]
    pub alt_bound_d: f32,

    pub sample_rate_hz: f32,
}
