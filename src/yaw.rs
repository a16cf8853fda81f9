//! Converts the IMU's wrapped heading (`(-pi, pi]`) into a continuous angle by
//! counting ±2π crossings, and flips sign for the NED convention.

use core::f32::consts::PI;

const TAU: f32 = 2.0 * PI;

/// Tracks the running spin count and the last published continuous yaw.
#[derive(Debug, Clone, Copy)]
pub struct YawUnwrapper {
    num_spins: i32,
    last_yaw: f32,
}

impl Default for YawUnwrapper {
    fn default() -> Self {
        Self::new()
    }
}

impl YawUnwrapper {
    pub fn new() -> Self {
        Self { num_spins: 0, last_yaw: 0.0 }
    }

    pub fn num_spins(&self) -> i32 {
        self.num_spins
    }

    pub fn last_yaw(&self) -> f32 {
        self.last_yaw
    }

    /// `imu_yaw_raw` is the raw heading in `(-pi, pi]`. Returns the continuous,
    /// NED-sign-flipped yaw.
    pub fn update(&mut self, imu_yaw_raw: f32) -> f32 {
        let tmp = -imu_yaw_raw + self.num_spins as f32 * TAU;
        let delta = tmp - self.last_yaw;
        if delta < -PI {
            self.num_spins += 1;
        } else if delta > PI {
            self.num_spins -= 1;
        }
        let yaw = -imu_yaw_raw + self.num_spins as f32 * TAU;
        self.last_yaw = yaw;
        yaw
    }

    /// Reset at arm: the pilot's yaw setpoint is relative to current heading,
    /// so the unwrapper re-anchors against the most recent raw IMU sample
    /// rather than zeroing outright.
    pub fn reset(&mut self, imu_yaw_raw: f32) {
        self.num_spins = 0;
        self.last_yaw = -imu_yaw_raw;
    }
}
