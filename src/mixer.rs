//! Maps per-axis compensator outputs onto per-rotor ESC commands via a fixed
//! mixing matrix, and reports the exact feasible interval each axis has left to
//! use before some rotor would leave `[0, 1]`.

/// Upper bound on rotor count this core supports (`Settings::num_rotors` is
/// validated against this at `Bootstrap::build`).
pub const MAX_ROTORS: usize = 8;

/// Number of mixable axes: throttle, roll, pitch, yaw, and the two lateral axes.
pub const NUM_AXES: usize = 6;

/// A mixable control axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum Axis {
    Thr,
    Roll,
    Pitch,
    Yaw,
    X,
    Y,
}

impl Axis {
    const fn index(self) -> usize {
        match self {
            Axis::Thr => 0,
            Axis::Roll => 1,
            Axis::Pitch => 2,
            Axis::Yaw => 3,
            Axis::X => 4,
            Axis::Y => 5,
        }
    }
}

/// Fixed linear map from per-axis commands to per-rotor commands, determined by
/// airframe geometry. Set once at `Bootstrap::build` time and never mutated
/// after.
pub struct Mixer {
    /// `matrix[axis][rotor]`. Only the first `num_rotors` columns are meaningful.
    matrix: [[f32; MAX_ROTORS]; NUM_AXES],
    num_rotors: usize,
}

impl Mixer {
    /// Build a mixer over `num_rotors` rotors (`1..=MAX_ROTORS`) from a fixed
    /// mixing matrix. `num_rotors` is assumed already validated by the caller
    /// (`Bootstrap::build`).
    pub fn new(num_rotors: usize, matrix: [[f32; MAX_ROTORS]; NUM_AXES]) -> Self {
        Self { matrix, num_rotors }
    }

    /// A neutral quad-X mixer: throttle shares equally across all rotors, roll
    /// and pitch split front/back and left/right, yaw alternates by rotor
    /// rotation direction. Useful as a test fixture and as a sane default.
    pub fn neutral_quad_x() -> Self {
        let mut matrix = [[0.0; MAX_ROTORS]; NUM_AXES];
        // Rotor order: 0 = front-left, 1 = front-right, 2 = rear-right, 3 = rear-left.
        matrix[Axis::Thr.index()][0..4].copy_from_slice(&[0.25, 0.25, 0.25, 0.25]);
        matrix[Axis::Roll.index()][0..4].copy_from_slice(&[-0.5, 0.5, 0.5, -0.5]);
        matrix[Axis::Pitch.index()][0..4].copy_from_slice(&[0.5, 0.5, -0.5, -0.5]);
        matrix[Axis::Yaw.index()][0..4].copy_from_slice(&[-0.5, 0.5, -0.5, 0.5]);
        Self { matrix, num_rotors: 4 }
    }

    pub fn num_rotors(&self) -> usize {
        self.num_rotors
    }

    /// Adds `u * matrix[axis][rotor]` to each entry of `mot`.
    pub fn add_mixed_input(&self, u: f32, axis: Axis, mot: &mut [f32]) {
        let row = &self.matrix[axis.index()];
        for (rotor, slot) in mot.iter_mut().take(self.num_rotors).enumerate() {
            *slot += u * row[rotor];
        }
    }

    /// Returns `[min, max]` such that any `u` in that interval, passed through
    /// `add_mixed_input(u, axis, mot)`, keeps every rotor within `[0, 1]`. Exact:
    /// no slack heuristics.
    pub fn check_channel_saturation(&self, axis: Axis, mot: &[f32]) -> (f32, f32) {
        let row = &self.matrix[axis.index()];
        let mut min = f32::NEG_INFINITY;
        let mut max = f32::INFINITY;

        for (rotor, &m) in mot.iter().take(self.num_rotors).enumerate() {
            let c = row[rotor];
            if c == 0.0 {
                continue;
            }
            // m + u*c in [0, 1] => u in [(0-m)/c, (1-m)/c], flipped if c < 0.
            let lo = (0.0 - m) / c;
            let hi = (1.0 - m) / c;
            let (lo, hi) = if c > 0.0 { (lo, hi) } else { (hi, lo) };
            if lo > min {
                min = lo;
            }
            if hi < max {
                max = hi;
            }
        }

        (min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    #[test]
    fn add_mixed_input_distributes_equal_throttle_share() {
        let mixer = Mixer::neutral_quad_x();
        let mut mot = [0.0; 4];
        mixer.add_mixed_input(1.0, Axis::Thr, &mut mot);
        for m in mot {
            assert!((m - 0.25).abs() < EPS, "got {m}");
        }
    }

    #[test]
    fn check_channel_saturation_is_exact_at_zero() {
        let mixer = Mixer::neutral_quad_x();
        let mot = [0.0; 4];
        // Throttle coefficient is 0.25 on every rotor; headroom to 1.0 is 4.0 each way.
        let (min, max) = mixer.check_channel_saturation(Axis::Thr, &mot);
        assert!((min - (-4.0)).abs() < EPS, "min = {min}");
        assert!((max - 4.0).abs() < EPS, "max = {max}");
    }

    #[test]
    fn check_channel_saturation_shrinks_as_headroom_is_consumed() {
        let mixer = Mixer::neutral_quad_x();
        let mut mot = [0.0; 4];
        mixer.add_mixed_input(3.0, Axis::Thr, &mut mot); // each rotor now at 0.75
        let (min, max) = mixer.check_channel_saturation(Axis::Thr, &mot);
        assert!((min - (-3.0)).abs() < EPS, "min = {min}");
        assert!((max - 1.0).abs() < EPS, "max = {max}");
    }

    #[test]
    fn unmixed_axis_is_unconstrained() {
        let mixer = Mixer::neutral_quad_x();
        let mot = [0.5; 4];
        let (min, max) = mixer.check_channel_saturation(Axis::X, &mot);
        assert_eq!(min, f32::NEG_INFINITY);
        assert_eq!(max, f32::INFINITY);
    }

    #[test]
    fn feasible_interval_keeps_every_rotor_in_bounds() {
        let mixer = Mixer::neutral_quad_x();
        let mot = [0.2, 0.4, 0.6, 0.8];
        let (min, max) = mixer.check_channel_saturation(Axis::Roll, &mot);
        for u in [min, max, (min + max) / 2.0] {
            let mut probe = mot;
            mixer.add_mixed_input(u, Axis::Roll, &mut probe);
            for m in probe {
                assert!(m >= -EPS && m <= 1.0 + EPS, "m = {m} out of bounds for u = {u}");
            }
        }
    }
}
