//! Scalar discrete compensator: a direct-form-II-transposed second-order
//! section (the same realization the rocket-TVC reference repo's
//! `BiquadFilter` uses for its gyro/accel filters) wrapped in the
//! gain/soft-start/clamp bookkeeping the teacher firmware's `PidState` carries.
//! A first-order or pure-gain compensator is the special case `b2 = a2 = 0`.

use crate::settings::CompensatorSpec;

/// One SISO compensator instance. Three of these (roll, pitch, yaw) are owned
/// exclusively by `FeedbackLoop`; a fourth exists under `altitude_hold`.
#[derive(Debug, Clone, Copy)]
pub struct DiscreteFilter {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1: f32,
    z2: f32,
    gain: f32,
    gain_orig: f32,
    dt: f32,
    soft_start_seconds: f32,
    t_since_enable: f32,
    clamp: Option<(f32, f32)>,
}

impl DiscreteFilter {
    /// `dt` is the fixed tick period; `soft_start_seconds` is the ramp time
    /// re-armed on every `reset`.
    pub fn new(spec: CompensatorSpec, dt: f32, soft_start_seconds: f32) -> Self {
        Self {
            b0: spec.b0,
            b1: spec.b1,
            b2: spec.b2,
            a1: spec.a1,
            a2: spec.a2,
            z1: 0.0,
            z2: 0.0,
            gain: spec.gain,
            gain_orig: spec.gain,
            dt,
            soft_start_seconds,
            t_since_enable: 0.0,
            clamp: None,
        }
    }

    /// Immutable reference gain set at construction / by `Bootstrap`. Gain
    /// scheduling rescales `gain`; this value never changes.
    pub fn gain_orig(&self) -> f32 {
        self.gain_orig
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Rescale the working gain, e.g. `gain_orig * v_nominal / v_batt`.
    pub fn set_gain(&mut self, g: f32) {
        self.gain = g;
    }

    /// Record the clamp window for subsequent `march` calls. Anti-windup: when
    /// the output clamps, the delay line is updated from the clamped value,
    /// not the raw one, so the integrator never winds up past what the mixer
    /// can use.
    pub fn enable_saturation(&mut self, min: f32, max: f32) {
        self.clamp = Some((min, max));
    }

    pub fn disable_saturation(&mut self) {
        self.clamp = None;
    }

    fn soft_start_factor(&self) -> f32 {
        if self.soft_start_seconds <= 0.0 {
            1.0
        } else {
            (self.t_since_enable / self.soft_start_seconds).min(1.0)
        }
    }

    fn effective_gain(&self) -> f32 {
        self.gain * self.soft_start_factor()
    }

    /// Apply one sample. Soft-start scales the effective gain; anti-windup
    /// clamps the output and back-computes the delay-line update so the state
    /// reflects what was actually sent out, not the pre-clamp value.
    pub fn march(&mut self, err: f32) -> f32 {
        self.t_since_enable = (self.t_since_enable + self.dt).min(self.soft_start_seconds);
        let g = self.effective_gain();

        let y_canon = self.b0 * err + self.z1;
        let y = g * y_canon;

        let y_out = match self.clamp {
            Some((min, max)) => y.clamp(min, max),
            None => y,
        };

        let y_canon_used = if y_out == y || g == 0.0 {
            y_canon
        } else {
            y_out / g
        };

        self.z1 = self.b1 * err + self.z2 - self.a1 * y_canon_used;
        self.z2 = self.b2 * err - self.a2 * y_canon_used;

        y_out
    }

    /// Zero the delay line and re-arm soft-start.
    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
        self.t_since_enable = 0.0;
    }

    /// Set the delay line so the next `march(0.0)` returns `y0`: bumpless
    /// handover from an externally imposed value. Fails (falls back to
    /// `z1 = 0`) only when the current effective gain is exactly zero, since
    /// no finite `z1` can produce a nonzero output through a zero gain.
    /// Returns `true` on an exact prefill, `false` on the degraded fallback.
    pub fn prefill(&mut self, y0: f32) -> bool {
        let g = self.effective_gain();
        if g == 0.0 {
            self.z1 = 0.0;
            self.z2 = 0.0;
            return false;
        }
        self.z1 = y0 / g;
        self.z2 = 0.0;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;
    const DT: f32 = 0.005;

    fn unity_gain_filter() -> DiscreteFilter {
        DiscreteFilter::new(CompensatorSpec::proportional(1.0), DT, 0.0)
    }

    #[test]
    fn pure_gain_march_scales_input() {
        let mut f = unity_gain_filter();
        f.set_gain(2.0);
        assert!((f.march(0.5) - 1.0).abs() < EPS);
    }

    #[test]
    fn reset_zeroes_delay_line() {
        let mut f = DiscreteFilter::new(CompensatorSpec::new(1.0, 0.5, 0.0, -0.2, 0.0, 1.0), DT, 0.0);
        f.march(1.0);
        f.march(1.0);
        f.reset();
        // With zeroed delay line, next output depends only on b0 * err.
        assert!((f.march(0.0) - 0.0).abs() < EPS);
    }

    #[test]
    fn prefill_then_zero_input_is_bumpless() {
        let mut f = unity_gain_filter();
        assert!(f.prefill(0.42));
        assert!((f.march(0.0) - 0.42).abs() < EPS);
    }

    #[test]
    fn prefill_fails_gracefully_at_zero_gain() {
        let mut f = unity_gain_filter();
        f.set_gain(0.0);
        assert!(!f.prefill(0.42));
        assert!((f.march(0.0) - 0.0).abs() < EPS);
    }

    #[test]
    fn anti_windup_clamps_output_and_state() {
        // A discrete accumulator (y[n] = y[n-1] + x[n]): b0=1, a1=-1, so
        // back-computation actually matters — a pure-gain filter has no
        // memory for windup to accumulate in.
        let mut f = DiscreteFilter::new(CompensatorSpec::new(1.0, 0.0, 0.0, -1.0, 0.0, 1.0), DT, 0.0);
        f.enable_saturation(-1.0, 1.0);
        let y = f.march(5.0);
        assert!((y - 1.0).abs() < EPS);
        // Delay line reflects the clamped output, so the next tick doesn't
        // carry forward windup from the unclamped 5.0.
        let y2 = f.march(0.0);
        assert!((y2 - 1.0).abs() < EPS);
    }

    #[test]
    fn soft_start_ramps_effective_gain_to_full_over_window() {
        let mut f = DiscreteFilter::new(CompensatorSpec::proportional(1.0), DT, 0.01);
        let y0 = f.march(1.0);
        assert!(y0 < 1.0, "expected ramped-down output, got {y0}");
        // After soft_start_seconds / dt = 2 ticks the ramp reaches 1.0.
        f.march(1.0);
        let y2 = f.march(1.0);
        assert!((y2 - 1.0).abs() < EPS, "got {y2}");
    }

    #[test]
    fn gain_equals_gain_orig_at_nominal_voltage() {
        let f = unity_gain_filter();
        assert!((f.gain() - f.gain_orig()).abs() < EPS);
    }
}
