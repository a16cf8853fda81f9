//! The ISR-invoked tick: state estimation, safety gates, the control march,
//! ESC output, and the optional log append. `Controller` bundles this with
//! the `ArmStateMachine` into the single owned context `Bootstrap` hands to
//! the board application — no global mutables, per the teacher firmware's own
//! module-level-state approach being the thing we are deliberately not
//! copying here.

use crate::arm::{ArmState, ArmStateMachine};
use crate::error::ArmError;
use crate::filter::DiscreteFilter;
use crate::log::LogEntry;
use crate::mixer::{Axis, Mixer};
use crate::settings::Settings;
use crate::state::{CoreState, Setpoint, TaitBryan};
use crate::traits::{Annunciator, EscDriver, ImuSource, LogSink};
use crate::yaw::YawUnwrapper;
use crate::IDLE_PULSE;
use num_traits::Float;

/// System-wide run state, supplied by the caller each tick. Distinct from
/// `ArmState`: a `RUNNING`/`ARMED` craft flies; a `PAUSED` craft is forced to
/// disarm regardless of pilot input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum RunState {
    Running,
    Paused,
}

/// State estimation, compensators, and mixing for one vehicle. Exclusively
/// owned by `Controller`.
pub struct FeedbackLoop {
    roll_filter: DiscreteFilter,
    pitch_filter: DiscreteFilter,
    yaw_filter: DiscreteFilter,
    #[cfg(feature = "altitude_hold")]
    altitude_filter: DiscreteFilter,
    mixer: Mixer,
    yaw_unwrapper: YawUnwrapper,
    core: CoreState,

    last_usr_thr: f32,
    last_alt_ctrl_en: bool,
    last_imu_yaw_raw: f32,
    loop_index: u32,

    dt: f32,
    v_nominal: f32,
    enable_logging: bool,
    tip_angle: f32,
    min_thrust_component: f32,
    max_thrust_component: f32,
    max_roll_component: f32,
    max_pitch_component: f32,
    max_yaw_component: f32,
    max_lateral_component: f32,
    #[cfg(feature = "altitude_hold")]
    alt_bound_u: f32,
    #[cfg(feature = "altitude_hold")]
    alt_bound_d: f32,
}

impl FeedbackLoop {
    pub fn new(settings: &Settings) -> Self {
        let dt = 1.0 / settings.sample_rate_hz;
        let num_rotors = settings.num_rotors as usize;
        Self {
            roll_filter: DiscreteFilter::new(settings.roll_controller, dt, settings.soft_start_seconds),
            pitch_filter: DiscreteFilter::new(settings.pitch_controller, dt, settings.soft_start_seconds),
            yaw_filter: DiscreteFilter::new(settings.yaw_controller, dt, settings.soft_start_seconds),
            #[cfg(feature = "altitude_hold")]
            altitude_filter: DiscreteFilter::new(
                settings.altitude_controller,
                dt,
                settings.soft_start_seconds,
            ),
            mixer: Mixer::new(num_rotors, settings.mixing_matrix),
            yaw_unwrapper: YawUnwrapper::new(),
            core: CoreState::new(num_rotors, settings.v_nominal),
            last_usr_thr: 0.0,
            last_alt_ctrl_en: false,
            last_imu_yaw_raw: 0.0,
            loop_index: 0,
            dt,
            v_nominal: settings.v_nominal,
            enable_logging: settings.enable_logging,
            tip_angle: settings.tip_angle,
            min_thrust_component: settings.min_thrust_component,
            max_thrust_component: settings.max_thrust_component,
            max_roll_component: settings.max_roll_component,
            max_pitch_component: settings.max_pitch_component,
            max_yaw_component: settings.max_yaw_component,
            max_lateral_component: settings.max_lateral_component,
            #[cfg(feature = "altitude_hold")]
            alt_bound_u: settings.alt_bound_u,
            #[cfg(feature = "altitude_hold")]
            alt_bound_d: settings.alt_bound_d,
        }
    }

    pub fn core(&self) -> &CoreState {
        &self.core
    }

    pub fn loop_index(&self) -> u32 {
        self.loop_index
    }

    /// Resets all compensators and re-anchors the yaw unwrapper against the
    /// most recently observed raw IMU sample. Invoked by `Controller::arm`.
    pub fn zero_out(&mut self) {
        self.roll_filter.reset();
        self.pitch_filter.reset();
        self.yaw_filter.reset();
        #[cfg(feature = "altitude_hold")]
        self.altitude_filter.reset();
        self.yaw_unwrapper.reset(self.last_imu_yaw_raw);
        self.last_alt_ctrl_en = false;
    }

    fn idle_motors(&mut self, esc: &mut impl EscDriver) {
        for i in 0..self.mixer.num_rotors() {
            self.core.motors[i] = IDLE_PULSE;
            esc.send_esc_pulse_normalized((i + 1) as u8, IDLE_PULSE);
        }
    }

    /// Runs the throttle / direct-throttle branch, writing `mot[THR]`. Returns
    /// the computed `u[THR]` command so the caller can log it directly.
    fn run_throttle(&mut self, sp: &mut Setpoint, mot: &mut [f32]) -> f32 {
        let cos_tilt = self.core.roll.cos() * self.core.pitch.cos();

        #[cfg(feature = "altitude_hold")]
        if sp.en_alt_ctrl {
            if !self.last_alt_ctrl_en {
                sp.altitude = self.core.alt;
                self.altitude_filter.reset();
                self.altitude_filter.prefill(self.last_usr_thr);
            }
            sp.altitude += sp.altitude_rate * self.dt;
            sp.altitude = sp
                .altitude
                .clamp(self.core.alt - self.alt_bound_d, self.core.alt + self.alt_bound_u);
            self.altitude_filter
                .set_gain(self.altitude_filter.gain_orig() * self.v_nominal / self.core.v_batt);
            let tmp = self.altitude_filter.march(sp.altitude - self.core.alt);
            let u_thr = (tmp / cos_tilt).clamp(self.min_thrust_component, self.max_thrust_component);
            self.mixer.add_mixed_input(u_thr, Axis::Thr, mot);
            self.last_alt_ctrl_en = true;
            return u_thr;
        }

        let tmp = sp.z_throttle / cos_tilt;
        let u_thr = tmp.clamp(-self.max_thrust_component, -self.min_thrust_component);
        self.mixer.add_mixed_input(u_thr, Axis::Thr, mot);
        self.last_usr_thr = sp.z_throttle;
        self.last_alt_ctrl_en = false;
        u_thr
    }

    fn run_axis(&mut self, axis: Axis, error: f32, max_component: f32, mot: &mut [f32]) -> f32 {
        let (min, max) = self.mixer.check_channel_saturation(axis, mot);
        let min = min.max(-max_component);
        let max = max.min(max_component);

        let filter = match axis {
            Axis::Roll => &mut self.roll_filter,
            Axis::Pitch => &mut self.pitch_filter,
            Axis::Yaw => &mut self.yaw_filter,
            _ => unreachable!("run_axis only handles roll/pitch/yaw"),
        };
        filter.enable_saturation(min, max);
        filter.set_gain(filter.gain_orig() * self.v_nominal / self.core.v_batt);
        let u = filter.march(error);
        self.mixer.add_mixed_input(u, axis, mot);
        u
    }

    /// Phases 1-5 of one tick. `armed` reflects `ArmStateMachine::get` as
    /// observed at tick start; safety-driven disarm requests are reported back
    /// via the return value rather than mutated directly, keeping arm-state
    /// ownership in `ArmStateMachine`.
    #[allow(clippy::too_many_arguments)]
    fn tick(
        &mut self,
        tait_bryan: TaitBryan,
        v_batt: f32,
        sp: &mut Setpoint,
        armed: bool,
        run_state: RunState,
        esc: &mut impl EscDriver,
        log_sink: &mut impl LogSink,
    ) -> TickResult {
        // Phase 1: state estimation.
        self.last_imu_yaw_raw = tait_bryan.z;
        self.core.roll = tait_bryan.y;
        self.core.pitch = tait_bryan.x;
        self.core.yaw = self.yaw_unwrapper.update(tait_bryan.z);
        self.core.v_batt = v_batt;
        // Altitude estimation: pass-through (no estimator in this core).

        // Phase 2: safety gates.
        if run_state == RunState::Paused && armed {
            self.idle_motors(esc);
            return TickResult::ForceDisarm;
        }
        if self.core.roll.abs() > self.tip_angle || self.core.pitch.abs() > self.tip_angle {
            self.idle_motors(esc);
            return TickResult::Tipover;
        }
        if run_state != RunState::Running || !armed {
            self.idle_motors(esc);
            return TickResult::Idle;
        }

        // Phase 3: control march.
        let mut mot = [0.0_f32; crate::mixer::MAX_ROTORS];
        let mot = &mut mot[..self.mixer.num_rotors()];

        let u_thr = self.run_throttle(sp, mot);

        let (u_roll, u_pitch, u_yaw) = if sp.en_rpy_ctrl {
            let roll_err = sp.roll - self.core.roll;
            let pitch_err = sp.pitch - self.core.pitch;
            sp.yaw += self.dt * sp.yaw_rate;
            let yaw_err = sp.yaw - self.core.yaw;

            let u_roll = self.run_axis(Axis::Roll, roll_err, self.max_roll_component, mot);
            let u_pitch = self.run_axis(Axis::Pitch, pitch_err, self.max_pitch_component, mot);
            let u_yaw = self.run_axis(Axis::Yaw, yaw_err, self.max_yaw_component, mot);
            (u_roll, u_pitch, u_yaw)
        } else {
            (0.0, 0.0, 0.0)
        };

        let (u_x, u_y) = if sp.en_6dof {
            let (min, max) = self.mixer.check_channel_saturation(Axis::Y, mot);
            let u_y = sp
                .y_throttle
                .clamp(min.max(-self.max_lateral_component), max.min(self.max_lateral_component));
            self.mixer.add_mixed_input(u_y, Axis::Y, mot);

            let (min, max) = self.mixer.check_channel_saturation(Axis::X, mot);
            let u_x = sp
                .x_throttle
                .clamp(min.max(-self.max_lateral_component), max.min(self.max_lateral_component));
            self.mixer.add_mixed_input(u_x, Axis::X, mot);
            (u_x, u_y)
        } else {
            (0.0, 0.0)
        };

        // Phase 4: output.
        for (i, m) in mot.iter().enumerate() {
            let clamped = m.clamp(0.0, 1.0);
            self.core.motors[i] = clamped;
            esc.send_esc_pulse_normalized((i + 1) as u8, clamped);
        }

        // Phase 5: log.
        if self.enable_logging {
            let mut mot_arr = [0.0_f32; crate::mixer::MAX_ROTORS];
            mot_arr[..mot.len()].copy_from_slice(mot);
            log_sink.push(LogEntry {
                loop_index: self.loop_index,
                alt: self.core.alt,
                roll: self.core.roll,
                pitch: self.core.pitch,
                yaw: self.core.yaw,
                v_batt: self.core.v_batt,
                u_thr,
                u_roll,
                u_pitch,
                u_yaw,
                u_x,
                u_y,
                mot: mot_arr,
                num_rotors: mot.len(),
            });
            self.loop_index += 1;
        }

        TickResult::Ok
    }
}

/// Outcome of one `FeedbackLoop::tick` call, used by `Controller::tick` to
/// decide whether to force a disarm through `ArmStateMachine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickResult {
    Ok,
    Idle,
    Tipover,
    ForceDisarm,
}

/// The single owned context handed to the board application: `FeedbackLoop` +
/// `ArmStateMachine`. Constructed exactly once, by `Bootstrap::build`.
pub struct Controller {
    feedback_loop: FeedbackLoop,
    arm_state_machine: ArmStateMachine,
}

impl Controller {
    pub(crate) fn new(feedback_loop: FeedbackLoop, arm_state_machine: ArmStateMachine) -> Self {
        Self { feedback_loop, arm_state_machine }
    }

    pub fn arm_state(&self) -> ArmState {
        self.arm_state_machine.get()
    }

    pub fn core(&self) -> &CoreState {
        self.feedback_loop.core()
    }

    pub fn loop_index(&self) -> u32 {
        self.feedback_loop.loop_index()
    }

    /// Arms the vehicle: starts the log, zeros compensators and the yaw
    /// unwrapper, sets annunciators. No-op (with a non-fatal error) if already
    /// armed.
    pub fn arm<A: Annunciator, L: LogSink>(
        &mut self,
        annunciator: &mut A,
        log_sink: &mut L,
    ) -> Result<(), ArmError> {
        self.arm_state_machine.arm(annunciator, log_sink)?;
        self.feedback_loop.zero_out();
        Ok(())
    }

    /// Disarms the vehicle. Does not itself command motors — the next tick's
    /// safety gate does that, avoiding a race with an in-flight tick.
    pub fn disarm<A: Annunciator, L: LogSink>(&mut self, annunciator: &mut A, log_sink: &mut L) {
        self.arm_state_machine.disarm(annunciator, log_sink);
    }

    /// Runs one full tick: reads the IMU, runs the feedback loop, and applies
    /// any safety-driven disarm the tick reports back.
    pub fn tick<I, E, A, L>(
        &mut self,
        imu: &mut I,
        sp: &mut Setpoint,
        esc: &mut E,
        annunciator: &mut A,
        log_sink: &mut L,
        run_state: RunState,
    ) where
        I: ImuSource,
        E: EscDriver,
        A: Annunciator,
        L: LogSink,
    {
        let tait_bryan = imu.tait_bryan();
        let v_batt = imu.v_batt();
        let armed = self.arm_state_machine.is_armed();

        let result = self
            .feedback_loop
            .tick(tait_bryan, v_batt, sp, armed, run_state, esc, log_sink);

        match result {
            TickResult::Tipover | TickResult::ForceDisarm if armed => {
                self.arm_state_machine.disarm(annunciator, log_sink);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::Bootstrap;
    use crate::settings::CompensatorSpec;
    use crate::traits::SettingsProvider;
    use crate::mixer::{MAX_ROTORS, NUM_AXES};

    const DT_S: f32 = 0.005;
    const V_NOM: f32 = 11.1;

    fn neutral_quad_matrix() -> [[f32; MAX_ROTORS]; NUM_AXES] {
        let mut m = [[0.0; MAX_ROTORS]; NUM_AXES];
        m[Axis::Thr as usize][0..4].copy_from_slice(&[0.25, 0.25, 0.25, 0.25]);
        m[Axis::Roll as usize][0..4].copy_from_slice(&[-0.5, 0.5, 0.5, -0.5]);
        m[Axis::Pitch as usize][0..4].copy_from_slice(&[0.5, 0.5, -0.5, -0.5]);
        m[Axis::Yaw as usize][0..4].copy_from_slice(&[-0.5, 0.5, -0.5, 0.5]);
        m
    }

    struct FixedSettings(Settings);
    impl SettingsProvider for FixedSettings {
        fn settings(&self) -> Settings {
            self.0.clone()
        }
    }

    fn default_settings() -> Settings {
        Settings {
            num_rotors: 4,
            v_nominal: V_NOM,
            enable_logging: true,
            roll_controller: CompensatorSpec::proportional(0.2),
            pitch_controller: CompensatorSpec::proportional(0.2),
            yaw_controller: CompensatorSpec::proportional(0.1),
            #[cfg(feature = "altitude_hold")]
            altitude_controller: CompensatorSpec::proportional(0.3),
            mixing_matrix: neutral_quad_matrix(),
            soft_start_seconds: 0.0,
            tip_angle: 60.0_f32.to_radians(),
            min_thrust_component: 0.1,
            max_thrust_component: 0.9,
            max_roll_component: 0.3,
            max_pitch_component: 0.3,
            max_yaw_component: 0.2,
            max_lateral_component: 0.2,
            #[cfg(feature = "altitude_hold")]
            alt_bound_u: 2.0,
            #[cfg(feature = "altitude_hold")]
            alt_bound_d: 2.0,
            sample_rate_hz: 1.0 / DT_S,
        }
    }

    struct FakeImu {
        tb: TaitBryan,
        v_batt: f32,
    }
    impl ImuSource for FakeImu {
        fn tait_bryan(&mut self) -> TaitBryan {
            self.tb
        }
        fn v_batt(&mut self) -> f32 {
            self.v_batt
        }
    }

    #[derive(Default)]
    struct FakeEsc {
        last: [f32; MAX_ROTORS],
    }
    impl EscDriver for FakeEsc {
        fn send_esc_pulse_normalized(&mut self, channel: u8, value: f32) {
            self.last[(channel - 1) as usize] = value;
        }
    }

    #[derive(Default)]
    struct FakeAnnunciator {
        red: bool,
        green: bool,
    }
    impl Annunciator for FakeAnnunciator {
        fn set_led(&mut self, color: crate::traits::LedColor, on: bool) {
            match color {
                crate::traits::LedColor::Red => self.red = on,
                crate::traits::LedColor::Green => self.green = on,
            }
        }
    }

    #[derive(Default)]
    struct FakeLogSink {
        entries: heapless::Vec<LogEntry, 256>,
    }
    impl LogSink for FakeLogSink {
        fn push(&mut self, entry: LogEntry) {
            let _ = self.entries.push(entry);
        }
        fn start(&mut self) {}
        fn stop(&mut self) {}
    }

    fn build_controller() -> Controller {
        let provider = FixedSettings(default_settings());
        Bootstrap::build(&provider).expect("valid settings")
    }

    fn armed_controller() -> (Controller, FakeAnnunciator, FakeLogSink) {
        let mut controller = build_controller();
        let mut led = FakeAnnunciator::default();
        let mut log = FakeLogSink::default();
        controller.arm(&mut led, &mut log).unwrap();
        (controller, led, log)
    }

    #[test]
    fn s1_idle_while_disarmed_sends_idle_pulse() {
        let mut controller = build_controller();
        let mut led = FakeAnnunciator::default();
        let mut log = FakeLogSink::default();
        let mut imu = FakeImu { tb: TaitBryan::default(), v_batt: V_NOM };
        let mut esc = FakeEsc::default();
        let mut sp = Setpoint::default();

        controller.tick(&mut imu, &mut sp, &mut esc, &mut led, &mut log, RunState::Running);

        for v in &esc.last[..default_settings().num_rotors as usize] {
            assert!((v - crate::IDLE_PULSE).abs() < 1e-6);
        }
        assert_eq!(log.entries.len(), 0);
    }

    #[test]
    fn s2_tipover_forces_disarm_and_idles_motors() {
        let (mut controller, mut led, mut log) = armed_controller();
        let mut imu = FakeImu {
            tb: TaitBryan { x: 0.0, y: controller_tip_angle() + 0.01, z: 0.0 },
            v_batt: V_NOM,
        };
        let mut esc = FakeEsc::default();
        let mut sp = Setpoint { en_rpy_ctrl: true, ..Default::default() };

        controller.tick(&mut imu, &mut sp, &mut esc, &mut led, &mut log, RunState::Running);

        assert_eq!(controller.arm_state(), ArmState::Disarmed);
        for v in &esc.last[..default_settings().num_rotors as usize] {
            assert!((v - crate::IDLE_PULSE).abs() < 1e-6);
        }
        assert!(led.red && !led.green);
    }

    fn controller_tip_angle() -> f32 {
        default_settings().tip_angle
    }

    #[test]
    fn s4_direct_throttle_tilt_compensation() {
        // Flat: u[THR] = z_throttle exactly (cos(0) == 1, clamp is a no-op
        // since -0.5 is already within [-0.9, -0.1]).
        let (mut controller, mut led, mut log) = armed_controller();
        let mut esc = FakeEsc::default();
        let mut sp = Setpoint { z_throttle: -0.5, en_rpy_ctrl: false, ..Default::default() };
        let mut imu = FakeImu { tb: TaitBryan::default(), v_batt: V_NOM };
        controller.tick(&mut imu, &mut sp, &mut esc, &mut led, &mut log, RunState::Running);
        let flat_u_thr = log.entries.last().unwrap().u_thr;
        assert!((flat_u_thr - (-0.5)).abs() < 1e-4, "got {flat_u_thr}");

        // Tilted: tmp = -0.5 / cos(0.3), then clamped to [-max, -min] thrust
        // component.
        let mut sp2 = Setpoint { z_throttle: -0.5, roll: 0.0, en_rpy_ctrl: false, ..Default::default() };
        let mut imu2 = FakeImu { tb: TaitBryan { x: 0.0, y: 0.3, z: 0.0 }, v_batt: V_NOM };
        controller.tick(&mut imu2, &mut sp2, &mut esc, &mut led, &mut log, RunState::Running);
        let tilted_u_thr = log.entries.last().unwrap().u_thr;
        let expected_tmp = (-0.5_f32 / 0.3_f32.cos()).clamp(-0.9, -0.1);
        assert!((tilted_u_thr - expected_tmp).abs() < 1e-4, "got {tilted_u_thr}");
    }

    #[test]
    fn s5_battery_sag_doubles_gain() {
        let mut controller = build_controller();
        let mut led = FakeAnnunciator::default();
        let mut log = FakeLogSink::default();
        controller.arm(&mut led, &mut log).unwrap();
        let mut esc = FakeEsc::default();
        let mut sp = Setpoint { en_rpy_ctrl: true, ..Default::default() };
        let mut imu = FakeImu { tb: TaitBryan::default(), v_batt: V_NOM / 2.0 };

        controller.tick(&mut imu, &mut sp, &mut esc, &mut led, &mut log, RunState::Running);

        assert!((controller.feedback_loop.roll_filter.gain()
            - 2.0 * controller.feedback_loop.roll_filter.gain_orig())
        .abs()
            < 1e-4);
    }

    #[test]
    fn arm_disarm_arm_restores_zeroed_state() {
        let mut controller = build_controller();
        let mut led = FakeAnnunciator::default();
        let mut log = FakeLogSink::default();
        let mut esc = FakeEsc::default();
        let mut sp = Setpoint { en_rpy_ctrl: true, roll: 0.2, ..Default::default() };
        let mut imu = FakeImu { tb: TaitBryan::default(), v_batt: V_NOM };

        controller.arm(&mut led, &mut log).unwrap();
        controller.tick(&mut imu, &mut sp, &mut esc, &mut led, &mut log, RunState::Running);
        controller.disarm(&mut led, &mut log);
        controller.arm(&mut led, &mut log).unwrap();

        assert_eq!(controller.feedback_loop.yaw_unwrapper.num_spins(), 0);
    }
}
