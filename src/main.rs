#![no_main]
#![no_std]
//! On-target firmware entry point. Thin RTIC application: it owns hardware
//! peripherals and exactly one `Controller`, and does nothing with flight
//! logic beyond calling `Controller::tick` from the IMU-ready interrupt and
//! `Controller::arm`/`disarm` from the link-status interrupt. All flight
//! logic lives in the library crate so it can be unit-tested on the host.

use cfg_if::cfg_if;
use cortex_m::asm;
use defmt::println;
use defmt_rtt as _;
use panic_probe as _;

use hal::{clocks::Clocks, pac};

use kestrel_fc::{
    ArmState, Bootstrap, CompensatorSpec, Controller, RunState, Settings,
};
use kestrel_fc::traits::{LogSink, SettingsProvider};
use kestrel_fc::state::Setpoint;
use kestrel_fc::log::{LogEntry, LogQueue};
use kestrel_fc::mixer::{Axis, MAX_ROTORS, NUM_AXES};

mod board;

use board::{BoardEsc, BoardImu, BoardLeds};

cfg_if! {
    if #[cfg(feature = "h7")] {
        const SAMPLE_RATE_HZ: f32 = 8_192.0;
    } else {
        const SAMPLE_RATE_HZ: f32 = 8_000.0;
    }
}

/// `Settings` baked into the firmware image. A future revision can source
/// this from on-board flash through the same `SettingsProvider` contract;
/// until then, this is the one approved-for-flight tune.
struct FirmwareSettings;

impl SettingsProvider for FirmwareSettings {
    fn settings(&self) -> Settings {
        let mut mixing_matrix = [[0.0_f32; MAX_ROTORS]; NUM_AXES];
        mixing_matrix[Axis::Thr as usize][0..4].copy_from_slice(&[0.25, 0.25, 0.25, 0.25]);
        mixing_matrix[Axis::Roll as usize][0..4].copy_from_slice(&[-0.5, 0.5, 0.5, -0.5]);
        mixing_matrix[Axis::Pitch as usize][0..4].copy_from_slice(&[0.5, 0.5, -0.5, -0.5]);
        mixing_matrix[Axis::Yaw as usize][0..4].copy_from_slice(&[-0.5, 0.5, -0.5, 0.5]);

        Settings {
            num_rotors: 4,
            v_nominal: 11.1,
            enable_logging: true,
            roll_controller: CompensatorSpec::proportional(0.17),
            pitch_controller: CompensatorSpec::proportional(0.17),
            yaw_controller: CompensatorSpec::proportional(0.1),
            #[cfg(feature = "altitude_hold")]
            altitude_controller: CompensatorSpec::proportional(0.3),
            mixing_matrix,
            soft_start_seconds: 0.5,
            tip_angle: 60.0_f32.to_radians(),
            min_thrust_component: 0.03,
            max_thrust_component: 0.95,
            max_roll_component: 0.3,
            max_pitch_component: 0.3,
            max_yaw_component: 0.2,
            max_lateral_component: 0.2,
            #[cfg(feature = "altitude_hold")]
            alt_bound_u: 2.0,
            #[cfg(feature = "altitude_hold")]
            alt_bound_d: 2.0,
            sample_rate_hz: SAMPLE_RATE_HZ,
        }
    }
}

/// Sink side of the log queue: a software task drains this and forwards to
/// wherever recorded flights are persisted (flash, USB, telemetry link — none
/// of which are in scope here; see `Non-goals`). For now it just counts.
struct QueueLogSink<'a> {
    producer: &'a mut heapless::spsc::Producer<'static, LogEntry, { kestrel_fc::log::LOG_QUEUE_CAPACITY }>,
    enabled: &'a mut bool,
}

impl<'a> LogSink for QueueLogSink<'a> {
    fn push(&mut self, entry: LogEntry) {
        if *self.enabled {
            let _ = self.producer.enqueue(entry);
        }
    }
    fn start(&mut self) {
        *self.enabled = true;
    }
    fn stop(&mut self) {
        *self.enabled = false;
    }
}

#[rtic::app(device = pac, peripherals = false, dispatchers = [EXTI9_5])]
mod app {
    use super::*;

    // `controller`, `leds`, and the log-queue producer are touched by both the
    // IMU tick and the link/arm-status handler, so they live under `#[shared]`
    // and are locked for the duration of each (non-blocking) access, per the
    // teacher firmware's own `(cx.shared.a, cx.shared.b).lock(...)` pattern.
    #[shared]
    struct Shared {
        setpoint: Setpoint,
        run_state: RunState,
        controller: Controller,
        leds: BoardLeds,
        log_producer: heapless::spsc::Producer<'static, LogEntry, { kestrel_fc::log::LOG_QUEUE_CAPACITY }>,
        log_enabled: bool,
    }

    #[local]
    struct Local {
        imu: BoardImu,
        esc: BoardEsc,
        arm_signals_received: u8,
        disarm_signals_received: u8,
        imu_isr_loop_i: u32,
    }

    #[init]
    fn init(cx: init::Context) -> (Shared, Local, init::Monotonics) {
        static mut LOG_QUEUE: LogQueue = LogQueue::new();

        let mut cp = cx.core;
        let dp = pac::Peripherals::take().unwrap();

        cp.SCB.enable_icache();

        let clock_cfg = Clocks::default();
        clock_cfg.setup().unwrap();

        let (log_producer, _log_consumer) = unsafe { LOG_QUEUE.split() };

        let controller = Bootstrap::build(&FirmwareSettings)
            .expect("flight settings failed validation; refusing to arm");

        println!("kestrel-fc init complete");

        (
            Shared {
                setpoint: Setpoint::default(),
                run_state: RunState::Running,
                controller,
                leds: BoardLeds::new(&dp),
                log_producer,
                log_enabled: false,
            },
            Local {
                imu: BoardImu::new(&dp),
                esc: BoardEsc::new(&dp),
                arm_signals_received: 0,
                disarm_signals_received: 0,
                imu_isr_loop_i: 0,
            },
            init::Monotonics(),
        )
    }

    /// Runs once per IMU sample. This is the only context that enters
    /// `Controller::tick` — the single-ISR-context rule the tick's phases
    /// depend on.
    #[task(binds = DMA1_CH2, shared = [setpoint, run_state, controller, leds, log_producer, log_enabled], local = [imu, esc, imu_isr_loop_i], priority = 4)]
    fn imu_tc_isr(cx: imu_tc_isr::Context) {
        *cx.local.imu_isr_loop_i += 1;

        (
            cx.shared.setpoint,
            cx.shared.run_state,
            cx.shared.controller,
            cx.shared.leds,
            cx.shared.log_producer,
            cx.shared.log_enabled,
        )
            .lock(|sp, run_state, controller, leds, log_producer, log_enabled| {
                let mut log_sink = QueueLogSink { producer: log_producer, enabled: log_enabled };
                controller.tick(cx.local.imu, sp, cx.local.esc, leds, &mut log_sink, *run_state);
            });
    }

    /// Debounced arm/disarm request from the link/RC handler. Mirrors the
    /// teacher firmware's `handle_arm_status` debounce: a request must repeat
    /// for `ARM_DISARM_SIGNALS_REQUIRED` consecutive reads before it takes
    /// effect, so a single noisy stick movement can't arm or disarm the
    /// vehicle.
    #[task(binds = EXTI4, shared = [controller, leds, log_producer, log_enabled], local = [arm_signals_received, disarm_signals_received], priority = 2)]
    fn link_status_isr(cx: link_status_isr::Context) {
        const ARM_DISARM_SIGNALS_REQUIRED: u8 = 3;

        let arm_requested = board::read_arm_switch();

        (
            cx.shared.controller,
            cx.shared.leds,
            cx.shared.log_producer,
            cx.shared.log_enabled,
        )
            .lock(|controller, leds, log_producer, log_enabled| {
                let mut log_sink = QueueLogSink { producer: log_producer, enabled: log_enabled };

                if arm_requested {
                    *cx.local.disarm_signals_received = 0;
                    *cx.local.arm_signals_received = cx.local.arm_signals_received.saturating_add(1);
                    if *cx.local.arm_signals_received >= ARM_DISARM_SIGNALS_REQUIRED
                        && controller.arm_state() == ArmState::Disarmed
                        && controller.arm(leds, &mut log_sink).is_err()
                    {
                        println!("arm request ignored: already armed");
                    }
                } else {
                    *cx.local.arm_signals_received = 0;
                    *cx.local.disarm_signals_received = cx.local.disarm_signals_received.saturating_add(1);
                    if *cx.local.disarm_signals_received >= ARM_DISARM_SIGNALS_REQUIRED
                        && controller.arm_state() == ArmState::Armed
                    {
                        controller.disarm(leds, &mut log_sink);
                    }
                }
            });
    }

    #[idle]
    fn idle(_cx: idle::Context) -> ! {
        loop {
            asm::wfi();
        }
    }
}
