//! Thin peripheral wrappers implementing the core's driver traits. This is
//! the only place in the workspace that talks to `hal` directly; everything
//! above the trait boundary is hardware-agnostic and lives in the library
//! crate. Attitude fusion, GNSS, and telemetry are out of scope here (see
//! `Non-goals`) — `BoardImu` reads whatever the sensor stack hands it and
//! does not compute it.

use hal::pac;
use kestrel_fc::log::LogEntry;
use kestrel_fc::state::TaitBryan;
use kestrel_fc::traits::{Annunciator, EscDriver, ImuSource, LedColor, LogSink};

/// Reads attitude and battery voltage off whatever sensor/fusion stack sits
/// below this core (out of scope for this crate; see `Non-goals`). Stubbed to
/// zero/nominal here until that stack is wired in.
pub struct BoardImu {
    v_batt_nominal: f32,
}

impl BoardImu {
    pub fn new(_dp: &pac::Peripherals) -> Self {
        Self { v_batt_nominal: 11.1 }
    }
}

impl ImuSource for BoardImu {
    fn tait_bryan(&mut self) -> TaitBryan {
        // TODO: wire to the attitude-fusion stack once it lands; out of
        // scope for this core (see Non-goals).
        TaitBryan::default()
    }

    fn v_batt(&mut self) -> f32 {
        self.v_batt_nominal
    }
}

/// Drives the four ESC channels over whatever PWM/DShot timer peripheral the
/// board variant uses.
pub struct BoardEsc {
    last: [f32; kestrel_fc::mixer::MAX_ROTORS],
}

impl BoardEsc {
    pub fn new(_dp: &pac::Peripherals) -> Self {
        Self { last: [0.0; kestrel_fc::mixer::MAX_ROTORS] }
    }
}

impl EscDriver for BoardEsc {
    fn send_esc_pulse_normalized(&mut self, channel: u8, value: f32) {
        self.last[(channel - 1) as usize] = value;
        // TODO: write `value` out over the motor timer/DShot peripheral.
    }
}

/// Arm/disarm/tipover status LEDs.
pub struct BoardLeds {
    red: bool,
    green: bool,
}

impl BoardLeds {
    pub fn new(_dp: &pac::Peripherals) -> Self {
        Self { red: true, green: false }
    }
}

impl Annunciator for BoardLeds {
    fn set_led(&mut self, color: LedColor, on: bool) {
        match color {
            LedColor::Red => self.red = on,
            LedColor::Green => self.green = on,
        }
        // TODO: drive the actual GPIO pin once board wiring is finalized.
    }
}

/// Reads the arm/disarm request line (RC aux channel or link command,
/// depending on board variant).
pub fn read_arm_switch() -> bool {
    false
}

/// No-op fallback sink, used only if a board build disables logging
/// entirely. The production path is `QueueLogSink` in `main.rs`.
pub struct NullLogSink;

impl LogSink for NullLogSink {
    fn push(&mut self, _entry: LogEntry) {}
    fn start(&mut self) {}
    fn stop(&mut self) {}
}
