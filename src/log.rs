//! The log record shape and the bounded SPSC queue that decouples the ISR
//! producer from a lower-priority consumer task, grounded in the rocket-TVC
//! reference repo's use of `heapless` for fixed-capacity embedded buffers (the
//! teacher firmware has no analogous bounded queue of its own).

use crate::mixer::MAX_ROTORS;
use heapless::spsc::Queue;

/// Snapshot of one tick, pushed to the log sink in phase 5 when logging is
/// enabled and the vehicle is armed.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub struct LogEntry {
    pub loop_index: u32,
    pub alt: f32,
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub v_batt: f32,
    pub u_thr: f32,
    pub u_roll: f32,
    pub u_pitch: f32,
    pub u_yaw: f32,
    pub u_x: f32,
    pub u_y: f32,
    pub mot: [f32; MAX_ROTORS],
    pub num_rotors: usize,
}

impl LogEntry {
    pub fn mot(&self) -> &[f32] {
        &self.mot[..self.num_rotors]
    }
}

/// Capacity of the bounded log queue. Sized generously above the expected
/// consumer latency at the default sample rate; the producer (the ISR) never
/// blocks when the queue is full — it drops the oldest-pending record's slot
/// by simply failing the push, which `FeedbackLoop` treats as a no-op.
pub const LOG_QUEUE_CAPACITY: usize = 64;

/// Fixed-capacity single-producer/single-consumer ring buffer of `LogEntry`.
/// The producer side lives in the ISR (phase 5 of `tick`); the consumer side
/// is drained by a lower-priority task into the concrete `LogSink`.
pub type LogQueue = Queue<LogEntry, LOG_QUEUE_CAPACITY>;
