//! Simulated positional servo.

use parking_lot::Mutex;
use slider_common::hal::driver::{HalError, ServoOutput};

#[derive(Debug, Default)]
struct ServoLog {
    attach_count: u32,
    pulse_range: Option<(u32, u32)>,
    attached: bool,
    angles: Vec<u8>,
}

/// Shared handle to the simulated servo. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct SimulatedServo {
    log: std::sync::Arc<Mutex<ServoLog>>,
}

impl SimulatedServo {
    /// New detached servo.
    pub fn new() -> Self {
        Self::default()
    }

    /// PWM output driving this servo.
    pub fn output(&self) -> SimulatedServoOutput {
        SimulatedServoOutput { servo: self.clone() }
    }

    /// Last written angle.
    pub fn angle(&self) -> Option<u8> {
        self.log.lock().angles.last().copied()
    }

    /// Every angle written so far.
    pub fn angles(&self) -> Vec<u8> {
        self.log.lock().angles.clone()
    }

    /// Number of `attach` calls.
    pub fn attach_count(&self) -> u32 {
        self.log.lock().attach_count
    }

    /// PWM signal active.
    pub fn is_attached(&self) -> bool {
        self.log.lock().attached
    }

    /// Pulse range of the last attach.
    pub fn pulse_range(&self) -> Option<(u32, u32)> {
        self.log.lock().pulse_range
    }
}

/// PWM output of the simulated servo.
#[derive(Debug)]
pub struct SimulatedServoOutput {
    servo: SimulatedServo,
}

impl ServoOutput for SimulatedServoOutput {
    fn attach(&mut self, min_pulse_us: u32, max_pulse_us: u32) -> Result<(), HalError> {
        let mut log = self.servo.log.lock();
        log.attach_count += 1;
        log.pulse_range = Some((min_pulse_us, max_pulse_us));
        log.attached = true;
        Ok(())
    }

    fn write_angle(&mut self, angle: u8) {
        let mut log = self.servo.log.lock();
        if log.attached {
            log.angles.push(angle);
        }
    }

    fn detach(&mut self) {
        self.servo.log.lock().attached = false;
    }
}
