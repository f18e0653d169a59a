//! Simulated linear rail.
//!
//! The carriage position is counted in steps. Each STEP pulse moves it by one
//! in the DIR direction while the driver stage is enabled. The min switch is
//! actuated at or below `min_stop`, the max switch at or above `max_stop`.
//! Tests can additionally force either switch regardless of position.

use parking_lot::Mutex;
use slider_common::hal::driver::{SenseLine, StepperOutputs};
use slider_common::io::DiLogic;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

/// Default end-stop positions: ±200 mm around power-on on an 8 mm lead.
const DEFAULT_STOP_STEPS: i64 = 5_000;

#[derive(Debug)]
struct RailState {
    position: AtomicI64,
    forward: AtomicBool,
    enabled: AtomicBool,
    pulses: AtomicU64,
    stops: Mutex<(i64, i64)>,
    forced: Mutex<[Option<bool>; 2]>,
}

/// Shared handle to the simulated rail. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SimulatedRail {
    state: Arc<RailState>,
}

impl SimulatedRail {
    /// Rail with end stops at `min_stop` and `max_stop` steps.
    pub fn new(min_stop: i64, max_stop: i64) -> Self {
        Self {
            state: Arc::new(RailState {
                position: AtomicI64::new(0),
                forward: AtomicBool::new(true),
                enabled: AtomicBool::new(false),
                pulses: AtomicU64::new(0),
                stops: Mutex::new((min_stop, max_stop)),
                forced: Mutex::new([None, None]),
            }),
        }
    }

    /// Carriage position [steps].
    pub fn position(&self) -> i64 {
        self.state.position.load(Ordering::Acquire)
    }

    /// Move the carriage by hand.
    pub fn set_position(&self, steps: i64) {
        self.state.position.store(steps, Ordering::Release);
    }

    /// Total STEP pulses seen, enabled or not.
    pub fn pulse_count(&self) -> u64 {
        self.state.pulses.load(Ordering::Acquire)
    }

    /// Driver stage enabled.
    pub fn is_enabled(&self) -> bool {
        self.state.enabled.load(Ordering::Acquire)
    }

    /// Relocate the end stops.
    pub fn set_stops(&self, min_stop: i64, max_stop: i64) {
        *self.state.stops.lock() = (min_stop, max_stop);
    }

    /// Force the min switch (`Some`) or return it to position sensing (`None`).
    pub fn force_min(&self, active: Option<bool>) {
        self.state.forced.lock()[0] = active;
    }

    /// Force the max switch (`Some`) or return it to position sensing (`None`).
    pub fn force_max(&self, active: Option<bool>) {
        self.state.forced.lock()[1] = active;
    }

    /// Logical state of the min switch.
    pub fn min_active(&self) -> bool {
        self.state.forced.lock()[0].unwrap_or_else(|| self.position() <= self.state.stops.lock().0)
    }

    /// Logical state of the max switch.
    pub fn max_active(&self) -> bool {
        self.state.forced.lock()[1].unwrap_or_else(|| self.position() >= self.state.stops.lock().1)
    }

    /// STEP/DIR/ENA outputs driving this rail.
    pub fn outputs(&self) -> RailOutputs {
        RailOutputs { rail: self.clone() }
    }

    /// Sense lines `(min, max)` wired with the given contact type.
    pub fn sense_lines(&self, logic: DiLogic) -> (RailSenseLine, RailSenseLine) {
        (
            RailSenseLine {
                rail: self.clone(),
                max_end: false,
                logic,
            },
            RailSenseLine {
                rail: self.clone(),
                max_end: true,
                logic,
            },
        )
    }
}

impl Default for SimulatedRail {
    fn default() -> Self {
        Self::new(-DEFAULT_STOP_STEPS, DEFAULT_STOP_STEPS)
    }
}

/// Stepper outputs of the simulated rail.
#[derive(Debug)]
pub struct RailOutputs {
    rail: SimulatedRail,
}

impl StepperOutputs for RailOutputs {
    fn set_direction(&mut self, forward: bool) {
        self.rail.state.forward.store(forward, Ordering::Release);
    }

    fn pulse(&mut self, _width: Duration) {
        let state = &self.rail.state;
        state.pulses.fetch_add(1, Ordering::AcqRel);
        if state.enabled.load(Ordering::Acquire) {
            let delta = if state.forward.load(Ordering::Acquire) { 1 } else { -1 };
            state.position.fetch_add(delta, Ordering::AcqRel);
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.rail.state.enabled.store(enabled, Ordering::Release);
    }
}

/// One end-stop sense line of the simulated rail.
#[derive(Debug)]
pub struct RailSenseLine {
    rail: SimulatedRail,
    max_end: bool,
    logic: DiLogic,
}

impl SenseLine for RailSenseLine {
    fn is_high(&mut self) -> bool {
        let active = if self.max_end {
            self.rail.max_active()
        } else {
            self.rail.min_active()
        };
        self.logic.level_for(active)
    }
}
