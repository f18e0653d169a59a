//! Limit switch to stepper interlock.
//!
//! Both trigger events abort the stepper. The handler runs on the monitor
//! task and only raises the abort flag of the move in flight, so it never
//! blocks. Queued commands are kept: the step loop checks the limit view
//! before every pulse, so moves toward the actuated switch end after zero
//! steps while moves away from it run normally.
//!
//! Worst-case latency from contact to abort is one debounce window, one poll
//! period and one inter-pulse interval. [`LimitConfig::validate`] rejects any
//! configuration whose travel during that latency exceeds the end-stop margin.

use crate::limit::{LimitEvent, LimitMonitor};
use crate::stepper::StepperHandle;
use slider_common::hal::config::{LimitConfig, StepperConfig};
use std::sync::Arc;
use tracing::info;

/// Installs and removes the limit interlock.
pub struct InterlockRouter;

impl InterlockRouter {
    /// Route both limit trigger events to a stepper abort.
    pub fn install(monitor: &LimitMonitor, stepper: &StepperHandle) {
        for event in [LimitEvent::MinTriggered, LimitEvent::MaxTriggered] {
            let stepper = stepper.clone();
            monitor.subscribe(event, Arc::new(move || stepper.abort()));
        }
        info!("limit interlock installed");
    }

    /// Remove both handlers.
    pub fn remove(monitor: &LimitMonitor) {
        monitor.unsubscribe(LimitEvent::MinTriggered);
        monitor.unsubscribe(LimitEvent::MaxTriggered);
        info!("limit interlock removed");
    }

    /// Rail travel [mm] possible before the interlock takes effect.
    pub fn worst_case_overtravel_mm(limits: &LimitConfig, stepper: &StepperConfig) -> f64 {
        limits.worst_case_overtravel_mm(stepper)
    }
}
