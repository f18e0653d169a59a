//! Task spawning with optional real-time scheduling.
//!
//! Every long-running component runs on its own named OS thread. With the
//! `rt` feature the thread applies a SCHED_FIFO priority and optionally pins
//! itself to one core before entering its loop. Without the feature both
//! calls are no-ops, which is what tests and the simulation use.
//!
//! Relative priorities, highest first: limit monitor, servo, stepper and
//! sequencer. The monitor and the stepper are kept on different cores.

use crate::error::MotionError;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Scheduling parameters of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSpec {
    /// Thread name.
    pub name: &'static str,
    /// SCHED_FIFO priority (1..=99).
    pub priority: i32,
    /// Core to pin to, if any.
    pub core: Option<usize>,
    /// Stack size [bytes].
    pub stack_size: usize,
}

/// Limit switch monitor: highest priority, own core.
pub const LIMIT_MONITOR_TASK: TaskSpec = TaskSpec {
    name: "limit_monitor",
    priority: 4,
    core: Some(1),
    stack_size: 64 * 1024,
};

/// Servo worker.
pub const SERVO_TASK: TaskSpec = TaskSpec {
    name: "servo_worker",
    priority: 2,
    core: None,
    stack_size: 64 * 1024,
};

/// Stepper worker: lowest priority, yields during pulse trains.
pub const STEPPER_TASK: TaskSpec = TaskSpec {
    name: "stepper_worker",
    priority: 1,
    core: Some(0),
    stack_size: 64 * 1024,
};

/// Sequence execution task.
pub const SEQUENCER_TASK: TaskSpec = TaskSpec {
    name: "sequencer",
    priority: 1,
    core: None,
    stack_size: 128 * 1024,
};

/// Spawn `body` on a new thread configured by `spec`.
///
/// # Errors
/// `MotionError::TaskSpawn` if the OS refuses the thread.
pub fn spawn_task<F>(spec: TaskSpec, body: F) -> Result<JoinHandle<()>, MotionError>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(spec.name.to_string())
        .stack_size(spec.stack_size)
        .spawn(move || {
            apply_scheduling(&spec);
            body();
        })
        .map_err(|e| MotionError::TaskSpawn {
            task: spec.name,
            reason: e.to_string(),
        })
}

fn apply_scheduling(spec: &TaskSpec) {
    if let Some(Err(e)) = spec.core.map(rt_set_affinity) {
        warn!(task = spec.name, "CPU pinning skipped: {e}");
    }
    match rt_set_scheduler(spec.priority) {
        Ok(()) => debug!(task = spec.name, priority = spec.priority, "task scheduling applied"),
        Err(e) => warn!(task = spec.name, "RT priority skipped: {e}"),
    }
}

/// Pin the current thread to a specific CPU core.
///
/// No-op when the `rt` feature is not enabled.
#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), String> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| format!("CpuSet::set({cpu}) failed: {e}"))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| format!("sched_setaffinity failed: {e}"))
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), String> {
    Ok(())
}

/// Set SCHED_FIFO with the given RT priority.
///
/// No-op when the `rt` feature is not enabled.
#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), String> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call; pid 0 targets the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        ));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), String> {
    Ok(())
}
