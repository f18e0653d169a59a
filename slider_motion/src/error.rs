//! Startup error type of the motion core.
//!
//! Only resource exhaustion at construction time is an error. Rejected
//! intake (full queue, bad index, disabled axis) is reported as `false`
//! and protective truncation is not an error at all.

use slider_common::config::ConfigError;
use slider_common::hal::driver::HalError;
use thiserror::Error;

/// Fatal errors raised while bringing up a motion component.
#[derive(Debug, Error)]
pub enum MotionError {
    /// The OS refused to create a task thread.
    #[error("failed to spawn task {task}: {reason}")]
    TaskSpawn {
        /// Task name.
        task: &'static str,
        /// OS error text.
        reason: String,
    },

    /// A HAL driver could not provide a component.
    #[error("HAL error: {0}")]
    Hal(#[from] HalError),

    /// Configuration rejected.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
