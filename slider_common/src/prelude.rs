//! Prelude module for common re-exports.
//!
//! ```rust
//! use slider_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, SharedConfig, SliderConfig, TaskConfig};
pub use crate::hal::config::{LimitConfig, ServoConfig, StepperConfig};

// ─── HAL ────────────────────────────────────────────────────────────
pub use crate::hal::driver::{HalDriver, HalError, SenseLine, ServoOutput, StepperOutputs};
pub use crate::io::DiLogic;

// ─── Motion ─────────────────────────────────────────────────────────
pub use crate::motion::{Movement, Sequence, ServoCommand, StepperCommand};

// ─── Status ─────────────────────────────────────────────────────────
pub use crate::status::{
    EndstopStatus, SequenceSummary, SequencerStatus, ServoStatus, SliderStatus, StepperStatus,
};

// ─── Supervision ────────────────────────────────────────────────────
pub use crate::watchdog::{HealthStatus, Heartbeat, TaskWatchdog};
