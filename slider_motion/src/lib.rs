//! # Slider Motion Library
//!
//! Real-time motion core of the camera slider: per-axis worker tasks for the
//! rail stepper and the head servo, a debounced limit switch monitor wired to
//! the stepper through an interlock, and a sequence orchestrator.
//!
//! # Module Structure
//!
//! - [`core`] - `SliderCore`, component wiring and the gateway API
//! - [`worker`] - Generic bounded-queue axis worker
//! - [`stepper`] - Rail axis (pulse trains, position tracking)
//! - [`servo`] - Head axis (lazy attach, degree ramp)
//! - [`limit`] - Debouncer and limit switch monitor task
//! - [`interlock`] - Limit events to stepper abort
//! - [`sequence`] - Sequence catalog and execution task
//! - [`status`] - JSON status export
//! - [`task`] - Thread spawning with optional RT scheduling
//! - [`driver_registry`] / [`drivers`] - HAL backends
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        SliderCore                             │
//! │                                                               │
//! │  ┌──────────────┐   commands    ┌──────────────┐              │
//! │  │  Sequence    │──────────────►│ StepperAxis  │◄─┐ LimitView │
//! │  │ Orchestrator │──────┐        └──────────────┘  │           │
//! │  └──────────────┘      │        ┌──────────────┐  │           │
//! │                        └───────►│  ServoAxis   │  │           │
//! │                                 └──────────────┘  │           │
//! │  ┌──────────────┐  abort (InterlockRouter)        │           │
//! │  │ LimitMonitor │─────────────────────────────────┘           │
//! │  └──────────────┘                                             │
//! └───────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod core;
pub mod driver_registry;
pub mod drivers;
pub mod error;
pub mod interlock;
pub mod limit;
pub mod sequence;
pub mod servo;
pub mod status;
pub mod stepper;
pub mod task;
pub mod worker;

pub use crate::core::SliderCore;
pub use crate::driver_registry::DriverRegistry;
pub use crate::error::MotionError;
