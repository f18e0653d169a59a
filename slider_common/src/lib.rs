//! Slider Common Library
//!
//! Shared constants, configuration loading, hardware abstraction traits and
//! motion data types for every crate of the camera slider workspace.
//!
//! # Module Structure
//!
//! - [`config`] - Configuration loading traits and the top-level `SliderConfig`
//! - [`consts`] - System-wide timing and sizing constants
//! - [`hal`] - Hardware abstraction: pin traits, driver trait, axis config
//! - [`io`] - Digital input polarity
//! - [`motion`] - Commands, movements, sequences and unit conversions
//! - [`status`] - Read-only status records shared with the web gateway
//! - [`watchdog`] - Task liveness heartbeats
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use slider_common::prelude::*;
//! ```

pub mod config;
pub mod consts;
pub mod hal;
pub mod io;
pub mod motion;
pub mod prelude;
pub mod status;
pub mod watchdog;
