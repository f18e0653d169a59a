//! Hardware abstraction layer types.
//!
//! - [`config`] - Per-axis and limit-switch pin configuration
//! - [`driver`] - Pin traits, `HalDriver` factory trait and `HalError`

pub mod config;
pub mod driver;
