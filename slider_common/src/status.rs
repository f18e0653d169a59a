//! Read-only status records.
//!
//! These are the shapes the web gateway renders. They are plain snapshots;
//! nothing in here refers back to live state.

use serde::{Deserialize, Serialize};

/// Rail axis snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepperStatus {
    /// Committed position [steps].
    pub position: i64,
    /// Committed position [mm].
    pub position_mm: f64,
    /// Target of the last accepted command [steps].
    pub target_position: i64,
    /// A command is being executed.
    pub is_moving: bool,
    /// Enable gate.
    pub is_enabled: bool,
    /// Default speed [steps/s].
    pub speed: u32,
    /// Speed clamp [steps/s].
    pub max_speed: u32,
}

/// Head axis snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServoStatus {
    /// Last written angle [°].
    pub angle: i32,
    /// A command is being executed.
    pub is_moving: bool,
    /// Default speed [%].
    pub speed: i32,
}

/// Debounced end-stop states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EndstopStatus {
    /// Minimum-end switch actuated.
    pub endstop_min: bool,
    /// Maximum-end switch actuated.
    pub endstop_max: bool,
}

/// Sequencer run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SequencerStatus {
    /// A sequence task is running.
    pub is_executing: bool,
    /// Movements are withheld at the next boundary.
    pub is_paused: bool,
    /// Index of the running (or last run) sequence.
    pub active_sequence: Option<usize>,
    /// Catalog size.
    pub sequence_count: usize,
}

/// Complete controller snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SliderStatus {
    /// Rail axis.
    pub stepper: StepperStatus,
    /// Head axis.
    pub servo: ServoStatus,
    /// End stops.
    pub endstops: EndstopStatus,
    /// Sequencer.
    pub sequencer: SequencerStatus,
}

/// One catalog entry as listed by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceSummary {
    /// Catalog index.
    pub index: usize,
    /// Display name.
    pub name: String,
    /// Number of movements.
    pub movement_count: usize,
    /// Repeat until stopped.
    #[serde(rename = "loop")]
    pub loop_forever: bool,
    /// Number of passes when not looping.
    pub repeat_count: u32,
}
