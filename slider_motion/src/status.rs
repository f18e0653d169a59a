//! Status export for the web gateway.
//!
//! Read-only snapshots assembled from the axis handles, the limit view and the
//! sequencer. Serialization is plain serde JSON; framing is the gateway's job.

use crate::limit::LimitView;
use crate::sequence::SequenceOrchestrator;
use crate::servo::ServoHandle;
use crate::stepper::StepperHandle;
use serde::Serialize;
use slider_common::motion::Sequence;
use slider_common::status::SliderStatus;
use std::sync::Arc;

/// Snapshot source over the running components.
#[derive(Clone)]
pub struct StatusExport {
    stepper: StepperHandle,
    servo: ServoHandle,
    limits: LimitView,
    sequencer: Arc<SequenceOrchestrator>,
}

impl StatusExport {
    /// Export over the given components.
    pub fn new(
        stepper: StepperHandle,
        servo: ServoHandle,
        limits: LimitView,
        sequencer: Arc<SequenceOrchestrator>,
    ) -> Self {
        Self {
            stepper,
            servo,
            limits,
            sequencer,
        }
    }

    /// Full controller snapshot.
    pub fn snapshot(&self) -> SliderStatus {
        SliderStatus {
            stepper: self.stepper.status(),
            servo: self.servo.status(),
            endstops: self.limits.status(),
            sequencer: self.sequencer.status(),
        }
    }

    /// Snapshot as JSON.
    pub fn snapshot_json(&self) -> Result<String, serde_json::Error> {
        to_json(&self.snapshot())
    }

    /// One catalog sequence as JSON, `None` for a bad index.
    pub fn sequence_json(&self, index: usize) -> Option<Result<String, serde_json::Error>> {
        self.sequencer
            .get_sequence(index)
            .map(|seq: Sequence| to_json(&seq))
    }

    /// Catalog listing as JSON.
    pub fn sequences_json(&self) -> Result<String, serde_json::Error> {
        to_json(&self.sequencer.list_sequences())
    }
}

/// Serialize any status record.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slider_common::status::{EndstopStatus, SequencerStatus, ServoStatus, StepperStatus};

    #[test]
    fn snapshot_json_shape() {
        let status = SliderStatus {
            stepper: StepperStatus {
                position: 1250,
                position_mm: 50.0,
                target_position: 1250,
                is_moving: false,
                is_enabled: true,
                speed: 1000,
                max_speed: 2000,
            },
            servo: ServoStatus {
                angle: 90,
                is_moving: false,
                speed: 50,
            },
            endstops: EndstopStatus::default(),
            sequencer: SequencerStatus::default(),
        };
        let value: serde_json::Value = serde_json::from_str(&to_json(&status).unwrap()).unwrap();
        assert_eq!(value["stepper"]["position"], 1250);
        assert_eq!(value["stepper"]["isMoving"], false);
        assert_eq!(value["servo"]["angle"], 90);
        assert_eq!(value["endstops"]["endstopMax"], false);
        assert_eq!(value["sequencer"]["isExecuting"], false);
        assert!(value["sequencer"]["activeSequence"].is_null());
    }
}
