//! Temporal aggregation of per-frame detections
//!
//! The only stateful stage of the pipeline: folds adapter observations into
//! a bounded sliding window and exposes pure snapshots of the stabilized
//! scene, so comparison and scoring never see a single raw frame's noise.

pub mod environment;
pub mod objects;

pub use environment::EnvironmentFuser;
pub use objects::ObjectLedger;

use crate::config::FusionConfig;
use serde::Serialize;
use tracing::debug;
use veriscope_core::{DetectionKind, EnvironmentEstimate, ObjectTally};

use crate::perception::FrameObservation;

/// Window-stabilized view of the scene as of the latest scored frame.
///
/// A pure value: cloning state out of the aggregator is the pipeline's sole
/// synchronization point, so consumers can never race window mutation.
#[derive(Debug, Clone, Serialize)]
pub struct SceneSnapshot {
    /// Absent until the window holds environment evidence; consumers must
    /// treat absence as confidence 0, never as a defaulted label
    pub environment: Option<EnvironmentEstimate>,
    /// Stabilized object tallies, sorted by label
    pub tallies: Vec<ObjectTally>,
    pub frames_scored: u64,
    pub frames_unscored: u64,
}

impl SceneSnapshot {
    /// Detected confidence in the environment estimate, 0 when absent
    pub fn environment_confidence(&self) -> f32 {
        self.environment.as_ref().map_or(0.0, |e| e.confidence)
    }
}

/// Fuses ordered per-frame observations into a stable scene estimate
pub struct TemporalAggregator {
    environment: EnvironmentFuser,
    objects: ObjectLedger,
    frames_scored: u64,
    frames_unscored: u64,
}

impl TemporalAggregator {
    pub fn new(config: &FusionConfig) -> Self {
        Self {
            environment: EnvironmentFuser::new(config.window_frames, config.hysteresis_margin),
            objects: ObjectLedger::new(config),
            frames_scored: 0,
            frames_unscored: 0,
        }
    }

    /// Fold one observation into window state.
    ///
    /// Observations must arrive in frame-sequence order; the windowing and
    /// hysteresis logic is order-sensitive. Unscored frames advance only the
    /// evidence counters, never the window.
    pub fn observe(&mut self, observation: &FrameObservation) {
        let detections = match &observation.detections {
            Some(detections) => detections,
            None => {
                self.frames_unscored += 1;
                return;
            }
        };
        self.frames_scored += 1;

        let environment_votes: Vec<(String, f32)> = detections
            .iter()
            .filter(|d| d.kind == DetectionKind::Environment)
            .map(|d| (d.label.clone(), d.confidence))
            .collect();
        let objects: Vec<_> = detections
            .iter()
            .filter(|d| d.kind == DetectionKind::Object)
            .cloned()
            .collect();

        debug!(
            seq = %observation.seq,
            environment_votes = environment_votes.len(),
            objects = objects.len(),
            "aggregating observation"
        );

        self.environment.observe(environment_votes);
        self.objects.observe(observation.seq, &objects);
    }

    /// Pure snapshot of the stabilized state
    pub fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot {
            environment: self.environment.current().cloned(),
            tallies: self.objects.tallies(),
            frames_scored: self.frames_scored,
            frames_unscored: self.frames_unscored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veriscope_core::{Detection, FrameSeq, Region};

    fn scored(seq: u64, detections: Vec<Detection>) -> FrameObservation {
        FrameObservation {
            seq: FrameSeq(seq),
            detections: Some(detections),
        }
    }

    fn unscored(seq: u64) -> FrameObservation {
        FrameObservation {
            seq: FrameSeq(seq),
            detections: None,
        }
    }

    #[test]
    fn test_empty_aggregator_snapshot() {
        let aggregator = TemporalAggregator::new(&FusionConfig::default());
        let snapshot = aggregator.snapshot();
        assert!(snapshot.environment.is_none());
        assert_eq!(snapshot.environment_confidence(), 0.0);
        assert!(snapshot.tallies.is_empty());
        assert_eq!(snapshot.frames_scored, 0);
    }

    #[test]
    fn test_observation_routing() {
        let mut aggregator = TemporalAggregator::new(&FusionConfig::default());
        let region = Region::new(0.0, 0.0, 50.0, 50.0);
        aggregator.observe(&scored(
            0,
            vec![
                Detection::environment("shop", 0.9),
                Detection::object("shelves", 0.8, Some(region)),
            ],
        ));
        aggregator.observe(&unscored(1));

        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.environment.unwrap().label, "shop");
        assert_eq!(snapshot.tallies.len(), 1);
        assert_eq!(snapshot.frames_scored, 1);
        assert_eq!(snapshot.frames_unscored, 1);
    }

    #[test]
    fn test_unscored_frames_leave_window_untouched() {
        let mut aggregator = TemporalAggregator::new(&FusionConfig::default());
        aggregator.observe(&scored(0, vec![Detection::environment("home", 0.9)]));
        let before = aggregator.snapshot();
        for seq in 1..10 {
            aggregator.observe(&unscored(seq));
        }
        let after = aggregator.snapshot();
        assert_eq!(
            before.environment.unwrap().label,
            after.environment.unwrap().label
        );
        assert_eq!(after.frames_unscored, 9);
    }

    #[test]
    fn test_snapshot_is_detached_from_live_state() {
        let mut aggregator = TemporalAggregator::new(&FusionConfig::default());
        aggregator.observe(&scored(0, vec![Detection::environment("home", 0.9)]));
        let snapshot = aggregator.snapshot();
        aggregator.observe(&scored(1, vec![Detection::environment("home", 0.2)]));
        // the earlier snapshot still shows the state it was taken at
        assert!((snapshot.environment.unwrap().confidence - 0.9).abs() < 0.001);
    }
}
