//! Cross-frame object deduplication and tallying
//!
//! A lightweight stand-in for full multi-object tracking: detections are
//! matched to known instances greedily by label and region overlap in
//! temporally nearby frames, so a static object seen in M frames counts
//! once, not M times. Instances that stop being re-matched expire out of
//! the tally.

use crate::config::FusionConfig;
use tracing::{debug, warn};
use veriscope_core::{Detection, FrameSeq, ObjectTally, Region};

/// Instances kept per session; beyond this new detections are ignored
const MAX_INSTANCES: usize = 512;

/// One physical object instance inferred across frames
#[derive(Debug, Clone)]
struct Instance {
    /// Lowercased label used for matching and grouping
    key: String,
    /// Display label as first reported by the model
    label: String,
    region: Option<Region>,
    /// Maximum confidence observed across matched frames
    confidence: f32,
    first_seen: FrameSeq,
    last_seen: FrameSeq,
}

pub struct ObjectLedger {
    overlap_threshold: f32,
    match_gap_frames: u64,
    instance_ttl_frames: u64,
    instances: Vec<Instance>,
}

impl ObjectLedger {
    pub fn new(config: &FusionConfig) -> Self {
        Self {
            overlap_threshold: config.overlap_threshold,
            match_gap_frames: config.match_gap_frames,
            instance_ttl_frames: config.instance_ttl_frames,
            instances: Vec::new(),
        }
    }

    /// Fold one scored frame's object detections into the ledger.
    ///
    /// `seq` must be non-decreasing across calls; expiry is computed against
    /// it.
    pub fn observe(&mut self, seq: FrameSeq, detections: &[Detection]) {
        let mut claimed = vec![false; self.instances.len()];

        for detection in detections {
            let key = detection.label.to_ascii_lowercase();
            let matched = self.best_match(seq, &key, detection.region.as_ref(), &claimed);

            match matched {
                Some(index) => {
                    claimed[index] = true;
                    let instance = &mut self.instances[index];
                    instance.last_seen = seq;
                    // a fresh region supersedes a stale one; a regionless
                    // re-sighting keeps the old geometry
                    if detection.region.is_some() {
                        instance.region = detection.region;
                    }
                    instance.confidence = instance.confidence.max(detection.confidence);
                }
                None => {
                    if self.instances.len() >= MAX_INSTANCES {
                        warn!(label = %detection.label, "instance cap reached, ignoring detection");
                        continue;
                    }
                    debug!(label = %detection.label, %seq, "new object instance");
                    self.instances.push(Instance {
                        key,
                        label: detection.label.clone(),
                        region: detection.region,
                        confidence: detection.confidence.clamp(0.0, 1.0),
                        first_seen: seq,
                        last_seen: seq,
                    });
                    claimed.push(true);
                }
            }
        }

        // instances not re-matched within the TTL leave the tally; this is
        // how objects leaving frame and non-recurring false positives decay
        let ttl = self.instance_ttl_frames;
        self.instances
            .retain(|instance| seq.0.saturating_sub(instance.last_seen.0) <= ttl);
    }

    /// Greedy nearest match: same label, recent enough, best region overlap.
    ///
    /// When either side lacks geometry the match falls back to label-only
    /// against the same-label instance most recently seen; a regionless
    /// detector is still count-stabilized, at the cost of never counting two
    /// simultaneous instances of one label.
    fn best_match(
        &self,
        seq: FrameSeq,
        key: &str,
        region: Option<&Region>,
        claimed: &[bool],
    ) -> Option<usize> {
        let mut best: Option<(usize, f32, FrameSeq)> = None;

        for (index, instance) in self.instances.iter().enumerate() {
            if claimed[index] || instance.key != key {
                continue;
            }
            if seq.0.saturating_sub(instance.last_seen.0) > self.match_gap_frames {
                continue;
            }

            let score = match (region, instance.region.as_ref()) {
                (Some(a), Some(b)) => {
                    let overlap = a.overlap_ratio(b);
                    if overlap >= self.overlap_threshold {
                        Some(overlap)
                    } else {
                        None
                    }
                }
                _ => Some(0.0),
            };

            if let Some(score) = score {
                let better = match best {
                    None => true,
                    Some((_, best_score, best_seen)) => {
                        score > best_score
                            || (score == best_score && instance.last_seen > best_seen)
                    }
                };
                if better {
                    best = Some((index, score, instance.last_seen));
                }
            }
        }

        best.map(|(index, _, _)| index)
    }

    /// Stabilized per-label tallies over the live instances, sorted by label
    pub fn tallies(&self) -> Vec<ObjectTally> {
        let mut tallies: Vec<ObjectTally> = Vec::new();

        for instance in &self.instances {
            match tallies
                .iter_mut()
                .find(|t| t.label.eq_ignore_ascii_case(&instance.label))
            {
                Some(tally) => {
                    tally.count += 1;
                    tally.confidence = tally.confidence.max(instance.confidence);
                    tally.first_seen = tally.first_seen.min(instance.first_seen);
                    tally.last_seen = tally.last_seen.max(instance.last_seen);
                }
                None => tallies.push(ObjectTally {
                    label: instance.label.clone(),
                    count: 1,
                    confidence: instance.confidence,
                    first_seen: instance.first_seen,
                    last_seen: instance.last_seen,
                }),
            }
        }

        tallies.sort_by(|a, b| a.label.cmp(&b.label));
        tallies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> ObjectLedger {
        ObjectLedger::new(&FusionConfig {
            window_frames: 30,
            hysteresis_margin: 0.15,
            overlap_threshold: 0.4,
            match_gap_frames: 2,
            instance_ttl_frames: 5,
        })
    }

    fn det(label: &str, confidence: f32, region: Option<Region>) -> Detection {
        Detection::object(label, confidence, region)
    }

    #[test]
    fn test_static_object_counts_once_across_frames() {
        let mut ledger = ledger();
        let region = Region::new(10.0, 10.0, 50.0, 50.0);
        for i in 0..8 {
            ledger.observe(FrameSeq(i), &[det("sofa", 0.8, Some(region))]);
        }
        let tallies = ledger.tallies();
        assert_eq!(tallies.len(), 1);
        assert_eq!(tallies[0].count, 1);
        assert_eq!(tallies[0].first_seen, FrameSeq(0));
        assert_eq!(tallies[0].last_seen, FrameSeq(7));
    }

    #[test]
    fn test_disjoint_regions_are_distinct_instances() {
        let mut ledger = ledger();
        ledger.observe(
            FrameSeq(0),
            &[
                det("fridge", 0.8, Some(Region::new(0.0, 0.0, 40.0, 80.0))),
                det("fridge", 0.7, Some(Region::new(200.0, 0.0, 40.0, 80.0))),
            ],
        );
        let tallies = ledger.tallies();
        assert_eq!(tallies.len(), 1);
        assert_eq!(tallies[0].count, 2);
    }

    #[test]
    fn test_confidence_is_max_across_sightings() {
        let mut ledger = ledger();
        let region = Region::new(10.0, 10.0, 50.0, 50.0);
        ledger.observe(FrameSeq(0), &[det("tv", 0.4, Some(region))]);
        ledger.observe(FrameSeq(1), &[det("tv", 0.9, Some(region))]);
        ledger.observe(FrameSeq(2), &[det("tv", 0.5, Some(region))]);
        assert!((ledger.tallies()[0].confidence - 0.9).abs() < 0.001);
    }

    #[test]
    fn test_unmatched_instance_expires_after_ttl() {
        let mut ledger = ledger();
        let region = Region::new(10.0, 10.0, 50.0, 50.0);
        ledger.observe(FrameSeq(0), &[det("chair", 0.8, Some(region))]);
        // frames go by without the chair recurring
        for i in 1..=6 {
            ledger.observe(FrameSeq(i), &[]);
        }
        assert!(ledger.tallies().is_empty());
    }

    #[test]
    fn test_instance_survives_within_ttl() {
        let mut ledger = ledger();
        let region = Region::new(10.0, 10.0, 50.0, 50.0);
        ledger.observe(FrameSeq(0), &[det("chair", 0.8, Some(region))]);
        for i in 1..=4 {
            ledger.observe(FrameSeq(i), &[]);
        }
        assert_eq!(ledger.tallies().len(), 1);
    }

    #[test]
    fn test_match_gap_prevents_stale_rematch() {
        let mut ledger = ledger();
        let region = Region::new(10.0, 10.0, 50.0, 50.0);
        ledger.observe(FrameSeq(0), &[det("box", 0.8, Some(region))]);
        // same place, but too many frames later to be matched (gap 2 < 4);
        // the old instance is still within TTL so both instances coexist
        ledger.observe(FrameSeq(4), &[det("box", 0.8, Some(region))]);
        assert_eq!(ledger.tallies()[0].count, 2);
    }

    #[test]
    fn test_regionless_detections_stabilize_by_label() {
        let mut ledger = ledger();
        for i in 0..5 {
            ledger.observe(FrameSeq(i), &[det("whiteboard", 0.7, None)]);
        }
        assert_eq!(ledger.tallies()[0].count, 1);
    }

    #[test]
    fn test_label_matching_is_case_insensitive() {
        let mut ledger = ledger();
        let region = Region::new(10.0, 10.0, 50.0, 50.0);
        ledger.observe(FrameSeq(0), &[det("Fridge", 0.8, Some(region))]);
        ledger.observe(FrameSeq(1), &[det("fridge", 0.9, Some(region))]);
        let tallies = ledger.tallies();
        assert_eq!(tallies.len(), 1);
        assert_eq!(tallies[0].count, 1);
        assert_eq!(tallies[0].label, "Fridge");
    }

    #[test]
    fn test_tally_invariants_hold() {
        let mut ledger = ledger();
        ledger.observe(
            FrameSeq(0),
            &[
                det("shelves", 1.5, Some(Region::new(0.0, 0.0, 10.0, 10.0))),
                det("shelves", 0.2, Some(Region::new(100.0, 0.0, 10.0, 10.0))),
            ],
        );
        for tally in ledger.tallies() {
            assert!(tally.count >= 1);
            assert!((0.0..=1.0).contains(&tally.confidence));
            assert!(tally.first_seen <= tally.last_seen);
        }
    }
}
