//! Environment label fusion with hysteresis
//!
//! A confidence-weighted vote over the sliding window picks the candidate
//! label; the current estimate only switches when the challenger clears it
//! by the hysteresis margin, so one noisy frame cannot flip the session's
//! environment belief back and forth.

use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info};
use veriscope_core::EnvironmentEstimate;

/// Per-frame environment votes: (label, confidence) pairs from one scored frame
pub type FrameVotes = Vec<(String, f32)>;

pub struct EnvironmentFuser {
    window_frames: usize,
    hysteresis_margin: f32,
    window: VecDeque<FrameVotes>,
    current: Option<EnvironmentEstimate>,
}

impl EnvironmentFuser {
    pub fn new(window_frames: usize, hysteresis_margin: f32) -> Self {
        Self {
            window_frames,
            hysteresis_margin,
            window: VecDeque::new(),
            current: None,
        }
    }

    /// Fold one scored frame's environment detections into the window
    pub fn observe(&mut self, votes: FrameVotes) {
        self.window.push_back(votes);
        while self.window.len() > self.window_frames {
            self.window.pop_front();
        }
        self.refresh();
    }

    /// Current stabilized estimate; `None` when the window holds no
    /// environment evidence
    pub fn current(&self) -> Option<&EnvironmentEstimate> {
        self.current.as_ref()
    }

    fn refresh(&mut self) {
        // label -> (confidence sum, detection count) across the window
        let mut sums: BTreeMap<String, (f32, u32)> = BTreeMap::new();
        let mut total_detections = 0u32;
        for frame_votes in &self.window {
            for (label, confidence) in frame_votes {
                let entry = sums.entry(label.clone()).or_insert((0.0, 0));
                entry.0 += confidence;
                entry.1 += 1;
                total_detections += 1;
            }
        }

        if total_detections == 0 {
            if self.current.is_some() {
                debug!("environment evidence aged out of window");
            }
            self.current = None;
            return;
        }

        let vote_of = |label: &str| -> f32 {
            sums.get(label)
                .map(|(sum, _)| sum / total_detections as f32)
                .unwrap_or(0.0)
        };
        let mean_of = |label: &str| -> f32 {
            sums.get(label)
                .map(|(sum, count)| sum / *count as f32)
                .unwrap_or(0.0)
        };

        let current_label = self.current.as_ref().map(|c| c.label.clone());

        // Candidate = highest weighted vote; ties prefer the current label,
        // then lexical order (BTreeMap iteration keeps the first seen)
        let mut candidate: Option<(String, f32)> = None;
        for label in sums.keys() {
            let vote = vote_of(label);
            let better = match &candidate {
                None => true,
                Some((best_label, best_vote)) => {
                    if vote > *best_vote {
                        true
                    } else if vote == *best_vote {
                        current_label.as_deref() == Some(label.as_str())
                            && current_label.as_deref() != Some(best_label.as_str())
                    } else {
                        false
                    }
                }
            };
            if better {
                candidate = Some((label.clone(), vote));
            }
        }
        let (cand_label, cand_vote) = match candidate {
            Some(c) => c,
            None => return,
        };

        let newest_supports = |label: &str| -> bool {
            self.window
                .back()
                .map(|votes| votes.iter().any(|(l, _)| l == label))
                .unwrap_or(false)
        };

        match &mut self.current {
            None => {
                let stability = u32::from(newest_supports(&cand_label));
                debug!(label = %cand_label, vote = cand_vote, "environment estimate adopted");
                self.current = Some(EnvironmentEstimate {
                    confidence: mean_of(&cand_label),
                    label: cand_label,
                    stability,
                });
            }
            Some(current) if current.label == cand_label => {
                current.confidence = mean_of(&cand_label);
                if newest_supports(&cand_label) {
                    current.stability += 1;
                } else {
                    current.stability = 0;
                }
            }
            Some(current) => {
                let current_vote = vote_of(&current.label);
                if cand_vote > current_vote + self.hysteresis_margin {
                    info!(
                        from = %current.label,
                        to = %cand_label,
                        challenger_vote = cand_vote,
                        incumbent_vote = current_vote,
                        "environment estimate flipped"
                    );
                    let stability = u32::from(newest_supports(&cand_label));
                    *current = EnvironmentEstimate {
                        confidence: mean_of(&cand_label),
                        label: cand_label,
                        stability,
                    };
                } else {
                    // challenger did not clear the margin; the incumbent
                    // stays, its confidence tracking the window
                    current.confidence = mean_of(&current.label);
                    if newest_supports(current.label.as_str()) {
                        current.stability += 1;
                    } else {
                        current.stability = 0;
                    }
                }
            }
        }
    }
}
