//! Declared-vs-detected reconciliation
//!
//! A pure diff between the customer's declared profile and the stabilized
//! scene snapshot. Counts are treated as estimates: a delta must clear both
//! the absolute and the relative allowance before it becomes a mismatch, and
//! records below the severity floor are suppressed as noise.

use crate::config::ComparatorConfig;
use crate::fusion::SceneSnapshot;
use serde_json::json;
use tracing::debug;
use veriscope_core::{DeclaredProfile, MismatchKind, MismatchRecord, ObjectTally};

pub struct Comparator {
    config: ComparatorConfig,
}

impl Comparator {
    pub fn new(config: ComparatorConfig) -> Self {
        Self { config }
    }

    /// Produce all mismatch records between a profile and a scene snapshot.
    ///
    /// Pure: the same frozen inputs always yield the same records. Output
    /// order is unspecified; the risk engine ranks by severity.
    pub fn compare(&self, profile: &DeclaredProfile, scene: &SceneSnapshot) -> Vec<MismatchRecord> {
        let mut records = Vec::new();

        self.compare_environment(profile, scene, &mut records);
        self.compare_declared_counts(profile, scene, &mut records);
        self.report_undeclared_presence(profile, scene, &mut records);

        let before = records.len();
        records.retain(|r| r.severity >= self.config.severity_floor);
        if records.len() < before {
            debug!(
                suppressed = before - records.len(),
                "suppressed sub-floor mismatch records"
            );
        }
        records
    }

    fn compare_environment(
        &self,
        profile: &DeclaredProfile,
        scene: &SceneSnapshot,
        records: &mut Vec<MismatchRecord>,
    ) {
        let declared = match &profile.environment {
            Some(declared) => declared,
            None => return,
        };
        // an absent estimate is an evidence problem, not a contradiction;
        // it surfaces through the low-evidence path instead
        let estimate = match &scene.environment {
            Some(estimate) => estimate,
            None => return,
        };
        if declared.eq_ignore_ascii_case(&estimate.label) {
            return;
        }
        // a confident contradiction is worse than an uncertain one
        records.push(MismatchRecord {
            field: "environment".to_string(),
            declared: json!(declared),
            detected: json!(estimate.label),
            kind: MismatchKind::TypeMismatch,
            severity: estimate.confidence.clamp(0.0, 1.0),
        });
    }

    fn compare_declared_counts(
        &self,
        profile: &DeclaredProfile,
        scene: &SceneSnapshot,
        records: &mut Vec<MismatchRecord>,
    ) {
        for (label, &declared_count) in &profile.objects {
            let tally = find_tally(scene, label);
            let detected_count = tally.map_or(0, |t| t.count);
            let detected_confidence = tally.map_or(0.0, |t| t.confidence);

            if declared_count > 0 && detected_count == 0 {
                // nothing at all where the claim says something should be;
                // severity grows with the size of the unbacked claim
                let severity = declared_count as f32 / (declared_count as f32 + 1.0);
                records.push(MismatchRecord {
                    field: label.clone(),
                    declared: json!(declared_count),
                    detected: json!(0),
                    kind: MismatchKind::UnexpectedAbsence,
                    severity,
                });
                continue;
            }

            let delta = declared_count.abs_diff(detected_count);
            let relative = delta as f32 / declared_count.max(1) as f32;
            let within_abs = delta <= self.config.count_tolerance_abs;
            let within_rel = relative <= self.config.count_tolerance_rel;
            if within_abs || within_rel {
                continue;
            }

            records.push(MismatchRecord {
                field: label.clone(),
                declared: json!(declared_count),
                detected: json!(detected_count),
                kind: MismatchKind::CountMismatch,
                severity: relative.min(1.0) * detected_confidence.clamp(0.0, 1.0),
            });
        }
    }

    fn report_undeclared_presence(
        &self,
        profile: &DeclaredProfile,
        scene: &SceneSnapshot,
        records: &mut Vec<MismatchRecord>,
    ) {
        for tally in &scene.tallies {
            let declared = profile
                .objects
                .keys()
                .any(|label| label.eq_ignore_ascii_case(&tally.label));
            if declared {
                continue;
            }
            if tally.confidence < self.config.presence_min_confidence
                || tally.count < self.config.presence_min_count
            {
                continue;
            }
            records.push(MismatchRecord {
                field: tally.label.clone(),
                declared: json!(0),
                detected: json!(tally.count),
                kind: MismatchKind::UnexpectedPresence,
                severity: tally.confidence.clamp(0.0, 1.0),
            });
        }
    }
}

fn find_tally<'a>(scene: &'a SceneSnapshot, label: &str) -> Option<&'a ObjectTally> {
    scene
        .tallies
        .iter()
        .find(|t| t.label.eq_ignore_ascii_case(label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use veriscope_core::{EnvironmentEstimate, FrameSeq};

    fn profile(env: Option<&str>, objects: &[(&str, u32)]) -> DeclaredProfile {
        DeclaredProfile {
            environment: env.map(|s| s.to_string()),
            objects: objects
                .iter()
                .map(|(l, c)| (l.to_string(), *c))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn tally(label: &str, count: u32, confidence: f32) -> ObjectTally {
        ObjectTally {
            label: label.to_string(),
            count,
            confidence,
            first_seen: FrameSeq(0),
            last_seen: FrameSeq(10),
        }
    }

    fn scene(env: Option<(&str, f32)>, tallies: Vec<ObjectTally>) -> SceneSnapshot {
        SceneSnapshot {
            environment: env.map(|(label, confidence)| EnvironmentEstimate {
                label: label.to_string(),
                confidence,
                stability: 5,
            }),
            tallies,
            frames_scored: 20,
            frames_unscored: 0,
        }
    }

    fn comparator() -> Comparator {
        Comparator::new(ComparatorConfig::default())
    }

    #[test]
    fn test_matching_state_produces_no_records() {
        let records = comparator().compare(
            &profile(Some("Home"), &[("fridge", 1)]),
            &scene(Some(("home", 0.9)), vec![tally("fridge", 1, 0.85)]),
        );
        assert!(records.is_empty());
    }

    #[test]
    fn test_environment_type_mismatch() {
        let records = comparator().compare(
            &profile(Some("Home"), &[]),
            &scene(Some(("shop", 0.89)), vec![]),
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, MismatchKind::TypeMismatch);
        assert_eq!(records[0].field, "environment");
        assert!((records[0].severity - 0.89).abs() < 0.001);
    }

    #[test]
    fn test_absent_estimate_is_not_a_contradiction() {
        let records = comparator().compare(&profile(Some("Office"), &[]), &scene(None, vec![]));
        assert!(records.is_empty());
    }

    #[test]
    fn test_count_mismatch_fridge_two_vs_one() {
        let records = comparator().compare(
            &profile(None, &[("fridge", 2)]),
            &scene(None, vec![tally("fridge", 1, 0.8)]),
        );
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.kind, MismatchKind::CountMismatch);
        assert_eq!(record.field, "fridge");
        assert_eq!(record.declared, json!(2));
        assert_eq!(record.detected, json!(1));
    }

    #[test]
    fn test_small_relative_delta_is_tolerated() {
        // 150 declared, 140 seen: counts are estimates, within 20% passes
        let records = comparator().compare(
            &profile(None, &[("bottled_products", 150)]),
            &scene(None, vec![tally("bottled_products", 140, 0.9)]),
        );
        assert!(records.is_empty());
    }

    #[test]
    fn test_total_absence_is_classified_as_absence() {
        let records = comparator().compare(
            &profile(None, &[("fridge", 2)]),
            &scene(None, vec![]),
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, MismatchKind::UnexpectedAbsence);
        assert_eq!(records[0].detected, json!(0));
    }

    #[test]
    fn test_unexpected_presence_for_undeclared_labels() {
        let records = comparator().compare(
            &profile(None, &[]),
            &scene(
                None,
                vec![tally("shelves", 5, 0.9), tally("boxes", 3, 0.85)],
            ),
        );
        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .all(|r| r.kind == MismatchKind::UnexpectedPresence));
    }

    #[test]
    fn test_low_confidence_presence_is_not_reported() {
        let records = comparator().compare(
            &profile(None, &[]),
            &scene(None, vec![tally("bottled_products", 150, 0.3)]),
        );
        assert!(records.is_empty());
    }

    #[test]
    fn test_severity_floor_suppresses_noise() {
        let config = ComparatorConfig {
            severity_floor: 0.5,
            ..ComparatorConfig::default()
        };
        let records = Comparator::new(config).compare(
            &profile(Some("Home"), &[]),
            &scene(Some(("shop", 0.3)), vec![]),
        );
        assert!(records.is_empty());
    }

    #[test]
    fn test_compare_is_idempotent() {
        let profile = profile(Some("Home"), &[("fridge", 2), ("sofa", 1)]);
        let scene = scene(
            Some(("shop", 0.89)),
            vec![
                tally("shelves", 5, 0.9),
                tally("fridge", 1, 0.8),
                tally("counter_table", 1, 0.75),
            ],
        );
        let comparator = comparator();
        let first = comparator.compare(&profile, &scene);
        let second = comparator.compare(&profile, &scene);
        assert_eq!(first, second);
    }

    #[test]
    fn test_full_shop_vs_home_scenario() {
        let profile = profile(Some("Home"), &[("fridge", 2)]);
        let scene = scene(
            Some(("Shop", 0.89)),
            vec![
                tally("shelves", 5, 0.9),
                tally("bottled_products", 150, 0.3),
                tally("fridge", 1, 0.8),
                tally("counter_table", 1, 0.75),
            ],
        );
        let records = comparator().compare(&profile, &scene);

        let kinds: Vec<_> = records.iter().map(|r| r.kind).collect();
        assert!(kinds.contains(&MismatchKind::TypeMismatch));
        assert!(kinds.contains(&MismatchKind::CountMismatch));
        // the low-confidence bottled_products bucket stays quiet
        assert!(!records.iter().any(|r| r.field == "bottled_products"));
    }
}
