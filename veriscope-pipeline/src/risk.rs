//! Risk scoring and verdict decision
//!
//! A deterministic fold over mismatch records: each record contributes its
//! severity times a per-kind weight from the configuration table, a single
//! critical record can force review on its own, and the ranked record list
//! always travels with the verdict — the decision is never opaque.

use crate::config::RiskConfig;
use std::cmp::Ordering;
use tracing::{debug, info};
use veriscope_core::{MismatchKind, MismatchRecord, RiskVerdict, VerdictLabel};

/// Engine phase; `Clear` until the first record is folded in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    Clear,
    Accumulating,
}

pub struct RiskEngine {
    config: RiskConfig,
}

impl RiskEngine {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Decide the terminal verdict for a session.
    ///
    /// `frames_scored` gates the evidence floor: a verdict always fires, but
    /// a Pass must never ride on missing evidence, so thin sessions are sent
    /// to review and flagged.
    pub fn decide(&self, mut records: Vec<MismatchRecord>, frames_scored: u64) -> RiskVerdict {
        let mut state = EngineState::Clear;
        let mut score = 0.0f32;
        let mut critical = false;

        for record in &records {
            state = EngineState::Accumulating;
            let mut weight = self.config.weight_for(record.kind);
            if record.kind == MismatchKind::UnexpectedPresence
                && self.config.is_business_asset(&record.field)
            {
                weight *= self.config.business_asset_multiplier;
            }
            score += weight * record.severity;

            if record.kind == MismatchKind::TypeMismatch
                && record.severity >= self.config.critical_confidence
            {
                info!(
                    field = %record.field,
                    severity = record.severity,
                    "critical mismatch, forcing review"
                );
                critical = true;
            }
        }

        // severity descending, then field for a stable audit ordering
        records.sort_by(|a, b| {
            b.severity
                .partial_cmp(&a.severity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.field.cmp(&b.field))
        });

        let low_evidence = frames_scored < self.config.min_scored_frames;
        let label = if critical || score > self.config.review_threshold || low_evidence {
            VerdictLabel::ReviewNeeded
        } else {
            VerdictLabel::Pass
        };

        debug!(
            ?state,
            score,
            verdict = %label,
            low_evidence,
            records = records.len(),
            "verdict decided"
        );

        RiskVerdict {
            score,
            label,
            contributing: records,
            low_evidence,
        }
    }
}
