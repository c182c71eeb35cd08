//! Agent-facing structured summary assembly
//!
//! The report is the sole artifact handed to the agent-facing surface. It
//! echoes the declared profile next to the detected summary, carries the
//! ranked mismatch list and the risk verdict, and always shows how much
//! evidence it rests on — a degraded session reads as degraded, never as a
//! confident Pass.

use crate::fusion::SceneSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use veriscope_core::{
    DeclaredProfile, MismatchRecord, Result, RiskVerdict, SessionId, VerdictLabel,
};

/// Evidence counters carried on every report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCounters {
    pub frames_admitted: u64,
    pub frames_scored: u64,
    pub frames_unscored: u64,
}

/// Detected environment cell; the label is absent when the window never
/// held environment evidence, and consumers must not default it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedEnvironment {
    pub label: Option<String>,
    pub confidence: f32,
    pub stability: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedObjectSummary {
    pub label: String,
    pub count: u32,
    pub confidence: f32,
}

/// Risk cell of the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSummary {
    pub score: f32,
    pub verdict: VerdictLabel,
    pub low_evidence: bool,
}

/// Structured verification summary for one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub session_id: SessionId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub environment_detected: DetectedEnvironment,
    pub environment_declared: Option<String>,
    pub declared_objects: BTreeMap<String, u32>,
    pub detected_objects: Vec<DetectedObjectSummary>,
    /// Ranked by severity descending, as ordered by the risk engine
    pub mismatches: Vec<MismatchRecord>,
    pub risk: RiskSummary,
    pub counters: SessionCounters,
}

impl VerificationReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Stateless assembly of the report from frozen pipeline outputs
pub struct ReportBuilder;

impl ReportBuilder {
    pub fn build(
        session_id: SessionId,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        profile: &DeclaredProfile,
        scene: &SceneSnapshot,
        verdict: RiskVerdict,
        frames_admitted: u64,
    ) -> VerificationReport {
        let environment_detected = match &scene.environment {
            Some(estimate) => DetectedEnvironment {
                label: Some(estimate.label.clone()),
                confidence: estimate.confidence,
                stability: estimate.stability,
            },
            None => DetectedEnvironment {
                label: None,
                confidence: 0.0,
                stability: 0,
            },
        };

        let detected_objects = scene
            .tallies
            .iter()
            .map(|tally| DetectedObjectSummary {
                label: tally.label.clone(),
                count: tally.count,
                confidence: tally.confidence,
            })
            .collect();

        let RiskVerdict {
            score,
            label,
            contributing,
            low_evidence,
        } = verdict;

        VerificationReport {
            session_id,
            started_at,
            finished_at,
            environment_detected,
            environment_declared: profile.environment.clone(),
            declared_objects: profile.objects.clone(),
            detected_objects,
            mismatches: contributing,
            risk: RiskSummary {
                score,
                verdict: label,
                low_evidence,
            },
            counters: SessionCounters {
                frames_admitted,
                frames_scored: scene.frames_scored,
                frames_unscored: scene.frames_unscored,
            },
        }
    }
}
