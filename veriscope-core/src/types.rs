//! Shared data model for the verification pipeline

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a verification session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic frame sequence number within a session.
///
/// Sequence numbers advance for every frame pulled from the source, including
/// frames dropped before admission, so gaps are detectable downstream.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct FrameSeq(pub u64);

impl fmt::Display for FrameSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Axis-aligned bounding region in frame coordinates (x, y, width, height)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Region {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Intersection-over-union overlap with another region.
    ///
    /// Returns 0.0 for degenerate inputs (NaN, infinite, negative extents)
    /// so a malformed model box can never match anything.
    pub fn overlap_ratio(&self, other: &Region) -> f32 {
        let a = [self.x, self.y, self.width, self.height];
        let b = [other.x, other.y, other.width, other.height];
        if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
            return 0.0;
        }
        if self.width < 0.0 || self.height < 0.0 || other.width < 0.0 || other.height < 0.0 {
            return 0.0;
        }

        let ax_max = self.x + self.width;
        let ay_max = self.y + self.height;
        let bx_max = other.x + other.width;
        let by_max = other.y + other.height;

        let inter_x_min = self.x.max(other.x);
        let inter_y_min = self.y.max(other.y);
        let inter_x_max = ax_max.min(bx_max);
        let inter_y_max = ay_max.min(by_max);

        if inter_x_max <= inter_x_min || inter_y_max <= inter_y_min {
            return 0.0;
        }

        let inter_area = (inter_x_max - inter_x_min) * (inter_y_max - inter_y_min);
        let union_area = self.width * self.height + other.width * other.height - inter_area;
        if union_area <= 0.0 || !union_area.is_finite() {
            return 0.0;
        }

        let iou = inter_area / union_area;
        if iou.is_finite() && (0.0..=1.0).contains(&iou) {
            iou
        } else {
            0.0
        }
    }
}

/// What kind of evidence a detection carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionKind {
    Environment,
    Object,
}

/// One raw model output for one frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub kind: DetectionKind,
    pub label: String,
    pub confidence: f32,
    /// Used only for cross-frame identity matching of object detections
    pub region: Option<Region>,
}

impl Detection {
    pub fn environment(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            kind: DetectionKind::Environment,
            label: label.into(),
            confidence,
            region: None,
        }
    }

    pub fn object(label: impl Into<String>, confidence: f32, region: Option<Region>) -> Self {
        Self {
            kind: DetectionKind::Object,
            label: label.into(),
            confidence,
            region,
        }
    }
}

/// One admitted video sample.
///
/// Pixel data is an opaque handle passed through to the perception backend
/// and discarded after inference; the pipeline never inspects it.
#[derive(Debug, Clone)]
pub struct Frame {
    pub seq: FrameSeq,
    pub timestamp: DateTime<Utc>,
    pub quality: f32,
    pub pixels: Bytes,
}

/// Stabilized count and confidence for one object label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectTally {
    pub label: String,
    pub count: u32,
    pub confidence: f32,
    pub first_seen: FrameSeq,
    pub last_seen: FrameSeq,
}

/// The session's current best environment classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentEstimate {
    pub label: String,
    pub confidence: f32,
    /// Consecutive scored frames that carried evidence for this label
    pub stability: u32,
}

/// Kind of declared-vs-detected discrepancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    TypeMismatch,
    CountMismatch,
    UnexpectedAbsence,
    UnexpectedPresence,
}

impl fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchKind::TypeMismatch => write!(f, "type_mismatch"),
            MismatchKind::CountMismatch => write!(f, "count_mismatch"),
            MismatchKind::UnexpectedAbsence => write!(f, "unexpected_absence"),
            MismatchKind::UnexpectedPresence => write!(f, "unexpected_presence"),
        }
    }
}

/// One discrepancy between declared and detected state.
///
/// `declared`/`detected` hold a label for environment mismatches and a count
/// for object mismatches, so they are JSON values rather than one fixed type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MismatchRecord {
    /// "environment" or the object label the record concerns
    pub field: String,
    pub declared: serde_json::Value,
    pub detected: serde_json::Value,
    pub kind: MismatchKind,
    pub severity: f32,
}

/// Verdict label handed to the human agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerdictLabel {
    Pass,
    #[serde(rename = "Review Needed")]
    ReviewNeeded,
}

impl fmt::Display for VerdictLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerdictLabel::Pass => write!(f, "Pass"),
            VerdictLabel::ReviewNeeded => write!(f, "Review Needed"),
        }
    }
}

/// Final decision for a session, produced exactly once
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskVerdict {
    pub score: f32,
    pub label: VerdictLabel,
    /// Contributing mismatch records, ordered by severity descending
    pub contributing: Vec<MismatchRecord>,
    /// Set when the window never reached the configured evidence minimum
    pub low_evidence: bool,
}
