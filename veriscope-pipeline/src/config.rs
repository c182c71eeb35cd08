//! Configuration for the verification pipeline
//!
//! Every numeric threshold in the pipeline lives here rather than in code:
//! window sizes, hysteresis margins, tolerance bands and severity weights
//! are calibration data, expected to be tuned against field recordings.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use veriscope_core::MismatchKind;

/// Frame admission configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Caps admission rate to reduce redundant inference load
    pub target_fps: u32,
    /// Frames below this quality score are dropped without being scored
    pub min_quality: f32,
    /// Hard ceiling on admitted frames per session
    pub max_session_frames: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            target_fps: 4,
            min_quality: 0.35,
            max_session_frames: 1800,
        }
    }
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.target_fps == 0 || self.target_fps > 120 {
            return Err("Target FPS must be between 1 and 120".to_string());
        }
        if !(0.0..=1.0).contains(&self.min_quality) {
            return Err("Minimum quality must be within [0, 1]".to_string());
        }
        if self.max_session_frames == 0 {
            return Err("Max session frames must be non-zero".to_string());
        }
        Ok(())
    }
}

/// External model call configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerceptionConfig {
    /// Per-call timeout for the external classifier/detector
    pub call_timeout_ms: u64,
    /// Pause before the single retry after a failed call
    pub retry_backoff_ms: u64,
    /// Frames dispatched to the backend concurrently; results are re-ordered
    /// into frame-sequence order before aggregation
    pub max_in_flight: usize,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: 800,
            retry_backoff_ms: 150,
            max_in_flight: 4,
        }
    }
}

impl PerceptionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.call_timeout_ms == 0 {
            return Err("Call timeout must be non-zero".to_string());
        }
        if self.max_in_flight == 0 || self.max_in_flight > 64 {
            return Err("Max in-flight calls must be between 1 and 64".to_string());
        }
        Ok(())
    }
}

/// Sliding-window fusion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Scored frames held in the sliding window; smaller reacts faster but
    /// flickers more
    pub window_frames: usize,
    /// Minimum vote advantage a challenger environment label needs over the
    /// current one before the estimate switches
    pub hysteresis_margin: f32,
    /// Region overlap at or above which two detections of the same label in
    /// nearby frames are treated as the same physical instance
    pub overlap_threshold: f32,
    /// Maximum frame-sequence gap across which instance matching is
    /// attempted; bridges unscored frames between two sightings
    pub match_gap_frames: u64,
    /// An instance not re-matched within this many frames is dropped from
    /// the tally
    pub instance_ttl_frames: u64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            window_frames: 30,
            hysteresis_margin: 0.15,
            overlap_threshold: 0.45,
            match_gap_frames: 3,
            instance_ttl_frames: 12,
        }
    }
}

impl FusionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.window_frames == 0 {
            return Err("Window size must be non-zero".to_string());
        }
        if !(0.0..=1.0).contains(&self.hysteresis_margin) {
            return Err("Hysteresis margin must be within [0, 1]".to_string());
        }
        if !(0.0..=1.0).contains(&self.overlap_threshold) || self.overlap_threshold == 0.0 {
            return Err("Overlap threshold must be within (0, 1]".to_string());
        }
        if self.instance_ttl_frames == 0 {
            return Err("Instance TTL must be non-zero".to_string());
        }
        Ok(())
    }
}

/// Declared-vs-detected comparison tolerances
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparatorConfig {
    /// Count deltas at or below this are always tolerated
    pub count_tolerance_abs: u32,
    /// Count deltas within this fraction of the declared count are tolerated
    pub count_tolerance_rel: f32,
    /// Undeclared labels need at least this confidence to be reported present
    pub presence_min_confidence: f32,
    /// Undeclared labels need at least this count to be reported present
    pub presence_min_count: u32,
    /// Records below this severity are suppressed as noise
    pub severity_floor: f32,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            count_tolerance_abs: 0,
            count_tolerance_rel: 0.2,
            presence_min_confidence: 0.6,
            presence_min_count: 1,
            severity_floor: 0.05,
        }
    }
}

impl ComparatorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.count_tolerance_rel) {
            return Err("Relative count tolerance must be within [0, 1]".to_string());
        }
        if !(0.0..=1.0).contains(&self.presence_min_confidence) {
            return Err("Presence confidence threshold must be within [0, 1]".to_string());
        }
        if self.presence_min_count == 0 {
            return Err("Presence count threshold must be non-zero".to_string());
        }
        if !(0.0..=1.0).contains(&self.severity_floor) {
            return Err("Severity floor must be within [0, 1]".to_string());
        }
        Ok(())
    }
}

/// Risk weighting and decision thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Per-kind severity weights; the weighted severity sum is the risk score
    pub kind_weights: HashMap<MismatchKind, f32>,
    /// Aggregate score above this forces a Review Needed verdict
    pub review_threshold: f32,
    /// A type mismatch whose severity reaches this is critical on its own
    pub critical_confidence: f32,
    /// Unexpected presence of these labels is weighted up (business assets)
    pub business_asset_labels: Vec<String>,
    pub business_asset_multiplier: f32,
    /// Sessions with fewer scored frames than this are flagged low-evidence
    pub min_scored_frames: u64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            kind_weights: HashMap::from([
                (MismatchKind::TypeMismatch, 1.0),
                (MismatchKind::CountMismatch, 0.4),
                (MismatchKind::UnexpectedAbsence, 0.6),
                (MismatchKind::UnexpectedPresence, 0.7),
            ]),
            review_threshold: 0.75,
            critical_confidence: 0.8,
            business_asset_labels: vec![
                "shelves".to_string(),
                "counter_table".to_string(),
                "bottled_products".to_string(),
                "packaged_boxes".to_string(),
                "boxes".to_string(),
            ],
            business_asset_multiplier: 1.5,
            min_scored_frames: 3,
        }
    }
}

impl RiskConfig {
    /// Weight for a record kind; unknown kinds fall back to neutral 1.0
    pub fn weight_for(&self, kind: MismatchKind) -> f32 {
        self.kind_weights.get(&kind).copied().unwrap_or(1.0)
    }

    pub fn is_business_asset(&self, label: &str) -> bool {
        self.business_asset_labels
            .iter()
            .any(|l| l.eq_ignore_ascii_case(label))
    }

    pub fn validate(&self) -> Result<(), String> {
        for (kind, weight) in &self.kind_weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(format!("Weight for {} must be finite and non-negative", kind));
            }
        }
        if !self.review_threshold.is_finite() || self.review_threshold <= 0.0 {
            return Err("Review threshold must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.critical_confidence) {
            return Err("Critical confidence cutoff must be within [0, 1]".to_string());
        }
        if !self.business_asset_multiplier.is_finite() || self.business_asset_multiplier < 1.0 {
            return Err("Business asset multiplier must be at least 1.0".to_string());
        }
        Ok(())
    }
}

/// Top-level pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub sampler: SamplerConfig,
    pub perception: PerceptionConfig,
    pub fusion: FusionConfig,
    pub comparator: ComparatorConfig,
    pub risk: RiskConfig,
    /// After a stop request, in-flight inference is drained for at most this
    /// long before being abandoned
    pub drain_grace_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sampler: SamplerConfig::default(),
            perception: PerceptionConfig::default(),
            fusion: FusionConfig::default(),
            comparator: ComparatorConfig::default(),
            risk: RiskConfig::default(),
            drain_grace_ms: 2_000,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.sampler
            .validate()
            .map_err(|e| format!("sampler: {}", e))?;
        self.perception
            .validate()
            .map_err(|e| format!("perception: {}", e))?;
        self.fusion
            .validate()
            .map_err(|e| format!("fusion: {}", e))?;
        self.comparator
            .validate()
            .map_err(|e| format!("comparator: {}", e))?;
        self.risk.validate().map_err(|e| format!("risk: {}", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_sampler_rejects_zero_fps() {
        let mut config = SamplerConfig::default();
        config.target_fps = 0;
        assert!(config.validate().is_err());
        config.target_fps = 121;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sampler_rejects_bad_quality_floor() {
        let mut config = SamplerConfig::default();
        config.min_quality = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_perception_rejects_zero_timeout() {
        let mut config = PerceptionConfig::default();
        config.call_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_perception_rejects_unbounded_concurrency() {
        let mut config = PerceptionConfig::default();
        config.max_in_flight = 65;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fusion_rejects_zero_window() {
        let mut config = FusionConfig::default();
        config.window_frames = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fusion_rejects_zero_overlap() {
        let mut config = FusionConfig::default();
        config.overlap_threshold = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_risk_rejects_negative_weight() {
        let mut config = RiskConfig::default();
        config
            .kind_weights
            .insert(MismatchKind::CountMismatch, -1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_risk_weight_lookup_falls_back_to_neutral() {
        let mut config = RiskConfig::default();
        config.kind_weights.clear();
        assert_eq!(config.weight_for(MismatchKind::TypeMismatch), 1.0);
    }

    #[test]
    fn test_business_asset_lookup_is_case_insensitive() {
        let config = RiskConfig::default();
        assert!(config.is_business_asset("Shelves"));
        assert!(!config.is_business_asset("sofa"));
    }

    #[test]
    fn test_pipeline_validation_names_failing_section() {
        let mut config = PipelineConfig::default();
        config.fusion.window_frames = 0;
        let err = config.validate().unwrap_err();
        assert!(err.contains("fusion"));
    }
}
