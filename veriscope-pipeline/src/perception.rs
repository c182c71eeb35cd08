//! External model calls normalized into the detection contract
//!
//! The environment classifier and object detector are black boxes behind
//! [`PerceptionBackend`]; the adapter owns the call policy: per-call timeout,
//! a single retry with backoff, and the unscored-frame fallback so that one
//! bad frame can never abort a verification session.

use crate::config::PerceptionConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use veriscope_core::{Detection, DetectionKind, Error, Frame, FrameSeq, Result};

/// Black-box perception capability: frame in, labeled detections out.
///
/// May return zero detections; must not block past the adapter's timeout.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PerceptionBackend: Send + Sync {
    async fn classify(&self, frame: &Frame) -> Result<Vec<Detection>>;
}

/// Per-frame model output after the adapter's call policy was applied
#[derive(Debug, Clone)]
pub struct FrameObservation {
    pub seq: FrameSeq,
    /// `None` means the frame was left unscored after timeout/retry; it
    /// contributes no detections, only a visible evidence gap
    pub detections: Option<Vec<Detection>>,
}

impl FrameObservation {
    pub fn is_scored(&self) -> bool {
        self.detections.is_some()
    }
}

/// Wraps backend calls with timeout and a single backed-off retry
pub struct PerceptionAdapter {
    backend: Arc<dyn PerceptionBackend>,
    config: PerceptionConfig,
}

impl PerceptionAdapter {
    pub fn new(backend: Arc<dyn PerceptionBackend>, config: PerceptionConfig) -> Self {
        Self { backend, config }
    }

    /// Classify one frame.
    ///
    /// A frame that fails both attempts yields an unscored observation,
    /// never an error: degraded evidence is surfaced downstream as reduced
    /// confidence instead of a session failure.
    pub async fn observe(&self, frame: Frame) -> FrameObservation {
        let seq = frame.seq;
        match self.attempt(&frame).await {
            Ok(detections) => FrameObservation {
                seq,
                detections: Some(sanitize(detections)),
            },
            Err(first) => {
                debug!(%seq, "inference attempt failed: {}, retrying once", first);
                tokio::time::sleep(Duration::from_millis(self.config.retry_backoff_ms)).await;
                match self.attempt(&frame).await {
                    Ok(detections) => FrameObservation {
                        seq,
                        detections: Some(sanitize(detections)),
                    },
                    Err(second) => {
                        warn!(%seq, "frame left unscored: {}", second);
                        FrameObservation {
                            seq,
                            detections: None,
                        }
                    }
                }
            }
        }
    }

    async fn attempt(&self, frame: &Frame) -> Result<Vec<Detection>> {
        let timeout = Duration::from_millis(self.config.call_timeout_ms);
        match tokio::time::timeout(timeout, self.backend.classify(frame)).await {
            Ok(result) => result,
            Err(_) => Err(Error::InferenceTimeout {
                frame: frame.seq.0,
                elapsed_ms: self.config.call_timeout_ms,
            }),
        }
    }
}

/// Drop malformed detections and clamp confidences into [0, 1]
fn sanitize(detections: Vec<Detection>) -> Vec<Detection> {
    let before = detections.len();
    let cleaned: Vec<Detection> = detections
        .into_iter()
        .filter(|d| !d.label.trim().is_empty() && d.confidence.is_finite())
        .map(|mut d| {
            d.confidence = d.confidence.clamp(0.0, 1.0);
            d
        })
        .collect();
    if cleaned.len() < before {
        warn!(dropped = before - cleaned.len(), "dropped malformed detections");
    }
    cleaned
}

/// Maps environment labels to the object labels that indicate them.
///
/// Restores the rule table the original deployment used when no dedicated
/// environment classifier is available: the environment is inferred from
/// which indicator objects the detector sees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentRules {
    rules: BTreeMap<String, Vec<String>>,
}

impl Default for EnvironmentRules {
    fn default() -> Self {
        let mut rules = BTreeMap::new();
        rules.insert(
            "Home".to_string(),
            ["bed", "sofa", "tv", "fridge", "microwave", "chair", "dining_table"]
                .map(String::from)
                .to_vec(),
        );
        rules.insert(
            "Office".to_string(),
            ["desk", "computer", "whiteboard", "chair", "meeting_table"]
                .map(String::from)
                .to_vec(),
        );
        rules.insert(
            "Shop".to_string(),
            [
                "shelves",
                "counter_table",
                "bottled_products",
                "packaged_boxes",
                "fridge",
            ]
            .map(String::from)
            .to_vec(),
        );
        Self { rules }
    }
}

impl EnvironmentRules {
    pub fn new(rules: BTreeMap<String, Vec<String>>) -> Self {
        Self { rules }
    }

    /// Infer an environment detection from object detections.
    ///
    /// Each environment is scored by the total confidence of its matched
    /// indicator objects; the best-scoring environment wins, ties broken by
    /// label order. The synthesized confidence is the mean confidence of the
    /// matched indicators.
    pub fn infer(&self, detections: &[Detection]) -> Option<Detection> {
        let mut best: Option<(&str, f32, f32)> = None; // label, mass, mean

        for (env, indicators) in &self.rules {
            let matched: Vec<f32> = detections
                .iter()
                .filter(|d| {
                    d.kind == DetectionKind::Object
                        && indicators
                            .iter()
                            .any(|i| i.eq_ignore_ascii_case(&d.label))
                })
                .map(|d| d.confidence)
                .collect();
            if matched.is_empty() {
                continue;
            }
            let mass: f32 = matched.iter().sum();
            let mean = mass / matched.len() as f32;
            // strict greater-than keeps the lexically first environment on ties
            if best.map_or(true, |(_, best_mass, _)| mass > best_mass) {
                best = Some((env, mass, mean));
            }
        }

        best.map(|(label, _, mean)| Detection::environment(label, mean.clamp(0.0, 1.0)))
    }
}

/// Decorates an object-only backend with rule-based environment evidence.
///
/// If the inner backend already produced environment detections the rules
/// stay out of the way.
pub struct RuleAugmentedBackend<B> {
    inner: B,
    rules: EnvironmentRules,
}

impl<B> RuleAugmentedBackend<B> {
    pub fn new(inner: B, rules: EnvironmentRules) -> Self {
        Self { inner, rules }
    }
}

#[async_trait]
impl<B: PerceptionBackend> PerceptionBackend for RuleAugmentedBackend<B> {
    async fn classify(&self, frame: &Frame) -> Result<Vec<Detection>> {
        let mut detections = self.inner.classify(frame).await?;
        let has_environment = detections
            .iter()
            .any(|d| d.kind == DetectionKind::Environment);
        if !has_environment {
            if let Some(env) = self.rules.infer(&detections) {
                debug!(label = %env.label, "synthesized environment from object rules");
                detections.push(env);
            }
        }
        Ok(detections)
    }
}
