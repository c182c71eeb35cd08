//! Per-call verification session orchestration
//!
//! One session per live call, fully isolated: sampler task → bounded frame
//! channel (backpressure) → concurrently dispatched inference re-ordered to
//! frame-sequence order → single-owner aggregator fold. Comparison, scoring
//! and report assembly run against immutable snapshots, so live previews
//! never race window mutation. However the call ends — cleanly, by error,
//! or by cancellation — the session finalizes into exactly one report.

use crate::compare::Comparator;
use crate::config::PipelineConfig;
use crate::fusion::TemporalAggregator;
use crate::perception::{PerceptionAdapter, PerceptionBackend};
use crate::report::{ReportBuilder, VerificationReport};
use crate::risk::RiskEngine;
use crate::sampler::FrameSampler;
use crate::source::VideoSource;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use veriscope_core::{DeclaredProfile, Error, Result, SessionId, VerdictLabel};

/// Frames buffered toward inference; bounds memory when the backend is slow
const FRAME_BUFFER_SIZE: usize = 16;

/// Cancellation handle for a running session
#[derive(Clone)]
pub struct SessionControl {
    running: Arc<RwLock<bool>>,
}

impl SessionControl {
    /// Stop admitting frames; in-flight inference is drained for the
    /// configured grace period, then the session finalizes
    pub fn stop(&self) {
        info!("session stop requested");
        *self.running.write() = false;
    }

    pub fn is_stopped(&self) -> bool {
        !*self.running.read()
    }
}

/// Snapshot-based live preview of a running session
#[derive(Clone)]
pub struct SessionMonitor {
    id: SessionId,
    started_at: DateTime<Utc>,
    profile: DeclaredProfile,
    config: PipelineConfig,
    aggregator: Arc<RwLock<TemporalAggregator>>,
}

impl SessionMonitor {
    /// Compare, score and assemble a report against the current window
    /// state. Safe to call at any time; sees only stabilized snapshots.
    pub fn preview(&self) -> VerificationReport {
        let scene = self.aggregator.read().snapshot();
        let records = Comparator::new(self.config.comparator.clone()).compare(&self.profile, &scene);
        let verdict =
            RiskEngine::new(self.config.risk.clone()).decide(records, scene.frames_scored);
        let frames_admitted = scene.frames_scored + scene.frames_unscored;
        ReportBuilder::build(
            self.id,
            self.started_at,
            Utc::now(),
            &self.profile,
            &scene,
            verdict,
            frames_admitted,
        )
    }
}

/// One verification attempt over one call
pub struct VerificationSession {
    id: SessionId,
    profile: DeclaredProfile,
    config: PipelineConfig,
    started_at: DateTime<Utc>,
    running: Arc<RwLock<bool>>,
    aggregator: Arc<RwLock<TemporalAggregator>>,
    verdict: Option<VerdictLabel>,
}

impl VerificationSession {
    /// Create a session, rejecting malformed configuration or profile
    /// before any processing begins.
    pub fn new(profile: DeclaredProfile, config: PipelineConfig) -> Result<Self> {
        config.validate().map_err(Error::Configuration)?;
        profile.validate().map_err(Error::Configuration)?;
        Ok(Self {
            id: SessionId::new(),
            aggregator: Arc::new(RwLock::new(TemporalAggregator::new(&config.fusion))),
            profile,
            config,
            started_at: Utc::now(),
            running: Arc::new(RwLock::new(true)),
            verdict: None,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Terminal verdict; `None` until the session has finalized
    pub fn verdict(&self) -> Option<VerdictLabel> {
        self.verdict
    }

    pub fn control(&self) -> SessionControl {
        SessionControl {
            running: self.running.clone(),
        }
    }

    pub fn monitor(&self) -> SessionMonitor {
        SessionMonitor {
            id: self.id,
            started_at: self.started_at,
            profile: self.profile.clone(),
            config: self.config.clone(),
            aggregator: self.aggregator.clone(),
        }
    }

    /// Drive the pipeline to completion and produce the final report.
    ///
    /// Always returns a report: source exhaustion, source errors, model
    /// failures and cancellation all finalize with whatever aggregate state
    /// exists, surfaced through the evidence counters and the low-evidence
    /// flag.
    pub async fn run<S>(
        &mut self,
        source: S,
        backend: Arc<dyn PerceptionBackend>,
    ) -> VerificationReport
    where
        S: VideoSource + 'static,
    {
        info!(session = %self.id, "verification session started");

        let (frame_tx, frame_rx) = mpsc::channel(FRAME_BUFFER_SIZE);
        let running = self.running.clone();
        let sampler_config = self.config.sampler.clone();

        let sampler_task = tokio::spawn(async move {
            let mut sampler = FrameSampler::new(source, sampler_config);
            while *running.read() {
                match sampler.next().await {
                    // send() suspends while the buffer is full, so a slow
                    // backend throttles admission instead of growing memory
                    Some(frame) => {
                        if frame_tx.send(frame).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            sampler.frames_admitted()
        });

        let adapter = Arc::new(PerceptionAdapter::new(
            backend,
            self.config.perception.clone(),
        ));
        // independent frames are classified concurrently; buffered() hands
        // results back in frame-sequence order, which the window logic needs
        let mut observations = ReceiverStream::new(frame_rx)
            .map(|frame| {
                let adapter = adapter.clone();
                async move { adapter.observe(frame).await }
            })
            .buffered(self.config.perception.max_in_flight);

        let grace = Duration::from_millis(self.config.drain_grace_ms);
        loop {
            let stopped = !*self.running.read();
            let next = if stopped {
                match tokio::time::timeout(grace, observations.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!(
                            session = %self.id,
                            "drain grace expired, abandoning in-flight inference"
                        );
                        break;
                    }
                }
            } else {
                observations.next().await
            };
            match next {
                Some(observation) => self.aggregator.write().observe(&observation),
                None => break,
            }
        }
        drop(observations);

        *self.running.write() = false;
        let frames_admitted = match sampler_task.await {
            Ok(admitted) => admitted,
            Err(e) => {
                warn!(session = %self.id, "sampler task join error: {}", e);
                0
            }
        };

        let scene = self.aggregator.read().snapshot();
        let records =
            Comparator::new(self.config.comparator.clone()).compare(&self.profile, &scene);
        let verdict =
            RiskEngine::new(self.config.risk.clone()).decide(records, scene.frames_scored);
        self.verdict = Some(verdict.label);

        let report = ReportBuilder::build(
            self.id,
            self.started_at,
            Utc::now(),
            &self.profile,
            &scene,
            verdict,
            frames_admitted,
        );
        info!(
            session = %self.id,
            verdict = %report.risk.verdict,
            score = report.risk.score,
            frames_admitted,
            "verification session finalized"
        );
        report
    }
}
