//! Frame admission and pacing
//!
//! Pulls raw frames from the video source, drops low-quality samples, caps
//! the admission rate to the configured FPS, and stamps every pulled frame
//! with a monotonic sequence number — including dropped ones, so downstream
//! consumers can see gaps.

use crate::config::SamplerConfig;
use crate::source::VideoSource;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use veriscope_core::{Frame, FrameSeq};

/// Paced, quality-filtered frame admission over a video source
pub struct FrameSampler<S: VideoSource> {
    source: S,
    config: SamplerConfig,
    next_seq: u64,
    admitted: u64,
    last_admitted_at: Option<DateTime<Utc>>,
    exhausted: bool,
}

impl<S: VideoSource> FrameSampler<S> {
    pub fn new(source: S, config: SamplerConfig) -> Self {
        Self {
            source,
            config,
            next_seq: 0,
            admitted: 0,
            last_admitted_at: None,
            exhausted: false,
        }
    }

    /// Next admitted frame.
    ///
    /// Returns `None` once the source ends or errors, or the per-session
    /// frame ceiling is reached. After `None` the sampler stays exhausted;
    /// the session finalizes with whatever was admitted.
    pub async fn next(&mut self) -> Option<Frame> {
        loop {
            if self.exhausted {
                return None;
            }
            if self.admitted >= self.config.max_session_frames {
                info!(
                    admitted = self.admitted,
                    "session frame ceiling reached, stopping admission"
                );
                self.exhausted = true;
                return None;
            }

            let raw = match self.source.next_frame().await {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    info!(
                        seen = self.next_seq,
                        admitted = self.admitted,
                        "video source ended"
                    );
                    self.exhausted = true;
                    return None;
                }
                Err(e) => {
                    warn!("video source error: {}, finalizing with partial data", e);
                    self.exhausted = true;
                    return None;
                }
            };

            // Every pulled frame consumes a sequence number, admitted or not
            let seq = FrameSeq(self.next_seq);
            self.next_seq += 1;

            if raw.quality < self.config.min_quality {
                debug!(%seq, quality = raw.quality, "dropping low-quality frame");
                continue;
            }
            if !self.due(raw.timestamp) {
                debug!(%seq, "dropping frame to hold target FPS");
                continue;
            }

            self.last_admitted_at = Some(raw.timestamp);
            self.admitted += 1;
            return Some(Frame {
                seq,
                timestamp: raw.timestamp,
                quality: raw.quality,
                pixels: raw.pixels,
            });
        }
    }

    /// Frames pulled from the source so far, including dropped ones
    pub fn frames_seen(&self) -> u64 {
        self.next_seq
    }

    /// Frames admitted past quality and pacing filters
    pub fn frames_admitted(&self) -> u64 {
        self.admitted
    }

    /// Pacing is driven by media timestamps, not wall clock, so recorded
    /// sources sample identically to live ones
    fn due(&self, timestamp: DateTime<Utc>) -> bool {
        let min_interval_ms = 1_000i64 / i64::from(self.config.target_fps);
        match self.last_admitted_at {
            None => true,
            Some(prev) => (timestamp - prev).num_milliseconds() >= min_interval_ms,
        }
    }
}
