//! Video source seam
//!
//! The call transport (live WebRTC leg, recorded-file decoder) lives outside
//! this crate; the pipeline only needs an opaque handle it can pull raw
//! frames from, with end-of-stream and failure kept distinguishable.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use veriscope_core::{Error, Result};

/// One raw sample pulled from a video source, before admission
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Media timestamp of the sample
    pub timestamp: DateTime<Utc>,
    /// Quality score in [0, 1] supplied by the capture layer (blur/exposure)
    pub quality: f32,
    /// Opaque pixel payload handed through to the perception backend
    pub pixels: Bytes,
}

/// Opaque handle yielding raw frames on demand.
///
/// `Ok(None)` signals a clean end of stream; `Err` signals a source failure.
/// Both terminate sampling, but the distinction is logged and the session
/// still finalizes with whatever evidence it has.
#[async_trait]
pub trait VideoSource: Send {
    async fn next_frame(&mut self) -> Result<Option<RawFrame>>;
}

/// In-memory source replaying a fixed frame script.
///
/// Used by tests and examples in place of a live call leg; can be told to
/// fail partway through to exercise the source-error path.
pub struct ScriptedSource {
    frames: VecDeque<RawFrame>,
    fail_after: Option<usize>,
    served: usize,
}

impl ScriptedSource {
    pub fn new(frames: Vec<RawFrame>) -> Self {
        Self {
            frames: frames.into(),
            fail_after: None,
            served: 0,
        }
    }

    /// Build a script of evenly spaced frames at the given quality
    pub fn evenly_spaced(count: usize, interval_ms: i64, quality: f32) -> Self {
        let start = Utc::now();
        let frames = (0..count)
            .map(|i| RawFrame {
                timestamp: start + Duration::milliseconds(interval_ms * i as i64),
                quality,
                pixels: Bytes::new(),
            })
            .collect();
        Self::new(frames)
    }

    /// Fail with a source error after serving `n` frames
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }
}

#[async_trait]
impl VideoSource for ScriptedSource {
    async fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        if let Some(limit) = self.fail_after {
            if self.served >= limit {
                return Err(Error::Source("scripted source failure".to_string()));
            }
        }
        match self.frames.pop_front() {
            Some(frame) => {
                self.served += 1;
                Ok(Some(frame))
            }
            None => Ok(None),
        }
    }
}
