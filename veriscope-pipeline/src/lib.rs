//! veriscope-pipeline: real-time perception-fusion and reconciliation
//!
//! Turns a stream of video-call frames and noisy per-frame model outputs
//! into one stable, auditable verification report: frame sampling under
//! backpressure, temporal aggregation into a stabilized scene estimate,
//! declared-vs-detected comparison, and risk-scored Pass / Review verdicts.
//!
//! The video transport and the perception models themselves are external
//! collaborators behind the [`source::VideoSource`] and
//! [`perception::PerceptionBackend`] traits.

pub mod compare;
pub mod config;
pub mod fusion;
pub mod perception;
pub mod report;
pub mod risk;
pub mod sampler;
pub mod session;
pub mod source;

pub use config::PipelineConfig;
pub use perception::{PerceptionAdapter, PerceptionBackend};
pub use report::VerificationReport;
pub use session::{SessionControl, SessionMonitor, VerificationSession};
pub use source::VideoSource;
