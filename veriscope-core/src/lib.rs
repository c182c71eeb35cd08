//! veriscope-core: shared data model for the Veriscope verification pipeline
//!
//! Holds the types that cross component boundaries (frames, detections,
//! aggregated estimates, mismatch records, verdicts), the declared-profile
//! intake contract, and the workspace error taxonomy.

pub mod error;
pub mod profile;
pub mod types;

pub use error::{Error, Result};
pub use profile::DeclaredProfile;
pub use types::{
    Detection, DetectionKind, EnvironmentEstimate, Frame, FrameSeq, MismatchKind, MismatchRecord,
    ObjectTally, Region, RiskVerdict, SessionId, VerdictLabel,
};
