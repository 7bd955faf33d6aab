//! Dashboard-facing snapshot of the types surface.
//! Prefer importing from this module instead of individual tree nodes when
//! working in presentation layers.

pub use super::annotation::{Cause, PassDiagnosis, PassNote, Symptom};
pub use super::error::{ModelError, Result as ModelResult};
pub use super::ids::{
    BinaryDataId, LocationId, MachineId, OrganizationId, PartId, PassId,
};
pub use super::media::{CaptureMetadata, MediaKind, MediaRecord};
pub use super::pass::{BuildInfo, EXECUTING_STEP_NAME, Pass, Step};
