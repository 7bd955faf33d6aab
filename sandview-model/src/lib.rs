//! Core data model definitions shared across Sandview crates.
#![allow(missing_docs)]

pub mod annotation;
pub mod error;
pub mod ids;
pub mod media;
pub mod pass;
pub mod prelude;

// Intentionally curated re-exports for downstream consumers.
pub use annotation::{Cause, PassDiagnosis, PassNote, Symptom};
pub use error::{ModelError, Result as ModelResult};
pub use ids::{
    BinaryDataId, LocationId, MachineId, OrganizationId, PartId, PassId,
};
pub use media::{CaptureMetadata, MediaKind, MediaRecord};
pub use pass::{BuildInfo, Pass, Step};
