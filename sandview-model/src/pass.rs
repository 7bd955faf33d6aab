use chrono::{DateTime, Duration, Utc};

use crate::ids::PassId;

/// Step name that counts toward execution-time aggregates.
///
/// Matched case-insensitively; every other step name is bucketed as
/// overhead (planning, imaging, homing, ...).
pub const EXECUTING_STEP_NAME: &str = "executing";

/// One phase within a sanding pass.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Step {
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Back-reference to the owning pass.
    pub pass_id: PassId,
}

impl Step {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whether this step is the machine actually sanding, as opposed to
    /// planning/imaging overhead.
    pub fn is_executing(&self) -> bool {
        self.name.eq_ignore_ascii_case(EXECUTING_STEP_NAME)
    }

    /// Whether a timestamp falls inside this step, inclusive on both ends.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}

/// Version stamp the machine reports with each pass summary.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BuildInfo {
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub version: Option<String>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub git_revision: Option<String>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub date_compiled: Option<String>,
}

/// One complete sanding operation run.
///
/// Constructed once per fetched tabular record and immutable afterwards,
/// except for [`Pass::blue_point_diff_percent`] which is filled in by a
/// second pass over the fully assembled, newest-first list (each pass is
/// compared against the chronologically previous one).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pass {
    pub pass_id: PassId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Steps in chronological order.
    pub steps: Vec<Step>,
    pub success: bool,
    pub err_string: Option<String>,
    pub build_info: Option<BuildInfo>,
    /// Count of remaining target ("blue") points reported by the scanner.
    pub blue_point_count: Option<u64>,
    /// Percentage change of `blue_point_count` against the previous pass.
    /// `None` for the oldest pass and whenever either count is missing.
    pub blue_point_diff_percent: Option<f64>,
    pub sanding_distance_mm: Option<f64>,
}

impl Pass {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Total time spent in "executing" steps.
    pub fn execution_time(&self) -> Duration {
        self.steps
            .iter()
            .filter(|step| step.is_executing())
            .fold(Duration::zero(), |sum, step| sum + step.duration())
    }

    /// Time spent in every step that is not "executing".
    pub fn overhead_time(&self) -> Duration {
        self.steps
            .iter()
            .filter(|step| !step.is_executing())
            .fold(Duration::zero(), |sum, step| sum + step.duration())
    }

    /// Whether a timestamp falls inside this pass, inclusive on both ends.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}
