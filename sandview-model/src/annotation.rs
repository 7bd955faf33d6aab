use chrono::{DateTime, Utc};

use crate::ids::PassId;

/// Free-form operator note attached to a pass. At most one note exists per
/// pass; saving replaces, it never appends.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PassNote {
    pub pass_id: PassId,
    pub note_text: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

/// What went wrong during a failed pass, as observed by the operator.
///
/// The set is open: values written by newer tools round-trip through
/// [`Symptom::Other`] instead of being rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symptom {
    PStop,
    UserCancelled,
    MotionPlanningFailed,
    CameraSensorIssue,
    ArmConnectionLost,
    CollisionDetected,
    JointOutOfBounds,
    MeshGenerationFailed,
    EStopTriggered,
    SystemError,
    Other(String),
}

impl Symptom {
    /// Known symptoms in the order the dashboard offers them.
    pub fn options() -> &'static [Symptom] {
        use Symptom::*;
        &[
            PStop,
            UserCancelled,
            MotionPlanningFailed,
            CameraSensorIssue,
            ArmConnectionLost,
            CollisionDetected,
            JointOutOfBounds,
            MeshGenerationFailed,
            EStopTriggered,
            SystemError,
        ]
    }

    pub fn label(&self) -> &str {
        match self {
            Symptom::PStop => "P-Stop",
            Symptom::UserCancelled => "User Cancelled",
            Symptom::MotionPlanningFailed => "Motion Planning Failed",
            Symptom::CameraSensorIssue => "Camera/Sensor Issue",
            Symptom::ArmConnectionLost => "Arm Connection Lost",
            Symptom::CollisionDetected => "Collision Detected",
            Symptom::JointOutOfBounds => "Joint Out of Bounds",
            Symptom::MeshGenerationFailed => "Mesh Generation Failed",
            Symptom::EStopTriggered => "E-Stop Triggered",
            Symptom::SystemError => "System Error",
            Symptom::Other(label) => label,
        }
    }

    pub fn from_label(label: &str) -> Self {
        for known in Self::options() {
            if known.label() == label {
                return known.clone();
            }
        }
        Symptom::Other(label.to_string())
    }
}

impl std::fmt::Display for Symptom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Symptom {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.label())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Symptom {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let label = String::deserialize(deserializer)?;
        Ok(Symptom::from_label(&label))
    }
}

/// Why the failure happened, as diagnosed after the fact.
///
/// Open set, same round-trip rule as [`Symptom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Cause {
    IntentionalStop,
    PartIssue,
    CableManagement,
    HoseManagement,
    NetworkIssue,
    VoltageIssue,
    ConfigurationError,
    SoftwareBug,
    TrajectoryGeneration,
    InaccurateMesh,
    HoleInMesh,
    LunchEndOfDay,
    Unknown,
    Other(String),
}

impl Cause {
    /// Known causes in the order the dashboard offers them.
    pub fn options() -> &'static [Cause] {
        use Cause::*;
        &[
            IntentionalStop,
            PartIssue,
            CableManagement,
            HoseManagement,
            NetworkIssue,
            VoltageIssue,
            ConfigurationError,
            SoftwareBug,
            TrajectoryGeneration,
            InaccurateMesh,
            HoleInMesh,
            LunchEndOfDay,
            Unknown,
        ]
    }

    pub fn label(&self) -> &str {
        match self {
            Cause::IntentionalStop => "Intentional Stop",
            Cause::PartIssue => "Part Issue",
            Cause::CableManagement => "Cable Management",
            Cause::HoseManagement => "Hose Management",
            Cause::NetworkIssue => "Network Issue",
            Cause::VoltageIssue => "Voltage Issue",
            Cause::ConfigurationError => "Configuration Error",
            Cause::SoftwareBug => "Software Bug",
            Cause::TrajectoryGeneration => "Trajectory Generation",
            Cause::InaccurateMesh => "Inaccurate mesh",
            Cause::HoleInMesh => "Hole in mesh",
            Cause::LunchEndOfDay => "Lunch/EOD",
            Cause::Unknown => "Unknown",
            Cause::Other(label) => label,
        }
    }

    pub fn from_label(label: &str) -> Self {
        for known in Self::options() {
            if known.label() == label {
                return known.clone();
            }
        }
        Cause::Other(label.to_string())
    }
}

impl std::fmt::Display for Cause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Cause {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.label())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Cause {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let label = String::deserialize(deserializer)?;
        Ok(Cause::from_label(&label))
    }
}

/// Operator diagnosis of a failed pass. At most one per pass; a diagnosis
/// with neither symptom nor cause must not exist at all (delete-on-empty).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PassDiagnosis {
    pub pass_id: PassId,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub symptom: Option<Symptom>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub cause: Option<Cause>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub jira_ticket_url: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl PassDiagnosis {
    /// A diagnosis carrying neither symptom nor cause is empty and should
    /// be deleted rather than stored.
    pub fn is_empty(&self) -> bool {
        self.symptom.is_none() && self.cause.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_labels_round_trip() {
        for symptom in Symptom::options() {
            assert_eq!(&Symptom::from_label(symptom.label()), symptom);
        }
        for cause in Cause::options() {
            assert_eq!(&Cause::from_label(cause.label()), cause);
        }
    }

    #[test]
    fn unknown_labels_are_preserved() {
        let symptom = Symptom::from_label("Vacuum Failure");
        assert_eq!(symptom, Symptom::Other("Vacuum Failure".to_string()));
        assert_eq!(symptom.label(), "Vacuum Failure");
    }

    #[test]
    fn empty_diagnosis_detection() {
        let diagnosis = PassDiagnosis {
            pass_id: PassId::new("p1"),
            symptom: None,
            cause: None,
            jira_ticket_url: Some("https://issues.example.com/SAND-12".into()),
            updated_at: Utc::now(),
            updated_by: "sandview-dashboard".to_string(),
        };
        assert!(diagnosis.is_empty());
    }
}
