use crate::error::{ModelError, Result};

/// Identifier of one sanding pass, unique within a machine.
///
/// Pass ids are issued by the machine itself and show up both in tabular
/// summary records and as path segments of uploaded file names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct PassId(pub String);

impl PassId {
    pub fn new(id: impl Into<String>) -> Self {
        PassId(id.into())
    }

    pub fn parse(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ModelError::InvalidPass(
                "pass id cannot be empty".to_string(),
            ));
        }
        Ok(PassId(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Whether this id is blank. Blank pass ids never match any file name
    /// segment, so membership checks short-circuit on them.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl AsRef<str> for PassId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PassId {
    fn from(id: &str) -> Self {
        PassId(id.to_string())
    }
}

impl From<String> for PassId {
    fn from(id: String) -> Self {
        PassId(id)
    }
}

impl std::fmt::Display for PassId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Platform-assigned identifier of one stored binary artifact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct BinaryDataId(pub String);

impl BinaryDataId {
    pub fn new(id: impl Into<String>) -> Self {
        BinaryDataId(id.into())
    }

    pub fn parse(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ModelError::InvalidMedia(
                "binary data id cannot be empty".to_string(),
            ));
        }
        Ok(BinaryDataId(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for BinaryDataId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BinaryDataId {
    fn from(id: &str) -> Self {
        BinaryDataId(id.to_string())
    }
}

impl From<String> for BinaryDataId {
    fn from(id: String) -> Self {
        BinaryDataId(id)
    }
}

impl std::fmt::Display for BinaryDataId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a machine (robot) registered with the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct MachineId(pub String);

impl MachineId {
    pub fn new(id: impl Into<String>) -> Self {
        MachineId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for MachineId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MachineId {
    fn from(id: &str) -> Self {
        MachineId(id.to_string())
    }
}

impl From<String> for MachineId {
    fn from(id: String) -> Self {
        MachineId(id)
    }
}

impl std::fmt::Display for MachineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one machine part; configuration history hangs off this.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct PartId(pub String);

impl PartId {
    pub fn new(id: impl Into<String>) -> Self {
        PartId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl AsRef<str> for PartId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PartId {
    fn from(id: &str) -> Self {
        PartId(id.to_string())
    }
}

impl From<String> for PartId {
    fn from(id: String) -> Self {
        PartId(id)
    }
}

impl std::fmt::Display for PartId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the organization that owns the machine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct OrganizationId(pub String);

impl OrganizationId {
    pub fn new(id: impl Into<String>) -> Self {
        OrganizationId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for OrganizationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OrganizationId {
    fn from(id: &str) -> Self {
        OrganizationId(id.to_string())
    }
}

impl From<String> for OrganizationId {
    fn from(id: String) -> Self {
        OrganizationId(id)
    }
}

impl std::fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the location a machine is installed at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct LocationId(pub String);

impl LocationId {
    pub fn new(id: impl Into<String>) -> Self {
        LocationId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for LocationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LocationId {
    fn from(id: &str) -> Self {
        LocationId(id.to_string())
    }
}

impl From<String> for LocationId {
    fn from(id: String) -> Self {
        LocationId(id)
    }
}

impl std::fmt::Display for LocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_empty_ids() {
        assert!(PassId::parse("").is_err());
        assert!(PassId::parse("   ").is_err());
        assert!(PassId::parse("pass-7").is_ok());
    }

    #[test]
    fn blank_pass_ids_are_flagged() {
        assert!(PassId::new("").is_blank());
        assert!(PassId::new("  ").is_blank());
        assert!(!PassId::new("p1").is_blank());
    }

    #[test]
    fn display_round_trips() {
        let id = MachineId::new("machine-abc");
        assert_eq!(id.to_string(), "machine-abc");
        assert_eq!(id.as_str(), "machine-abc");
    }
}
