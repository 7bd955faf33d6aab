use chrono::{DateTime, Utc};

use crate::ids::{BinaryDataId, PassId};

/// How a stored binary artifact is presented in the dashboard.
///
/// Classification is total and mutually exclusive: every record lands in
/// exactly one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MediaKind {
    Video,
    Image,
    Other,
}

/// Capture provenance recorded by the data pipeline when a component
/// (usually a camera) produced the artifact through a capture method.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CaptureMetadata {
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub component_name: Option<String>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub component_type: Option<String>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub method_name: Option<String>,
}

impl CaptureMetadata {
    /// A record counts as a camera capture only when both the component and
    /// the method are known.
    pub fn is_camera_capture(&self) -> bool {
        self.component_name.is_some() && self.method_name.is_some()
    }
}

/// Normalized metadata of one binary artifact stored on the platform.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MediaRecord {
    pub binary_data_id: BinaryDataId,
    /// Full upload path; pass ids appear as path segments.
    pub file_name: String,
    /// When the artifact was captured/requested. Records without a
    /// timestamp never match any time range.
    pub time_requested: Option<DateTime<Utc>>,
    /// Download location issued by the platform.
    pub uri: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub dataset_ids: Vec<String>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub capture_metadata: Option<CaptureMetadata>,
}

impl MediaRecord {
    /// Classify this record into its dashboard bucket.
    ///
    /// Rules, evaluated in order: an `.mp4` file name is a video; an image
    /// extension or a camera capture (component + method present) is an
    /// image; everything else is a plain file.
    pub fn kind(&self) -> MediaKind {
        let lowered = self.file_name.to_ascii_lowercase();
        if lowered.ends_with(".mp4") {
            return MediaKind::Video;
        }

        let has_image_ext = lowered.ends_with(".png")
            || lowered.ends_with(".jpg")
            || lowered.ends_with(".jpeg");
        let is_camera_capture = self
            .capture_metadata
            .as_ref()
            .is_some_and(CaptureMetadata::is_camera_capture);

        if has_image_ext || is_camera_capture {
            MediaKind::Image
        } else {
            MediaKind::Other
        }
    }

    /// Component that captured this record, when known.
    pub fn component_name(&self) -> Option<&str> {
        self.capture_metadata
            .as_ref()
            .and_then(|meta| meta.component_name.as_deref())
    }

    /// Whether the capture time falls within `[start, end]`, inclusive.
    /// Records with no capture time never match.
    pub fn is_in_time_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> bool {
        match self.time_requested {
            Some(at) => at >= start && at <= end,
            None => false,
        }
    }

    /// Whether this file belongs to a pass by file name: the pass id must
    /// appear as a whole `/`-separated path segment, never as a substring.
    /// Blank pass ids match nothing.
    pub fn is_part_of_pass(&self, pass_id: &PassId) -> bool {
        if pass_id.is_blank() {
            return false;
        }
        self.file_name
            .split('/')
            .any(|segment| segment == pass_id.as_str())
    }

    /// Last path segment of the file name, for display and download names.
    pub fn display_name(&self) -> &str {
        self.file_name
            .rsplit('/')
            .next()
            .unwrap_or(self.file_name.as_str())
    }
}
