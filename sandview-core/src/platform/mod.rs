//! Capability interface over the cloud data platform.
//!
//! Everything the dashboard core needs from the platform goes through the
//! [`DataPlatform`] trait: tabular pass queries, binary media listings,
//! payload downloads, signed URLs, the shared machine metadata blob, and
//! robot configuration history. The platform itself is an external
//! collaborator; this crate ships one thin HTTP implementation
//! ([`http::CloudPlatformClient`]) and one in-memory implementation for
//! tests ([`memory::InMemoryPlatform`]).

pub mod http;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use sandview_model::{
    BinaryDataId, LocationId, MachineId, MediaRecord, OrganizationId, PartId,
};

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("API error: {0}")]
    Api(String),

    #[error("not found")]
    NotFound,

    #[error("unauthorized")]
    Unauthorized,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("parse error: {0}")]
    Parse(String),
}

pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// Sort direction for paginated listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Identity filter for tabular pass-summary queries.
#[derive(Debug, Clone)]
pub struct PassRecordFilter {
    pub organization_id: OrganizationId,
    pub location_id: LocationId,
    pub machine_id: MachineId,
    /// Component that publishes pass summaries.
    pub component_name: String,
    pub component_type: String,
}

impl PassRecordFilter {
    /// Filter for the standard sanding-summary sensor on a machine.
    pub fn sanding_summary(
        organization_id: OrganizationId,
        location_id: LocationId,
        machine_id: MachineId,
    ) -> Self {
        Self {
            organization_id,
            location_id,
            machine_id,
            component_name: "sanding-summary".to_string(),
            component_type: "rdk:component:sensor".to_string(),
        }
    }
}

/// Time-window filter for binary media listings.
#[derive(Debug, Clone)]
pub struct MediaFilter {
    pub machine_id: MachineId,
    pub captured_after: DateTime<Utc>,
    pub captured_before: DateTime<Utc>,
}

/// One page of a cursor-paginated binary listing.
#[derive(Debug, Clone, Default)]
pub struct MediaPage {
    pub data: Vec<MediaRecord>,
    /// Opaque token for the next page; `None` when exhausted.
    pub next_cursor: Option<String>,
}

/// One entry of a part's configuration history, newest first.
///
/// `old_part` is the part record as it looked *before* the change this
/// entry describes; the platform nests the actual robot configuration
/// under its `robot_config` field.
#[derive(Debug, Clone)]
pub struct ConfigHistoryEntry {
    pub part_id: PartId,
    pub robot_id: MachineId,
    pub when: DateTime<Utc>,
    pub old_part: Option<Value>,
}

/// Minimal organization listing used during session bootstrap.
#[derive(Debug, Clone)]
pub struct OrganizationSummary {
    pub id: OrganizationId,
    pub name: String,
}

/// The cloud data platform as the dashboard core consumes it.
///
/// Implementations must be cheap to share behind an `Arc`; every method is
/// a single logical round trip and the core sequences its own pagination.
#[async_trait]
pub trait DataPlatform: Send + Sync {
    /// Run a filtered, newest-first tabular query over pass summaries.
    ///
    /// `received_before` is a strict upper bound on the records'
    /// `time_received` field and serves as the pagination cursor; `None`
    /// starts from the newest record. Returns raw records; decoding is the
    /// caller's concern.
    async fn query_tabular(
        &self,
        filter: &PassRecordFilter,
        received_before: Option<&str>,
        limit: usize,
    ) -> PlatformResult<Vec<Value>>;

    /// List binary media metadata for a time window, one page at a time.
    async fn query_binary_metadata(
        &self,
        filter: &MediaFilter,
        page_size: usize,
        order: SortOrder,
        cursor: Option<&str>,
    ) -> PlatformResult<MediaPage>;

    /// Download raw payload bytes for the given binary ids, in order.
    async fn fetch_binary_payload(
        &self,
        ids: &[BinaryDataId],
    ) -> PlatformResult<Vec<Vec<u8>>>;

    /// Issue a short-lived download/playback URL for a stored object.
    async fn create_signed_url(
        &self,
        path: &str,
        ttl_seconds: u64,
    ) -> PlatformResult<String>;

    /// Read the machine's shared flat metadata blob.
    async fn get_metadata_blob(
        &self,
        machine_id: &MachineId,
    ) -> PlatformResult<std::collections::BTreeMap<String, String>>;

    /// Replace the machine's shared flat metadata blob.
    ///
    /// The platform offers no compare-and-swap; writers are expected to
    /// read-merge-write and only touch keys they own.
    async fn put_metadata_blob(
        &self,
        machine_id: &MachineId,
        blob: &std::collections::BTreeMap<String, String>,
    ) -> PlatformResult<()>;

    /// Configuration change history for a part, newest first.
    async fn get_config_history(
        &self,
        part_id: &PartId,
    ) -> PlatformResult<Vec<ConfigHistoryEntry>>;

    /// Current part record, or `None` when the part is unknown.
    async fn get_robot_part(
        &self,
        part_id: &PartId,
    ) -> PlatformResult<Option<Value>>;

    /// Organizations visible to the current credentials.
    async fn list_organizations(&self)
    -> PlatformResult<Vec<OrganizationSummary>>;
}
