//! In-memory platform for tests.
//!
//! Behaves like the real thing at the seams the core cares about: tabular
//! queries honor the `time_received` cursor bound, binary listings hand out
//! opaque page tokens, and the metadata blob is a plain map that multiple
//! writers can clobber. Note: callers seed state up front; the request
//! counters exist so tests can assert how many round trips a fetch took.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use sandview_model::{BinaryDataId, MachineId, MediaRecord, PartId};

use super::{
    ConfigHistoryEntry, DataPlatform, MediaFilter, MediaPage,
    OrganizationSummary, PassRecordFilter, PlatformError, PlatformResult,
    SortOrder,
};

#[derive(Default)]
struct State {
    tabular_records: Vec<Value>,
    media_records: Vec<MediaRecord>,
    payloads: BTreeMap<String, Vec<u8>>,
    metadata_blobs: BTreeMap<String, BTreeMap<String, String>>,
    config_histories: BTreeMap<String, Vec<ConfigHistoryEntry>>,
    robot_parts: BTreeMap<String, Value>,
    organizations: Vec<OrganizationSummary>,
    tabular_requests: usize,
    binary_requests: usize,
    blob_writes: usize,
}

/// Scriptable in-memory implementation of [`DataPlatform`].
#[derive(Default)]
pub struct InMemoryPlatform {
    state: Mutex<State>,
}

impl std::fmt::Debug for InMemoryPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().expect("platform state poisoned");
        f.debug_struct("InMemoryPlatform")
            .field("tabular_records", &state.tabular_records.len())
            .field("media_records", &state.media_records.len())
            .finish()
    }
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed raw tabular pass-summary records. Records are served newest
    /// first by their `time_received` field.
    pub fn seed_tabular(&self, records: Vec<Value>) {
        let mut state = self.state.lock().expect("platform state poisoned");
        state.tabular_records = records;
        Self::sort_tabular(&mut state.tabular_records);
    }

    /// Seed stored media metadata, newest first by request time.
    pub fn seed_media(&self, records: Vec<MediaRecord>) {
        let mut state = self.state.lock().expect("platform state poisoned");
        state.media_records = records;
        Self::sort_media(&mut state.media_records);
    }

    /// Add one media record after the fact, e.g. to simulate a video
    /// synthesis job completing between poll ticks.
    pub fn push_media(&self, record: MediaRecord) {
        let mut state = self.state.lock().expect("platform state poisoned");
        state.media_records.push(record);
        Self::sort_media(&mut state.media_records);
    }

    pub fn seed_payload(&self, id: &BinaryDataId, bytes: Vec<u8>) {
        let mut state = self.state.lock().expect("platform state poisoned");
        state.payloads.insert(id.as_str().to_string(), bytes);
    }

    pub fn seed_metadata_blob(
        &self,
        machine_id: &MachineId,
        blob: BTreeMap<String, String>,
    ) {
        let mut state = self.state.lock().expect("platform state poisoned");
        state
            .metadata_blobs
            .insert(machine_id.as_str().to_string(), blob);
    }

    pub fn seed_config_history(
        &self,
        part_id: &PartId,
        entries: Vec<ConfigHistoryEntry>,
    ) {
        let mut state = self.state.lock().expect("platform state poisoned");
        state
            .config_histories
            .insert(part_id.as_str().to_string(), entries);
    }

    pub fn seed_robot_part(&self, part_id: &PartId, part: Value) {
        let mut state = self.state.lock().expect("platform state poisoned");
        state.robot_parts.insert(part_id.as_str().to_string(), part);
    }

    pub fn seed_organizations(&self, organizations: Vec<OrganizationSummary>) {
        let mut state = self.state.lock().expect("platform state poisoned");
        state.organizations = organizations;
    }

    /// Current blob contents, for assertions on foreign-key preservation.
    pub fn metadata_blob(
        &self,
        machine_id: &MachineId,
    ) -> BTreeMap<String, String> {
        let state = self.state.lock().expect("platform state poisoned");
        state
            .metadata_blobs
            .get(machine_id.as_str())
            .cloned()
            .unwrap_or_default()
    }

    pub fn tabular_requests(&self) -> usize {
        self.state
            .lock()
            .expect("platform state poisoned")
            .tabular_requests
    }

    pub fn binary_requests(&self) -> usize {
        self.state
            .lock()
            .expect("platform state poisoned")
            .binary_requests
    }

    pub fn blob_writes(&self) -> usize {
        self.state
            .lock()
            .expect("platform state poisoned")
            .blob_writes
    }

    fn sort_tabular(records: &mut [Value]) {
        records.sort_by(|a, b| {
            let a = a.get("time_received").and_then(Value::as_str).unwrap_or("");
            let b = b.get("time_received").and_then(Value::as_str).unwrap_or("");
            b.cmp(a)
        });
    }

    fn sort_media(records: &mut [MediaRecord]) {
        records.sort_by(|a, b| b.time_requested.cmp(&a.time_requested));
    }
}

#[async_trait]
impl DataPlatform for InMemoryPlatform {
    async fn query_tabular(
        &self,
        filter: &PassRecordFilter,
        received_before: Option<&str>,
        limit: usize,
    ) -> PlatformResult<Vec<Value>> {
        let mut state = self.state.lock().expect("platform state poisoned");
        state.tabular_requests += 1;

        let machine = filter.machine_id.as_str();
        Ok(state
            .tabular_records
            .iter()
            .filter(|record| {
                record
                    .get("robot_id")
                    .and_then(Value::as_str)
                    .is_none_or(|id| id == machine)
            })
            .filter(|record| match received_before {
                Some(bound) => record
                    .get("time_received")
                    .and_then(Value::as_str)
                    .is_some_and(|received| received < bound),
                None => true,
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn query_binary_metadata(
        &self,
        filter: &MediaFilter,
        page_size: usize,
        _order: SortOrder,
        cursor: Option<&str>,
    ) -> PlatformResult<MediaPage> {
        let mut state = self.state.lock().expect("platform state poisoned");
        state.binary_requests += 1;

        let offset: usize = match cursor {
            Some(token) => token.parse().map_err(|_| {
                PlatformError::Parse(format!("bad cursor token {token}"))
            })?,
            None => 0,
        };

        let in_window: Vec<MediaRecord> = state
            .media_records
            .iter()
            .filter(|record| {
                record.time_requested.is_some_and(|at| {
                    at >= filter.captured_after && at <= filter.captured_before
                })
            })
            .cloned()
            .collect();

        let page: Vec<MediaRecord> =
            in_window.iter().skip(offset).take(page_size).cloned().collect();
        let consumed = offset + page.len();
        let next_cursor = if consumed < in_window.len() {
            Some(consumed.to_string())
        } else {
            None
        };

        Ok(MediaPage {
            data: page,
            next_cursor,
        })
    }

    async fn fetch_binary_payload(
        &self,
        ids: &[BinaryDataId],
    ) -> PlatformResult<Vec<Vec<u8>>> {
        let state = self.state.lock().expect("platform state poisoned");
        ids.iter()
            .map(|id| {
                state
                    .payloads
                    .get(id.as_str())
                    .cloned()
                    .ok_or(PlatformError::NotFound)
            })
            .collect()
    }

    async fn create_signed_url(
        &self,
        path: &str,
        ttl_seconds: u64,
    ) -> PlatformResult<String> {
        Ok(format!(
            "https://signed.invalid/{}?expires_in={ttl_seconds}",
            path.trim_start_matches('/')
        ))
    }

    async fn get_metadata_blob(
        &self,
        machine_id: &MachineId,
    ) -> PlatformResult<BTreeMap<String, String>> {
        let state = self.state.lock().expect("platform state poisoned");
        Ok(state
            .metadata_blobs
            .get(machine_id.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn put_metadata_blob(
        &self,
        machine_id: &MachineId,
        blob: &BTreeMap<String, String>,
    ) -> PlatformResult<()> {
        let mut state = self.state.lock().expect("platform state poisoned");
        state.blob_writes += 1;
        state
            .metadata_blobs
            .insert(machine_id.as_str().to_string(), blob.clone());
        Ok(())
    }

    async fn get_config_history(
        &self,
        part_id: &PartId,
    ) -> PlatformResult<Vec<ConfigHistoryEntry>> {
        let state = self.state.lock().expect("platform state poisoned");
        Ok(state
            .config_histories
            .get(part_id.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn get_robot_part(
        &self,
        part_id: &PartId,
    ) -> PlatformResult<Option<Value>> {
        let state = self.state.lock().expect("platform state poisoned");
        Ok(state.robot_parts.get(part_id.as_str()).cloned())
    }

    async fn list_organizations(
        &self,
    ) -> PlatformResult<Vec<OrganizationSummary>> {
        let state = self.state.lock().expect("platform state poisoned");
        Ok(state.organizations.clone())
    }
}
