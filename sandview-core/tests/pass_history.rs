//! Pagination and decoding behaviour of the pass fetcher against scripted
//! and in-memory platforms.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::{Value, json};

use sandview_core::passes::PassFetcher;
use sandview_core::platform::{
    ConfigHistoryEntry, DataPlatform, MediaFilter, MediaPage,
    OrganizationSummary, PassRecordFilter, PlatformResult, SortOrder,
};
use sandview_model::{BinaryDataId, LocationId, MachineId, OrganizationId, PartId};

/// Serves pre-scripted tabular batches in order, ignoring the cursor, so
/// tests control exactly what each round trip returns.
struct ScriptedPlatform {
    batches: Mutex<Vec<Vec<Value>>>,
    requests: Mutex<usize>,
}

impl ScriptedPlatform {
    fn new(batches: Vec<Vec<Value>>) -> Self {
        Self {
            batches: Mutex::new(batches),
            requests: Mutex::new(0),
        }
    }

    fn requests(&self) -> usize {
        *self.requests.lock().unwrap()
    }
}

#[async_trait]
impl DataPlatform for ScriptedPlatform {
    async fn query_tabular(
        &self,
        _filter: &PassRecordFilter,
        _received_before: Option<&str>,
        _limit: usize,
    ) -> PlatformResult<Vec<Value>> {
        *self.requests.lock().unwrap() += 1;
        let mut batches = self.batches.lock().unwrap();
        if batches.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(batches.remove(0))
        }
    }

    async fn query_binary_metadata(
        &self,
        _filter: &MediaFilter,
        _page_size: usize,
        _order: SortOrder,
        _cursor: Option<&str>,
    ) -> PlatformResult<MediaPage> {
        Ok(MediaPage::default())
    }

    async fn fetch_binary_payload(
        &self,
        _ids: &[BinaryDataId],
    ) -> PlatformResult<Vec<Vec<u8>>> {
        Ok(Vec::new())
    }

    async fn create_signed_url(
        &self,
        path: &str,
        _ttl_seconds: u64,
    ) -> PlatformResult<String> {
        Ok(path.to_string())
    }

    async fn get_metadata_blob(
        &self,
        _machine_id: &MachineId,
    ) -> PlatformResult<BTreeMap<String, String>> {
        Ok(BTreeMap::new())
    }

    async fn put_metadata_blob(
        &self,
        _machine_id: &MachineId,
        _blob: &BTreeMap<String, String>,
    ) -> PlatformResult<()> {
        Ok(())
    }

    async fn get_config_history(
        &self,
        _part_id: &PartId,
    ) -> PlatformResult<Vec<ConfigHistoryEntry>> {
        Ok(Vec::new())
    }

    async fn get_robot_part(
        &self,
        _part_id: &PartId,
    ) -> PlatformResult<Option<Value>> {
        Ok(None)
    }

    async fn list_organizations(
        &self,
    ) -> PlatformResult<Vec<OrganizationSummary>> {
        Ok(Vec::new())
    }
}

fn filter() -> PassRecordFilter {
    PassRecordFilter::sanding_summary(
        OrganizationId::new("org-1"),
        LocationId::new("loc-1"),
        MachineId::new("machine-1"),
    )
}

/// Record `seq` steps back from a fixed anchor, one hour per pass.
fn record(seq: usize, blue_points: Option<u64>) -> Value {
    let anchor = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
    let end = anchor - chrono::Duration::hours(seq as i64);
    let start = end - chrono::Duration::minutes(45);

    let mut readings = json!({
        "pass_id": format!("pass-{seq:04}"),
        "start": start.to_rfc3339(),
        "end": end.to_rfc3339(),
        "success": true,
    });
    if let Some(count) = blue_points {
        readings["target_points_count"] = json!(count);
    }

    json!({
        "time_received": end.to_rfc3339(),
        "part_id": "part-1",
        "data": { "readings": readings },
    })
}

#[tokio::test]
async fn batches_of_100_100_40_yield_240_records_in_3_requests() {
    let batches = vec![
        (0..100).map(|i| record(i, Some(100 + i as u64))).collect(),
        (100..200).map(|i| record(i, Some(100 + i as u64))).collect(),
        (200..240).map(|i| record(i, Some(100 + i as u64))).collect(),
    ];
    let platform = Arc::new(ScriptedPlatform::new(batches));

    let fetcher = PassFetcher::new(platform.clone(), filter());
    let history = fetcher.fetch_history().await.expect("fetch succeeds");

    assert_eq!(history.passes.len(), 240);
    assert_eq!(platform.requests(), 3);
    assert!(history.complete);
    assert_eq!(history.part_id, Some(PartId::new("part-1")));
}

#[tokio::test]
async fn pass_list_is_non_increasing_by_start_with_diffs_filled_in() {
    let batches = vec![(0..50).map(|i| record(i, Some(100 + i as u64))).collect()];
    let platform = Arc::new(ScriptedPlatform::new(batches));

    let fetcher = PassFetcher::new(platform, filter());
    let history = fetcher.fetch_history().await.expect("fetch succeeds");
    let passes = &history.passes;

    for window in passes.windows(2) {
        assert!(window[0].start >= window[1].start);
    }

    // Counts increase going back in time, so every diff against the
    // previous (older) pass is negative; the oldest pass has none.
    for pass in &passes[..passes.len() - 1] {
        let diff = pass.blue_point_diff_percent.expect("diff defined");
        assert!(diff < 0.0);
    }
    assert_eq!(passes.last().unwrap().blue_point_diff_percent, None);
}

#[tokio::test]
async fn empty_first_batch_yields_empty_history() {
    let platform = Arc::new(ScriptedPlatform::new(vec![]));
    let fetcher = PassFetcher::new(platform.clone(), filter());

    let history = fetcher.fetch_history().await.expect("fetch succeeds");
    assert!(history.passes.is_empty());
    assert!(history.complete);
    assert_eq!(history.part_id, None);
    assert_eq!(platform.requests(), 1);
}

#[tokio::test]
async fn missing_cursor_halts_pagination_with_a_partial_list() {
    // A full first batch whose last record lacks time_received: pagination
    // cannot continue, but everything received so far must be kept. The
    // second batch must never be requested.
    let mut first: Vec<Value> = (0..10).map(|i| record(i, None)).collect();
    if let Some(last) = first.last_mut() {
        last.as_object_mut().unwrap().remove("time_received");
    }
    let never_served: Vec<Value> = (10..20).map(|i| record(i, None)).collect();
    let platform =
        Arc::new(ScriptedPlatform::new(vec![first, never_served]));

    let fetcher =
        PassFetcher::new(platform.clone(), filter()).with_batch_size(10);
    let history = fetcher.fetch_history().await.expect("fetch succeeds");

    assert_eq!(history.passes.len(), 10);
    assert!(!history.complete);
    assert_eq!(platform.requests(), 1);
}

#[tokio::test]
async fn malformed_records_are_skipped_without_failing_the_fetch() {
    let mut batch: Vec<Value> = (0..5).map(|i| record(i, None)).collect();
    batch.insert(2, json!({ "time_received": "2026-02-28T10:00:00Z" }));
    let platform = Arc::new(ScriptedPlatform::new(vec![batch]));

    let fetcher = PassFetcher::new(platform, filter());
    let history = fetcher.fetch_history().await.expect("fetch succeeds");
    assert_eq!(history.passes.len(), 5);
}
