//! Walk the full dashboard data path against a seeded in-memory platform
//! and print the history table to stdout.
//!
//! Run with `cargo run -p sandview-core --example dump_history`; set
//! `RUST_LOG=debug` to watch the fetchers paginate.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sandview_core::annotations::AnnotationRegistry;
use sandview_core::history::{day_aggregates, group_by_day, page_by_days};
use sandview_core::media::{MediaFetcher, MediaIndex, before_after_images};
use sandview_core::passes::PassFetcher;
use sandview_core::platform::memory::InMemoryPlatform;
use sandview_core::platform::{DataPlatform, PassRecordFilter};
use sandview_model::{
    BinaryDataId, CaptureMetadata, Cause, LocationId, MachineId, MediaRecord,
    OrganizationId, Symptom,
};

const CAMERA: &str = "overview-cam";

fn seed(platform: &InMemoryPlatform, machine: &MachineId, now: DateTime<Utc>) {
    let mut tabular = Vec::new();
    let mut media = Vec::new();

    for seq in 0..12u32 {
        let end = now - Duration::hours(6 * i64::from(seq));
        let start = end - Duration::minutes(50);
        let pass_id = format!("pass-{seq:04}");
        let success = seq % 5 != 0;

        tabular.push(json!({
            "time_received": end.to_rfc3339(),
            "part_id": "part-1",
            "robot_id": machine.as_str(),
            "data": { "readings": {
                "pass_id": pass_id,
                "start": start.to_rfc3339(),
                "end": end.to_rfc3339(),
                "success": success,
                "err_string": if success { json!(null) } else { json!("pressure fault") },
                "target_points_count": 40 + seq * 3,
                "sanding_distance_mm": 12_500.0 - f64::from(seq) * 140.0,
                "steps": [
                    { "name": "imaging",
                      "start": start.to_rfc3339(),
                      "end": (start + Duration::minutes(8)).to_rfc3339() },
                    { "name": "executing",
                      "start": (start + Duration::minutes(8)).to_rfc3339(),
                      "end": end.to_rfc3339() },
                ],
            } },
        }));

        media.push(MediaRecord {
            binary_data_id: BinaryDataId::new(format!("img-before-{seq}")),
            file_name: format!("captures/{pass_id}/before.jpg"),
            time_requested: Some(start + Duration::seconds(30)),
            uri: String::new(),
            dataset_ids: Vec::new(),
            capture_metadata: Some(CaptureMetadata {
                component_name: Some(CAMERA.to_string()),
                component_type: Some("camera".to_string()),
                method_name: Some("ReadImage".to_string()),
            }),
        });
        media.push(MediaRecord {
            binary_data_id: BinaryDataId::new(format!("log-{seq}")),
            file_name: format!("logs/{pass_id}/controller.txt"),
            time_requested: Some(end - Duration::minutes(1)),
            uri: String::new(),
            dataset_ids: Vec::new(),
            capture_metadata: None,
        });
    }

    platform.seed_tabular(tabular);
    platform.seed_media(media);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let machine = MachineId::new("machine-demo");
    let memory = Arc::new(InMemoryPlatform::new());
    seed(&memory, &machine, Utc::now());
    let platform: Arc<dyn DataPlatform> = memory;

    // Passes, then media for the window they span.
    let filter = PassRecordFilter::sanding_summary(
        OrganizationId::new("org-demo"),
        LocationId::new("loc-demo"),
        machine.clone(),
    );
    let history = PassFetcher::new(platform.clone(), filter)
        .fetch_history()
        .await?;

    let mut index = MediaIndex::new();
    if let Some(oldest) = history.passes.last() {
        MediaFetcher::new(platform.clone(), machine.clone())
            .fetch_since(&mut index, oldest.start, false)
            .await?;
    }

    // Annotate the most recent failure the way an operator would.
    let registry = AnnotationRegistry::new(platform.clone());
    let store = registry.store_for(&machine);
    if let Some(failed) = history.passes.iter().find(|pass| !pass.success) {
        store
            .save_note(&failed.pass_id, "checked the belt, needs replacement")
            .await?;
        store
            .save_diagnosis(
                &failed.pass_id,
                Some(Symptom::PStop),
                Some(Cause::PartIssue),
                None,
            )
            .await?;
    }
    let pass_ids: Vec<_> =
        history.passes.iter().map(|p| p.pass_id.clone()).collect();
    let (notes, diagnoses) = store.fetch_for_passes(&pass_ids).await?;

    // Render the first page of the day-grouped table.
    let page = page_by_days(&history.passes, 1, 7);
    let aggregates = day_aggregates(&group_by_day(&history.passes), &diagnoses);

    println!(
        "history: {} passes over {} days (page {}/{})",
        page.total_entries, page.total_days, page.current_page, page.total_pages
    );
    for day in &page.days {
        let aggregate = &aggregates[day];
        println!(
            "\n{day}  {} passes, {:.0}% executing, {} blue points",
            aggregate.total_pass_count,
            aggregate.execution_percentage,
            aggregate.total_blue_points,
        );
        for pass in page.passes.iter().filter(|p| p.start.date_naive() == *day) {
            let frames = before_after_images(pass, &index, CAMERA);
            let diff = pass
                .blue_point_diff_percent
                .map(|d| format!("{d:+.1}%"))
                .unwrap_or_else(|| "n/a".to_string());
            println!(
                "  {}  {}  points {:>3} ({diff})  files {}  before-frame {}",
                pass.pass_id,
                if pass.success { "ok " } else { "FAIL" },
                pass.blue_point_count.unwrap_or(0),
                index.pass_files(pass).len(),
                frames
                    .before
                    .map(|f| f.display_name())
                    .unwrap_or("-"),
            );
            if let Some(note) = notes.get(&pass.pass_id) {
                println!("      note: {}", note.note_text);
            }
        }
    }

    Ok(())
}
