//! End-to-end reconciliation: a generation request resolves once the
//! platform's media store grows a video inside the step's range.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Mutex;

use sandview_core::media::{MediaFetcher, MediaIndex};
use sandview_core::platform::PlatformResult;
use sandview_core::platform::memory::InMemoryPlatform;
use sandview_core::video::{RefreshFn, VideoPoller, VideoPollerConfig, VideoStore};
use sandview_model::{BinaryDataId, MachineId, MediaRecord, PassId, Step};

/// Records generation commands; synthesis itself "completes" only when the
/// test pushes a video into the platform.
#[derive(Default)]
struct RecordingVideoStore {
    generated: StdMutex<Vec<Step>>,
}

#[async_trait]
impl VideoStore for RecordingVideoStore {
    async fn generate(&self, step: &Step) -> PlatformResult<()> {
        self.generated.lock().unwrap().push(step.clone());
        Ok(())
    }
}

fn step(start: i64, end: i64) -> Step {
    Step {
        name: "executing".to_string(),
        start: Utc.timestamp_opt(start, 0).unwrap(),
        end: Utc.timestamp_opt(end, 0).unwrap(),
        pass_id: PassId::new("p1"),
    }
}

fn video(id: &str, secs: i64) -> MediaRecord {
    MediaRecord {
        binary_data_id: BinaryDataId::new(id),
        file_name: format!("videos/{id}.mp4"),
        time_requested: Some(Utc.timestamp_opt(secs, 0).unwrap()),
        uri: String::new(),
        dataset_ids: Vec::new(),
        capture_metadata: None,
    }
}

/// Refresh closure the way the dashboard builds it: re-fetch media since
/// the step start into a shared index, then hand back a snapshot.
fn media_refresh(
    platform: Arc<InMemoryPlatform>,
    shared: Arc<Mutex<MediaIndex>>,
    step: &Step,
) -> RefreshFn {
    let start = step.start;
    Arc::new(move || {
        let platform = platform.clone();
        let shared = shared.clone();
        Box::pin(async move {
            let fetcher =
                MediaFetcher::new(platform, MachineId::new("machine-1"));
            let mut index = shared.lock().await;
            // Transient refresh failures leave the previous snapshot in
            // place; the next tick retries.
            let _ = fetcher.fetch_since(&mut index, start, false).await;
            index.clone()
        })
    })
}

#[tokio::test]
async fn request_resolves_once_synthesis_output_lands() {
    let platform = Arc::new(InMemoryPlatform::new());
    let shared = Arc::new(Mutex::new(MediaIndex::new()));
    let store = RecordingVideoStore::default();
    let poller = VideoPoller::new(VideoPollerConfig::default());

    let step = step(1_000, 2_000);
    let refresh = media_refresh(platform.clone(), shared.clone(), &step);
    let (_, mut resolved) = poller
        .request_generation(&store, step.clone(), refresh)
        .await
        .expect("generation request accepted");

    assert_eq!(store.generated.lock().unwrap().len(), 1);

    // Nothing in the store yet: the first tick leaves the request pending.
    poller.poll_once().await;
    assert_eq!(poller.pending_count().await, 1);
    assert!(resolved.try_recv().is_err());

    // A video outside the step range must not resolve it either.
    platform.push_media(video("outside", 5_000));
    poller.poll_once().await;
    assert_eq!(poller.pending_count().await, 1);

    // Synthesis output appears inside the range: the next tick resolves.
    platform.push_media(video("generated", 1_500));
    poller.poll_once().await;
    assert_eq!(poller.pending_count().await, 0);

    let videos = resolved.await.expect("request resolved");
    assert_eq!(videos.len(), 1);
    assert_eq!(videos[0].binary_data_id.as_str(), "generated");

    // The refreshes merged everything into the shared index too.
    let index = shared.lock().await;
    assert!(index.contains(&BinaryDataId::new("generated")));
}

#[tokio::test]
async fn background_timer_resolves_without_manual_ticks() {
    let platform = Arc::new(InMemoryPlatform::new());
    let shared = Arc::new(Mutex::new(MediaIndex::new()));
    let poller = VideoPoller::new(VideoPollerConfig {
        poll_interval: std::time::Duration::from_millis(10),
    });
    let handle = Arc::clone(&poller).start();

    let step = step(1_000, 2_000);
    let refresh = media_refresh(platform.clone(), shared, &step);
    let (_, resolved) = poller.register(step, refresh).await;

    platform.push_media(video("generated", 1_200));

    let videos = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        resolved,
    )
    .await
    .expect("timer resolves in time")
    .expect("request resolved");
    assert_eq!(videos.len(), 1);

    poller.stop().await;
    handle.await.expect("poller task exits cleanly");
}

#[tokio::test]
async fn unmount_cancels_and_leaves_no_pending_requests() {
    let platform = Arc::new(InMemoryPlatform::new());
    let shared = Arc::new(Mutex::new(MediaIndex::new()));
    let poller = VideoPoller::new(VideoPollerConfig::default());

    let step = step(1_000, 2_000);
    let refresh = media_refresh(platform, shared, &step);
    let (id, _resolved) = poller.register(step, refresh).await;

    assert!(poller.cancel(&id).await);
    assert_eq!(poller.pending_count().await, 0);

    // A tick after cancellation is a clean no-op.
    poller.poll_once().await;
    assert_eq!(poller.pending_count().await, 0);
}
