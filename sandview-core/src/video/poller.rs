use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock, oneshot};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};
use uuid::Uuid;

use sandview_model::{MediaRecord, Step};

use crate::error::Result;
use crate::media::MediaIndex;
use crate::platform::PlatformResult;

/// Backend capable of synthesizing a video covering a step's time range.
///
/// Job completion is not reported through this interface; the only signal
/// is the eventual appearance of a new video record in the media store,
/// which is what [`VideoPoller`] watches for.
#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn generate(&self, step: &Step) -> PlatformResult<()>;
}

/// Future returned by a refresh closure: re-fetches media for the relevant
/// window and yields the updated video snapshot.
pub type RefreshFuture = Pin<Box<dyn Future<Output = MediaIndex> + Send>>;

/// Per-request media refresh. Each pending request carries its own closure
/// so unrelated steps never share (and overwrite) one poll driver.
pub type RefreshFn = Arc<dyn Fn() -> RefreshFuture + Send + Sync>;

/// Configuration for the reconciliation loop.
#[derive(Debug, Clone)]
pub struct VideoPollerConfig {
    /// Interval between reconciliation cycles.
    pub poll_interval: Duration,
}

impl Default for VideoPollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
        }
    }
}

struct PendingRequest {
    step: Step,
    started_at: DateTime<Utc>,
    refresh: RefreshFn,
    resolve: oneshot::Sender<Vec<MediaRecord>>,
}

/// Tracks outstanding "generate video for this step" requests and resolves
/// them once a matching video shows up in the media store.
///
/// There is no in-band retry limit: a request stays pending until a video
/// lands in its step's time range, the caller cancels it, or the poller is
/// stopped. All pending-set mutation happens under one async lock, so a
/// tick never observes a half-updated set.
pub struct VideoPoller {
    pending: Mutex<HashMap<Uuid, PendingRequest>>,
    shutdown: RwLock<bool>,
    config: VideoPollerConfig,
}

impl std::fmt::Debug for VideoPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoPoller")
            .field("config", &self.config)
            .finish()
    }
}

impl VideoPoller {
    pub fn new(config: VideoPollerConfig) -> Arc<Self> {
        Arc::new(Self {
            pending: Mutex::new(HashMap::new()),
            shutdown: RwLock::new(false),
            config,
        })
    }

    /// Start the background reconciliation task.
    ///
    /// The timer runs until [`VideoPoller::stop`] is called; ticks with an
    /// empty pending set are no-ops.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let poller = Arc::clone(&self);
        tokio::spawn(async move {
            info!(
                "video poller started with interval of {:?}",
                poller.config.poll_interval
            );

            let mut ticker = interval(poller.config.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                if *poller.shutdown.read().await {
                    info!("video poller shutting down");
                    break;
                }

                poller.poll_once().await;
            }
        })
    }

    /// Signal the background task to exit on its next tick.
    pub async fn stop(&self) {
        *self.shutdown.write().await = true;
    }

    /// Kick off video synthesis for a step and track it until the video
    /// appears.
    ///
    /// Returns the request id (for cancellation) and a receiver that yields
    /// the matching videos on resolution.
    pub async fn request_generation(
        &self,
        store: &dyn VideoStore,
        step: Step,
        refresh: RefreshFn,
    ) -> Result<(Uuid, oneshot::Receiver<Vec<MediaRecord>>)> {
        store.generate(&step).await?;
        Ok(self.register(step, refresh).await)
    }

    /// Track an already-issued generation request.
    pub async fn register(
        &self,
        step: Step,
        refresh: RefreshFn,
    ) -> (Uuid, oneshot::Receiver<Vec<MediaRecord>>) {
        let id = Uuid::new_v4();
        let (resolve, resolved) = oneshot::channel();
        let request = PendingRequest {
            step,
            started_at: Utc::now(),
            refresh,
            resolve,
        };

        let mut pending = self.pending.lock().await;
        debug!(request = %id, "registered video generation request");
        pending.insert(id, request);
        (id, resolved)
    }

    /// Drop a pending request, e.g. when its owning view goes away or the
    /// caller saw the videos arrive through another path.
    pub async fn cancel(&self, id: &Uuid) -> bool {
        let mut pending = self.pending.lock().await;
        let removed = pending.remove(id).is_some();
        if removed {
            debug!(request = %id, "cancelled video generation request");
        } else {
            debug!(request = %id, "no pending request to cancel");
        }
        removed
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Run one reconciliation cycle: refresh media for every pending
    /// request and resolve the ones whose step range now contains a video.
    ///
    /// Called by the background timer; exposed so tests and callers can
    /// drive ticks deterministically.
    pub async fn poll_once(&self) {
        let mut pending = self.pending.lock().await;
        if pending.is_empty() {
            return;
        }
        debug!("polling for {} pending video request(s)", pending.len());

        let ids: Vec<Uuid> = pending.keys().copied().collect();
        for id in ids {
            let Some(request) = pending.get(&id) else {
                continue;
            };
            let index = (request.refresh)().await;
            let matches = matching_videos(&request.step, &index);
            if matches.is_empty() {
                continue;
            }

            let request = pending
                .remove(&id)
                .expect("pending request vanished while locked");
            let waited = Utc::now() - request.started_at;
            info!(
                request = %id,
                step = %request.step.name,
                videos = matches.len(),
                waited_secs = waited.num_seconds(),
                "video generation request resolved"
            );
            if request.resolve.send(matches).is_err() {
                warn!(request = %id, "resolution receiver was dropped");
            }
        }
    }

    /// Resolve against a caller-provided snapshot without invoking any
    /// refresh closure. Covers the race where the regular media fetch beat
    /// the timer to the new video.
    pub async fn check_videos(&self, index: &MediaIndex) {
        let mut pending = self.pending.lock().await;
        if pending.is_empty() {
            return;
        }

        let resolved: Vec<Uuid> = pending
            .iter()
            .filter(|(_, request)| {
                !matching_videos(&request.step, index).is_empty()
            })
            .map(|(id, _)| *id)
            .collect();

        for id in resolved {
            let request = pending
                .remove(&id)
                .expect("pending request vanished while locked");
            let matches = matching_videos(&request.step, index);
            debug!(request = %id, "request resolved from caller snapshot");
            let _ = request.resolve.send(matches);
        }
    }
}

fn matching_videos(step: &Step, index: &MediaIndex) -> Vec<MediaRecord> {
    index
        .videos()
        .filter(|video| video.is_in_time_range(step.start, step.end))
        .cloned()
        .collect()
}
