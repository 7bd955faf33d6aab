use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::debug;

use sandview_model::MachineId;

use crate::error::Result;
use crate::media::MediaIndex;
use crate::platform::{DataPlatform, MediaFilter, SortOrder};

/// Records fetched per binary-listing request.
pub const MEDIA_PAGE_SIZE: usize = 1000;

/// Paginated retrieval of binary media for a time window.
///
/// Pages arrive newest first and are merged into the caller's
/// [`MediaIndex`] as they land, so consumers can render partial results
/// while older pages are still in flight. The oldest timestamp of the most
/// recent page is published on a watch channel as a loading watermark and
/// cleared (set back to `None`) when pagination completes.
pub struct MediaFetcher {
    platform: Arc<dyn DataPlatform>,
    machine_id: MachineId,
    page_size: usize,
    progress: watch::Sender<Option<DateTime<Utc>>>,
}

impl std::fmt::Debug for MediaFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaFetcher")
            .field("machine_id", &self.machine_id)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl MediaFetcher {
    pub fn new(platform: Arc<dyn DataPlatform>, machine_id: MachineId) -> Self {
        let (progress, _) = watch::channel(None);
        Self {
            platform,
            machine_id,
            page_size: MEDIA_PAGE_SIZE,
            progress,
        }
    }

    /// Override the listing page size. Mostly useful in tests.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Subscribe to the loading watermark: `Some(t)` while pagination is in
    /// flight (t = oldest item of the latest page), `None` when idle.
    pub fn progress(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.progress.subscribe()
    }

    /// Fetch all media captured in `[start, now]` and merge it into
    /// `index`.
    ///
    /// Pages are merged one at a time; if a page request fails, everything
    /// already merged stays in the index and the error is returned to the
    /// caller. Re-running the fetch over an overlapping window is safe:
    /// merging is id-keyed and idempotent.
    pub async fn fetch_since(
        &self,
        index: &mut MediaIndex,
        start: DateTime<Utc>,
        signal_progress: bool,
    ) -> Result<()> {
        let end = Utc::now();
        debug!(
            machine = %self.machine_id,
            %start,
            %end,
            "fetching media for time range"
        );
        if signal_progress {
            self.progress.send_replace(Some(start));
        }

        let filter = MediaFilter {
            machine_id: self.machine_id.clone(),
            captured_after: start,
            captured_before: end,
        };

        let mut cursor: Option<String> = None;
        let result = loop {
            let page = match self
                .platform
                .query_binary_metadata(
                    &filter,
                    self.page_size,
                    SortOrder::Descending,
                    cursor.as_deref(),
                )
                .await
            {
                Ok(page) => page,
                Err(err) => break Err(err.into()),
            };

            debug!("received {} media records in page", page.data.len());

            if signal_progress
                && let Some(oldest) =
                    page.data.last().and_then(|record| record.time_requested)
            {
                self.progress.send_replace(Some(oldest));
            }

            let incoming = page.data;
            *index = std::mem::take(index).merged(incoming);

            match page.next_cursor {
                Some(token) => cursor = Some(token),
                None => break Ok(()),
            }
        };

        if signal_progress {
            self.progress.send_replace(None);
        }
        debug!(
            total = index.len(),
            videos = index.videos().count(),
            images = index.images().count(),
            "media index updated"
        );
        result
    }
}
