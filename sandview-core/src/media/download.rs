use std::sync::Arc;

use tracing::debug;

use sandview_model::MediaRecord;

use crate::error::{CoreError, Result};
use crate::platform::DataPlatform;

/// Default lifetime for signed playback/download URLs.
pub const SIGNED_URL_TTL_SECONDS: u64 = 300;

/// A fully downloaded binary artifact, ready to hand to the user.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    /// Bare file name (last path segment) for the save dialog.
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Payload downloads and signed-URL issuance for stored media.
#[derive(Clone)]
pub struct MediaDownloader {
    platform: Arc<dyn DataPlatform>,
}

impl std::fmt::Debug for MediaDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaDownloader").finish()
    }
}

impl MediaDownloader {
    pub fn new(platform: Arc<dyn DataPlatform>) -> Self {
        Self { platform }
    }

    /// Fetch the raw bytes of one record.
    pub async fn download(&self, record: &MediaRecord) -> Result<DownloadedFile> {
        debug!(file = %record.file_name, "downloading binary payload");
        let mut payloads = self
            .platform
            .fetch_binary_payload(std::slice::from_ref(&record.binary_data_id))
            .await?;
        if payloads.is_empty() {
            return Err(CoreError::NotFound(format!(
                "no payload for {}",
                record.binary_data_id
            )));
        }
        Ok(DownloadedFile {
            name: record.display_name().to_string(),
            bytes: payloads.swap_remove(0),
        })
    }

    /// Issue a short-lived URL for streaming playback in the browser.
    pub async fn playback_url(&self, record: &MediaRecord) -> Result<String> {
        let url = self
            .platform
            .create_signed_url(&record.file_name, SIGNED_URL_TTL_SECONDS)
            .await?;
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandview_model::BinaryDataId;

    use crate::platform::memory::InMemoryPlatform;

    fn record(id: &str, file_name: &str) -> MediaRecord {
        MediaRecord {
            binary_data_id: BinaryDataId::new(id),
            file_name: file_name.to_string(),
            time_requested: None,
            uri: String::new(),
            dataset_ids: Vec::new(),
            capture_metadata: None,
        }
    }

    #[tokio::test]
    async fn download_uses_display_name() {
        let platform = Arc::new(InMemoryPlatform::new());
        platform.seed_payload(&BinaryDataId::new("bd-1"), b"bytes".to_vec());

        let downloader = MediaDownloader::new(platform);
        let file = downloader
            .download(&record("bd-1", "runs/p1/trace.txt"))
            .await
            .expect("download succeeds");

        assert_eq!(file.name, "trace.txt");
        assert_eq!(file.bytes, b"bytes");
    }

    #[tokio::test]
    async fn missing_payload_is_an_error() {
        let platform = Arc::new(InMemoryPlatform::new());
        let downloader = MediaDownloader::new(platform);
        assert!(
            downloader
                .download(&record("unknown", "runs/p1/trace.txt"))
                .await
                .is_err()
        );
    }
}
