//! Binary media retrieval, indexing, and pass correlation.

mod correlate;
mod download;
mod fetcher;
mod index;

pub use correlate::{BeforeAfterImages, before_after_images, step_videos};
pub use download::{DownloadedFile, MediaDownloader};
pub use fetcher::{MEDIA_PAGE_SIZE, MediaFetcher};
pub use index::MediaIndex;
