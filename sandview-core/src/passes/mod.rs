//! Pass-summary retrieval and decoding.

mod fetcher;

pub use fetcher::{PASS_BATCH_SIZE, PassFetcher, PassHistory, compute_blue_point_diffs};
