//! # Sandview Core
//!
//! Data/correlation core for the Sandview pass-history dashboard: it pulls
//! sanding-pass telemetry and binary media out of a cloud data platform,
//! correlates the two, drives video-generation polling, and persists
//! per-pass annotations.
//!
//! ## Overview
//!
//! `sandview-core` provides:
//!
//! - **Pass retrieval**: cursor-paginated tabular queries decoded into
//!   ordered [`Pass`](sandview_model::Pass) histories with derived metrics
//! - **Media retrieval**: incremental, page-by-page binary fetches
//!   classified into video/image/file buckets
//! - **Correlation**: which media belongs to which pass, before/after
//!   camera frames, per-step videos
//! - **Video polling**: reconciliation of asynchronous video-synthesis
//!   jobs against newly arriving media
//! - **Annotations**: notes and diagnoses in a shared machine metadata
//!   blob, written read-merge-write so other tools' keys survive
//! - **Config derivation**: the configuration active at a pass's start,
//!   reconstructed from change history plus fragment mods
//!
//! ## Architecture
//!
//! The platform is consumed through the [`platform::DataPlatform`] trait;
//! [`platform::http::CloudPlatformClient`] talks to the real service and
//! [`platform::memory::InMemoryPlatform`] backs the tests. Everything runs
//! on a single logical thread: pagination is strictly sequential per
//! fetcher, and independent fetchers interleave only at await points.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use sandview_core::error::Result;
//! use sandview_core::passes::PassFetcher;
//! use sandview_core::platform::DataPlatform;
//! use sandview_core::session::{Credentials, DashboardSession};
//!
//! async fn newest_pass(platform: Arc<dyn DataPlatform>) -> Result<()> {
//!     let credentials = Credentials::from_env()?;
//!     let session = DashboardSession::establish(&platform, credentials).await?;
//!
//!     let fetcher = PassFetcher::new(platform, session.pass_filter());
//!     let history = fetcher.fetch_history().await?;
//!     if let Some(pass) = history.passes.first() {
//!         println!("latest pass {} started {}", pass.pass_id, pass.start);
//!     }
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

/// Per-pass notes and diagnoses in the shared metadata blob
pub mod annotations;

/// Error types and the crate-wide `Result` alias
pub mod error;

/// Day grouping, aggregates, and day-based pagination
pub mod history;

/// Media indexing, fetching, correlation, and downloads
pub mod media;

/// Pass-summary pagination and decoding
pub mod passes;

/// Capability interface over the cloud data platform
pub mod platform;

/// Configuration history walking and fragment-mod application
pub mod robot_config;

/// Credential loading and session bootstrap
pub mod session;

/// Video synthesis requests and the reconciliation poller
pub mod video;

pub use error::{CoreError, Result};
pub use media::{MediaFetcher, MediaIndex};
pub use passes::{PassFetcher, PassHistory};
pub use platform::{DataPlatform, PlatformError};
pub use video::VideoPoller;
