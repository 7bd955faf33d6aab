//! Deriving the configuration that was active at a point in time.
//!
//! The platform records configuration changes as a newest-first history of
//! entries; each entry's `old_part` is the part as it looked before that
//! change. The config active at time T is therefore the `old_part` of the
//! entry one newer than the last change at or before T - except when that
//! last change is the newest entry, in which case the live part holds the
//! active config.

mod mods;

pub use mods::{ConfigMod, ModPath, PathSegment, apply_fragment_mods, collect_mods};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, error};

use sandview_model::{MachineId, PartId, Pass, PassId};

use crate::error::Result;
use crate::platform::{ConfigHistoryEntry, DataPlatform};

/// Provenance of a derived configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigMetadata {
    pub part_id: PartId,
    pub robot_id: MachineId,
    /// When the change that produced this configuration landed.
    pub config_timestamp: DateTime<Utc>,
    pub has_old_config: bool,
}

impl ConfigMetadata {
    pub fn from_entry(entry: &ConfigHistoryEntry) -> Self {
        Self {
            part_id: entry.part_id.clone(),
            robot_id: entry.robot_id.clone(),
            config_timestamp: entry.when,
            has_old_config: entry.old_part.is_some(),
        }
    }
}

/// A configuration derived for a point in time, fragment mods applied.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: Value,
    pub metadata: ConfigMetadata,
}

/// Walks configuration history to answer "what was the config when this
/// pass started?".
pub struct ConfigResolver {
    platform: Arc<dyn DataPlatform>,
}

impl std::fmt::Debug for ConfigResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigResolver").finish()
    }
}

impl ConfigResolver {
    pub fn new(platform: Arc<dyn DataPlatform>) -> Self {
        Self { platform }
    }

    /// The configuration active at `at`, or `None` when it cannot be
    /// derived (no history, timestamp before all history, or a history
    /// entry without a usable config). Failures are logged and produce
    /// `None`; no partial config is ever fabricated.
    pub async fn config_at_time(
        &self,
        part_id: &PartId,
        at: DateTime<Utc>,
    ) -> Result<Option<ResolvedConfig>> {
        let history = match self.platform.get_config_history(part_id).await {
            Ok(history) => history,
            Err(err) => {
                error!(part = %part_id, "error fetching config history: {err}");
                return Ok(None);
            }
        };
        if history.is_empty() {
            debug!(part = %part_id, "no config history for part");
            return Ok(None);
        }

        // First (newest) entry at or before the requested time: the last
        // change made before our target.
        let Some(last_change_index) =
            history.iter().position(|entry| entry.when <= at)
        else {
            debug!(part = %part_id, %at, "timestamp predates all config history");
            return Ok(None);
        };

        let base = if last_change_index > 0 {
            // The state after that change is the `old_part` of the next
            // newer entry.
            let newer = &history[last_change_index - 1];
            match newer
                .old_part
                .as_ref()
                .and_then(|part| part.get("robot_config"))
            {
                Some(config) => config.clone(),
                None => {
                    error!("invalid config structure in history entry");
                    return Ok(None);
                }
            }
        } else {
            // The last change is the newest one; the active config is the
            // absolute latest, so fetch the part directly.
            let part = match self.platform.get_robot_part(part_id).await {
                Ok(part) => part,
                Err(err) => {
                    error!(part = %part_id, "could not fetch current robot part: {err}");
                    return Ok(None);
                }
            };
            match part.as_ref().and_then(|part| part.get("robot_config")) {
                Some(config) => config.clone(),
                None => {
                    error!("current robot part has no config");
                    return Ok(None);
                }
            }
        };

        let config = apply_fragment_mods(&base);
        let metadata = ConfigMetadata::from_entry(&history[last_change_index]);
        Ok(Some(ResolvedConfig { config, metadata }))
    }
}

/// Comparison of a pass's configuration against its chronological
/// predecessor.
#[derive(Debug, Clone, Copy)]
pub struct ConfigComparison<'a> {
    /// The previous pass in time (the next entry of the newest-first
    /// list), when there is one.
    pub prev_pass: Option<&'a Pass>,
    /// `true` only when both passes have known config metadata with
    /// different change timestamps.
    pub config_changed: bool,
}

/// Compare a pass against the previous one over a newest-first pass list.
pub fn config_comparison<'a>(
    pass: &Pass,
    all_passes: &'a [Pass],
    metadata: &HashMap<PassId, ConfigMetadata>,
) -> ConfigComparison<'a> {
    let index = all_passes
        .iter()
        .position(|candidate| candidate.pass_id == pass.pass_id);
    let prev_pass = match index {
        Some(index) if index + 1 < all_passes.len() => {
            Some(&all_passes[index + 1])
        }
        _ => None,
    };

    let Some(prev_pass) = prev_pass else {
        return ConfigComparison {
            prev_pass: None,
            config_changed: false,
        };
    };

    let current = metadata.get(&pass.pass_id);
    let previous = metadata.get(&prev_pass.pass_id);
    let config_changed = matches!(
        (current, previous),
        (Some(current), Some(previous))
            if current.config_timestamp != previous.config_timestamp
    );

    ConfigComparison {
        prev_pass: Some(prev_pass),
        config_changed,
    }
}

/// File name for a downloaded config snapshot, e.g.
/// `config-a1b2c3d4-pass-0f9e8d7c-2026-03-01-8-30-00AM.json` (UTC).
pub fn config_download_file_name(
    machine_id: &MachineId,
    pass_id: &PassId,
    config_timestamp: DateTime<Utc>,
) -> String {
    let machine = truncate(machine_id.as_str(), 8);
    let pass = truncate(pass_id.as_str(), 8);
    let stamp = config_timestamp.format("%Y-%m-%d-%-I-%M-%S%p");
    format!("config-{machine}-pass-{pass}-{stamp}.json")
}

fn truncate(raw: &str, len: usize) -> &str {
    match raw.char_indices().nth(len) {
        Some((at, _)) => &raw[..at],
        None => raw,
    }
}
