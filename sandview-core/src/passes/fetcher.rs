use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use sandview_model::{BuildInfo, Pass, PassId, PartId, Step};

use crate::error::Result;
use crate::platform::{DataPlatform, PassRecordFilter};

/// Records fetched per tabular query.
pub const PASS_BATCH_SIZE: usize = 100;

/// Outcome of one full history fetch.
#[derive(Debug, Clone)]
pub struct PassHistory {
    /// Passes in the platform's newest-first order, with
    /// `blue_point_diff_percent` already filled in.
    pub passes: Vec<Pass>,
    /// Part id lifted from the newest record, when present. Configuration
    /// history is keyed by this.
    pub part_id: Option<PartId>,
    /// `false` when pagination halted early because a record was missing
    /// its cursor field; the list may be missing older passes.
    pub complete: bool,
}

/// Paginates pass-summary records out of the tabular store and decodes
/// them into [`Pass`] entities.
///
/// Queries run strictly sequentially; each batch's cursor is the
/// `time_received` of the previous batch's last record, applied as a
/// strict less-than bound. Pagination stops on a short or empty batch.
pub struct PassFetcher {
    platform: Arc<dyn DataPlatform>,
    filter: PassRecordFilter,
    batch_size: usize,
}

impl std::fmt::Debug for PassFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassFetcher")
            .field("filter", &self.filter)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl PassFetcher {
    pub fn new(platform: Arc<dyn DataPlatform>, filter: PassRecordFilter) -> Self {
        Self {
            platform,
            filter,
            batch_size: PASS_BATCH_SIZE,
        }
    }

    /// Override the query batch size. Mostly useful in tests.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Fetch the machine's entire pass history.
    pub async fn fetch_history(&self) -> Result<PassHistory> {
        self.fetch_history_inner(None).await
    }

    /// Fetch history, stopping once records older than `since` show up.
    pub async fn fetch_history_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<PassHistory> {
        self.fetch_history_inner(Some(since)).await
    }

    async fn fetch_history_inner(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<PassHistory> {
        let mut raw: Vec<Value> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut complete = true;

        loop {
            debug!(
                machine = %self.filter.machine_id,
                cursor = cursor.as_deref().unwrap_or("<start>"),
                "fetching pass summary batch"
            );
            let batch = self
                .platform
                .query_tabular(&self.filter, cursor.as_deref(), self.batch_size)
                .await?;
            debug!("received {} pass records in batch", batch.len());

            if batch.is_empty() {
                break;
            }

            let short_batch = batch.len() < self.batch_size;
            let next_cursor = batch
                .last()
                .and_then(|record| record.get("time_received"))
                .and_then(Value::as_str)
                .map(str::to_string);
            raw.extend(batch);

            match next_cursor {
                Some(bound) => cursor = Some(bound),
                None => {
                    // Without the cursor field we cannot page further;
                    // surface what we have instead of failing the fetch.
                    warn!(
                        "pass record is missing time_received, halting \
                         pagination with a partial history"
                    );
                    complete = false;
                    break;
                }
            }

            if short_batch {
                break;
            }

            if let Some(since) = since {
                let oldest = raw
                    .last()
                    .and_then(|record| record.get("time_received"))
                    .and_then(Value::as_str)
                    .and_then(parse_timestamp_str);
                if oldest.is_some_and(|at| at < since) {
                    break;
                }
            }
        }

        let part_id = raw
            .first()
            .and_then(|record| record.get("part_id"))
            .and_then(Value::as_str)
            .map(PartId::new);

        let mut passes: Vec<Pass> = raw.iter().filter_map(decode_pass).collect();
        if let Some(since) = since {
            passes.retain(|pass| pass.start >= since);
        }
        compute_blue_point_diffs(&mut passes);

        debug!(
            total = passes.len(),
            complete, "assembled pass history"
        );
        Ok(PassHistory {
            passes,
            part_id,
            complete,
        })
    }
}

/// Fill in `blue_point_diff_percent` over a newest-first pass list.
///
/// Index i is compared against index i+1 (the chronologically previous
/// pass); the oldest pass never receives a diff.
pub fn compute_blue_point_diffs(passes: &mut [Pass]) {
    if passes.len() < 2 {
        return;
    }
    for i in 0..passes.len() - 1 {
        let current = passes[i].blue_point_count;
        let previous = passes[i + 1].blue_point_count;
        if let (Some(current), Some(previous)) = (current, previous)
            && previous != 0
        {
            let diff = current as f64 - previous as f64;
            passes[i].blue_point_diff_percent =
                Some(diff / previous as f64 * 100.0);
        }
    }
}

/// Decode one raw tabular record into a [`Pass`].
///
/// Tolerant by design: a record without readings, pass id, or usable
/// timestamps is skipped with a warning; missing numeric fields stay
/// `None` instead of becoming zero.
fn decode_pass(record: &Value) -> Option<Pass> {
    let readings = match record.get("data").and_then(|data| data.get("readings")) {
        Some(readings) => readings,
        None => {
            warn!("tabular record has no readings payload, skipping");
            return None;
        }
    };

    let pass_id = match readings.get("pass_id").and_then(Value::as_str) {
        Some(id) if !id.trim().is_empty() => PassId::new(id),
        _ => {
            warn!("pass record has no pass_id, skipping");
            return None;
        }
    };

    let start = readings.get("start").and_then(parse_timestamp);
    let end = readings.get("end").and_then(parse_timestamp);
    let (start, end) = match (start, end) {
        (Some(start), Some(end)) => (start, end),
        _ => {
            warn!(pass = %pass_id, "pass record has unusable start/end, skipping");
            return None;
        }
    };

    let steps = readings
        .get("steps")
        .and_then(Value::as_array)
        .map(|raw_steps| {
            raw_steps
                .iter()
                .filter_map(|raw| decode_step(raw, &pass_id))
                .collect()
        })
        .unwrap_or_default();

    let build_info = readings
        .get("build_info")
        .filter(|info| info.is_object())
        .and_then(|info| serde_json::from_value::<BuildInfo>(info.clone()).ok());

    Some(Pass {
        pass_id,
        start,
        end,
        steps,
        success: readings
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(true),
        err_string: readings
            .get("err_string")
            .and_then(Value::as_str)
            .filter(|err| !err.is_empty())
            .map(str::to_string),
        build_info,
        blue_point_count: readings
            .get("target_points_count")
            .and_then(parse_count),
        blue_point_diff_percent: None,
        sanding_distance_mm: readings
            .get("sanding_distance_mm")
            .and_then(parse_number),
    })
}

fn decode_step(raw: &Value, pass_id: &PassId) -> Option<Step> {
    let name = raw.get("name").and_then(Value::as_str)?;
    let start = raw.get("start").and_then(parse_timestamp)?;
    let end = raw.get("end").and_then(parse_timestamp)?;
    Some(Step {
        name: name.to_string(),
        start,
        end,
        pass_id: pass_id.clone(),
    })
}

/// Accept RFC 3339 strings or epoch milliseconds.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => parse_timestamp_str(raw),
        Value::Number(raw) => raw
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

fn parse_timestamp_str(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

/// Non-negative integer, tolerating float and numeric-string encodings.
fn parse_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(raw) => raw.as_u64().or_else(|| {
            raw.as_f64()
                .filter(|n| n.is_finite() && *n >= 0.0)
                .map(|n| n as u64)
        }),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(raw) => raw.as_f64().filter(|n| n.is_finite()),
        Value::String(raw) => {
            raw.trim().parse().ok().filter(|n: &f64| n.is_finite())
        }
        _ => None,
    }
}
