use std::collections::HashMap;

use sandview_model::{BinaryDataId, MediaKind, MediaRecord, Pass, PassId};

/// In-memory index over every media record fetched so far.
///
/// Records keep their insertion order, which makes lookups deterministic:
/// whenever two records tie on a timestamp, the first one merged wins.
/// Each record belongs to exactly one kind bucket, derived from
/// [`MediaRecord::kind`].
#[derive(Debug, Clone, Default)]
pub struct MediaIndex {
    records: Vec<MediaRecord>,
    by_id: HashMap<BinaryDataId, usize>,
}

impl MediaIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a batch of records into a new index.
    ///
    /// Pure with respect to the inputs: `self` is consumed and the merged
    /// index is returned, so a half-applied merge is never observable.
    /// Re-merging an id that is already present is a no-op; the existing
    /// record is kept untouched.
    #[must_use]
    pub fn merged(
        mut self,
        incoming: impl IntoIterator<Item = MediaRecord>,
    ) -> Self {
        for record in incoming {
            if self.by_id.contains_key(&record.binary_data_id) {
                continue;
            }
            self.by_id
                .insert(record.binary_data_id.clone(), self.records.len());
            self.records.push(record);
        }
        self
    }

    pub fn get(&self, id: &BinaryDataId) -> Option<&MediaRecord> {
        self.by_id.get(id).map(|&slot| &self.records[slot])
    }

    pub fn contains(&self, id: &BinaryDataId) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &MediaRecord> {
        self.records.iter()
    }

    pub fn videos(&self) -> impl Iterator<Item = &MediaRecord> {
        self.of_kind(MediaKind::Video)
    }

    pub fn images(&self) -> impl Iterator<Item = &MediaRecord> {
        self.of_kind(MediaKind::Image)
    }

    /// Plain files: everything that is neither a video nor an image.
    pub fn others(&self) -> impl Iterator<Item = &MediaRecord> {
        self.of_kind(MediaKind::Other)
    }

    pub fn of_kind(&self, kind: MediaKind) -> impl Iterator<Item = &MediaRecord> {
        self.records.iter().filter(move |record| record.kind() == kind)
    }

    pub fn count_of_kind(&self, kind: MediaKind) -> usize {
        self.of_kind(kind).count()
    }

    /// Records captured within `[start, end]`, in insertion order.
    pub fn in_time_range(
        &self,
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    ) -> Vec<&MediaRecord> {
        self.records
            .iter()
            .filter(|record| record.is_in_time_range(start, end))
            .collect()
    }

    /// Records whose file name carries the pass id as a path segment.
    pub fn for_pass_id(&self, pass_id: &PassId) -> Vec<&MediaRecord> {
        self.records
            .iter()
            .filter(|record| record.is_part_of_pass(pass_id))
            .collect()
    }

    /// Every file that belongs to a pass: the union of the time-range match
    /// and the file-name match, deduplicated by id and sorted ascending by
    /// capture time (untimed records first).
    ///
    /// A record matching both conditions appears exactly once - the union
    /// is computed in a single scan over the index.
    pub fn pass_files(&self, pass: &Pass) -> Vec<&MediaRecord> {
        let mut files: Vec<&MediaRecord> = self
            .records
            .iter()
            .filter(|record| {
                record.is_part_of_pass(&pass.pass_id)
                    || record.is_in_time_range(pass.start, pass.end)
            })
            .collect();
        files.sort_by_key(|record| record.time_requested);
        files
    }

    /// Case-insensitive substring search over full file paths.
    pub fn search_by_file_name(&self, term: &str) -> Vec<&MediaRecord> {
        let term = term.to_lowercase();
        self.records
            .iter()
            .filter(|record| record.file_name.to_lowercase().contains(&term))
            .collect()
    }
}

impl FromIterator<MediaRecord> for MediaIndex {
    fn from_iter<T: IntoIterator<Item = MediaRecord>>(iter: T) -> Self {
        MediaIndex::new().merged(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sandview_model::CaptureMetadata;

    fn record(id: &str, file_name: &str, secs: Option<i64>) -> MediaRecord {
        MediaRecord {
            binary_data_id: BinaryDataId::new(id),
            file_name: file_name.to_string(),
            time_requested: secs.map(|s| Utc.timestamp_opt(s, 0).unwrap()),
            uri: format!("https://store.invalid/{id}"),
            dataset_ids: Vec::new(),
            capture_metadata: None,
        }
    }

    fn pass(id: &str, start: i64, end: i64) -> Pass {
        Pass {
            pass_id: PassId::new(id),
            start: Utc.timestamp_opt(start, 0).unwrap(),
            end: Utc.timestamp_opt(end, 0).unwrap(),
            steps: Vec::new(),
            success: true,
            err_string: None,
            build_info: None,
            blue_point_count: None,
            blue_point_diff_percent: None,
            sanding_distance_mm: None,
        }
    }

    #[test]
    fn merge_is_idempotent_and_keeps_existing_records() {
        let complete = MediaRecord {
            capture_metadata: Some(CaptureMetadata {
                component_name: Some("cam".into()),
                component_type: None,
                method_name: Some("ReadImage".into()),
            }),
            ..record("a", "runs/p/one.png", Some(100))
        };
        let incomplete = record("a", "runs/p/one.png", None);

        let index = MediaIndex::new()
            .merged([complete.clone()])
            .merged([incomplete, record("b", "runs/p/two.png", Some(200))]);

        assert_eq!(index.len(), 2);
        // The first-merged record survives a re-merge of the same id.
        assert_eq!(
            index.get(&BinaryDataId::new("a")).unwrap().time_requested,
            complete.time_requested
        );
    }

    #[test]
    fn buckets_are_mutually_exclusive_and_total() {
        let index: MediaIndex = [
            record("v", "runs/p/clip.mp4", Some(1)),
            record("i", "runs/p/shot.jpg", Some(2)),
            record("o", "runs/p/mesh.ply", Some(3)),
        ]
        .into_iter()
        .collect();

        assert_eq!(index.videos().count(), 1);
        assert_eq!(index.images().count(), 1);
        assert_eq!(index.others().count(), 1);
        assert_eq!(
            index.videos().count() + index.images().count() + index.others().count(),
            index.len()
        );
    }

    #[test]
    fn pass_files_unions_and_dedupes() {
        let p = pass("pass-9", 100, 200);
        let index: MediaIndex = [
            // Matches both conditions: named after the pass AND in range.
            record("both", "logs/pass-9/trace.txt", Some(150)),
            // Only in time range.
            record("timed", "captures/frame.bin", Some(199)),
            // Only by file name, captured later.
            record("named", "uploads/pass-9/report.pdf", Some(500)),
            // Matches neither.
            record("stray", "other/file.txt", Some(999)),
        ]
        .into_iter()
        .collect();

        let files = index.pass_files(&p);
        let ids: Vec<&str> = files
            .iter()
            .map(|f| f.binary_data_id.as_str())
            .collect();
        assert_eq!(ids, vec!["both", "timed", "named"]);
    }

    #[test]
    fn search_is_case_insensitive() {
        let index: MediaIndex =
            [record("a", "Runs/Pass-1/Overview.PNG", Some(1))]
                .into_iter()
                .collect();
        assert_eq!(index.search_by_file_name("overview").len(), 1);
        assert_eq!(index.search_by_file_name("missing").len(), 0);
    }
}
