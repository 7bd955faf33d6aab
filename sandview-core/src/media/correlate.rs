//! Correlating media records with passes and steps.

use sandview_model::{MediaRecord, Pass, Step};

use crate::media::MediaIndex;

/// The camera frames bracketing a pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct BeforeAfterImages<'a> {
    /// Earliest image captured at or after the pass start.
    pub before: Option<&'a MediaRecord>,
    /// Latest image captured at or before the pass end.
    pub after: Option<&'a MediaRecord>,
}

/// Pick the before/after camera images for a pass.
///
/// Only images whose capture component matches `camera_name` are
/// considered. Ties on the boundary timestamps resolve to the record that
/// was merged into the index first, which keeps the selection stable for
/// identical input orderings.
pub fn before_after_images<'a>(
    pass: &Pass,
    index: &'a MediaIndex,
    camera_name: &str,
) -> BeforeAfterImages<'a> {
    let mut result = BeforeAfterImages::default();

    for image in index.images() {
        let Some(at) = image.time_requested else {
            continue;
        };
        if image.component_name() != Some(camera_name) {
            continue;
        }

        if at >= pass.start {
            let earlier = result
                .before
                .and_then(|best| best.time_requested)
                .is_none_or(|best| at < best);
            if earlier {
                result.before = Some(image);
            }
        }
        if at <= pass.end {
            let later = result
                .after
                .and_then(|best| best.time_requested)
                .is_none_or(|best| at > best);
            if later {
                result.after = Some(image);
            }
        }
    }

    result
}

/// All videos captured during a step, sorted ascending by capture time.
pub fn step_videos<'a>(step: &Step, index: &'a MediaIndex) -> Vec<&'a MediaRecord> {
    let mut videos: Vec<&MediaRecord> = index
        .videos()
        .filter(|video| video.is_in_time_range(step.start, step.end))
        .collect();
    videos.sort_by_key(|video| video.time_requested);
    videos
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use sandview_model::{BinaryDataId, CaptureMetadata, PassId};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn image(id: &str, camera: &str, secs: i64) -> MediaRecord {
        MediaRecord {
            binary_data_id: BinaryDataId::new(id),
            file_name: format!("captures/{id}.jpg"),
            time_requested: Some(ts(secs)),
            uri: String::new(),
            dataset_ids: Vec::new(),
            capture_metadata: Some(CaptureMetadata {
                component_name: Some(camera.to_string()),
                component_type: Some("camera".to_string()),
                method_name: Some("ReadImage".to_string()),
            }),
        }
    }

    fn video(id: &str, secs: i64) -> MediaRecord {
        MediaRecord {
            binary_data_id: BinaryDataId::new(id),
            file_name: format!("videos/{id}.mp4"),
            time_requested: Some(ts(secs)),
            uri: String::new(),
            dataset_ids: Vec::new(),
            capture_metadata: None,
        }
    }

    fn pass(start: i64, end: i64) -> Pass {
        Pass {
            pass_id: PassId::new("p1"),
            start: ts(start),
            end: ts(end),
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
    fn picks_earliest_after_start_and_latest_before_end() {
        let index: MediaIndex = [
            image("early", "cam-a", 90),
            image("first", "cam-a", 110),
            image("middle", "cam-a", 150),
            image("last", "cam-a", 190),
            image("late", "cam-a", 210),
        ]
        .into_iter()
        .collect();

        let found = before_after_images(&pass(100, 200), &index, "cam-a");
        assert_eq!(found.before.unwrap().binary_data_id.as_str(), "first");
        assert_eq!(found.after.unwrap().binary_data_id.as_str(), "last");
    }

    #[test]
    fn filters_by_camera_and_returns_none_when_empty() {
        let index: MediaIndex =
            [image("wrong", "cam-b", 150)].into_iter().collect();

        let found = before_after_images(&pass(100, 200), &index, "cam-a");
        assert!(found.before.is_none());
        assert!(found.after.is_none());
    }

    #[test]
    fn tie_break_is_first_merged() {
        let index: MediaIndex = [
            image("one", "cam-a", 150),
            image("two", "cam-a", 150),
        ]
        .into_iter()
        .collect();

        let found = before_after_images(&pass(100, 200), &index, "cam-a");
        assert_eq!(found.before.unwrap().binary_data_id.as_str(), "one");
        assert_eq!(found.after.unwrap().binary_data_id.as_str(), "one");
    }

    #[test]
    fn step_videos_are_contained_and_sorted() {
        let step = Step {
            name: "executing".to_string(),
            start: ts(100),
            end: ts(200),
            pass_id: PassId::new("p1"),
        };
        let index: MediaIndex = [
            video("after", 250),
            video("second", 180),
            video("first", 120),
            image("not-a-video", "cam-a", 150),
        ]
        .into_iter()
        .collect();

        let found = step_videos(&step, &index);
        let ids: Vec<&str> =
            found.iter().map(|v| v.binary_data_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
    }
}
