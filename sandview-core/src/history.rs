//! Day-level grouping and aggregates for the history table.
//!
//! Passes arrive newest first; the table shows them grouped by (UTC) day
//! with a summary header per day and paginates by days, not by rows.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDate};

use sandview_model::{Cause, Pass, PassDiagnosis, PassId, Symptom};

/// Summary line for one day of operation.
#[derive(Debug, Clone)]
pub struct DayAggregate {
    pub date: NaiveDate,
    /// Wall-clock sum of pass durations.
    pub total_factory_time: Duration,
    /// Time spent in "executing" steps.
    pub total_execution_time: Duration,
    /// Time spent in every other step.
    pub total_other_steps_time: Duration,
    pub total_pass_count: usize,
    /// Executing share of all step time, 0-100. Zero when no step time
    /// was recorded at all.
    pub execution_percentage: f64,
    pub total_blue_points: u64,
    /// Diagnosis tallies over the day's failed passes.
    pub symptom_counts: HashMap<Symptom, usize>,
    pub cause_counts: HashMap<Cause, usize>,
}

/// Group passes by the UTC day they started, keeping each day's passes in
/// their incoming (newest-first) order.
pub fn group_by_day(passes: &[Pass]) -> BTreeMap<NaiveDate, Vec<&Pass>> {
    let mut grouped: BTreeMap<NaiveDate, Vec<&Pass>> = BTreeMap::new();
    for pass in passes {
        grouped.entry(pass.start.date_naive()).or_default().push(pass);
    }
    grouped
}

/// Compute per-day aggregates over grouped passes.
pub fn day_aggregates(
    grouped: &BTreeMap<NaiveDate, Vec<&Pass>>,
    diagnoses: &HashMap<PassId, PassDiagnosis>,
) -> BTreeMap<NaiveDate, DayAggregate> {
    grouped
        .iter()
        .map(|(&date, passes)| {
            let mut aggregate = DayAggregate {
                date,
                total_factory_time: Duration::zero(),
                total_execution_time: Duration::zero(),
                total_other_steps_time: Duration::zero(),
                total_pass_count: passes.len(),
                execution_percentage: 0.0,
                total_blue_points: 0,
                symptom_counts: HashMap::new(),
                cause_counts: HashMap::new(),
            };

            for pass in passes {
                aggregate.total_factory_time =
                    aggregate.total_factory_time + pass.duration();
                aggregate.total_execution_time =
                    aggregate.total_execution_time + pass.execution_time();
                aggregate.total_other_steps_time =
                    aggregate.total_other_steps_time + pass.overhead_time();

                if let Some(count) = pass.blue_point_count {
                    aggregate.total_blue_points += count;
                }

                // Diagnoses only count against failed passes.
                if !pass.success
                    && let Some(diagnosis) = diagnoses.get(&pass.pass_id)
                {
                    if let Some(symptom) = &diagnosis.symptom {
                        *aggregate
                            .symptom_counts
                            .entry(symptom.clone())
                            .or_default() += 1;
                    }
                    if let Some(cause) = &diagnosis.cause {
                        *aggregate
                            .cause_counts
                            .entry(cause.clone())
                            .or_default() += 1;
                    }
                }
            }

            let total_steps_time = aggregate.total_execution_time
                + aggregate.total_other_steps_time;
            if total_steps_time > Duration::zero() {
                aggregate.execution_percentage = aggregate
                    .total_execution_time
                    .num_milliseconds()
                    as f64
                    / total_steps_time.num_milliseconds() as f64
                    * 100.0;
            }

            (date, aggregate)
        })
        .collect()
}

/// One page of the day-paginated history view.
#[derive(Debug, Clone)]
pub struct DayPage<'a> {
    /// The selected days, most recent first.
    pub days: Vec<NaiveDate>,
    /// Every pass of the selected days, newest first.
    pub passes: Vec<&'a Pass>,
    /// 1-based page number actually served (clamped to the last page).
    pub current_page: usize,
    pub total_pages: usize,
    pub total_days: usize,
    pub total_entries: usize,
}

/// Slice a newest-first pass list into its `page`-th window of
/// `days_per_page` days. Pages are 1-based.
pub fn page_by_days(
    passes: &[Pass],
    page: usize,
    days_per_page: usize,
) -> DayPage<'_> {
    let days_per_page = days_per_page.max(1);
    let grouped = group_by_day(passes);

    // BTreeMap iterates oldest first; the table wants newest first.
    let all_days: Vec<NaiveDate> = grouped.keys().rev().copied().collect();
    let total_days = all_days.len();
    let total_pages = total_days.div_ceil(days_per_page).max(1);
    let current_page = page.clamp(1, total_pages);

    let days: Vec<NaiveDate> = all_days
        .into_iter()
        .skip((current_page - 1) * days_per_page)
        .take(days_per_page)
        .collect();
    let selected: Vec<&Pass> = days
        .iter()
        .flat_map(|day| grouped[day].iter().copied())
        .collect();

    DayPage {
        days,
        passes: selected,
        current_page,
        total_pages,
        total_days,
        total_entries: passes.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use sandview_model::Step;

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
    }

    fn pass(id: &str, day: u32, hour: u32, success: bool) -> Pass {
        let start = ts(day, hour);
        let end = ts(day, hour + 1);
        Pass {
            pass_id: PassId::new(id),
            start,
            end,
            steps: vec![
                Step {
                    name: "imaging".to_string(),
                    start,
                    end: start + Duration::minutes(15),
                    pass_id: PassId::new(id),
                },
                Step {
                    name: "executing".to_string(),
                    start: start + Duration::minutes(15),
                    end: start + Duration::minutes(60),
                    pass_id: PassId::new(id),
                },
            ],
            success,
            err_string: None,
            build_info: None,
            blue_point_count: Some(10),
            blue_point_diff_percent: None,
            sanding_distance_mm: None,
        }
    }

    #[test]
    fn aggregates_sum_times_and_count_diagnoses() {
        // Newest first: two passes on day 2, one on day 1.
        let passes = vec![
            pass("p3", 2, 12, false),
            pass("p2", 2, 8, true),
            pass("p1", 1, 9, true),
        ];
        let mut diagnoses = HashMap::new();
        diagnoses.insert(
            PassId::new("p3"),
            PassDiagnosis {
                pass_id: PassId::new("p3"),
                symptom: Some(Symptom::PStop),
                cause: Some(Cause::PartIssue),
                jira_ticket_url: None,
                updated_at: Utc::now(),
                updated_by: "test".to_string(),
            },
        );
        // A diagnosis on a successful pass must not be counted.
        diagnoses.insert(
            PassId::new("p2"),
            PassDiagnosis {
                pass_id: PassId::new("p2"),
                symptom: Some(Symptom::SystemError),
                cause: None,
                jira_ticket_url: None,
                updated_at: Utc::now(),
                updated_by: "test".to_string(),
            },
        );

        let aggregates = day_aggregates(&group_by_day(&passes), &diagnoses);
        assert_eq!(aggregates.len(), 2);

        let day2 = &aggregates[&NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()];
        assert_eq!(day2.total_pass_count, 2);
        assert_eq!(day2.total_factory_time, Duration::hours(2));
        assert_eq!(day2.total_execution_time, Duration::minutes(90));
        assert_eq!(day2.total_other_steps_time, Duration::minutes(30));
        assert_eq!(day2.execution_percentage, 75.0);
        assert_eq!(day2.total_blue_points, 20);
        assert_eq!(day2.symptom_counts.get(&Symptom::PStop), Some(&1));
        assert_eq!(day2.symptom_counts.get(&Symptom::SystemError), None);
        assert_eq!(day2.cause_counts.get(&Cause::PartIssue), Some(&1));
    }

    #[test]
    fn paging_selects_most_recent_days_first() {
        let passes = vec![
            pass("p4", 4, 9, true),
            pass("p3", 3, 9, true),
            pass("p2", 2, 9, true),
            pass("p1", 1, 9, true),
        ];

        let first = page_by_days(&passes, 1, 3);
        assert_eq!(first.total_pages, 2);
        assert_eq!(first.total_days, 4);
        assert_eq!(first.days.len(), 3);
        assert_eq!(first.days[0], NaiveDate::from_ymd_opt(2026, 3, 4).unwrap());
        assert_eq!(first.passes.len(), 3);
        assert_eq!(first.passes[0].pass_id, PassId::new("p4"));

        let second = page_by_days(&passes, 2, 3);
        assert_eq!(second.days.len(), 1);
        assert_eq!(second.passes[0].pass_id, PassId::new("p1"));

        // Out-of-range pages clamp to the last page.
        let clamped = page_by_days(&passes, 99, 3);
        assert_eq!(clamped.current_page, 2);
    }

    #[test]
    fn empty_history_yields_one_empty_page() {
        let page = page_by_days(&[], 1, 7);
        assert_eq!(page.total_pages, 1);
        assert!(page.days.is_empty());
        assert!(page.passes.is_empty());
    }
}
