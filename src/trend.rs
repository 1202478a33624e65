use std::collections::BTreeMap;

use serde::Serialize;

use crate::buckets::{months_of_years, touched_years, weeks_of_years, MonthKey, WeekKey};
use crate::models::ViolationRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint<K> {
    pub period: K,
    pub count: usize,
    pub completed_count: usize,
}

/// Violation counts per week over every week of every touched year.
///
/// Records are binned by `interview_date`; records without one are left out.
pub fn weekly_trend(records: &[ViolationRecord], fallback_year: i32) -> Vec<TrendPoint<WeekKey>> {
    let years = touched_years(records.iter().filter_map(|r| r.interview_date), fallback_year);
    fill(weeks_of_years(&years), records, WeekKey::of)
}

/// Violation counts per calendar month over every month of every touched year.
pub fn monthly_trend(
    records: &[ViolationRecord],
    fallback_year: i32,
) -> Vec<TrendPoint<MonthKey>> {
    let years = touched_years(records.iter().filter_map(|r| r.interview_date), fallback_year);
    fill(months_of_years(&years), records, MonthKey::of)
}

fn fill<K, F>(periods: Vec<K>, records: &[ViolationRecord], key_of: F) -> Vec<TrendPoint<K>>
where
    K: Ord + Copy,
    F: Fn(chrono::NaiveDate) -> K,
{
    let mut counts: BTreeMap<K, (usize, usize)> =
        periods.iter().map(|&period| (period, (0, 0))).collect();

    for record in records {
        let Some(date) = record.interview_date else {
            continue;
        };
        let entry = counts.entry(key_of(date)).or_insert((0, 0));
        entry.0 += 1;
        if record.is_completed() {
            entry.1 += 1;
        }
    }

    counts
        .into_iter()
        .map(|(period, (count, completed_count))| TrendPoint {
            period,
            count,
            completed_count,
        })
        .collect()
}
