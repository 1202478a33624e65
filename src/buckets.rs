//! Weeks are Sunday-anchored and numbered `ceil(days since January 1st / 7)`,
//! counted from the week's Sunday. Not ISO-8601: a year can start at week 0
//! and early January can belong to the previous year's last week.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeekKey {
    pub year: i32,
    pub week: u32,
}

impl WeekKey {
    pub fn of(date: NaiveDate) -> Self {
        let week_start = week_start(date);
        let year = week_start.year();
        let days = (week_start - start_of_year(year)).num_days();
        WeekKey {
            year,
            week: ceil_weeks(days),
        }
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{}", self.year, self.week)
    }
}

impl Serialize for WeekKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn of(date: NaiveDate) -> Self {
        MonthKey {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn ceil_weeks(days: i64) -> u32 {
    // week_start is never before January 1st of its own year
    ((days.max(0) + 6) / 7) as u32
}

/// Most recent Sunday at or before `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().num_days_from_sunday();
    date - Duration::days(i64::from(offset))
}

fn start_of_year(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Distinct calendar years touched by `dates`, or `fallback_year` if none.
pub fn touched_years<I>(dates: I, fallback_year: i32) -> BTreeSet<i32>
where
    I: IntoIterator<Item = NaiveDate>,
{
    let mut years: BTreeSet<i32> = dates.into_iter().map(|date| date.year()).collect();
    if years.is_empty() {
        years.insert(fallback_year);
    }
    years
}

/// Every week key produced by any day of the given years, ascending.
pub fn weeks_of_years(years: &BTreeSet<i32>) -> Vec<WeekKey> {
    let mut weeks = BTreeSet::new();
    for &year in years {
        let Some(mut day) = NaiveDate::from_ymd_opt(year, 1, 1) else {
            continue;
        };
        while day.year() == year {
            weeks.insert(WeekKey::of(day));
            day = match day.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
    }
    weeks.into_iter().collect()
}

/// All twelve months of each given year, ascending.
pub fn months_of_years(years: &BTreeSet<i32>) -> Vec<MonthKey> {
    years
        .iter()
        .flat_map(|&year| (1..=12).map(move |month| MonthKey { year, month }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn year_starting_on_sunday_begins_at_week_zero() {
        // 2023-01-01 was a Sunday
        assert_eq!(WeekKey::of(date(2023, 1, 1)).to_string(), "2023-W0");
        assert_eq!(WeekKey::of(date(2023, 1, 7)).to_string(), "2023-W0");
        assert_eq!(WeekKey::of(date(2023, 1, 8)).to_string(), "2023-W1");
    }

    #[test]
    fn early_january_can_belong_to_previous_year() {
        // 2024-01-01 was a Monday; its week started on 2023-12-31
        assert_eq!(WeekKey::of(date(2024, 1, 1)).to_string(), "2023-W52");
        assert_eq!(WeekKey::of(date(2024, 1, 6)).to_string(), "2023-W52");
        assert_eq!(WeekKey::of(date(2024, 1, 7)).to_string(), "2024-W1");
    }

    #[test]
    fn mid_year_week_number() {
        // 2025-06-11 is a Wednesday, week starts Sunday 2025-06-08 (day 158)
        assert_eq!(WeekKey::of(date(2025, 6, 11)).to_string(), "2025-W23");
    }

    #[test]
    fn month_key_is_zero_padded() {
        assert_eq!(MonthKey::of(date(2025, 3, 31)).to_string(), "2025-03");
        assert_eq!(MonthKey::of(date(2025, 11, 1)).to_string(), "2025-11");
    }

    #[test]
    fn week_keys_follow_chronological_order_within_a_year() {
        let mut previous = WeekKey::of(date(2025, 1, 5));
        let mut day = date(2025, 1, 6);
        while day.year() == 2025 {
            let current = WeekKey::of(day);
            assert!(current >= previous, "{current} sorted before {previous}");
            previous = current;
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn touched_years_default_to_fallback() {
        let years = touched_years(Vec::new(), 2026);
        assert_eq!(years.into_iter().collect::<Vec<_>>(), vec![2026]);
    }

    #[test]
    fn week_set_covers_whole_year_including_spillover() {
        let years = touched_years(vec![date(2024, 5, 1)], 2000);
        let weeks = weeks_of_years(&years);
        assert_eq!(weeks.first().map(ToString::to_string).as_deref(), Some("2023-W52"));
        assert_eq!(weeks.last().map(ToString::to_string).as_deref(), Some("2024-W52"));
        assert!(weeks.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(weeks.len(), 53);
    }

    #[test]
    fn month_set_has_twelve_entries_per_year() {
        let years = touched_years(vec![date(2024, 5, 1), date(2025, 2, 1)], 2000);
        let months = months_of_years(&years);
        assert_eq!(months.len(), 24);
        assert_eq!(months[0].to_string(), "2024-01");
        assert_eq!(months[23].to_string(), "2025-12");
    }
}
