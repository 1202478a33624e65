use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::config::AnalyticsConfig;
use crate::models::{Team, ViolationRecord};

/// Post-training observation floor in days.
pub const MIN_COMPARISON_DAYS: i64 = 7;

/// Share of the pre-training window that must also be observed after training, in percent.
pub const COMPARISON_WINDOW_PERCENT: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Improvement {
    Percentage(f64),
    /// Not enough days have passed since training to compare rates.
    NotApplicable,
}

impl Improvement {
    pub fn percentage(self) -> Option<f64> {
        match self {
            Improvement::Percentage(value) => Some(value),
            Improvement::NotApplicable => None,
        }
    }

    pub fn is_not_applicable(self) -> bool {
        matches!(self, Improvement::NotApplicable)
    }
}

impl Serialize for Improvement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Improvement::Percentage(value) => serializer.serialize_f64(*value),
            Improvement::NotApplicable => serializer.serialize_str("N/A"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasonBreakdown {
    pub reason: String,
    pub total_count: usize,
    pub before_count: usize,
    pub after_count: usize,
    /// Share of all pre-training violations, 0 when there were none.
    pub before_percentage: f64,
    pub after_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamEffectiveness {
    pub team_id: String,
    pub team_name: String,
    pub training_date: Option<NaiveDate>,
    pub first_violation_date: Option<NaiveDate>,
    pub total_violations: usize,
    pub violations_before: usize,
    pub violations_after: usize,
    pub days_from_cycle_start: i64,
    pub days_after_training: i64,
    pub required_days_for_comparison: i64,
    pub has_sufficient_data: bool,
    pub rate_before: f64,
    pub rate_after: f64,
    /// `None` for untrained teams.
    pub improvement: Option<Improvement>,
    pub has_new_violations: bool,
    pub reasons: Vec<ReasonBreakdown>,
}

impl TeamEffectiveness {
    pub fn is_trained(&self) -> bool {
        self.training_date.is_some()
    }
}

/// `max(7, ceil(days_from_cycle_start * 10%))`.
pub fn required_days_for_comparison(days_from_cycle_start: i64) -> i64 {
    let scaled = (days_from_cycle_start.max(0) * COMPARISON_WINDOW_PERCENT + 99) / 100;
    scaled.max(MIN_COMPARISON_DAYS)
}

fn rate(count: usize, days: i64) -> f64 {
    if days == 0 {
        0.0
    } else {
        count as f64 / days as f64
    }
}

fn share(count: usize, side_total: usize) -> f64 {
    count as f64 / side_total.max(1) as f64 * 100.0
}

enum Side {
    Before,
    After,
    Undated,
}

/// Evaluates one team against the violations already filtered to its `team_id`.
pub fn evaluate_team(
    team: &Team,
    violations: &[&ViolationRecord],
    config: &AnalyticsConfig,
) -> TeamEffectiveness {
    let training_date = team.effective_training_date();
    let first_violation_date = violations.iter().filter_map(|v| v.occurred_at()).min();

    let side_of = |violation: &ViolationRecord| match (training_date, violation.occurred_at()) {
        (None, _) => Side::After,
        (Some(trained), Some(date)) if date < trained => Side::Before,
        (Some(_), Some(_)) => Side::After,
        (Some(_), None) => Side::Undated,
    };

    let mut violations_before = 0;
    let mut violations_after = 0;
    let mut by_reason: Vec<(String, usize, usize, usize)> = Vec::new();
    let mut reason_slot: HashMap<&str, usize> = HashMap::new();

    for violation in violations {
        let reason = violation.reason();
        let slot = *reason_slot.entry(reason).or_insert_with(|| {
            by_reason.push((reason.to_string(), 0, 0, 0));
            by_reason.len() - 1
        });
        let row = &mut by_reason[slot];
        row.1 += 1;
        match side_of(*violation) {
            Side::Before => {
                violations_before += 1;
                row.2 += 1;
            }
            Side::After => {
                violations_after += 1;
                row.3 += 1;
            }
            Side::Undated => {}
        }
    }

    let (days_from_cycle_start, days_after_training) = match training_date {
        Some(trained) => (
            (trained - config.cycle_start).num_days().max(0),
            (config.evaluation_date - trained).num_days().max(0),
        ),
        None => (0, 0),
    };
    let required_days = required_days_for_comparison(days_from_cycle_start);
    let has_sufficient_data = days_after_training >= required_days;
    let rate_before = rate(violations_before, days_from_cycle_start);
    let rate_after = rate(violations_after, days_after_training);

    let mut has_new_violations = false;
    let improvement = training_date.map(|_| {
        if violations_before == 0 {
            if violations_after == 0 {
                Improvement::Percentage(0.0)
            } else {
                has_new_violations = true;
                Improvement::Percentage(-100.0)
            }
        } else if has_sufficient_data {
            if rate_before > 0.0 {
                Improvement::Percentage((rate_before - rate_after) / rate_before * 100.0)
            } else if rate_after > 0.0 {
                Improvement::Percentage(-100.0)
            } else {
                Improvement::Percentage(0.0)
            }
        } else {
            Improvement::NotApplicable
        }
    });

    let mut reasons: Vec<ReasonBreakdown> = by_reason
        .into_iter()
        .map(|(reason, total_count, before_count, after_count)| ReasonBreakdown {
            reason,
            total_count,
            before_count,
            after_count,
            before_percentage: share(before_count, violations_before),
            after_percentage: share(after_count, violations_after),
        })
        .collect();
    // stable: equal totals keep first-seen order
    reasons.sort_by(|a, b| b.total_count.cmp(&a.total_count));

    TeamEffectiveness {
        team_id: team.team_id.clone(),
        team_name: team.team_name.clone(),
        training_date,
        first_violation_date,
        total_violations: violations.len(),
        violations_before,
        violations_after,
        days_from_cycle_start,
        days_after_training,
        required_days_for_comparison: required_days,
        has_sufficient_data,
        rate_before,
        rate_after,
        improvement,
        has_new_violations,
        reasons,
    }
}

/// Evaluates every team in input order. Records for unknown teams are ignored.
pub fn evaluate_teams(
    teams: &[Team],
    records: &[ViolationRecord],
    config: &AnalyticsConfig,
) -> Vec<TeamEffectiveness> {
    let mut by_team: HashMap<&str, Vec<&ViolationRecord>> = HashMap::new();
    for record in records {
        by_team.entry(record.team_id.as_str()).or_default().push(record);
    }

    let results: Vec<TeamEffectiveness> = teams
        .iter()
        .map(|team| {
            let violations = by_team
                .get(team.team_id.as_str())
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            evaluate_team(team, violations, config)
        })
        .collect();

    debug!(
        teams = teams.len(),
        records = records.len(),
        trained = results.iter().filter(|r| r.is_trained()).count(),
        "evaluated training effectiveness"
    );
    results
}
