use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::effectiveness::{Improvement, TeamEffectiveness};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Cohort {
    Untrained,
    NoViolations,
    NewViolations,
    NoChange,
    Improved,
    Declined,
}

impl Cohort {
    /// First matching rule wins: no violations, new violations, no change, improved, declined.
    pub fn of(result: &TeamEffectiveness) -> Cohort {
        let Some(improvement) = result.improvement.filter(|_| result.is_trained()) else {
            return Cohort::Untrained;
        };
        if result.total_violations == 0 {
            return Cohort::NoViolations;
        }
        if result.has_new_violations {
            return Cohort::NewViolations;
        }
        match improvement {
            Improvement::NotApplicable => Cohort::NoChange,
            Improvement::Percentage(pct) if pct == 0.0 => Cohort::NoChange,
            Improvement::Percentage(pct) if pct > 0.0 => Cohort::Improved,
            Improvement::Percentage(_) => Cohort::Declined,
        }
    }
}

impl fmt::Display for Cohort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Cohort::Untrained => "Untrained",
            Cohort::NoViolations => "No violations",
            Cohort::NewViolations => "New violations after training",
            Cohort::NoChange => "No change",
            Cohort::Improved => "Improved",
            Cohort::Declined => "Declined",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortReport {
    pub untrained: Vec<TeamEffectiveness>,
    pub no_violations: Vec<TeamEffectiveness>,
    pub new_violations: Vec<TeamEffectiveness>,
    pub no_change: Vec<TeamEffectiveness>,
    pub improved: Vec<TeamEffectiveness>,
    pub declined: Vec<TeamEffectiveness>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortSizes {
    pub trained: usize,
    pub untrained: usize,
    pub no_violations: usize,
    pub new_violations: usize,
    pub no_change: usize,
    pub improved: usize,
    pub declined: usize,
}

impl CohortReport {
    pub fn members(&self, cohort: Cohort) -> &[TeamEffectiveness] {
        match cohort {
            Cohort::Untrained => &self.untrained,
            Cohort::NoViolations => &self.no_violations,
            Cohort::NewViolations => &self.new_violations,
            Cohort::NoChange => &self.no_change,
            Cohort::Improved => &self.improved,
            Cohort::Declined => &self.declined,
        }
    }

    fn members_mut(&mut self, cohort: Cohort) -> &mut Vec<TeamEffectiveness> {
        match cohort {
            Cohort::Untrained => &mut self.untrained,
            Cohort::NoViolations => &mut self.no_violations,
            Cohort::NewViolations => &mut self.new_violations,
            Cohort::NoChange => &mut self.no_change,
            Cohort::Improved => &mut self.improved,
            Cohort::Declined => &mut self.declined,
        }
    }

    pub fn cohort_of(&self, team_id: &str) -> Option<Cohort> {
        [
            Cohort::Untrained,
            Cohort::NoViolations,
            Cohort::NewViolations,
            Cohort::NoChange,
            Cohort::Improved,
            Cohort::Declined,
        ]
        .into_iter()
        .find(|&cohort| self.members(cohort).iter().any(|r| r.team_id == team_id))
    }

    pub fn sizes(&self) -> CohortSizes {
        let trained = self.no_violations.len()
            + self.new_violations.len()
            + self.no_change.len()
            + self.improved.len()
            + self.declined.len();
        CohortSizes {
            trained,
            untrained: self.untrained.len(),
            no_violations: self.no_violations.len(),
            new_violations: self.new_violations.len(),
            no_change: self.no_change.len(),
            improved: self.improved.len(),
            declined: self.declined.len(),
        }
    }
}

fn improvement_of(result: &TeamEffectiveness) -> f64 {
    result
        .improvement
        .and_then(Improvement::percentage)
        .unwrap_or(0.0)
}

fn by_total_desc(a: &TeamEffectiveness, b: &TeamEffectiveness) -> Ordering {
    b.total_violations.cmp(&a.total_violations)
}

/// Splits teams into cohorts. Equal sort keys keep input order.
pub fn classify(results: Vec<TeamEffectiveness>) -> CohortReport {
    let mut report = CohortReport::default();
    for result in results {
        let cohort = Cohort::of(&result);
        report.members_mut(cohort).push(result);
    }

    report
        .improved
        .sort_by(|a, b| improvement_of(b).total_cmp(&improvement_of(a)));
    report
        .declined
        .sort_by(|a, b| improvement_of(a).total_cmp(&improvement_of(b)));
    report.no_change.sort_by(by_total_desc);
    report.no_violations.sort_by(by_total_desc);
    report
        .new_violations
        .sort_by(|a, b| b.violations_after.cmp(&a.violations_after));
    report.untrained.sort_by(by_total_desc);

    debug!(sizes = ?report.sizes(), "classified teams");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::ViolationFilter;
    use crate::effectiveness::evaluate_teams;
    use crate::effectiveness::tests::{config, date, history, trained_team, untrained_team};
    use crate::models::ViolationRecord;

    fn scenario() -> CohortReport {
        let trained_on = date(2025, 4, 11);
        let teams = vec![
            trained_team("clean", trained_on),
            trained_team("fresh", trained_on),
            trained_team("flat", trained_on),
            trained_team("better", trained_on),
            trained_team("much-better", trained_on),
            trained_team("worse", trained_on),
            untrained_team("idle"),
            untrained_team("busy"),
        ];
        let mut records: Vec<ViolationRecord> = Vec::new();
        records.extend(history("fresh", trained_on, 0, 3));
        records.extend(history("flat", trained_on, 10, 2));
        records.extend(history("better", trained_on, 10, 1));
        records.extend(history("much-better", trained_on, 20, 1));
        records.extend(history("worse", trained_on, 10, 6));
        records.extend(history("idle", trained_on, 1, 0));
        records.extend(history("busy", trained_on, 3, 2));

        classify(evaluate_teams(&teams, &records, &config(date(2025, 5, 1))))
    }

    fn ids(members: &[TeamEffectiveness]) -> Vec<&str> {
        members.iter().map(|m| m.team_id.as_str()).collect()
    }

    #[test]
    fn every_team_lands_in_exactly_one_cohort() {
        let report = scenario();
        let sizes = report.sizes();
        assert_eq!(sizes.trained, 6);
        assert_eq!(sizes.untrained, 2);
        let cohort_total = sizes.no_violations
            + sizes.new_violations
            + sizes.no_change
            + sizes.improved
            + sizes.declined;
        assert_eq!(cohort_total, sizes.trained);
        assert_eq!(report.cohort_of("clean"), Some(Cohort::NoViolations));
        assert_eq!(report.cohort_of("fresh"), Some(Cohort::NewViolations));
        assert_eq!(report.cohort_of("flat"), Some(Cohort::NoChange));
        assert_eq!(report.cohort_of("better"), Some(Cohort::Improved));
        assert_eq!(report.cohort_of("worse"), Some(Cohort::Declined));
        assert_eq!(report.cohort_of("idle"), Some(Cohort::Untrained));
        assert_eq!(report.cohort_of("nobody"), None);
    }

    #[test]
    fn cohorts_are_sorted_by_their_keys() {
        let report = scenario();
        assert_eq!(ids(&report.improved), vec!["much-better", "better"]);
        assert_eq!(ids(&report.untrained), vec!["busy", "idle"]);
    }

    #[test]
    fn declined_lists_most_negative_first() {
        let trained_on = date(2025, 4, 11);
        let teams = vec![trained_team("slightly", trained_on), trained_team("badly", trained_on)];
        let mut records = history("slightly", trained_on, 10, 3);
        records.extend(history("badly", trained_on, 10, 8));
        let report = classify(evaluate_teams(&teams, &records, &config(date(2025, 5, 1))));
        assert_eq!(ids(&report.declined), vec!["badly", "slightly"]);
    }

    #[test]
    fn insufficient_window_goes_to_no_change() {
        let trained_on = date(2025, 4, 11);
        let teams = vec![trained_team("recent", trained_on)];
        let records = history("recent", trained_on, 10, 9);
        let report = classify(evaluate_teams(&teams, &records, &config(date(2025, 4, 14))));
        assert_eq!(report.cohort_of("recent"), Some(Cohort::NoChange));
        assert!(report.no_change[0]
            .improvement
            .is_some_and(Improvement::is_not_applicable));
        assert!(report.improved.is_empty() && report.declined.is_empty());
    }

    #[test]
    fn no_change_lists_most_violations_first() {
        let trained_on = date(2025, 4, 11);
        let teams = vec![
            trained_team("quiet", trained_on),
            trained_team("noisy", trained_on),
            trained_team("steady", trained_on),
        ];
        let mut records = history("quiet", trained_on, 4, 1);
        records.extend(history("noisy", trained_on, 12, 7));
        records.extend(history("steady", trained_on, 6, 2));
        // three days after training, below the ten day threshold
        let report = classify(evaluate_teams(&teams, &records, &config(date(2025, 4, 14))));
        assert_eq!(ids(&report.no_change), vec!["noisy", "steady", "quiet"]);
        assert!(report
            .no_change
            .iter()
            .all(|r| r.improvement.is_some_and(Improvement::is_not_applicable)));
    }

    #[test]
    fn scoped_filters_leave_other_teams_untouched() {
        let trained_on = date(2025, 4, 11);
        let teams = vec![trained_team("A", trained_on), trained_team("B", trained_on)];
        let mut records = history("A", trained_on, 10, 1);
        records.extend(history("B", trained_on, 10, 6));
        let config = config(date(2025, 5, 1));
        let run = |filter: ViolationFilter| {
            let (teams, records) = filter.effectiveness_scope(&teams, &records);
            classify(evaluate_teams(&teams, &records, &config))
        };

        let everyone = run(ViolationFilter::default());
        assert_eq!(everyone.cohort_of("B"), Some(Cohort::Declined));

        let only_a = run(ViolationFilter {
            team_id: Some("A".to_string()),
            ..Default::default()
        });
        assert_eq!(only_a.cohort_of("A"), Some(Cohort::Improved));
        assert_eq!(only_a.cohort_of("B"), None);

        let late_start = run(ViolationFilter {
            from: Some(date(2025, 4, 9)),
            ..Default::default()
        });
        assert_eq!(late_start.cohort_of("B"), Some(Cohort::Declined));
        assert_eq!(late_start.declined[0].violations_before, 10);
        assert_eq!(
            late_start.declined[0].improvement,
            everyone.declined[0].improvement
        );
    }

    #[test]
    fn new_violations_sorted_by_after_count() {
        let trained_on = date(2025, 4, 11);
        let teams = vec![trained_team("few", trained_on), trained_team("many", trained_on)];
        let mut records = history("few", trained_on, 0, 1);
        records.extend(history("many", trained_on, 0, 4));
        let report = classify(evaluate_teams(&teams, &records, &config(date(2025, 5, 1))));
        assert_eq!(ids(&report.new_violations), vec!["many", "few"]);
    }

    #[test]
    fn round_trip_scenario_is_declined() {
        let trained_on = date(2025, 2, 20);
        let teams = vec![trained_team("T", trained_on)];
        let records = history("T", trained_on, 3, 2);
        let report = classify(evaluate_teams(&teams, &records, &config(date(2025, 3, 22))));
        assert_eq!(report.cohort_of("T"), Some(Cohort::Declined));
        let pct = report.declined[0]
            .improvement
            .and_then(Improvement::percentage)
            .unwrap();
        assert!((pct + 11.11).abs() < 0.01);
    }

    #[test]
    fn classification_is_idempotent() {
        assert_eq!(scenario(), scenario());
    }

    #[test]
    fn empty_input_gives_empty_cohorts() {
        let report = classify(Vec::new());
        assert_eq!(report.sizes(), CohortSizes::default());
    }
}
