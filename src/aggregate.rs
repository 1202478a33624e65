use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{Team, ViolationRecord, NOT_SPECIFIED};

pub const DETRACTOR_SCORES: std::ops::RangeInclusive<i64> = 1..=6;
pub const NEUTRAL_SCORES: std::ops::RangeInclusive<i64> = 7..=8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Dimension {
    Reason,
    Governorate,
    Responsibility,
    Category,
    Priority,
    Status,
    EvaluationScore,
}

impl Dimension {
    pub const ALL: [Dimension; 7] = [
        Dimension::Reason,
        Dimension::Governorate,
        Dimension::Responsibility,
        Dimension::Category,
        Dimension::Priority,
        Dimension::Status,
        Dimension::EvaluationScore,
    ];

    pub fn key_of(self, record: &ViolationRecord) -> String {
        match self {
            Dimension::Reason => record.reason().to_string(),
            Dimension::Governorate => record.governorate().to_string(),
            Dimension::Responsibility => record.responsibility().to_string(),
            Dimension::Category => record.category().to_string(),
            Dimension::Priority => record.priority().to_string(),
            Dimension::Status => record.status().to_string(),
            Dimension::EvaluationScore => record
                .floored_score()
                .map(|score| score.to_string())
                .unwrap_or_else(|| NOT_SPECIFIED.to_string()),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Dimension::Reason => "reason",
            Dimension::Governorate => "governorate",
            Dimension::Responsibility => "responsibility",
            Dimension::Category => "category",
            Dimension::Priority => "priority",
            Dimension::Status => "status",
            Dimension::EvaluationScore => "evaluation score",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStats {
    pub count: usize,
    pub completed_count: usize,
    pub evaluation_score_sum: f64,
}

impl GroupStats {
    fn add(&mut self, record: &ViolationRecord) {
        self.count += 1;
        if record.is_completed() {
            self.completed_count += 1;
        }
        if let Some(score) = record.evaluation_score.filter(|s| s.is_finite()) {
            self.evaluation_score_sum += score;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionSummary {
    pub dimension: Dimension,
    pub groups: BTreeMap<String, GroupStats>,
    /// Governorate only: validation category histogram per governorate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_categories: Option<BTreeMap<String, BTreeMap<String, usize>>>,
}

impl DimensionSummary {
    pub fn total(&self) -> usize {
        self.groups.values().map(|group| group.count).sum()
    }

    /// Groups ordered by descending count, ties alphabetical.
    pub fn ranked(&self) -> Vec<(&str, &GroupStats)> {
        let mut ranked: Vec<(&str, &GroupStats)> = self
            .groups
            .iter()
            .map(|(key, stats)| (key.as_str(), stats))
            .collect();
        ranked.sort_by(|a, b| b.1.count.cmp(&a.1.count));
        ranked
    }
}

pub fn summarize_by(records: &[ViolationRecord], dimension: Dimension) -> DimensionSummary {
    let mut groups: BTreeMap<String, GroupStats> = BTreeMap::new();
    let mut nested: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();

    for record in records {
        let key = dimension.key_of(record);
        if dimension == Dimension::Governorate {
            *nested
                .entry(key.clone())
                .or_default()
                .entry(record.validation_category().to_string())
                .or_insert(0) += 1;
        }
        groups.entry(key).or_default().add(record);
    }

    DimensionSummary {
        dimension,
        groups,
        validation_categories: (dimension == Dimension::Governorate).then_some(nested),
    }
}

/// Counts per floored score in 1..=8. Absent or out-of-range scores are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ScoreHistogram(pub BTreeMap<i64, usize>);

impl ScoreHistogram {
    pub fn get(&self, score: i64) -> usize {
        self.0.get(&score).copied().unwrap_or(0)
    }

    /// Counts for scores 1 through 8, with absent scores as zero.
    pub fn zero_filled(&self) -> [usize; 8] {
        let mut filled = [0; 8];
        for (slot, score) in filled.iter_mut().zip(1..=8) {
            *slot = self.get(score);
        }
        filled
    }
}

pub fn score_histogram(records: &[ViolationRecord]) -> ScoreHistogram {
    let mut counts = BTreeMap::new();
    for score in records.iter().filter_map(ViolationRecord::floored_score) {
        if (1..=8).contains(&score) {
            *counts.entry(score).or_insert(0) += 1;
        }
    }
    ScoreHistogram(counts)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SatisfactionSummary {
    pub total: usize,
    pub mean_score: f64,
    pub detractors: usize,
    pub neutrals: usize,
    /// `None` when there are no records to divide by.
    pub detractor_percentage: Option<f64>,
    pub neutral_percentage: Option<f64>,
}

pub fn satisfaction(records: &[ViolationRecord]) -> SatisfactionSummary {
    let total = records.len();
    let scores: Vec<f64> = records
        .iter()
        .filter_map(|record| record.evaluation_score)
        .filter(|score| score.is_finite())
        .collect();
    let mean_score = if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    };

    let floored: Vec<i64> = records
        .iter()
        .filter_map(ViolationRecord::floored_score)
        .collect();
    let detractors = floored.iter().filter(|s| DETRACTOR_SCORES.contains(*s)).count();
    let neutrals = floored.iter().filter(|s| NEUTRAL_SCORES.contains(*s)).count();

    let percentage = |count: usize| {
        if total == 0 {
            None
        } else {
            Some(count as f64 / total as f64 * 100.0)
        }
    };

    SatisfactionSummary {
        total,
        mean_score,
        detractors,
        neutrals,
        detractor_percentage: percentage(detractors),
        neutral_percentage: percentage(neutrals),
    }
}

/// Pre-aggregation filter. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationFilter {
    pub governorate: Option<String>,
    pub team_id: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl ViolationFilter {
    pub fn matches(&self, record: &ViolationRecord) -> bool {
        if let Some(governorate) = &self.governorate {
            if record.governorate() != governorate {
                return false;
            }
        }
        if let Some(team_id) = &self.team_id {
            if &record.team_id != team_id {
                return false;
            }
        }
        if self.from.is_none() && self.to.is_none() {
            return true;
        }
        let Some(date) = record.occurred_at() else {
            return false;
        };
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }

    pub fn apply(&self, records: &[ViolationRecord]) -> Vec<ViolationRecord> {
        records.iter().filter(|r| self.matches(r)).cloned().collect()
    }

    /// Teams and records to feed the effectiveness calculator.
    ///
    /// Date bounds are ignored: the pre-training window always runs from the
    /// cycle start, so dropping early records would deflate the before rate.
    /// A team filter keeps only that team; a governorate filter keeps only the
    /// teams with at least one violation left in that governorate.
    pub fn effectiveness_scope(
        &self,
        teams: &[Team],
        records: &[ViolationRecord],
    ) -> (Vec<Team>, Vec<ViolationRecord>) {
        let undated = ViolationFilter {
            from: None,
            to: None,
            ..self.clone()
        };
        let scoped = undated.apply(records);

        let teams = teams
            .iter()
            .filter(|team| self.team_id.as_ref().map_or(true, |id| &team.team_id == id))
            .filter(|team| {
                self.governorate.is_none() || scoped.iter().any(|r| r.team_id == team.team_id)
            })
            .cloned()
            .collect();
        (teams, scoped)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_records: usize,
    pub dimensions: Vec<DimensionSummary>,
    pub score_histogram: ScoreHistogram,
    pub satisfaction: SatisfactionSummary,
}

impl DashboardSummary {
    pub fn dimension(&self, dimension: Dimension) -> Option<&DimensionSummary> {
        self.dimensions.iter().find(|summary| summary.dimension == dimension)
    }
}

pub fn summarize(records: &[ViolationRecord]) -> DashboardSummary {
    debug!(records = records.len(), "summarizing violations");
    DashboardSummary {
        total_records: records.len(),
        dimensions: Dimension::ALL
            .iter()
            .map(|&dimension| summarize_by(records, dimension))
            .collect(),
        score_histogram: score_histogram(records),
        satisfaction: satisfaction(records),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_date;

    fn record(
        reason: Option<&str>,
        governorate: &str,
        score: Option<f64>,
        status: &str,
    ) -> ViolationRecord {
        ViolationRecord {
            team_id: "T1".to_string(),
            evaluation_score: score,
            reason: reason.map(str::to_string),
            governorate: Some(governorate.to_string()),
            status: Some(status.to_string()),
            validation_category: Some("Field".to_string()),
            ..Default::default()
        }
    }

    fn sample() -> Vec<ViolationRecord> {
        vec![
            record(Some("Late arrival"), "Cairo", Some(3.0), "Done"),
            record(Some("Late arrival"), "Giza", Some(7.0), "Open"),
            record(None, "Cairo", Some(6.9), "Done"),
            record(Some("Rude staff"), "Alexandria", None, "Done"),
            record(Some("Rude staff"), "Cairo", Some(8.0), "Pending"),
        ]
    }

    #[test]
    fn group_counts_partition_the_input() {
        let records = sample();
        for dimension in Dimension::ALL {
            let summary = summarize_by(&records, dimension);
            assert_eq!(summary.total(), records.len(), "{dimension}");
        }
    }

    #[test]
    fn reason_groups_accumulate_completion_and_scores() {
        let summary = summarize_by(&sample(), Dimension::Reason);
        let late = &summary.groups["Late arrival"];
        assert_eq!(late.count, 2);
        assert_eq!(late.completed_count, 1);
        assert!((late.evaluation_score_sum - 10.0).abs() < 1e-9);
        assert_eq!(summary.groups[NOT_SPECIFIED].count, 1);
        assert!(summary.validation_categories.is_none());
    }

    #[test]
    fn governorate_nests_validation_categories() {
        let mut records = sample();
        records[0].validation_category = None;
        let summary = summarize_by(&records, Dimension::Governorate);
        let nested = summary.validation_categories.expect("governorate nesting");
        assert_eq!(nested["Cairo"]["Field"], 2);
        assert_eq!(nested["Cairo"][NOT_SPECIFIED], 1);
        assert_eq!(nested["Giza"]["Field"], 1);
    }

    #[test]
    fn score_dimension_uses_floored_scores() {
        let summary = summarize_by(&sample(), Dimension::EvaluationScore);
        assert_eq!(summary.groups["6"].count, 1);
        assert_eq!(summary.groups[NOT_SPECIFIED].count, 1);
    }

    #[test]
    fn histogram_omits_absent_scores_until_zero_filled() {
        let histogram = score_histogram(&sample());
        assert_eq!(histogram.0.len(), 4);
        assert_eq!(histogram.get(6), 1);
        assert_eq!(histogram.get(2), 0);
        assert_eq!(histogram.zero_filled(), [0, 0, 1, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn satisfaction_counts_bands() {
        let summary = satisfaction(&sample());
        assert_eq!(summary.total, 5);
        assert_eq!(summary.detractors, 2);
        assert_eq!(summary.neutrals, 2);
        assert!((summary.mean_score - 24.9 / 4.0).abs() < 1e-9);
        assert_eq!(summary.detractor_percentage, Some(40.0));
    }

    #[test]
    fn empty_input_yields_zeroed_summary() {
        let summary = summarize(&[]);
        assert_eq!(summary.total_records, 0);
        assert_eq!(summary.satisfaction.mean_score, 0.0);
        assert_eq!(summary.satisfaction.detractor_percentage, None);
        assert!(summary.dimensions.iter().all(|d| d.groups.is_empty()));
        assert_eq!(summary.score_histogram.zero_filled(), [0; 8]);
    }

    #[test]
    fn summary_is_idempotent() {
        let records = sample();
        assert_eq!(summarize(&records), summarize(&records));
    }

    fn team(id: &str) -> Team {
        Team {
            team_id: id.to_string(),
            team_name: format!("Team {id}"),
            session_history: Vec::new(),
        }
    }

    #[test]
    fn team_filter_scopes_effectiveness_to_that_team() {
        let mut records = sample();
        records[1].team_id = "T2".to_string();
        let filter = ViolationFilter {
            team_id: Some("T1".to_string()),
            ..Default::default()
        };
        let (teams, scoped) = filter.effectiveness_scope(&[team("T1"), team("T2")], &records);
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0].team_id, "T1");
        assert_eq!(scoped.len(), 4);
        assert!(scoped.iter().all(|r| r.team_id == "T1"));
    }

    #[test]
    fn governorate_filter_keeps_only_teams_with_records_there() {
        let mut records = sample();
        records[1].team_id = "T2".to_string();
        let filter = ViolationFilter {
            governorate: Some("Giza".to_string()),
            ..Default::default()
        };
        let (teams, scoped) =
            filter.effectiveness_scope(&[team("T1"), team("T2"), team("T3")], &records);
        let ids: Vec<&str> = teams.iter().map(|t| t.team_id.as_str()).collect();
        assert_eq!(ids, vec!["T2"]);
        assert_eq!(scoped.len(), 1);
    }

    #[test]
    fn date_bounds_do_not_shrink_effectiveness_input() {
        let mut records = sample();
        records[0].interview_date = parse_date("2025-01-15");
        records[2].interview_date = parse_date("2025-06-01");
        let filter = ViolationFilter {
            from: parse_date("2025-03-01"),
            ..Default::default()
        };
        assert_eq!(filter.apply(&records).len(), 1);

        let (teams, scoped) = filter.effectiveness_scope(&[team("T1"), team("T2")], &records);
        assert_eq!(teams.len(), 2);
        assert_eq!(scoped.len(), records.len());
    }

    #[test]
    fn filter_by_governorate_and_dates() {
        let mut records = sample();
        records[0].interview_date = parse_date("2025-04-01");
        records[2].interview_date = parse_date("2025-06-01");

        let filter = ViolationFilter {
            governorate: Some("Cairo".to_string()),
            from: parse_date("2025-05-01"),
            ..Default::default()
        };
        let kept = filter.apply(&records);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].reason(), NOT_SPECIFIED);

        let by_place = ViolationFilter {
            governorate: Some("Cairo".to_string()),
            ..Default::default()
        };
        assert_eq!(by_place.apply(&records).len(), 3);
    }
}
