use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::debug;

use crate::models::ViolationRecord;

/// Counts per label, remembering the input position where each label first appeared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tally {
    entries: HashMap<String, TallyEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct TallyEntry {
    count: usize,
    first_seen: usize,
}

impl Tally {
    pub fn add(&mut self, label: &str, position: usize) {
        self.add_many(label, 1, position);
    }

    fn add_many(&mut self, label: &str, count: usize, position: usize) {
        let entry = self.entries.entry(label.to_string()).or_insert(TallyEntry {
            count: 0,
            first_seen: position,
        });
        entry.count += count;
        entry.first_seen = entry.first_seen.min(position);
    }

    pub fn merge(&mut self, other: &Tally) {
        for (label, entry) in &other.entries {
            self.add_many(label, entry.count, entry.first_seen);
        }
    }

    pub fn count(&self, label: &str) -> usize {
        self.entries.get(label).map_or(0, |entry| entry.count)
    }

    /// Highest count wins; equal counts go to the earliest first appearance.
    pub fn most_common(&self) -> Option<&str> {
        self.entries
            .iter()
            .max_by(|(_, a), (_, b)| {
                a.count
                    .cmp(&b.count)
                    .then_with(|| b.first_seen.cmp(&a.first_seen))
            })
            .map(|(label, _)| label.as_str())
    }

    pub fn as_map(&self) -> BTreeMap<&str, usize> {
        self.entries
            .iter()
            .map(|(label, entry)| (label.as_str(), entry.count))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReasonCell {
    pub count: usize,
    pub first_seen: usize,
    pub teams: Tally,
    pub governorates: Tally,
}

impl ReasonCell {
    fn new(first_seen: usize) -> Self {
        ReasonCell {
            first_seen,
            ..Default::default()
        }
    }

    fn merge(&mut self, other: &ReasonCell) {
        self.count += other.count;
        self.first_seen = self.first_seen.min(other.first_seen);
        self.teams.merge(&other.teams);
        self.governorates.merge(&other.governorates);
    }
}

/// Floored satisfaction score → reason → cell. Records without a score are not indexed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreReasonIndex {
    pub scores: BTreeMap<i64, HashMap<String, ReasonCell>>,
}

impl ScoreReasonIndex {
    pub fn build(records: &[ViolationRecord]) -> Self {
        let mut scores: BTreeMap<i64, HashMap<String, ReasonCell>> = BTreeMap::new();

        for (position, record) in records.iter().enumerate() {
            let Some(score) = record.floored_score() else {
                continue;
            };
            let cell = scores
                .entry(score)
                .or_default()
                .entry(record.reason().to_string())
                .or_insert_with(|| ReasonCell::new(position));
            cell.count += 1;
            cell.teams.add(&record.team_id, position);
            cell.governorates.add(record.governorate(), position);
        }

        debug!(scores = scores.len(), "built score/reason index");
        ScoreReasonIndex { scores }
    }

    pub fn cell(&self, score: i64, reason: &str) -> Option<&ReasonCell> {
        self.scores.get(&score).and_then(|reasons| reasons.get(reason))
    }

    /// Flattens the cells of every score accepted by `include` into one row per reason.
    pub fn reason_summary<F>(&self, include: F) -> Vec<ReasonSummary>
    where
        F: Fn(i64) -> bool,
    {
        let mut merged: HashMap<&str, ReasonCell> = HashMap::new();
        for (_, reasons) in self.scores.iter().filter(|(score, _)| include(**score)) {
            for (reason, cell) in reasons {
                merged
                    .entry(reason.as_str())
                    .or_insert_with(|| ReasonCell::new(cell.first_seen))
                    .merge(cell);
            }
        }

        let total: usize = merged.values().map(|cell| cell.count).sum();
        let mut rows: Vec<(usize, ReasonSummary)> = merged
            .into_iter()
            .map(|(reason, cell)| {
                let percentage = if total == 0 {
                    0.0
                } else {
                    cell.count as f64 / total as f64 * 100.0
                };
                (
                    cell.first_seen,
                    ReasonSummary {
                        reason: reason.to_string(),
                        count: cell.count,
                        percentage,
                        most_common_team: cell.teams.most_common().map(str::to_string),
                        most_common_governorate: cell
                            .governorates
                            .most_common()
                            .map(str::to_string),
                    },
                )
            })
            .collect();

        rows.sort_by(|(a_seen, a), (b_seen, b)| {
            b.count.cmp(&a.count).then_with(|| a_seen.cmp(b_seen))
        });
        rows.into_iter().map(|(_, row)| row).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasonSummary {
    pub reason: String,
    pub count: usize,
    pub percentage: f64,
    pub most_common_team: Option<String>,
    pub most_common_governorate: Option<String>,
}

/// Reason summary over every scored record.
pub fn reason_summary(records: &[ViolationRecord]) -> Vec<ReasonSummary> {
    ScoreReasonIndex::build(records).reason_summary(|_| true)
}
