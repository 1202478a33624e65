use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

/// Label used for any classification attribute that is missing or blank.
pub const NOT_SPECIFIED: &str = "Not specified";

/// Status value that marks a violation as resolved.
pub const DONE_STATUS: &str = "Done";

/// One audit finding raised against a field team.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationRecord {
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub evaluation_score: Option<f64>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub governorate: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub responsibility: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub validation_category: Option<String>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub interview_date: Option<NaiveDate>,
    #[serde(default, alias = "updatedAt", deserialize_with = "lenient_date")]
    pub created_at: Option<NaiveDate>,
}

impl ViolationRecord {
    /// Date used to place the violation before or after a team's training.
    pub fn occurred_at(&self) -> Option<NaiveDate> {
        self.interview_date.or(self.created_at)
    }

    pub fn reason(&self) -> &str {
        or_not_specified(&self.reason)
    }

    pub fn governorate(&self) -> &str {
        or_not_specified(&self.governorate)
    }

    pub fn category(&self) -> &str {
        or_not_specified(&self.category)
    }

    pub fn responsibility(&self) -> &str {
        or_not_specified(&self.responsibility)
    }

    pub fn priority(&self) -> &str {
        or_not_specified(&self.priority)
    }

    pub fn status(&self) -> &str {
        or_not_specified(&self.status)
    }

    pub fn validation_category(&self) -> &str {
        or_not_specified(&self.validation_category)
    }

    pub fn is_completed(&self) -> bool {
        self.status() == DONE_STATUS
    }

    /// Floored satisfaction score, or `None` when absent or not a number.
    pub fn floored_score(&self) -> Option<i64> {
        self.evaluation_score
            .filter(|score| score.is_finite())
            .map(|score| score.floor() as i64)
    }
}

fn or_not_specified(value: &Option<String>) -> &str {
    match value.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => text,
        _ => NOT_SPECIFIED,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SessionStatus {
    Completed,
    Other(String),
}

impl From<String> for SessionStatus {
    fn from(value: String) -> Self {
        if value.trim() == "Completed" {
            SessionStatus::Completed
        } else {
            SessionStatus::Other(value)
        }
    }
}

impl From<SessionStatus> for String {
    fn from(value: SessionStatus) -> Self {
        match value {
            SessionStatus::Completed => "Completed".to_string(),
            SessionStatus::Other(text) => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingSession {
    #[serde(default, deserialize_with = "lenient_date")]
    pub session_date: Option<NaiveDate>,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub team_id: String,
    #[serde(default)]
    pub team_name: String,
    #[serde(default)]
    pub session_history: Vec<TrainingSession>,
}

impl Team {
    /// Latest completed session date; `None` means the team is untrained.
    pub fn effective_training_date(&self) -> Option<NaiveDate> {
        self.session_history
            .iter()
            .filter(|session| session.status == SessionStatus::Completed)
            .filter_map(|session| session.session_date)
            .max()
    }
}

/// Parses the date formats the API emits. Anything else is unparseable.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(stamp.date_naive());
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|stamp| stamp.date())
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_date))
}
