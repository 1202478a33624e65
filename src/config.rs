use chrono::{Datelike, NaiveDate, Utc};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cycle start {cycle_start} is after the evaluation date {evaluation_date}")]
    CycleStartAfterEvaluation {
        cycle_start: NaiveDate,
        evaluation_date: NaiveDate,
    },

    #[error("no January 1st exists for year {0}")]
    InvalidYear(i32),
}

/// Dates the effectiveness calculation is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyticsConfig {
    /// Start of the current reporting cycle; pre-training windows are measured from here.
    pub cycle_start: NaiveDate,
    /// The "now" post-training windows are measured up to.
    pub evaluation_date: NaiveDate,
}

impl AnalyticsConfig {
    pub fn new(cycle_start: NaiveDate, evaluation_date: NaiveDate) -> Result<Self, ConfigError> {
        if cycle_start > evaluation_date {
            return Err(ConfigError::CycleStartAfterEvaluation {
                cycle_start,
                evaluation_date,
            });
        }
        Ok(AnalyticsConfig {
            cycle_start,
            evaluation_date,
        })
    }

    /// Cycle starts on January 1st of the evaluation year unless given explicitly.
    pub fn resolve(
        cycle_start: Option<NaiveDate>,
        evaluation_date: Option<NaiveDate>,
    ) -> Result<Self, ConfigError> {
        let evaluation_date = evaluation_date.unwrap_or_else(|| Utc::now().date_naive());
        let cycle_start = match cycle_start {
            Some(date) => date,
            None => {
                let year = evaluation_date.year();
                NaiveDate::from_ymd_opt(year, 1, 1).ok_or(ConfigError::InvalidYear(year))?
            }
        };
        Self::new(cycle_start, evaluation_date)
    }

    pub fn evaluation_year(&self) -> i32 {
        self.evaluation_date.year()
    }
}
