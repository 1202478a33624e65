pub mod aggregate;
pub mod buckets;
pub mod cohort;
pub mod config;
pub mod crosstab;
pub mod db;
pub mod effectiveness;
pub mod input;
pub mod models;
pub mod report;
pub mod trend;

pub use aggregate::{summarize, DashboardSummary, Dimension, ViolationFilter};
pub use cohort::{classify, Cohort, CohortReport};
pub use config::{AnalyticsConfig, ConfigError};
pub use effectiveness::{evaluate_team, evaluate_teams, Improvement, TeamEffectiveness};
pub use models::{SessionStatus, Team, TrainingSession, ViolationRecord};
