use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::EnvFilter;

use field_quality_analytics::aggregate::{summarize, DashboardSummary, DETRACTOR_SCORES};
use field_quality_analytics::buckets::{MonthKey, WeekKey};
use field_quality_analytics::cohort::{classify, CohortReport};
use field_quality_analytics::crosstab::{ReasonSummary, ScoreReasonIndex};
use field_quality_analytics::effectiveness::evaluate_teams;
use field_quality_analytics::trend::{monthly_trend, weekly_trend, TrendPoint};
use field_quality_analytics::{db, input, report};
use field_quality_analytics::{AnalyticsConfig, Team, ViolationFilter, ViolationRecord};

#[derive(Parser)]
#[command(name = "field-quality")]
#[command(about = "Violation and training-effectiveness analytics for field teams", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import violations from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print dimension summaries, trends and detractor reasons as JSON
    Summary {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        cycle: CycleArgs,
    },
    /// Print training-effectiveness cohorts as JSON
    Effectiveness {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        cycle: CycleArgs,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        cycle: CycleArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

/// Where records come from: files when given, otherwise `DATABASE_URL`.
#[derive(Args)]
struct SourceArgs {
    /// Violations as CSV or JSON
    #[arg(long, requires = "teams")]
    violations: Option<PathBuf>,
    /// Teams with session history as JSON
    #[arg(long, requires = "violations")]
    teams: Option<PathBuf>,
    #[arg(long)]
    governorate: Option<String>,
    #[arg(long)]
    team: Option<String>,
    /// Only violations on or after this date (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Only violations on or before this date (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,
}

impl SourceArgs {
    fn filter(&self) -> ViolationFilter {
        ViolationFilter {
            governorate: self.governorate.clone(),
            team_id: self.team.clone(),
            from: self.from,
            to: self.to,
        }
    }

    fn scope(&self) -> Option<&str> {
        self.team.as_deref().or(self.governorate.as_deref())
    }

    /// Unfiltered violations and teams from files or the database.
    async fn load(&self) -> anyhow::Result<(Vec<ViolationRecord>, Vec<Team>)> {
        let (violations, teams) = match (&self.violations, &self.teams) {
            (Some(violations), Some(teams)) => {
                (input::load_violations(violations)?, input::load_teams(teams)?)
            }
            _ => {
                let pool = connect().await?;
                let violations =
                    db::fetch_violations(&pool, None, self.team.as_deref()).await?;
                (violations, db::fetch_teams(&pool).await?)
            }
        };
        info!(
            violations = violations.len(),
            teams = teams.len(),
            "records loaded"
        );
        Ok((violations, teams))
    }

    fn dashboard_records(&self, violations: &[ViolationRecord]) -> Vec<ViolationRecord> {
        let kept = self.filter().apply(violations);
        info!(kept = kept.len(), "violations in dashboard scope");
        kept
    }

    fn cohorts(
        &self,
        violations: &[ViolationRecord],
        teams: &[Team],
        config: &AnalyticsConfig,
    ) -> CohortReport {
        let (teams, records) = self.filter().effectiveness_scope(teams, violations);
        info!(
            teams = teams.len(),
            violations = records.len(),
            "teams in effectiveness scope"
        );
        classify(evaluate_teams(&teams, &records, config))
    }
}

#[derive(Args)]
struct CycleArgs {
    /// Start of the reporting cycle (defaults to January 1st of the evaluation year)
    #[arg(long)]
    cycle_start: Option<NaiveDate>,
    /// Evaluation date used as "now" (defaults to today)
    #[arg(long)]
    as_of: Option<NaiveDate>,
}

impl CycleArgs {
    fn config(&self) -> anyhow::Result<AnalyticsConfig> {
        AnalyticsConfig::resolve(self.cycle_start, self.as_of).context("invalid cycle dates")
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryOutput {
    summary: DashboardSummary,
    weekly: Vec<TrendPoint<WeekKey>>,
    monthly: Vec<TrendPoint<MonthKey>>,
    detractor_reasons: Vec<ReasonSummary>,
}

fn detractor_reasons(records: &[ViolationRecord]) -> Vec<ReasonSummary> {
    ScoreReasonIndex::build(records).reason_summary(|score| DETRACTOR_SCORES.contains(&score))
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set when --violations/--teams are not given")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            db::init_db(&connect().await?).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&connect().await?).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&connect().await?, &csv).await?;
            println!("Inserted {inserted} violations from {}.", csv.display());
        }
        Commands::Summary { source, cycle } => {
            let config = cycle.config()?;
            let (violations, _) = source.load().await?;
            let records = source.dashboard_records(&violations);
            let output = SummaryOutput {
                summary: summarize(&records),
                weekly: weekly_trend(&records, config.evaluation_year()),
                monthly: monthly_trend(&records, config.evaluation_year()),
                detractor_reasons: detractor_reasons(&records),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Effectiveness { source, cycle } => {
            let config = cycle.config()?;
            let (violations, teams) = source.load().await?;
            let cohorts = source.cohorts(&violations, &teams, &config);
            println!("{}", serde_json::to_string_pretty(&cohorts)?);
        }
        Commands::Report { source, cycle, out } => {
            let config = cycle.config()?;
            let (violations, teams) = source.load().await?;
            let records = source.dashboard_records(&violations);
            let summary = summarize(&records);
            let cohorts = source.cohorts(&violations, &teams, &config);
            let report = report::build_report(
                source.scope(),
                &config,
                &summary,
                &detractor_reasons(&records),
                &cohorts,
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
