use std::fmt::Write;

use crate::aggregate::{DashboardSummary, Dimension, DETRACTOR_SCORES};
use crate::cohort::{Cohort, CohortReport};
use crate::config::AnalyticsConfig;
use crate::crosstab::ReasonSummary;
use crate::effectiveness::{Improvement, TeamEffectiveness};

const TOP_ROWS: usize = 5;

fn format_percentage(value: Option<f64>) -> String {
    match value {
        Some(pct) => format!("{pct:.1}%"),
        None => "n/a".to_string(),
    }
}

fn format_improvement(result: &TeamEffectiveness) -> String {
    match result.improvement {
        Some(Improvement::Percentage(pct)) => format!("{pct:+.1}%"),
        Some(Improvement::NotApplicable) => format!(
            "not enough data ({} of {} days)",
            result.days_after_training, result.required_days_for_comparison
        ),
        None => "untrained".to_string(),
    }
}

pub fn build_report(
    scope: Option<&str>,
    config: &AnalyticsConfig,
    summary: &DashboardSummary,
    detractor_reasons: &[ReasonSummary],
    cohorts: &CohortReport,
) -> String {
    let mut output = String::new();
    let scope_label = scope.unwrap_or("all teams");

    let _ = writeln!(output, "# Field Quality Report");
    let _ = writeln!(
        output,
        "Generated for {} (cycle {} to {})",
        scope_label, config.cycle_start, config.evaluation_date
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Satisfaction");

    let satisfaction = &summary.satisfaction;
    if satisfaction.total == 0 {
        let _ = writeln!(output, "No violations recorded for this scope.");
    } else {
        let _ = writeln!(
            output,
            "- {} violations, mean score {:.2}",
            satisfaction.total, satisfaction.mean_score
        );
        let _ = writeln!(
            output,
            "- Detractors (1-6): {} ({})",
            satisfaction.detractors,
            format_percentage(satisfaction.detractor_percentage)
        );
        let _ = writeln!(
            output,
            "- Neutrals (7-8): {} ({})",
            satisfaction.neutrals,
            format_percentage(satisfaction.neutral_percentage)
        );
        let histogram = summary.score_histogram.zero_filled();
        let cells: Vec<String> = histogram
            .iter()
            .zip(1..)
            .map(|(count, score)| format!("{score}: {count}"))
            .collect();
        let _ = writeln!(output, "- Score distribution: {}", cells.join(", "));
    }

    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "## Top Detractor Reasons (scores {}-{})",
        DETRACTOR_SCORES.start(),
        DETRACTOR_SCORES.end()
    );
    if detractor_reasons.is_empty() {
        let _ = writeln!(output, "No detractor feedback in this scope.");
    } else {
        for row in detractor_reasons.iter().take(TOP_ROWS) {
            let _ = writeln!(
                output,
                "- {}: {} ({:.1}%), mostly team {} in {}",
                row.reason,
                row.count,
                row.percentage,
                row.most_common_team.as_deref().unwrap_or("-"),
                row.most_common_governorate.as_deref().unwrap_or("-")
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Governorates");
    match summary.dimension(Dimension::Governorate) {
        Some(governorates) if !governorates.groups.is_empty() => {
            for (name, stats) in governorates.ranked().into_iter().take(TOP_ROWS) {
                let _ = writeln!(
                    output,
                    "- {}: {} violations, {} completed",
                    name, stats.count, stats.completed_count
                );
            }
        }
        _ => {
            let _ = writeln!(output, "No governorates recorded.");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Training Effectiveness");
    let sizes = cohorts.sizes();
    let _ = writeln!(
        output,
        "{} trained teams, {} untrained.",
        sizes.trained, sizes.untrained
    );

    for cohort in [
        Cohort::Improved,
        Cohort::Declined,
        Cohort::NoChange,
        Cohort::NewViolations,
        Cohort::NoViolations,
        Cohort::Untrained,
    ] {
        let members = cohorts.members(cohort);
        let _ = writeln!(output);
        let _ = writeln!(output, "### {} ({})", cohort, members.len());
        if members.is_empty() {
            let _ = writeln!(output, "None.");
            continue;
        }
        for result in members.iter().take(TOP_ROWS) {
            let _ = writeln!(
                output,
                "- {} ({}): {} violations ({} before / {} after), {}",
                result.team_name,
                result.team_id,
                result.total_violations,
                result.violations_before,
                result.violations_after,
                format_improvement(result)
            );
        }
    }

    output
}
