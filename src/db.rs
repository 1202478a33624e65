use std::collections::HashMap;

use anyhow::Context;
use chrono::NaiveDate;
use sqlx::postgres::PgArguments;
use sqlx::{Arguments, PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{parse_date, SessionStatus, Team, TrainingSession, ViolationRecord};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("field_quality schema migrated");
    Ok(())
}

async fn upsert_team(pool: &PgPool, team_code: &str, team_name: &str) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO field_quality.teams (id, team_code, team_name)
        VALUES ($1, $2, $3)
        ON CONFLICT (team_code) DO UPDATE
        SET team_name = EXCLUDED.team_name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(team_code)
    .bind(team_name)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to upsert team {team_code}"))?
    .get("id");
    Ok(id)
}

async fn insert_violation(
    pool: &PgPool,
    team_uuid: Uuid,
    record: &ViolationRecord,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO field_quality.violations
        (id, team_id, evaluation_score, reason, governorate, category, responsibility,
         priority, status, validation_category, interview_date, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(team_uuid)
    .bind(record.evaluation_score)
    .bind(&record.reason)
    .bind(&record.governorate)
    .bind(&record.category)
    .bind(&record.responsibility)
    .bind(&record.priority)
    .bind(&record.status)
    .bind(&record.validation_category)
    .bind(record.interview_date)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

const INSERT_SESSION: &str = r#"
    INSERT INTO field_quality.training_sessions (id, team_id, session_date, status, source_key)
    VALUES ($1, $2, $3, $4, $5)
    ON CONFLICT (source_key) DO NOTHING
"#;

fn session_arguments(
    team_uuid: Uuid,
    session_date: NaiveDate,
    status: &str,
    source_key: &str,
) -> anyhow::Result<PgArguments> {
    let mut args = PgArguments::default();
    args.add(Uuid::new_v4()).map_err(|e| anyhow::anyhow!(e))?;
    args.add(team_uuid).map_err(|e| anyhow::anyhow!(e))?;
    args.add(session_date).map_err(|e| anyhow::anyhow!(e))?;
    args.add(status.to_string()).map_err(|e| anyhow::anyhow!(e))?;
    args.add(source_key.to_string()).map_err(|e| anyhow::anyhow!(e))?;
    Ok(args)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let teams = vec![
        ("FT-101", "Cairo North Field Team"),
        ("FT-204", "Giza Installation Crew"),
        ("FT-317", "Alexandria Maintenance Unit"),
    ];
    let mut team_ids = HashMap::new();
    for (code, name) in teams {
        team_ids.insert(code, upsert_team(pool, code, name).await?);
    }

    let sessions = vec![
        ("seed-session-001", "FT-101", "2025-03-10", "Completed"),
        ("seed-session-002", "FT-204", "2025-04-02", "Completed"),
        ("seed-session-003", "FT-204", "2025-06-15", "Scheduled"),
    ];
    for (source_key, code, date, status) in sessions {
        let session_date = NaiveDate::parse_from_str(date, "%Y-%m-%d").context("invalid date")?;
        let args = session_arguments(team_ids[code], session_date, status, source_key)?;
        sqlx::query_with(INSERT_SESSION, args).execute(pool).await?;
    }

    let violations = vec![
        ("seed-001", "FT-101", 3.0, "Late arrival", "Cairo", "Done", "2025-02-11"),
        ("seed-002", "FT-101", 5.0, "Incomplete installation", "Cairo", "Done", "2025-02-27"),
        ("seed-003", "FT-101", 7.0, "Late arrival", "Cairo", "Open", "2025-04-20"),
        ("seed-004", "FT-204", 2.0, "Unprofessional conduct", "Giza", "Done", "2025-03-05"),
        ("seed-005", "FT-204", 6.0, "Late arrival", "Giza", "Open", "2025-05-14"),
        ("seed-006", "FT-317", 4.0, "Incomplete installation", "Alexandria", "Open", "2025-05-02"),
    ];
    for (source_key, code, score, reason, governorate, status, date) in violations {
        let interview_date = NaiveDate::parse_from_str(date, "%Y-%m-%d").context("invalid date")?;
        let record = ViolationRecord {
            team_id: code.to_string(),
            evaluation_score: Some(score),
            reason: Some(reason.to_string()),
            governorate: Some(governorate.to_string()),
            category: Some("Installation".to_string()),
            responsibility: Some("Field team".to_string()),
            priority: Some("Medium".to_string()),
            status: Some(status.to_string()),
            validation_category: Some("Customer call".to_string()),
            interview_date: Some(interview_date),
            created_at: None,
        };
        insert_violation(pool, team_ids[code], &record, source_key).await?;
    }

    Ok(())
}

pub async fn fetch_violations(
    pool: &PgPool,
    since_date: Option<NaiveDate>,
    team_code: Option<&str>,
) -> anyhow::Result<Vec<ViolationRecord>> {
    let mut query = String::from(
        "SELECT t.team_code, v.evaluation_score, v.reason, v.governorate, v.category, \
         v.responsibility, v.priority, v.status, v.validation_category, v.interview_date, \
         v.created_at::date AS created_on \
         FROM field_quality.violations v \
         JOIN field_quality.teams t ON t.id = v.team_id \
         WHERE ($1::date IS NULL OR COALESCE(v.interview_date, v.created_at::date) >= $1)",
    );
    if team_code.is_some() {
        query.push_str(" AND t.team_code = $2");
    }
    query.push_str(" ORDER BY v.created_at, v.id");

    let mut rows = sqlx::query(&query).bind(since_date);
    if let Some(value) = team_code {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    let mut violations = Vec::with_capacity(records.len());

    for row in records {
        violations.push(ViolationRecord {
            team_id: row.get("team_code"),
            evaluation_score: row.get("evaluation_score"),
            reason: row.get("reason"),
            governorate: row.get("governorate"),
            category: row.get("category"),
            responsibility: row.get("responsibility"),
            priority: row.get("priority"),
            status: row.get("status"),
            validation_category: row.get("validation_category"),
            interview_date: row.get("interview_date"),
            created_at: row.get("created_on"),
        });
    }

    debug!(count = violations.len(), "fetched violations");
    Ok(violations)
}

pub async fn fetch_teams(pool: &PgPool) -> anyhow::Result<Vec<Team>> {
    let team_rows = sqlx::query(
        "SELECT id, team_code, team_name FROM field_quality.teams ORDER BY team_code",
    )
    .fetch_all(pool)
    .await?;

    let mut teams = Vec::with_capacity(team_rows.len());
    let mut index: HashMap<Uuid, usize> = HashMap::new();
    for row in team_rows {
        index.insert(row.get("id"), teams.len());
        teams.push(Team {
            team_id: row.get("team_code"),
            team_name: row.get("team_name"),
            session_history: Vec::new(),
        });
    }

    let session_rows = sqlx::query(
        "SELECT team_id, session_date, status FROM field_quality.training_sessions \
         ORDER BY session_date",
    )
    .fetch_all(pool)
    .await?;

    for row in session_rows {
        let team_id: Uuid = row.get("team_id");
        if let Some(&slot) = index.get(&team_id) {
            let status: String = row.get("status");
            teams[slot].session_history.push(TrainingSession {
                session_date: row.get("session_date"),
                status: SessionStatus::from(status),
            });
        }
    }

    debug!(count = teams.len(), "fetched teams");
    Ok(teams)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct CsvRow {
        team_id: String,
        team_name: Option<String>,
        evaluation_score: Option<f64>,
        reason: Option<String>,
        governorate: Option<String>,
        category: Option<String>,
        responsibility: Option<String>,
        priority: Option<String>,
        status: Option<String>,
        validation_category: Option<String>,
        interview_date: Option<String>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;
    let mut team_ids: HashMap<String, Uuid> = HashMap::new();

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let code = row.team_id.clone();
        let team_uuid = match team_ids.get(&code) {
            Some(id) => *id,
            None => {
                let name = row.team_name.as_deref().unwrap_or(&code);
                let id = upsert_team(pool, &code, name).await?;
                team_ids.insert(code.clone(), id);
                id
            }
        };

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let record = ViolationRecord {
            team_id: row.team_id,
            evaluation_score: row.evaluation_score,
            reason: row.reason,
            governorate: row.governorate,
            category: row.category,
            responsibility: row.responsibility,
            priority: row.priority,
            status: row.status,
            validation_category: row.validation_category,
            interview_date: row.interview_date.as_deref().and_then(parse_date),
            created_at: None,
        };

        if insert_violation(pool, team_uuid, &record, &source_key).await? {
            inserted += 1;
        }
    }

    info!(inserted, path = %csv_path.display(), "imported violations");
    Ok(inserted)
}
