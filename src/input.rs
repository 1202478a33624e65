use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Context;
use tracing::{info, warn};

use crate::models::{Team, ViolationRecord};

/// Reads violations from a `.csv` file (header row, camelCase columns) or a JSON array.
pub fn load_violations(path: &Path) -> anyhow::Result<Vec<ViolationRecord>> {
    let records = if is_csv(path) {
        read_violations_csv(path)?
    } else {
        read_json(path)?
    };

    let undated = records.iter().filter(|r| r.occurred_at().is_none()).count();
    if undated > 0 {
        warn!(undated, path = %path.display(), "violations without a parseable date");
    }
    info!(count = records.len(), path = %path.display(), "loaded violations");
    Ok(records)
}

/// Reads teams with their session history from a JSON array.
pub fn load_teams(path: &Path) -> anyhow::Result<Vec<Team>> {
    let teams: Vec<Team> = read_json(path)?;
    info!(count = teams.len(), path = %path.display(), "loaded teams");
    Ok(teams)
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn read_violations_csv(path: &Path) -> anyhow::Result<Vec<ViolationRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut records = Vec::new();
    for (line, result) in reader.deserialize::<ViolationRecord>().enumerate() {
        let record = result
            .with_context(|| format!("bad CSV row {} in {}", line + 2, path.display()))?;
        records.push(record);
    }
    Ok(records)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse {} as a JSON array", path.display()))
}
