// Iteration writer: one JSON audit file per successful refinement round

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::refinement::types::{IterationRecord, RunResult};

/// What lands on disk for one round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedIteration {
    pub run_id: String,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: IterationRecord,
}

/// Writes `<dir>/<run_id>_iteration_<index>.json`
#[derive(Debug, Clone)]
pub struct IterationWriter {
    dir: PathBuf,
}

impl IterationWriter {
    /// Create a writer, making sure the directory exists
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create audit directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    /// Deterministic file path for a run/round pair
    pub fn path_for(&self, run_id: &str, index: usize) -> PathBuf {
        self.dir
            .join(format!("{}_iteration_{}.json", sanitize(run_id), index))
    }

    pub fn write(&self, run_id: &str, record: &IterationRecord) -> Result<PathBuf> {
        let path = self.path_for(run_id, record.index);
        let entry = PersistedIteration {
            run_id: run_id.to_string(),
            recorded_at: Utc::now(),
            record: record.clone(),
        };
        let json =
            serde_json::to_string_pretty(&entry).context("Failed to serialize iteration record")?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

/// Write a whole run report as pretty JSON
pub fn write_run_result(path: &Path, result: &RunResult) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(result).context("Failed to serialize run result")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// Keep run ids filesystem-safe
fn sanitize(run_id: &str) -> String {
    run_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
