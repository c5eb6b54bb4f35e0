//! Report Emitter - Grading Platform Output
//!
//! Serializes result records into the Gradescope `results.json` shape:
//! an overall `score`, the wall-clock `execution_time`, and a `tests` array of
//! `{name, score, max_score, visibility}` entries.
//!
//! Diagnostics captured on records are operator-only and never written here.
//! The mode only picks the destination path; it has no effect on scores.

use crate::types::{aggregate_score, ResultRecord};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const PRODUCTION_REPORT_PATH: &str = "/autograder/results/results.json";
pub const LOCAL_REPORT_PATH: &str = "results.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    Local,
    Production,
}

impl ReportMode {
    /// Any non-empty flag value selects the production path
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some(value) if !value.is_empty() => ReportMode::Production,
            _ => ReportMode::Local,
        }
    }

    pub fn output_path(&self) -> &'static Path {
        match self {
            ReportMode::Local => Path::new(LOCAL_REPORT_PATH),
            ReportMode::Production => Path::new(PRODUCTION_REPORT_PATH),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Visible,
    /// Hidden from students until grades are published, still graded
    AfterPublished,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTest {
    pub name: String,
    pub score: u32,
    pub max_score: u32,
    pub visibility: Visibility,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingReport {
    pub score: f64,
    pub execution_time: f64,
    pub tests: Vec<ReportTest>,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write report to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GradingReport {
    pub fn from_results(results: &[ResultRecord], execution_time: Duration) -> Self {
        let tests = results
            .iter()
            .map(|record| ReportTest {
                name: record.name.clone(),
                score: record.score,
                max_score: record.max_score,
                visibility: if record.visible {
                    Visibility::Visible
                } else {
                    Visibility::AfterPublished
                },
            })
            .collect();

        Self {
            score: aggregate_score(results).unwrap_or(0.0),
            execution_time: execution_time.as_secs_f64(),
            tests,
        }
    }
}

/// Write the report to `path`, creating parent directories as needed.
pub fn write_report_to(report: &GradingReport, path: &Path) -> Result<(), ReportError> {
    let payload = serde_json::to_string_pretty(report)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ReportError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }

    fs::write(path, payload).map_err(|source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the report to the destination selected by `mode`.
pub fn write_report(
    results: &[ResultRecord],
    execution_time: Duration,
    mode: ReportMode,
) -> Result<PathBuf, ReportError> {
    let report = GradingReport::from_results(results, execution_time);
    let path = mode.output_path();
    write_report_to(&report, path)?;
    Ok(path.to_path_buf())
}
