use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One fixture triple plus the metadata needed to score it.
///
/// Paths are relative to the fixture root; the runner resolves them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseDescriptor {
    pub name: String,
    pub input_path: PathBuf,
    pub source_path: PathBuf,
    pub expected_path: PathBuf,
    pub expect_failure: bool,
    pub visible: bool,
}

/// Structured runtime error reported by the interpreter under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub error_kind: String,
    /// 1-based source line
    pub line: u32,
}

impl ErrorDescriptor {
    pub fn new(error_kind: impl Into<String>, line: u32) -> Self {
        Self {
            error_kind: error_kind.into(),
            line,
        }
    }
}

/// Renders as the single expected-output line of a failing case, e.g. `DivideByZero 7`.
impl fmt::Display for ErrorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.error_kind, self.line)
    }
}

/// Scored result of a single case. Built once by the orchestrator and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub name: String,
    pub score: u32,
    pub max_score: u32,
    pub visible: bool,
    /// Operator diagnostic; never written to the report
    #[serde(skip)]
    pub output: Option<String>,
    pub execution_time_ms: u64,
}

impl ResultRecord {
    pub fn passed(&self) -> bool {
        self.score == self.max_score
    }
}

/// Percentage of cases that scored, or `None` for an empty run.
pub fn aggregate_score(results: &[ResultRecord]) -> Option<f64> {
    if results.is_empty() {
        return None;
    }
    let earned: u32 = results.iter().map(|r| r.score).sum();
    Some(f64::from(earned) / results.len() as f64 * 100.0)
}
