// Fixture loading: one case's input, expected output, and program text
use harness_common::types::CaseDescriptor;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Missing or unreadable source/expected files abort the whole run
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read {role} fixture {path}: {source}")]
    Unreadable {
        role: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// In-memory environment for one case. Built fresh per case and dropped after scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseEnvironment {
    /// Expected lines with terminators stripped
    pub expected: Vec<String>,
    /// Stdin lines for the interpreter; `None` when the case has no input file
    pub input: Option<Vec<String>>,
    /// Program lines exactly as read, terminators included
    pub program: Vec<String>,
}

fn read_fixture(role: &'static str, path: &Path) -> Result<String, FixtureError> {
    fs::read_to_string(path).map_err(|source| FixtureError::Unreadable {
        role,
        path: path.to_path_buf(),
        source,
    })
}

fn strip_terminators(content: &str) -> Vec<String> {
    content.lines().map(str::to_string).collect()
}

fn raw_lines(content: &str) -> Vec<String> {
    content.split_inclusive('\n').map(str::to_string).collect()
}

/// Load the fixture triple for `case`, resolving its paths against `root`.
pub fn load(root: &Path, case: &CaseDescriptor) -> Result<CaseEnvironment, FixtureError> {
    let expected = strip_terminators(&read_fixture("expected", &root.join(&case.expected_path))?);

    let input_path = root.join(&case.input_path);
    let input = match fs::read_to_string(&input_path) {
        Ok(content) => Some(strip_terminators(&content)),
        Err(e) => {
            debug!(path = %input_path.display(), error = %e, "No input stream for case");
            None
        }
    };

    let program = raw_lines(&read_fixture("source", &root.join(&case.source_path))?);

    Ok(CaseEnvironment {
        expected,
        input,
        program,
    })
}
