// Run orchestration: every case descriptor in, one result record out per case

use crate::fixture::FixtureError;
use crate::scaffold::Verdict;
use async_trait::async_trait;
use harness_common::types::{CaseDescriptor, ResultRecord};
use std::time::Instant;
use tracing::{info, warn};

/// Per-suite driver contract.
///
/// `setup` errors are fatal to the run. Validation hands its context (the
/// constructed interpreter) to `run_test_case`; a failed validation yields
/// the case's verdict directly.
#[async_trait]
pub trait Scaffold: Sync {
    type Environment: Send + Sync;
    type Context: Send;

    fn setup(&self, case: &CaseDescriptor) -> Result<Self::Environment, FixtureError>;

    async fn run_validation(
        &self,
        case: &CaseDescriptor,
        env: &Self::Environment,
    ) -> Result<Self::Context, Verdict>;

    async fn run_test_case(
        &self,
        case: &CaseDescriptor,
        env: &Self::Environment,
        context: Self::Context,
    ) -> Verdict;
}

/// Run a single case through setup, validation, and execution.
pub async fn run_case<S: Scaffold>(
    scaffold: &S,
    case: &CaseDescriptor,
) -> Result<Verdict, FixtureError> {
    let env = scaffold.setup(case)?;

    let verdict = match scaffold.run_validation(case, &env).await {
        Ok(context) => scaffold.run_test_case(case, &env, context).await,
        Err(verdict) => verdict,
    };

    Ok(verdict)
}

/// Run every case in order, collecting one record per descriptor.
///
/// Case-level failures become a score of 0 and the batch continues; only
/// fixture errors abort.
pub async fn run_all_tests<S: Scaffold>(
    scaffold: &S,
    cases: &[CaseDescriptor],
) -> Result<Vec<ResultRecord>, FixtureError> {
    let mut results = Vec::with_capacity(cases.len());

    println!("→ Running {} test cases", cases.len());
    println!();

    for (idx, case) in cases.iter().enumerate() {
        println!("  Running {} ({}/{})", case.name, idx + 1, cases.len());

        let start = Instant::now();
        let verdict = run_case(scaffold, case).await?;
        let execution_time_ms = start.elapsed().as_millis() as u64;

        let diagnostic = verdict.diagnostic();
        if let Some(text) = &diagnostic {
            println!("{}", text);
        }

        match &verdict {
            Verdict::Passed => println!("    ✓ Passed"),
            Verdict::TimedOut { .. } => println!("    ⚠ Timed out"),
            Verdict::Failed(_) => println!("    ✗ Failed ({})", verdict.label()),
        }

        if verdict.score() == 0 {
            warn!(
                case = %case.name,
                outcome = verdict.label(),
                execution_ms = execution_time_ms,
                "Test case failed"
            );
        } else {
            info!(case = %case.name, execution_ms = execution_time_ms, "Test case passed");
        }

        results.push(ResultRecord {
            name: case.name.clone(),
            score: verdict.score(),
            max_score: 1,
            visible: case.visible,
            output: diagnostic,
            execution_time_ms,
        });
    }

    let passed = results.iter().filter(|r| r.passed()).count();
    println!();
    println!("→ All test cases executed");
    println!("  Passed: {} / {}", passed, results.len());

    info!(passed, total = results.len(), "Run complete");

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deadline::Phase;
    use crate::fixture::CaseEnvironment;
    use crate::scaffold::FailureReason;
    use harness_common::suites::{always_visible, generate_case_structure, CORRECTNESS};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Scaffold whose verdicts are keyed off the case id, no I/O
    struct StubScaffold {
        validations: AtomicUsize,
        executions: AtomicUsize,
    }

    impl StubScaffold {
        fn new() -> Self {
            Self {
                validations: AtomicUsize::new(0),
                executions: AtomicUsize::new(0),
            }
        }
    }

    fn case_id(case: &CaseDescriptor) -> u32 {
        case.name.rsplit('#').next().unwrap().parse().unwrap()
    }

    #[async_trait]
    impl Scaffold for StubScaffold {
        type Environment = CaseEnvironment;
        type Context = u32;

        fn setup(&self, case: &CaseDescriptor) -> Result<CaseEnvironment, FixtureError> {
            if case_id(case) == 99 {
                return Err(FixtureError::Unreadable {
                    role: "source",
                    path: case.source_path.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
                });
            }
            Ok(CaseEnvironment {
                expected: vec![],
                input: None,
                program: vec![],
            })
        }

        async fn run_validation(
            &self,
            case: &CaseDescriptor,
            _env: &CaseEnvironment,
        ) -> Result<u32, Verdict> {
            self.validations.fetch_add(1, Ordering::SeqCst);
            match case_id(case) {
                3 => Err(Verdict::TimedOut {
                    phase: Phase::Validation,
                    budget: Duration::from_secs(5),
                }),
                id => Ok(id),
            }
        }

        async fn run_test_case(
            &self,
            _case: &CaseDescriptor,
            _env: &CaseEnvironment,
            id: u32,
        ) -> Verdict {
            self.executions.fetch_add(1, Ordering::SeqCst);
            if id % 2 == 0 {
                Verdict::Passed
            } else {
                Verdict::Failed(FailureReason::OutputMismatch {
                    expected: vec!["1".to_string()],
                    actual: vec![],
                })
            }
        }
    }

    fn make_cases(ids: &[u32]) -> Vec<CaseDescriptor> {
        generate_case_structure(ids.iter().copied(), "testsv1/", CORRECTNESS, false, |n| {
            n != "test4"
        })
    }

    #[tokio::test]
    async fn test_one_record_per_case() {
        let scaffold = StubScaffold::new();
        let cases = make_cases(&[1, 2, 3, 4]);

        let results = run_all_tests(&scaffold, &cases).await.unwrap();

        assert_eq!(results.len(), 4);
        let scores: Vec<u32> = results.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![0, 1, 0, 1]);
        assert!(results.iter().all(|r| r.max_score == 1));
        assert_eq!(results[3].name, "Correctness | Test #4");
        assert!(!results[3].visible);
        assert!(results[0].output.as_deref().unwrap().contains("Expected output:"));
        assert!(results[1].output.is_none());
    }

    #[tokio::test]
    async fn test_validation_failure_skips_execution() {
        let scaffold = StubScaffold::new();
        let cases = make_cases(&[3]);

        let results = run_all_tests(&scaffold, &cases).await.unwrap();

        assert_eq!(results[0].score, 0);
        assert!(results[0].output.as_deref().unwrap().contains("Timed out"));
        assert_eq!(scaffold.validations.load(Ordering::SeqCst), 1);
        assert_eq!(scaffold.executions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fixture_error_aborts_run() {
        let scaffold = StubScaffold::new();
        let cases = make_cases(&[2, 99, 4]);

        let err = run_all_tests(&scaffold, &cases).await.unwrap_err();

        assert!(err.to_string().contains("testsv1/test99.src"));
        assert_eq!(scaffold.validations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_case_list() {
        let scaffold = StubScaffold::new();
        let results = run_all_tests(&scaffold, &[]).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_run_case_is_repeatable() {
        let scaffold = StubScaffold::new();
        let case = make_cases(&[2]).remove(0);

        let first = run_case(&scaffold, &case).await.unwrap();
        let second = run_case(&scaffold, &case).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(case.source_path, PathBuf::from("testsv1/test2.src"));
    }
}
