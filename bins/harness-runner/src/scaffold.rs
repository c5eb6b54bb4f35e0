//! Test Scaffold - Per-Case Driver and Classification
//!
//! **Phases:**
//! 1. Setup: load the fixture triple (fatal on missing files)
//! 2. Validation (bounded): construct a fresh interpreter with the case's
//!    stdin and validate the program
//! 3. Execution (bounded): run the program and classify the outcome
//!
//! **Classification Rules:**
//! - Expected failure + raised error: `"{error_kind} {line}"` must equal the
//!   expected lines exactly
//! - Expected failure + clean run: fail
//! - Normal case + raised error: fail
//! - Normal case + clean run: output lines must equal expected lines exactly
//! - Timeout in either phase: fail
//!
//! No normalization beyond the terminator stripping done at load time.

use crate::deadline::{with_deadline, DeadlineError, Phase};
use crate::fixture::{self, CaseEnvironment, FixtureError};
use crate::interpreter::{Interpreter, InterpreterError, InterpreterFactory};
use crate::runner::Scaffold;
use async_trait::async_trait;
use harness_common::types::{CaseDescriptor, ErrorDescriptor};
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::debug;

/// Error message and trace surfaced for the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionDetail {
    pub message: String,
    pub trace: Option<String>,
}

impl From<&InterpreterError> for ExceptionDetail {
    fn from(err: &InterpreterError) -> Self {
        Self {
            message: err.to_string(),
            trace: err.trace().map(str::to_string),
        }
    }
}

impl fmt::Display for ExceptionDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\nException: \n{}", self.message)?;
        if let Some(trace) = &self.trace {
            write!(f, "\n{}", trace.trim_end())?;
        }
        Ok(())
    }
}

/// Raw result of the execution phase, before it is judged
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed {
        output: Vec<String>,
    },
    Raised {
        descriptor: Option<ErrorDescriptor>,
        exception: ExceptionDetail,
    },
    TimedOut {
        budget: Duration,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// Construction or validation raised before the program could run
    ValidationFailed { exception: ExceptionDetail },
    /// A normal case raised during execution
    UnexpectedError { exception: ExceptionDetail },
    /// An expected-failure case raised the wrong error kind or line
    ErrorMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
        exception: ExceptionDetail,
    },
    /// An expected-failure case raised but reported no descriptor
    MissingErrorDescriptor {
        expected: Vec<String>,
        exception: ExceptionDetail,
    },
    /// An expected-failure case ran to completion
    UnexpectedSuccess {
        expected: Vec<String>,
        actual: Vec<String>,
    },
    OutputMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::ValidationFailed { exception } => {
                write!(f, "\nValidation failed:{}", exception)
            }
            FailureReason::UnexpectedError { exception } => write!(f, "{}", exception),
            FailureReason::ErrorMismatch {
                expected,
                actual,
                exception,
            } => write!(
                f,
                "\nExpected failure:\n{:?}\n\nActual output:\n{:?}{}",
                expected, actual, exception
            ),
            FailureReason::MissingErrorDescriptor {
                expected,
                exception,
            } => write!(
                f,
                "\nExpected failure:\n{:?}\n\nActual output:\n(no error descriptor reported){}",
                expected, exception
            ),
            FailureReason::UnexpectedSuccess { expected, actual } => write!(
                f,
                "\nExpected failure:\n{:?}\n\nActual output:\n{:?}",
                expected, actual
            ),
            FailureReason::OutputMismatch { expected, actual } => write!(
                f,
                "\nExpected output:\n{:?}\n\nActual output:\n{:?}",
                expected, actual
            ),
        }
    }
}

/// Terminal state of one case
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Passed,
    Failed(FailureReason),
    TimedOut { phase: Phase, budget: Duration },
}

impl Verdict {
    pub fn score(&self) -> u32 {
        match self {
            Verdict::Passed => 1,
            _ => 0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Passed => "passed",
            Verdict::Failed(FailureReason::ValidationFailed { .. }) => "validation failed",
            Verdict::Failed(FailureReason::UnexpectedError { .. }) => "runtime error",
            Verdict::Failed(FailureReason::ErrorMismatch { .. })
            | Verdict::Failed(FailureReason::MissingErrorDescriptor { .. }) => "wrong error",
            Verdict::Failed(FailureReason::UnexpectedSuccess { .. }) => "missing error",
            Verdict::Failed(FailureReason::OutputMismatch { .. }) => "wrong output",
            Verdict::TimedOut { .. } => "timed out",
        }
    }

    /// Operator-facing text; `None` for a pass
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            Verdict::Passed => None,
            Verdict::Failed(reason) => Some(reason.to_string()),
            Verdict::TimedOut { phase, budget } => Some(format!(
                "\nTimed out: {} phase exceeded {:.1}s",
                phase,
                budget.as_secs_f64()
            )),
        }
    }
}

/// Judge an execution outcome against the expected lines.
pub fn classify(expect_failure: bool, outcome: &RunOutcome, expected: &[String]) -> Verdict {
    match (expect_failure, outcome) {
        (_, RunOutcome::TimedOut { budget }) => Verdict::TimedOut {
            phase: Phase::Execution,
            budget: *budget,
        },
        (
            true,
            RunOutcome::Raised {
                descriptor: Some(descriptor),
                exception,
            },
        ) => {
            let actual = vec![descriptor.to_string()];
            if actual == expected {
                Verdict::Passed
            } else {
                Verdict::Failed(FailureReason::ErrorMismatch {
                    expected: expected.to_vec(),
                    actual,
                    exception: exception.clone(),
                })
            }
        }
        (
            true,
            RunOutcome::Raised {
                descriptor: None,
                exception,
            },
        ) => Verdict::Failed(FailureReason::MissingErrorDescriptor {
            expected: expected.to_vec(),
            exception: exception.clone(),
        }),
        (true, RunOutcome::Completed { output }) => {
            Verdict::Failed(FailureReason::UnexpectedSuccess {
                expected: expected.to_vec(),
                actual: output.clone(),
            })
        }
        (false, RunOutcome::Raised { exception, .. }) => {
            Verdict::Failed(FailureReason::UnexpectedError {
                exception: exception.clone(),
            })
        }
        (false, RunOutcome::Completed { output }) => {
            if output.as_slice() == expected {
                Verdict::Passed
            } else {
                Verdict::Failed(FailureReason::OutputMismatch {
                    expected: expected.to_vec(),
                    actual: output.clone(),
                })
            }
        }
    }
}

/// Interpreter instance threaded from validation into execution for one case
pub struct CaseContext<I> {
    pub interpreter: I,
    pub validation_time: Duration,
}

/// Drives one interpreter implementation through fixture cases
pub struct TestScaffold<F> {
    factory: F,
    phase_timeout: Duration,
    fixture_root: PathBuf,
}

impl<F: InterpreterFactory> TestScaffold<F> {
    pub fn new(factory: F, phase_timeout: Duration, fixture_root: impl Into<PathBuf>) -> Self {
        Self {
            factory,
            phase_timeout,
            fixture_root: fixture_root.into(),
        }
    }

    async fn execute(&self, interpreter: &mut F::Instance, env: &CaseEnvironment) -> RunOutcome {
        let result = with_deadline(
            Phase::Execution,
            self.phase_timeout,
            interpreter.run(&env.program),
        )
        .await;

        match result {
            Ok(()) => RunOutcome::Completed {
                output: interpreter.output().to_vec(),
            },
            Err(DeadlineError::Failed(err)) => RunOutcome::Raised {
                descriptor: interpreter.error_type_and_line(),
                exception: ExceptionDetail::from(&err),
            },
            Err(DeadlineError::TimedOut { budget, .. }) => RunOutcome::TimedOut { budget },
        }
    }
}

#[async_trait]
impl<F: InterpreterFactory> Scaffold for TestScaffold<F> {
    type Environment = CaseEnvironment;
    type Context = CaseContext<F::Instance>;

    fn setup(&self, case: &CaseDescriptor) -> Result<CaseEnvironment, FixtureError> {
        fixture::load(&self.fixture_root, case)
    }

    async fn run_validation(
        &self,
        case: &CaseDescriptor,
        env: &CaseEnvironment,
    ) -> Result<Self::Context, Verdict> {
        let factory = &self.factory;
        let start = Instant::now();

        // On timeout this future is dropped with the instance inside it;
        // process-backed instances are killed on drop.
        let phase = async {
            let mut interpreter = factory.spawn(env.input.as_deref()).await?;
            match interpreter.validate(&env.program).await {
                Ok(()) => Ok::<_, InterpreterError>(interpreter),
                Err(e) => {
                    interpreter.terminate().await;
                    Err(e)
                }
            }
        };

        match with_deadline(Phase::Validation, self.phase_timeout, phase).await {
            Ok(interpreter) => Ok(CaseContext {
                interpreter,
                validation_time: start.elapsed(),
            }),
            Err(DeadlineError::Failed(err)) => {
                Err(Verdict::Failed(FailureReason::ValidationFailed {
                    exception: ExceptionDetail::from(&err),
                }))
            }
            Err(DeadlineError::TimedOut { phase, budget }) => {
                Err(Verdict::TimedOut { phase, budget })
            }
        }
    }

    async fn run_test_case(
        &self,
        case: &CaseDescriptor,
        env: &CaseEnvironment,
        mut context: Self::Context,
    ) -> Verdict {
        let start = Instant::now();
        let outcome = self.execute(&mut context.interpreter, env).await;
        context.interpreter.terminate().await;
        debug!(
            case = %case.name,
            validation_ms = context.validation_time.as_millis() as u64,
            execution_ms = start.elapsed().as_millis() as u64,
            "Case executed"
        );
        classify(case.expect_failure, &outcome, &env.expected)
    }
}
