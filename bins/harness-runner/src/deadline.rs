//! Deadline-Bounded Executor
//!
//! Runs one phase of a case under a hard wall-clock budget. On expiry the
//! phase future is dropped and a `TimedOut` error is returned, distinct from
//! an error the operation raised itself. Dropping the future is the only
//! cancellation applied here; in-flight work that cannot observe the drop
//! (a child process) must be torn down by the caller.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Validation,
    Execution,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Validation => f.write_str("validation"),
            Phase::Execution => f.write_str("execution"),
        }
    }
}

#[derive(Debug)]
pub enum DeadlineError<E> {
    TimedOut { phase: Phase, budget: Duration },
    Failed(E),
}

impl<E: fmt::Display> fmt::Display for DeadlineError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeadlineError::TimedOut { phase, budget } => {
                write!(f, "{} phase timed out after {}ms", phase, budget.as_millis())
            }
            DeadlineError::Failed(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for DeadlineError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DeadlineError::TimedOut { .. } => None,
            DeadlineError::Failed(e) => Some(e),
        }
    }
}

/// Run `operation`, giving up once `budget` has elapsed.
pub async fn with_deadline<T, E, F>(
    phase: Phase,
    budget: Duration,
    operation: F,
) -> Result<T, DeadlineError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    let start = Instant::now();

    match tokio::time::timeout(budget, operation).await {
        Ok(Ok(value)) => {
            debug!(%phase, elapsed_ms = start.elapsed().as_millis() as u64, "Phase completed");
            Ok(value)
        }
        Ok(Err(e)) => Err(DeadlineError::Failed(e)),
        Err(_) => {
            warn!(
                %phase,
                budget_ms = budget.as_millis() as u64,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Phase exceeded deadline"
            );
            Err(DeadlineError::TimedOut { phase, budget })
        }
    }
}
