//! Interpreter Capability Contract + Process Backend
//!
//! **Contract:**
//! The interpreter under test is a black box that can be constructed with an
//! optional stdin, validated, and run once. After `run` it exposes its output
//! lines, or (after a raised runtime error) an `(error_kind, line)` descriptor.
//!
//! **Process backend:**
//! Each case gets its own child process speaking newline-delimited JSON on
//! stdin/stdout. The child's stderr is inherited so interpreter traces reach
//! the operator. A hung child is killed on `terminate` or on drop, so a stuck
//! case never outlives its deadline.

use async_trait::async_trait;
use harness_common::types::ErrorDescriptor;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum InterpreterError {
    /// The interpreter rejected the program or failed while running it
    #[error("{message}")]
    Raised {
        message: String,
        trace: Option<String>,
    },
    #[error("interpreter exited before responding ({status})")]
    Exited { status: String },
    #[error("interpreter protocol error: {0}")]
    Protocol(String),
    #[error("failed to launch interpreter '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("interpreter I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl InterpreterError {
    pub fn trace(&self) -> Option<&str> {
        match self {
            InterpreterError::Raised { trace, .. } => trace.as_deref(),
            _ => None,
        }
    }
}

#[async_trait]
pub trait Interpreter: Send {
    async fn validate(&mut self, program: &[String]) -> Result<(), InterpreterError>;

    async fn run(&mut self, program: &[String]) -> Result<(), InterpreterError>;

    /// Output lines produced by the last successful `run`
    fn output(&self) -> &[String];

    /// Only meaningful after `run` raised
    fn error_type_and_line(&self) -> Option<ErrorDescriptor>;

    /// Release the instance. Called once per case, including after a timeout.
    async fn terminate(&mut self) {}
}

#[async_trait]
pub trait InterpreterFactory: Send + Sync {
    type Instance: Interpreter;

    /// Construct a fresh instance; `None` means the case has no stdin.
    async fn spawn(&self, input: Option<&[String]>) -> Result<Self::Instance, InterpreterError>;
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request<'a> {
    Init { input: Option<&'a [String]> },
    Validate { program: &'a [String] },
    Run { program: &'a [String] },
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
enum Response {
    Ok,
    Completed {
        output: Vec<String>,
    },
    Error {
        message: String,
        #[serde(default)]
        error_kind: Option<String>,
        #[serde(default)]
        line: Option<u32>,
        #[serde(default)]
        trace: Option<String>,
    },
}

/// Launches one interpreter child process per case
#[derive(Debug, Clone)]
pub struct ProcessInterpreterFactory {
    command: String,
    args: Vec<String>,
}

impl ProcessInterpreterFactory {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl InterpreterFactory for ProcessInterpreterFactory {
    type Instance = ProcessInterpreter;

    async fn spawn(&self, input: Option<&[String]>) -> Result<ProcessInterpreter, InterpreterError> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| InterpreterError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| InterpreterError::Protocol("child stdin was not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| InterpreterError::Protocol("child stdout was not captured".into()))?;

        debug!(command = %self.command, pid = ?child.id(), "Spawned interpreter");

        let mut interpreter = ProcessInterpreter {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            output: Vec::new(),
            error: None,
        };

        match interpreter.request(&Request::Init { input }).await? {
            Response::Ok => Ok(interpreter),
            Response::Error { message, trace, .. } => {
                Err(InterpreterError::Raised { message, trace })
            }
            other => Err(InterpreterError::Protocol(format!(
                "unexpected reply to init: {:?}",
                other
            ))),
        }
    }
}

pub struct ProcessInterpreter {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    output: Vec<String>,
    error: Option<ErrorDescriptor>,
}

impl ProcessInterpreter {
    async fn request(&mut self, request: &Request<'_>) -> Result<Response, InterpreterError> {
        let mut payload = serde_json::to_string(request)
            .map_err(|e| InterpreterError::Protocol(format!("failed to encode request: {}", e)))?;
        payload.push('\n');

        if let Err(e) = self.send(payload.as_bytes()).await {
            if e.kind() == ErrorKind::BrokenPipe {
                return Err(self.exited().await);
            }
            return Err(e.into());
        }

        let mut reply = String::new();
        if self.stdout.read_line(&mut reply).await? == 0 {
            return Err(self.exited().await);
        }

        let reply = reply.trim_end();
        serde_json::from_str(reply).map_err(|e| {
            InterpreterError::Protocol(format!("invalid reply {:?}: {}", reply, e))
        })
    }

    async fn send(&mut self, payload: &[u8]) -> std::io::Result<()> {
        self.stdin.write_all(payload).await?;
        self.stdin.flush().await
    }

    async fn exited(&mut self) -> InterpreterError {
        match self.child.wait().await {
            Ok(status) => InterpreterError::Exited {
                status: status.to_string(),
            },
            Err(e) => InterpreterError::Io(e),
        }
    }
}

#[async_trait]
impl Interpreter for ProcessInterpreter {
    async fn validate(&mut self, program: &[String]) -> Result<(), InterpreterError> {
        match self.request(&Request::Validate { program }).await? {
            Response::Ok => Ok(()),
            Response::Error { message, trace, .. } => {
                Err(InterpreterError::Raised { message, trace })
            }
            other => Err(InterpreterError::Protocol(format!(
                "unexpected reply to validate: {:?}",
                other
            ))),
        }
    }

    async fn run(&mut self, program: &[String]) -> Result<(), InterpreterError> {
        self.output.clear();
        self.error = None;

        match self.request(&Request::Run { program }).await? {
            Response::Completed { output } => {
                self.output = output;
                Ok(())
            }
            Response::Ok => Ok(()),
            Response::Error {
                message,
                error_kind,
                line,
                trace,
            } => {
                self.error = error_kind
                    .zip(line)
                    .map(|(kind, line)| ErrorDescriptor::new(kind, line));
                Err(InterpreterError::Raised { message, trace })
            }
        }
    }

    fn output(&self) -> &[String] {
        &self.output
    }

    fn error_type_and_line(&self) -> Option<ErrorDescriptor> {
        self.error.clone()
    }

    async fn terminate(&mut self) {
        if let Err(e) = self.child.start_kill() {
            // already reaped
            debug!(error = %e, "Interpreter kill skipped");
        }
        if let Err(e) = self.child.wait().await {
            warn!(error = %e, "Failed to reap interpreter process");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::deadline::{with_deadline, DeadlineError, Phase};
    use std::time::{Duration, Instant};

    const OK: &str = r#"echo '{"status":"ok"}'"#;

    /// Interpreter backed by a shell script that answers one request per `read`
    fn scripted(script: &str) -> ProcessInterpreterFactory {
        ProcessInterpreterFactory::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    fn program() -> Vec<String> {
        vec!["func main\n".to_string(), "endfunc\n".to_string()]
    }

    #[test]
    fn test_request_encoding() {
        let input = vec!["5".to_string()];
        assert_eq!(
            serde_json::to_string(&Request::Init { input: None }).unwrap(),
            r#"{"op":"init","input":null}"#
        );
        assert_eq!(
            serde_json::to_string(&Request::Init { input: Some(input.as_slice()) }).unwrap(),
            r#"{"op":"init","input":["5"]}"#
        );
        assert_eq!(
            serde_json::to_string(&Request::Run { program: &input }).unwrap(),
            r#"{"op":"run","program":["5"]}"#
        );
    }

    #[test]
    fn test_response_decoding() {
        let reply: Response = serde_json::from_str(
            r#"{"status":"error","message":"boom","error_kind":"NameError","line":3}"#,
        )
        .unwrap();
        assert_eq!(
            reply,
            Response::Error {
                message: "boom".to_string(),
                error_kind: Some("NameError".to_string()),
                line: Some(3),
                trace: None,
            }
        );
    }

    #[tokio::test]
    async fn test_validate_then_run() {
        let factory = scripted(&format!(
            r#"read l; {OK}; read l; {OK}; read l; echo '{{"status":"completed","output":["3","5"]}}'"#
        ));

        let mut interpreter = factory.spawn(None).await.unwrap();
        interpreter.validate(&program()).await.unwrap();
        interpreter.run(&program()).await.unwrap();

        assert_eq!(interpreter.output(), ["3", "5"]);
        assert_eq!(interpreter.error_type_and_line(), None);
        interpreter.terminate().await;
    }

    #[tokio::test]
    async fn test_runtime_error_descriptor() {
        let factory = scripted(&format!(
            r#"read l; {OK}; read l; {OK}; read l; echo '{{"status":"error","message":"division by zero","error_kind":"DivideByZero","line":7,"trace":"at line 7"}}'"#
        ));

        let input = vec!["1".to_string()];
        let mut interpreter = factory.spawn(Some(input.as_slice())).await.unwrap();
        interpreter.validate(&program()).await.unwrap();
        let err = interpreter.run(&program()).await.unwrap_err();

        assert_eq!(err.to_string(), "division by zero");
        assert_eq!(err.trace(), Some("at line 7"));
        assert_eq!(
            interpreter.error_type_and_line(),
            Some(ErrorDescriptor::new("DivideByZero", 7))
        );
        interpreter.terminate().await;
    }

    #[tokio::test]
    async fn test_validation_rejected() {
        let factory = scripted(&format!(
            r#"read l; {OK}; read l; echo '{{"status":"error","message":"no main function"}}'"#
        ));

        let mut interpreter = factory.spawn(None).await.unwrap();
        let err = interpreter.validate(&program()).await.unwrap_err();

        assert!(matches!(err, InterpreterError::Raised { .. }));
        assert_eq!(err.to_string(), "no main function");
        interpreter.terminate().await;
    }

    #[tokio::test]
    async fn test_crashed_child_reports_exit() {
        let factory = scripted("read l; exit 3");

        let err = factory.spawn(None).await.err().unwrap();

        match err {
            InterpreterError::Exited { status } => assert!(status.contains('3'), "{}", status),
            other => panic!("expected exit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_garbage_reply_is_protocol_error() {
        let factory = scripted("read l; echo 'not json'");

        let err = factory.spawn(None).await.err().unwrap();

        assert!(matches!(err, InterpreterError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let factory = ProcessInterpreterFactory::new("interpreterv-does-not-exist", vec![]);

        let err = factory.spawn(None).await.err().unwrap();

        assert!(matches!(err, InterpreterError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_hung_child_is_killed_after_deadline() {
        let factory = scripted(&format!("read l; {OK}; exec sleep 30"));
        let mut interpreter = factory.spawn(None).await.unwrap();
        let start = Instant::now();

        let result = with_deadline(
            Phase::Validation,
            Duration::from_millis(100),
            interpreter.validate(&program()),
        )
        .await;
        interpreter.terminate().await;

        assert!(matches!(result, Err(DeadlineError::TimedOut { .. })));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
