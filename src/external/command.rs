//! Base command execution abstraction
//!
//! Provides the foundational trait for executing external programs (`curl`,
//! `sendmail`, `gh`), enabling dependency injection for testing.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

/// A single invocation of an external program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandRequest {
    pub program: String,
    pub args: Vec<String>,
    /// Bytes written to the child's stdin, which is then closed.
    pub stdin: Option<Vec<u8>>,
    /// Upper bound on the child's runtime; the child is killed when exceeded.
    pub timeout: Option<Duration>,
}

impl CommandRequest {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == 0
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Command not found: {command}")]
    CommandNotFound { command: String },
    #[error("Command timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("IO error: {message}")]
    Io { message: String },
}

/// Trait for executing external commands
///
/// The rest of the crate runs programs through this trait instead of
/// `tokio::process::Command` directly, so drivers and the search wrapper
/// can be tested against a mock.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, request: &CommandRequest) -> Result<CommandOutput, CommandError>;

    /// Resolve a program name against `PATH`.
    fn locate(&self, program: &str) -> Option<PathBuf>;
}

/// Real implementation using `tokio::process::Command`
pub struct ProcessCommandExecutor;

#[async_trait]
impl CommandExecutor for ProcessCommandExecutor {
    async fn execute(&self, request: &CommandRequest) -> Result<CommandOutput, CommandError> {
        use tokio::process::Command;

        tracing::debug!(program = %request.program, args = request.args.len(), "Spawning external command");

        let mut child = Command::new(&request.program)
            .args(&request.args)
            .stdin(if request.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    CommandError::CommandNotFound {
                        command: request.program.clone(),
                    }
                } else {
                    CommandError::Io { message: e.to_string() }
                }
            })?;

        // Feed stdin while draining stdout/stderr, all under the one deadline.
        let pipe = child.stdin.take();
        let input = request.stdin.as_deref();
        let run = async move {
            let feed = async move {
                match (input, pipe) {
                    (Some(input), Some(mut pipe)) => match pipe.write_all(input).await {
                        // The child may exit without reading all of its input.
                        Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => Err(e),
                        _ => Ok(()),
                    },
                    _ => Ok(()),
                }
            };
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            fed.and(output)
        };

        // Dropping `run` on timeout drops the child, which kills it.
        let output = match request.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| CommandError::Timeout {
                    timeout_ms: limit.as_millis() as u64,
                })?,
            None => run.await,
        }
        .map_err(|e| CommandError::Io { message: e.to_string() })?;

        Ok(CommandOutput {
            status_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}
