//! Hand the message to the local MTA through its `sendmail` interface.

use super::{
    CredentialStore, DependencyCheck, DriverContext, DriverError, DriverInit, EmailSender, MailDriver,
    TransportFailureKind,
};
use crate::external::{CommandError, CommandExecutor, CommandRequest};
use crate::message::{Message, SpooledMessage};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_PROGRAM: &str = "sendmail";

const HELP: &str = "\
sendmail: hand messages to the local mail transfer agent.

The MTA (postfix, exim, msmtp, ...) must already be configured to relay.
Override the binary in the credentials file:
  SENDMAIL_PATH=/usr/sbin/sendmail

Requires: sendmail (or SENDMAIL_PATH)";

pub struct SendmailDriver {
    credentials_path: PathBuf,
    executor: Arc<dyn CommandExecutor>,
    timeout: Duration,
    /// Resolved by `init`.
    program: Option<String>,
}

impl SendmailDriver {
    pub fn new(ctx: &DriverContext) -> Self {
        Self {
            credentials_path: ctx.credentials_path.clone(),
            executor: ctx.executor.clone(),
            timeout: ctx.timeout,
            program: None,
        }
    }

    /// `SENDMAIL_PATH` when set, otherwise `sendmail` from `PATH`.
    fn configured_program(&self) -> Result<String, DriverError> {
        let store = CredentialStore::load(&self.credentials_path).map_err(|e| DriverError::InitFailed {
            driver: "sendmail".to_string(),
            reason: format!("cannot parse {}: {e}", self.credentials_path.display()),
        })?;
        Ok(store
            .get("SENDMAIL_PATH")
            .unwrap_or_else(|| DEFAULT_PROGRAM.to_string()))
    }

    fn transport_failed(kind: TransportFailureKind, diagnostic: impl Into<String>) -> DriverError {
        DriverError::Transport {
            driver: "sendmail".to_string(),
            kind,
            diagnostic: diagnostic.into(),
        }
    }
}

impl MailDriver for SendmailDriver {
    fn name(&self) -> &str {
        "sendmail"
    }

    fn dependency_check(&self) -> Option<&dyn DependencyCheck> {
        Some(self)
    }

    fn initializer(&mut self) -> Option<&mut dyn DriverInit> {
        Some(self)
    }

    fn sender(&self) -> Option<&dyn EmailSender> {
        Some(self)
    }

    fn help_text(&self) -> Option<&str> {
        Some(HELP)
    }
}

#[async_trait]
impl DependencyCheck for SendmailDriver {
    async fn check_dependencies(&self) -> Result<(), DriverError> {
        let program = self.configured_program()?;
        match self.executor.locate(&program) {
            Some(path) => {
                tracing::debug!(sendmail = %path.display(), "Found sendmail");
                Ok(())
            }
            None => Err(DriverError::DependencyMissing {
                driver: "sendmail".to_string(),
                program,
            }),
        }
    }
}

#[async_trait]
impl DriverInit for SendmailDriver {
    async fn init(&mut self) -> Result<(), DriverError> {
        let program = self.configured_program()?;
        tracing::info!(program = %program, "sendmail driver initialized");
        self.program = Some(program);
        Ok(())
    }
}

#[async_trait]
impl EmailSender for SendmailDriver {
    async fn send_email(&self, message: &Message, spool: &SpooledMessage) -> Result<(), DriverError> {
        let program = self.program.as_deref().ok_or_else(|| {
            Self::transport_failed(TransportFailureKind::Other, "send attempted before init")
        })?;
        let contents = spool
            .contents()
            .map_err(|e| Self::transport_failed(TransportFailureKind::Other, e.to_string()))?;

        // -i: a lone "." in the body does not end the message.
        let request = CommandRequest::new(program)
            .args(["-i", "-f"])
            .arg(message.from())
            .arg("--")
            .arg(message.to())
            .stdin(contents)
            .timeout(self.timeout);

        let output = self.executor.execute(&request).await.map_err(|e| match e {
            CommandError::Timeout { timeout_ms } => Self::transport_failed(
                TransportFailureKind::Timeout,
                format!("{program} did not finish within {timeout_ms}ms"),
            ),
            other => Self::transport_failed(TransportFailureKind::Other, other.to_string()),
        })?;

        if !output.success() {
            let diagnostic = if output.stderr.trim().is_empty() {
                format!("{program} exited with status {}", output.status_code)
            } else {
                output.stderr.trim().to_string()
            };
            return Err(Self::transport_failed(TransportFailureKind::Other, diagnostic));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::command::{CommandOutput, MockCommandExecutor};
    use std::io::Write;

    fn driver_at(credentials: &std::path::Path, executor: MockCommandExecutor) -> SendmailDriver {
        SendmailDriver::new(&DriverContext {
            credentials_path: credentials.to_path_buf(),
            executor: Arc::new(executor),
            timeout: Duration::from_secs(10),
        })
    }

    fn driver_with(executor: MockCommandExecutor) -> SendmailDriver {
        driver_at("/nonexistent/credentials".as_ref(), executor)
    }

    fn credentials(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file
    }

    #[tokio::test]
    async fn test_pipes_rendered_message_to_sendmail() {
        let message = Message::new("me@x.com", "a@x.com", "Hi", "Hello");
        let spool = SpooledMessage::write(&message).unwrap();
        let rendered = message.render().into_bytes();

        let mut executor = MockCommandExecutor::new();
        executor
            .expect_execute()
            .withf(move |req| {
                req.program == "sendmail"
                    && req.args == ["-i", "-f", "me@x.com", "--", "a@x.com"]
                    && req.stdin.as_deref() == Some(rendered.as_slice())
            })
            .times(1)
            .returning(|_| {
                Ok(CommandOutput {
                    status_code: 0,
                    stdout: String::new(),
                    stderr: String::new(),
                })
            });

        let mut driver = driver_with(executor);
        driver.init().await.unwrap();
        driver.send_email(&message, &spool).await.unwrap();
    }

    #[tokio::test]
    async fn test_nonzero_exit_carries_stderr() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_execute().returning(|_| {
            Ok(CommandOutput {
                status_code: 75,
                stdout: String::new(),
                stderr: "sendmail: fatal: queue file write error\n".to_string(),
            })
        });
        let mut driver = driver_with(executor);
        driver.init().await.unwrap();
        let message = Message::new("me@x.com", "a@x.com", "Hi", "Hello");
        let spool = SpooledMessage::write(&message).unwrap();

        assert_eq!(
            driver.send_email(&message, &spool).await.unwrap_err(),
            DriverError::Transport {
                driver: "sendmail".to_string(),
                kind: TransportFailureKind::Other,
                diagnostic: "sendmail: fatal: queue file write error".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_locate().returning(|_| None);

        assert!(matches!(
            driver_with(executor).check_dependencies().await,
            Err(DriverError::DependencyMissing { program, .. }) if program == "sendmail"
        ));
    }

    #[tokio::test]
    async fn test_sendmail_path_from_credentials_file() {
        let file = credentials("SENDMAIL_PATH=/opt/mta/bin/sendmail\n");
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_locate()
            .withf(|program| program == "/opt/mta/bin/sendmail")
            .times(1)
            .returning(|program| Some(PathBuf::from(program)));
        executor
            .expect_execute()
            .withf(|req| req.program == "/opt/mta/bin/sendmail")
            .times(1)
            .returning(|_| {
                Ok(CommandOutput {
                    status_code: 0,
                    stdout: String::new(),
                    stderr: String::new(),
                })
            });

        let mut driver = driver_at(file.path(), executor);
        driver.check_dependencies().await.unwrap();
        driver.init().await.unwrap();
        let message = Message::new("me@x.com", "a@x.com", "Hi", "Hello");
        let spool = SpooledMessage::write(&message).unwrap();
        driver.send_email(&message, &spool).await.unwrap();
    }

    #[tokio::test]
    async fn test_unparseable_credentials_reported_not_ignored() {
        let file = credentials("SENDMAIL_PATH=\"/opt/mta/bin/sendmail\n");
        // Constructing the driver touches neither the file nor the executor.
        let driver = driver_at(file.path(), MockCommandExecutor::new());

        assert!(matches!(
            driver.check_dependencies().await,
            Err(DriverError::InitFailed { driver, .. }) if driver == "sendmail"
        ));
    }

    #[tokio::test]
    async fn test_send_before_init_is_refused() {
        let driver = driver_with(MockCommandExecutor::new());
        let message = Message::new("me@x.com", "a@x.com", "Hi", "Hello");
        let spool = SpooledMessage::write(&message).unwrap();

        assert!(driver.send_email(&message, &spool).await.is_err());
    }
}
