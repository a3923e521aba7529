//! SMTP over TLS, delegated to `curl`
//!
//! The `gmail` and `smtp` drivers share this implementation and differ only
//! in the credential keys they read and whether the server URL is fixed.
//! Credentials reach curl through a config document on stdin so the
//! password never appears in the process list.

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

/// curl exit code for "login denied".
const CURL_LOGIN_DENIED: i32 = 67;
/// curl exit code for "operation timed out".
const CURL_TIMED_OUT: i32 = 28;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpProfile {
    pub name: &'static str,
    /// Server URL when fixed by the provider; otherwise read from `url_key`.
    pub fixed_url: Option<&'static str>,
    pub url_key: &'static str,
    pub user_key: &'static str,
    pub password_key: &'static str,
    pub help: &'static str,
}

pub const GMAIL: SmtpProfile = SmtpProfile {
    name: "gmail",
    fixed_url: Some("smtps://smtp.gmail.com:465"),
    url_key: "GMAIL_SMTP_URL",
    user_key: "GMAIL_USER",
    password_key: "GMAIL_APP_PASSWORD",
    help: "\
gmail: send through Gmail's SMTP server (smtps://smtp.gmail.com:465) using curl.

Setup:
  1. Enable 2-Step Verification on the Google account.
  2. Create an app password at https://myaccount.google.com/apppasswords
  3. Add to the credentials file:
       GMAIL_USER=you@gmail.com
       GMAIL_APP_PASSWORD=abcdabcdabcdabcd

Requires: curl",
};

pub const GENERIC: SmtpProfile = SmtpProfile {
    name: "smtp",
    fixed_url: None,
    url_key: "SMTP_URL",
    user_key: "SMTP_USER",
    password_key: "SMTP_PASSWORD",
    help: "\
smtp: send through any SMTP server reachable by curl.

Setup: add to the credentials file:
  SMTP_URL=smtps://mail.example.com:465   (or smtp://host:587 for STARTTLS)
  SMTP_USER=you@example.com
  SMTP_PASSWORD=secret

TLS is required for both URL schemes.

Requires: curl",
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct SmtpSettings {
    url: String,
    user: String,
    password: String,
}

pub struct SmtpDriver {
    profile: SmtpProfile,
    credentials_path: PathBuf,
    executor: Arc<dyn CommandExecutor>,
    timeout: Duration,
    settings: Option<SmtpSettings>,
}

impl SmtpDriver {
    pub fn new(profile: SmtpProfile, ctx: &DriverContext) -> Self {
        Self {
            profile,
            credentials_path: ctx.credentials_path.clone(),
            executor: ctx.executor.clone(),
            timeout: ctx.timeout,
            settings: None,
        }
    }

    pub fn gmail(ctx: &DriverContext) -> Self {
        Self::new(GMAIL, ctx)
    }

    pub fn generic(ctx: &DriverContext) -> Self {
        Self::new(GENERIC, ctx)
    }

    fn require(&self, store: &CredentialStore, key: &str) -> Result<String, DriverError> {
        store.get(key).ok_or_else(|| DriverError::CredentialsMissing {
            driver: self.profile.name.to_string(),
            key: key.to_string(),
            path: self.credentials_path.clone(),
        })
    }

    fn init_failed(&self, reason: impl Into<String>) -> DriverError {
        DriverError::InitFailed {
            driver: self.profile.name.to_string(),
            reason: reason.into(),
        }
    }

    fn transport_failed(&self, kind: TransportFailureKind, diagnostic: impl Into<String>) -> DriverError {
        DriverError::Transport {
            driver: self.profile.name.to_string(),
            kind,
            diagnostic: diagnostic.into(),
        }
    }

    /// curl config read from stdin; values are quoted per curl's config syntax.
    fn curl_config(settings: &SmtpSettings) -> String {
        let quote = |v: &str| v.replace('\\', "\\\\").replace('"', "\\\"");
        format!("user = \"{}:{}\"\n", quote(&settings.user), quote(&settings.password))
    }

    fn classify_failure(&self, status_code: i32, stderr: &str) -> DriverError {
        let diagnostic = if stderr.trim().is_empty() {
            format!("curl exited with status {status_code}")
        } else {
            stderr.trim().to_string()
        };
        let kind = if status_code == CURL_LOGIN_DENIED
            || stderr.contains("Login denied")
            || stderr.contains(" 535 ")
        {
            TransportFailureKind::Authentication
        } else if status_code == CURL_TIMED_OUT {
            TransportFailureKind::Timeout
        } else {
            TransportFailureKind::Other
        };
        self.transport_failed(kind, diagnostic)
    }
}

impl MailDriver for SmtpDriver {
    fn name(&self) -> &str {
        self.profile.name
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
        Some(self.profile.help)
    }
}

#[async_trait]
impl DependencyCheck for SmtpDriver {
    async fn check_dependencies(&self) -> Result<(), DriverError> {
        match self.executor.locate("curl") {
            Some(path) => {
                tracing::debug!(driver = %self.profile.name, curl = %path.display(), "Found curl");
                Ok(())
            }
            None => Err(DriverError::DependencyMissing {
                driver: self.profile.name.to_string(),
                program: "curl".to_string(),
            }),
        }
    }
}

#[async_trait]
impl DriverInit for SmtpDriver {
    async fn init(&mut self) -> Result<(), DriverError> {
        let store = CredentialStore::load(&self.credentials_path)
            .map_err(|e| self.init_failed(format!("cannot parse {}: {e}", self.credentials_path.display())))?;

        let url = match self.profile.fixed_url {
            Some(fixed) => store.get(self.profile.url_key).unwrap_or_else(|| fixed.to_string()),
            None => self.require(&store, self.profile.url_key)?,
        };
        if !(url.starts_with("smtps://") || url.starts_with("smtp://")) {
            return Err(self.init_failed(format!("{} must be an smtp:// or smtps:// URL, got '{url}'", self.profile.url_key)));
        }
        let user = self.require(&store, self.profile.user_key)?;
        let password = self.require(&store, self.profile.password_key)?;
        if !user.contains('@') {
            return Err(self.init_failed(format!("{} should be a full email address", self.profile.user_key)));
        }

        tracing::info!(
            driver = %self.profile.name,
            url = %url,
            user = %user,
            credentials_file = store.file_present(),
            "SMTP driver initialized"
        );
        self.settings = Some(SmtpSettings { url, user, password });
        Ok(())
    }
}

#[async_trait]
impl EmailSender for SmtpDriver {
    async fn send_email(&self, message: &Message, spool: &SpooledMessage) -> Result<(), DriverError> {
        let settings = self
            .settings
            .as_ref()
            .ok_or_else(|| self.init_failed("send attempted before init"))?;

        let request = CommandRequest::new("curl")
            .args([
                "--silent",
                "--show-error",
                "--ssl-reqd",
                "--config",
                "-",
                "--url",
            ])
            .arg(settings.url.as_str())
            .arg("--max-time")
            .arg(self.timeout.as_secs().max(1).to_string())
            .arg("--mail-from")
            .arg(message.from())
            .arg("--mail-rcpt")
            .arg(message.to())
            .arg("--upload-file")
            .arg(spool.path().to_string_lossy().to_string())
            .stdin(Self::curl_config(settings))
            // curl enforces --max-time; this catches a wedged process.
            .timeout(self.timeout + Duration::from_secs(5));

        let output = self.executor.execute(&request).await.map_err(|e| match e {
            CommandError::Timeout { timeout_ms } => self.transport_failed(
                TransportFailureKind::Timeout,
                format!("curl did not finish within {timeout_ms}ms"),
            ),
            other => self.transport_failed(TransportFailureKind::Other, other.to_string()),
        })?;

        if !output.success() {
            let err = self.classify_failure(output.status_code, &output.stderr);
            tracing::warn!(driver = %self.profile.name, status = output.status_code, "curl reported a failure");
            return Err(err);
        }

        tracing::info!(driver = %self.profile.name, to = %message.to(), "Message accepted by SMTP server");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::command::{CommandOutput, MockCommandExecutor};
    use std::io::Write;

    fn credentials(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    fn context(path: &std::path::Path, executor: MockCommandExecutor) -> DriverContext {
        DriverContext {
            credentials_path: path.to_path_buf(),
            executor: Arc::new(executor),
            timeout: Duration::from_secs(30),
        }
    }

    fn message() -> (Message, SpooledMessage) {
        let message = Message::new("me@gmail.com", "a@x.com", "Hi", "Hello");
        let spool = SpooledMessage::write(&message).unwrap();
        (message, spool)
    }

    #[tokio::test]
    async fn test_missing_curl_is_dependency_error() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_locate().returning(|_| None);
        let file = credentials(&[]);

        let driver = SmtpDriver::gmail(&context(file.path(), executor));
        assert_eq!(
            driver.check_dependencies().await.unwrap_err(),
            DriverError::DependencyMissing {
                driver: "gmail".to_string(),
                program: "curl".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_init_requires_app_password() {
        let file = credentials(&["GMAIL_USER=me@gmail.com"]);
        let mut driver = SmtpDriver::gmail(&context(file.path(), MockCommandExecutor::new()));

        match driver.init().await.unwrap_err() {
            DriverError::CredentialsMissing { driver, key, .. } => {
                assert_eq!(driver, "gmail");
                assert_eq!(key, "GMAIL_APP_PASSWORD");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generic_profile_requires_url() {
        let file = credentials(&["SMTP_USER=me@x.com", "SMTP_PASSWORD=pw"]);
        let mut driver = SmtpDriver::generic(&context(file.path(), MockCommandExecutor::new()));

        assert!(matches!(
            driver.init().await.unwrap_err(),
            DriverError::CredentialsMissing { key, .. } if key == "SMTP_URL"
        ));
    }

    #[tokio::test]
    async fn test_generic_profile_rejects_non_smtp_url() {
        let file = credentials(&[
            "SMTP_URL=https://mail.example.com",
            "SMTP_USER=me@x.com",
            "SMTP_PASSWORD=pw",
        ]);
        let mut driver = SmtpDriver::generic(&context(file.path(), MockCommandExecutor::new()));

        assert!(matches!(
            driver.init().await.unwrap_err(),
            DriverError::InitFailed { .. }
        ));
    }

    #[tokio::test]
    async fn test_send_invokes_curl_with_spool_and_stdin_credentials() {
        let (message, spool) = message();
        let spool_path = spool.path().to_string_lossy().to_string();

        let mut executor = MockCommandExecutor::new();
        executor
            .expect_execute()
            .withf(move |req| {
                req.program == "curl"
                    && req.args.windows(2).any(|w| w == ["--url", "smtps://smtp.gmail.com:465"])
                    && req.args.windows(2).any(|w| w == ["--mail-rcpt", "a@x.com"])
                    && req.args.windows(2).any(|w| w[0] == "--upload-file" && w[1] == spool_path)
                    && !req.args.iter().any(|a| a.contains("sekrit"))
                    && req.stdin.as_deref() == Some(b"user = \"me@gmail.com:sekrit\"\n".as_slice())
            })
            .times(1)
            .returning(|_| {
                Ok(CommandOutput {
                    status_code: 0,
                    stdout: String::new(),
                    stderr: String::new(),
                })
            });

        let file = credentials(&["GMAIL_USER=me@gmail.com", "GMAIL_APP_PASSWORD=sekrit"]);
        let mut driver = SmtpDriver::gmail(&context(file.path(), executor));
        driver.init().await.unwrap();

        driver.send_email(&message, &spool).await.unwrap();
    }

    #[tokio::test]
    async fn test_login_denied_is_authentication_failure() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_execute().returning(|_| {
            Ok(CommandOutput {
                status_code: 67,
                stdout: String::new(),
                stderr: "curl: (67) Login denied".to_string(),
            })
        });
        let file = credentials(&["GMAIL_USER=me@gmail.com", "GMAIL_APP_PASSWORD=wrong"]);
        let mut driver = SmtpDriver::gmail(&context(file.path(), executor));
        driver.init().await.unwrap();

        let (message, spool) = message();
        assert_eq!(
            driver.send_email(&message, &spool).await.unwrap_err(),
            DriverError::Transport {
                driver: "gmail".to_string(),
                kind: TransportFailureKind::Authentication,
                diagnostic: "curl: (67) Login denied".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_executor_timeout_is_transport_timeout() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_execute()
            .returning(|_| Err(CommandError::Timeout { timeout_ms: 35_000 }));
        let file = credentials(&["GMAIL_USER=me@gmail.com", "GMAIL_APP_PASSWORD=pw"]);
        let mut driver = SmtpDriver::gmail(&context(file.path(), executor));
        driver.init().await.unwrap();

        let (message, spool) = message();
        assert!(matches!(
            driver.send_email(&message, &spool).await.unwrap_err(),
            DriverError::Transport { kind: TransportFailureKind::Timeout, .. }
        ));
    }

    #[test]
    fn test_curl_config_escapes_quotes() {
        let settings = SmtpSettings {
            url: "smtps://x".to_string(),
            user: "me@x.com".to_string(),
            password: "pa\"ss\\".to_string(),
        };
        assert_eq!(
            SmtpDriver::curl_config(&settings),
            "user = \"me@x.com:pa\\\"ss\\\\\"\n"
        );
    }
}
