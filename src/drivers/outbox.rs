//! Append messages to a local mbox file instead of sending them.
//!
//! Needs no external program, which makes it the driver of choice for
//! trying out a whitelist or wiring toolshed into scripts under test.

use super::{
    CredentialStore, DependencyCheck, DriverContext, DriverError, DriverInit, EmailSender, MailDriver,
    TransportFailureKind,
};
use crate::message::{Message, SpooledMessage};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

const HELP: &str = "\
outbox: append messages to a local mbox file instead of sending them.

Setup: add to the credentials file:
  OUTBOX_PATH=~/Mail/toolshed-outbox

The containing directory must exist. No external programs are required.";

pub struct OutboxDriver {
    credentials_path: PathBuf,
    target: Option<PathBuf>,
}

impl OutboxDriver {
    pub fn new(ctx: &DriverContext) -> Self {
        Self {
            credentials_path: ctx.credentials_path.clone(),
            target: None,
        }
    }

    /// mbox separator line for one message.
    fn separator(message: &Message) -> String {
        format!(
            "From {} {}\n",
            message.from(),
            message.date().format("%a %b %e %H:%M:%S %Y")
        )
    }
}

/// mboxrd quoting: `From ` lines (and already-quoted ones) gain a `>`.
fn quote_from_lines(rendered: &str) -> String {
    rendered
        .split('\n')
        .map(|line| {
            if line.trim_start_matches('>').starts_with("From ") {
                format!(">{line}")
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl MailDriver for OutboxDriver {
    fn name(&self) -> &str {
        "outbox"
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
impl DependencyCheck for OutboxDriver {
    async fn check_dependencies(&self) -> Result<(), DriverError> {
        Ok(())
    }
}

#[async_trait]
impl DriverInit for OutboxDriver {
    async fn init(&mut self) -> Result<(), DriverError> {
        let store = CredentialStore::load(&self.credentials_path).map_err(|reason| {
            DriverError::InitFailed {
                driver: "outbox".to_string(),
                reason,
            }
        })?;
        let raw = store.get("OUTBOX_PATH").ok_or_else(|| DriverError::CredentialsMissing {
            driver: "outbox".to_string(),
            key: "OUTBOX_PATH".to_string(),
            path: self.credentials_path.clone(),
        })?;
        let target = PathBuf::from(shellexpand::tilde(&raw).into_owned());

        match target.parent() {
            Some(dir) if !dir.as_os_str().is_empty() && !dir.is_dir() => {
                return Err(DriverError::InitFailed {
                    driver: "outbox".to_string(),
                    reason: format!("directory {} does not exist", dir.display()),
                });
            }
            _ => {}
        }
        tracing::info!(outbox = %target.display(), "outbox driver initialized");
        self.target = Some(target);
        Ok(())
    }
}

#[async_trait]
impl EmailSender for OutboxDriver {
    async fn send_email(&self, message: &Message, spool: &SpooledMessage) -> Result<(), DriverError> {
        let failed = |diagnostic: String| DriverError::Transport {
            driver: "outbox".to_string(),
            kind: TransportFailureKind::Other,
            diagnostic,
        };
        let target = self
            .target
            .as_ref()
            .ok_or_else(|| failed("send attempted before init".to_string()))?;
        let rendered = spool.contents().map_err(|e| failed(e.to_string()))?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(target)
            .await
            .map_err(|e| failed(format!("cannot open {}: {e}", target.display())))?;

        let mut entry = Self::separator(message);
        entry.push_str(&quote_from_lines(&String::from_utf8_lossy(&rendered)));
        entry.push_str("\n\n");
        file.write_all(entry.as_bytes())
            .await
            .map_err(|e| failed(format!("cannot write {}: {e}", target.display())))?;
        file.flush().await.map_err(|e| failed(e.to_string()))?;

        tracing::info!(outbox = %target.display(), to = %message.to(), "Message appended to outbox");
        Ok(())
    }
}
