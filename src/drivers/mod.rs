//! Mail transport drivers
//!
//! A driver is anything implementing [`MailDriver`]. Each of the four
//! capabilities the dispatcher relies on is its own trait, reached through
//! an accessor on [`MailDriver`], so a driver can only expose an operation
//! it actually implements. Drivers are looked up by name in a
//! [`DriverRegistry`]; the registry refuses any driver missing a capability
//! before a single lifecycle call is made.

pub mod credentials;
pub mod outbox;
pub mod registry;
pub mod sendmail;
pub mod smtp;

use crate::external::CommandExecutor;
use crate::message::{Message, SpooledMessage};
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use credentials::CredentialStore;
pub use registry::{DriverFactory, DriverRegistry, LoadedDriver, ReadyDriver};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    CheckDependencies,
    Init,
    SendEmail,
    Help,
}

impl Capability {
    pub const REQUIRED: [Capability; 4] = [
        Capability::CheckDependencies,
        Capability::Init,
        Capability::SendEmail,
        Capability::Help,
    ];
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::CheckDependencies => "check_dependencies",
            Capability::Init => "init",
            Capability::SendEmail => "send_email",
            Capability::Help => "help",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailureKind {
    Authentication,
    Timeout,
    Other,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("Unknown driver '{name}' (available: {})", .available.join(", "))]
    NotFound { name: String, available: Vec<String> },
    #[error("Driver '{driver}' does not provide: {}", join_capabilities(.missing))]
    MissingCapability {
        driver: String,
        missing: Vec<Capability>,
    },
    #[error("Driver '{driver}' needs '{program}', which was not found on PATH")]
    DependencyMissing { driver: String, program: String },
    #[error("Driver '{driver}' is missing credential {key} (looked in {} and the environment)", .path.display())]
    CredentialsMissing {
        driver: String,
        key: String,
        path: PathBuf,
    },
    #[error("Driver '{driver}' failed to initialize: {reason}")]
    InitFailed { driver: String, reason: String },
    #[error("Driver '{driver}' failed to send: {diagnostic}")]
    Transport {
        driver: String,
        kind: TransportFailureKind,
        diagnostic: String,
    },
}

fn join_capabilities(caps: &[Capability]) -> String {
    caps.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Everything a driver may use while being constructed and initialized.
#[derive(Clone)]
pub struct DriverContext {
    /// Credentials file; only drivers read it.
    pub credentials_path: PathBuf,
    pub executor: Arc<dyn CommandExecutor>,
    /// Upper bound for a single transport invocation.
    pub timeout: Duration,
}

/// Verify the external programs a driver needs are installed.
#[async_trait]
pub trait DependencyCheck: Send + Sync {
    async fn check_dependencies(&self) -> Result<(), DriverError>;
}

/// Load and validate credentials/config.
#[async_trait]
pub trait DriverInit: Send + Sync {
    async fn init(&mut self) -> Result<(), DriverError>;
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_email(&self, message: &Message, spool: &SpooledMessage) -> Result<(), DriverError>;
}

/// The transport contract.
///
/// Every capability accessor defaults to `None`; a driver provides a
/// capability by returning itself from the accessor, which only compiles
/// when it implements the matching trait.
pub trait MailDriver: Send + Sync {
    fn name(&self) -> &str;

    fn dependency_check(&self) -> Option<&dyn DependencyCheck> {
        None
    }

    fn initializer(&mut self) -> Option<&mut dyn DriverInit> {
        None
    }

    fn sender(&self) -> Option<&dyn EmailSender> {
        None
    }

    /// Setup instructions. Never consulted while sending.
    fn help_text(&self) -> Option<&str> {
        None
    }
}

/// The capabilities `driver` actually exposes, in [`Capability::REQUIRED`] order.
pub fn provided_capabilities(driver: &mut dyn MailDriver) -> Vec<Capability> {
    let mut provided = Vec::with_capacity(Capability::REQUIRED.len());
    if driver.dependency_check().is_some() {
        provided.push(Capability::CheckDependencies);
    }
    if driver.initializer().is_some() {
        provided.push(Capability::Init);
    }
    if driver.sender().is_some() {
        provided.push(Capability::SendEmail);
    }
    if driver.help_text().is_some() {
        provided.push(Capability::Help);
    }
    provided
}
