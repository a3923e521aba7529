use super::lifecycle::DispatchPhase;
use crate::address_book::AddressBookError;
use crate::drivers::{DriverError, TransportFailureKind};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse failure classes a caller can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureCategory {
    ConfigMissing,
    Usage,
    AliasInvalid,
    DriverNotFound,
    DriverMissingCapability,
    DependencyMissing,
    InitFailed,
    TransportFailed,
    AuthenticationFailed,
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureCategory::ConfigMissing => "config-missing",
            FailureCategory::Usage => "usage",
            FailureCategory::AliasInvalid => "alias-invalid",
            FailureCategory::DriverNotFound => "driver-not-found",
            FailureCategory::DriverMissingCapability => "driver-missing-capability",
            FailureCategory::DependencyMissing => "dependency-missing",
            FailureCategory::InitFailed => "init-failed",
            FailureCategory::TransportFailed => "transport-failed",
            FailureCategory::AuthenticationFailed => "authentication-failed",
        };
        f.write_str(name)
    }
}

pub mod exit_code {
    pub const SUCCESS: u8 = 0;
    pub const FAILURE: u8 = 1;
    pub const USAGE: u8 = 2;
    pub const CONFIG_MISSING: u8 = 3;
    pub const AUTHENTICATION: u8 = 4;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Missing configuration: {what}")]
    ConfigMissing { what: String },
    #[error("Cannot read message body from {}: {message}", .path.display())]
    BodyUnreadable { path: PathBuf, message: String },
    #[error(transparent)]
    AddressBook(#[from] AddressBookError),
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error("Failed to spool message: {message}")]
    Spool { message: String },
}

impl DispatchError {
    pub fn category(&self) -> FailureCategory {
        match self {
            DispatchError::ConfigMissing { .. } => FailureCategory::ConfigMissing,
            DispatchError::BodyUnreadable { .. } => FailureCategory::Usage,
            DispatchError::AddressBook(err) => match err {
                AddressBookError::Missing { .. } => FailureCategory::ConfigMissing,
                AddressBookError::Unreadable { .. } => FailureCategory::ConfigMissing,
                AddressBookError::NotFound { .. } | AddressBookError::DuplicateAlias { .. } => {
                    FailureCategory::AliasInvalid
                }
            },
            DispatchError::Driver(err) => match err {
                DriverError::NotFound { .. } => FailureCategory::DriverNotFound,
                DriverError::MissingCapability { .. } => FailureCategory::DriverMissingCapability,
                DriverError::DependencyMissing { .. } => FailureCategory::DependencyMissing,
                DriverError::CredentialsMissing { .. } => FailureCategory::ConfigMissing,
                DriverError::InitFailed { .. } => FailureCategory::InitFailed,
                DriverError::Transport {
                    kind: TransportFailureKind::Authentication,
                    ..
                } => FailureCategory::AuthenticationFailed,
                DriverError::Transport { .. } => FailureCategory::TransportFailed,
            },
            DispatchError::Spool { .. } => FailureCategory::TransportFailed,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self.category() {
            FailureCategory::Usage => exit_code::USAGE,
            FailureCategory::ConfigMissing => exit_code::CONFIG_MISSING,
            FailureCategory::AuthenticationFailed => exit_code::AUTHENTICATION,
            _ => exit_code::FAILURE,
        }
    }
}

/// A failed dispatch with the context it was traced under.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{error}")]
pub struct DispatchFailure {
    pub correlation_id: String,
    /// Phases visited, ending in `Failed`.
    pub phases: Vec<DispatchPhase>,
    pub error: DispatchError,
}

impl DispatchFailure {
    pub fn category(&self) -> FailureCategory {
        self.error.category()
    }

    pub fn exit_code(&self) -> u8 {
        self.error.exit_code()
    }
}
