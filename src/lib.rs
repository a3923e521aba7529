// toolshed library: whitelist-based email sending and GitHub repository search
// This exposes the core components for the binary and for integration tests

pub mod address_book;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod drivers;
pub mod external;
pub mod fs;
pub mod message;
pub mod telemetry;

// Re-export key types for easy access
pub use address_book::{AddressBook, AddressBookError, AddressEntry, AliasGroup};
pub use config::ToolshedConfig;
pub use dispatch::{
    BodySource, DispatchError, DispatchFailure, DispatchOutcome, DispatchReport, DispatchRequest,
    DispatchSettings, Dispatcher, FailureCategory,
};
pub use drivers::{
    Capability, DependencyCheck, DriverContext, DriverError, DriverInit, DriverRegistry, EmailSender,
    MailDriver,
};
pub use message::{Message, SpooledMessage};
pub use telemetry::{generate_correlation_id, init_telemetry};
