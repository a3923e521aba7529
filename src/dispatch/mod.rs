//! Dispatch orchestrator
//!
//! Ties the address book, the message formatter and the driver registry
//! together for a single send (or dry-run) request. Each dispatch is one
//! sequential pipeline; nothing is shared between dispatches.

pub mod errors;
pub mod lifecycle;

use crate::address_book::AddressBook;
use crate::drivers::{DriverContext, DriverRegistry};
use crate::external::CommandExecutor;
use crate::message::{Message, SpooledMessage};
use crate::telemetry::generate_correlation_id;
use serde::Serialize;
use statig::prelude::*;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

pub use errors::{exit_code, DispatchError, DispatchFailure, FailureCategory};
pub use lifecycle::{DispatchEvent, DispatchLifecycle, DispatchPhase};

/// Where the message body comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodySource {
    Inline(String),
    File(PathBuf),
    Stdin,
}

impl BodySource {
    fn read(&self) -> Result<String, DispatchError> {
        match self {
            BodySource::Inline(text) => Ok(text.clone()),
            BodySource::File(path) => {
                std::fs::read_to_string(path).map_err(|e| DispatchError::BodyUnreadable {
                    path: path.clone(),
                    message: e.to_string(),
                })
            }
            BodySource::Stdin => {
                let mut body = String::new();
                std::io::stdin()
                    .read_to_string(&mut body)
                    .map_err(|e| DispatchError::BodyUnreadable {
                        path: PathBuf::from("<stdin>"),
                        message: e.to_string(),
                    })?;
                Ok(body)
            }
        }
    }
}

/// One parsed send request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    pub alias: String,
    pub subject: String,
    pub body: BodySource,
    pub driver: String,
    pub dry_run: bool,
}

/// Settings the dispatcher needs from configuration.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Sender address; `None` is reported as missing configuration.
    pub sender: Option<String>,
    pub whitelist: PathBuf,
    pub credentials: PathBuf,
    pub transport_timeout: Duration,
    /// Directory the rendered message is spooled into.
    pub spool_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preview {
    pub driver: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub rendered: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub driver: String,
    pub to: String,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum DispatchOutcome {
    Previewed(Preview),
    Sent(Receipt),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub correlation_id: String,
    pub outcome: DispatchOutcome,
    pub phases: Vec<DispatchPhase>,
}

pub struct Dispatcher {
    settings: DispatchSettings,
    registry: DriverRegistry,
    executor: Arc<dyn CommandExecutor>,
}

impl Dispatcher {
    pub fn new(
        settings: DispatchSettings,
        registry: DriverRegistry,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self {
            settings,
            registry,
            executor,
        }
    }

    fn driver_context(&self) -> DriverContext {
        DriverContext {
            credentials_path: self.settings.credentials.clone(),
            executor: self.executor.clone(),
            timeout: self.settings.transport_timeout,
        }
    }

    /// Run one request to completion.
    pub async fn dispatch(&self, request: DispatchRequest) -> Result<DispatchReport, DispatchFailure> {
        let correlation_id = generate_correlation_id();
        let span = tracing::info_span!(
            "dispatch",
            correlation.id = %correlation_id,
            alias = %request.alias,
            driver = %request.driver,
            dry_run = request.dry_run,
        );

        let mut lifecycle = DispatchLifecycle::default().state_machine();
        let result = self
            .run(&request, &mut lifecycle)
            .instrument(span.clone())
            .await;

        let _entered = span.enter();
        match result {
            Ok(outcome) => {
                tracing::info!(phases = ?lifecycle.inner().phases(), "Dispatch complete");
                Ok(DispatchReport {
                    correlation_id,
                    outcome,
                    phases: lifecycle.inner().phases().to_vec(),
                })
            }
            Err(error) => {
                lifecycle.handle(&DispatchEvent::Fail {
                    category: error.category(),
                });
                let phases = lifecycle.inner().phases().to_vec();
                tracing::error!(
                    error = %error,
                    category = %error.category(),
                    phases = ?phases,
                    "Dispatch failed"
                );
                Err(DispatchFailure {
                    correlation_id,
                    phases,
                    error,
                })
            }
        }
    }

    async fn run(
        &self,
        request: &DispatchRequest,
        lifecycle: &mut StateMachine<DispatchLifecycle>,
    ) -> Result<DispatchOutcome, DispatchError> {
        lifecycle.handle(&DispatchEvent::Start);

        // Resolving
        let book = AddressBook::load(&self.settings.whitelist)?;
        let to = book.resolve(&request.alias)?.to_string();
        tracing::info!(to = %to, "Recipient resolved");
        lifecycle.handle(&DispatchEvent::Resolved { email: to.clone() });

        // Formatting
        let from = self
            .settings
            .sender
            .clone()
            .ok_or_else(|| DispatchError::ConfigMissing {
                what: "sender address (mail.from)".to_string(),
            })?;
        let body = request.body.read()?;
        let message = Message::new(&from, &to, &request.subject, &body);
        // Removed when this function returns, on every path.
        let spool = SpooledMessage::write_in(&self.settings.spool_dir, &message).map_err(|e| {
            DispatchError::Spool {
                message: e.to_string(),
            }
        })?;
        lifecycle.handle(&DispatchEvent::Formatted);

        // DriverLoading
        let driver = self
            .registry
            .load(&request.driver, &self.driver_context())?
            .prepare()
            .await?;
        lifecycle.handle(&DispatchEvent::DriverReady {
            dry_run: request.dry_run,
        });

        if request.dry_run {
            let preview = Preview {
                driver: driver.name().to_string(),
                from: message.from().to_string(),
                to: message.to().to_string(),
                subject: message.subject().to_string(),
                rendered: message.render(),
            };
            lifecycle.handle(&DispatchEvent::Previewed);
            return Ok(DispatchOutcome::Previewed(preview));
        }

        driver.send(&message, &spool).await?;
        lifecycle.handle(&DispatchEvent::Delivered);
        tracing::info!(to = %message.to(), "Message sent");

        Ok(DispatchOutcome::Sent(Receipt {
            driver: driver.name().to_string(),
            to: message.to().to_string(),
            subject: message.subject().to_string(),
        }))
    }
}
