//! Name-keyed driver table and the driver lifecycle
//!
//! `DriverRegistry::load` → [`LoadedDriver::prepare`] → [`ReadyDriver::send`].
//! Each step consumes the previous value, so a driver whose dependency
//! check or initialization failed can never be asked to send.

use super::{provided_capabilities, Capability, DriverContext, DriverError, MailDriver};
use crate::message::{Message, SpooledMessage};
use std::collections::BTreeMap;

pub type DriverFactory = Box<dyn Fn(&DriverContext) -> Box<dyn MailDriver> + Send + Sync>;

pub struct DriverRegistry {
    factories: BTreeMap<String, DriverFactory>,
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl DriverRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// The drivers that ship with toolshed.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("gmail", |ctx| Box::new(super::smtp::SmtpDriver::gmail(ctx)));
        registry.register("smtp", |ctx| Box::new(super::smtp::SmtpDriver::generic(ctx)));
        registry.register("sendmail", |ctx| {
            Box::new(super::sendmail::SendmailDriver::new(ctx))
        });
        registry.register("outbox", |ctx| Box::new(super::outbox::OutboxDriver::new(ctx)));
        registry
    }

    /// Add or replace a driver factory.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&DriverContext) -> Box<dyn MailDriver> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Construct the named driver and verify it exposes every required
    /// capability. No lifecycle method is called here.
    pub fn load(&self, name: &str, ctx: &DriverContext) -> Result<LoadedDriver, DriverError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| DriverError::NotFound {
                name: name.to_string(),
                available: self.names(),
            })?;
        let mut driver = factory(ctx);

        let provided = provided_capabilities(driver.as_mut());
        let missing: Vec<Capability> = Capability::REQUIRED
            .iter()
            .copied()
            .filter(|cap| !provided.contains(cap))
            .collect();
        if !missing.is_empty() {
            tracing::error!(driver = %name, missing = ?missing, "Driver rejected: incomplete capability set");
            return Err(DriverError::MissingCapability {
                driver: name.to_string(),
                missing,
            });
        }

        tracing::debug!(driver = %name, "Driver loaded");
        Ok(LoadedDriver {
            name: name.to_string(),
            driver,
        })
    }

    /// Help text for one driver, for the `drivers` command.
    pub fn help(&self, name: &str, ctx: &DriverContext) -> Result<String, DriverError> {
        self.load(name, ctx)?.help()
    }
}

fn withdrawn(driver: &str, capability: Capability) -> DriverError {
    DriverError::MissingCapability {
        driver: driver.to_string(),
        missing: vec![capability],
    }
}

/// A driver that passed capability validation but has not been initialized.
pub struct LoadedDriver {
    name: String,
    driver: Box<dyn MailDriver>,
}

impl LoadedDriver {
    pub fn name(&self) -> &str {
        self.driver.name()
    }

    pub fn help(&self) -> Result<String, DriverError> {
        self.driver
            .help_text()
            .map(str::to_string)
            .ok_or_else(|| withdrawn(&self.name, Capability::Help))
    }

    /// Run `check_dependencies` then `init`, stopping at the first failure.
    pub async fn prepare(mut self) -> Result<ReadyDriver, DriverError> {
        self.driver
            .dependency_check()
            .ok_or_else(|| withdrawn(&self.name, Capability::CheckDependencies))?
            .check_dependencies()
            .await?;
        tracing::debug!(driver = %self.name, "Dependencies present");

        self.driver
            .initializer()
            .ok_or_else(|| withdrawn(&self.name, Capability::Init))?
            .init()
            .await?;
        tracing::debug!(driver = %self.name, "Driver initialized");
        Ok(ReadyDriver {
            name: self.name,
            driver: self.driver,
        })
    }
}

/// A driver whose dependency check and initialization both succeeded.
pub struct ReadyDriver {
    name: String,
    driver: Box<dyn MailDriver>,
}

impl ReadyDriver {
    pub fn name(&self) -> &str {
        self.driver.name()
    }

    pub async fn send(&self, message: &Message, spool: &SpooledMessage) -> Result<(), DriverError> {
        self.driver
            .sender()
            .ok_or_else(|| withdrawn(&self.name, Capability::SendEmail))?
            .send_email(message, spool)
            .await
    }
}
