use crate::config::ToolshedConfig;
use crate::dispatch::DispatchError;
use crate::drivers::{DriverContext, DriverRegistry};
use anyhow::Result;

use super::{driver_context, process_executor};

pub struct DriversCommand {
    pub name: Option<String>,
    registry: DriverRegistry,
}

impl DriversCommand {
    pub fn new(name: Option<String>) -> Self {
        Self {
            name,
            registry: DriverRegistry::with_builtin(),
        }
    }

    pub fn with_registry(mut self, registry: DriverRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub async fn execute(&self, config: &ToolshedConfig) -> Result<()> {
        let ctx = driver_context(config, process_executor());
        print!("{}", self.render(&ctx, &config.mail.driver)?);
        Ok(())
    }

    /// Listing or help text; never loads credentials or runs a driver.
    pub fn render(&self, ctx: &DriverContext, default_driver: &str) -> Result<String> {
        match &self.name {
            Some(name) => {
                let help = self.registry.help(name, ctx).map_err(DispatchError::from)?;
                if help.trim().is_empty() {
                    Ok(format!("🚚 {name}: no setup help available\n"))
                } else {
                    Ok(format!("🚚 {name}\n\n{}\n", help.trim_end()))
                }
            }
            None => {
                let mut out = String::from("🚚 Available drivers:\n");
                for name in self.registry.names() {
                    let marker = if name == default_driver { " (default)" } else { "" };
                    out.push_str(&format!("   • {name}{marker}\n"));
                }
                out.push_str("\n💡 'toolshed drivers <NAME>' shows setup help for a driver\n");
                Ok(out)
            }
        }
    }
}
