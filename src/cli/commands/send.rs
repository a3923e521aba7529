use crate::config::ToolshedConfig;
use crate::dispatch::{BodySource, DispatchOutcome, DispatchReport, DispatchRequest, Dispatcher};
use crate::drivers::DriverRegistry;
use anyhow::Result;
use std::path::PathBuf;

use super::process_executor;

pub struct SendCommand {
    pub alias: String,
    pub subject: String,
    pub body: Option<String>,
    pub body_file: Option<PathBuf>,
    pub driver: Option<String>,
    pub dry_run: bool,
}

impl SendCommand {
    pub fn body_source(&self) -> BodySource {
        match (&self.body, &self.body_file) {
            (Some(text), _) => BodySource::Inline(text.clone()),
            (None, Some(path)) if path.as_os_str() == "-" => BodySource::Stdin,
            (None, Some(path)) => BodySource::File(path.clone()),
            (None, None) => BodySource::Stdin,
        }
    }

    pub fn request(&self, config: &ToolshedConfig) -> DispatchRequest {
        DispatchRequest {
            alias: self.alias.clone(),
            subject: self.subject.clone(),
            body: self.body_source(),
            driver: self
                .driver
                .clone()
                .unwrap_or_else(|| config.mail.driver.clone()),
            dry_run: self.dry_run,
        }
    }

    pub async fn execute(&self, config: &ToolshedConfig) -> Result<()> {
        let dispatcher = Dispatcher::new(
            config.dispatch_settings(),
            DriverRegistry::with_builtin(),
            process_executor(),
        );
        let report = dispatcher.dispatch(self.request(config)).await?;
        print_report(&report);
        Ok(())
    }
}

pub fn print_report(report: &DispatchReport) {
    match &report.outcome {
        DispatchOutcome::Previewed(preview) => {
            println!("🔍 DRY RUN: message was NOT sent");
            println!("   🚚 Driver:  {}", preview.driver);
            println!("   📤 From:    {}", preview.from);
            println!("   📥 To:      {}", preview.to);
            println!("   📝 Subject: {}", preview.subject);
            println!();
            println!("{}", preview.rendered.replace("\r\n", "\n"));
        }
        DispatchOutcome::Sent(receipt) => {
            println!(
                "✅ Sent '{}' to {} via {}",
                receipt.subject, receipt.to, receipt.driver
            );
        }
    }
}
