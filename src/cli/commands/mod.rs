use crate::config::ToolshedConfig;
use crate::dispatch::{DispatchError, DispatchFailure};
use crate::drivers::DriverContext;
use crate::dispatch::exit_code;
use crate::external::{CommandExecutor, ProcessCommandExecutor, SearchError};
use anyhow::Result;
use std::sync::Arc;

pub mod aliases;
pub mod drivers;
pub mod search;
pub mod send;
pub mod setup;

/// Driver context built from configuration, for commands that only query drivers.
pub fn driver_context(config: &ToolshedConfig, executor: Arc<dyn CommandExecutor>) -> DriverContext {
    let settings = config.dispatch_settings();
    DriverContext {
        credentials_path: settings.credentials,
        executor,
        timeout: settings.transport_timeout,
    }
}

pub fn process_executor() -> Arc<dyn CommandExecutor> {
    Arc::new(ProcessCommandExecutor)
}

/// Exit status for an error returned by any command.
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    if let Some(failure) = err.downcast_ref::<DispatchFailure>() {
        return failure.exit_code();
    }
    if let Some(dispatch) = err.downcast_ref::<DispatchError>() {
        return dispatch.exit_code();
    }
    match err.downcast_ref::<SearchError>() {
        Some(SearchError::AuthenticationFailed) => exit_code::AUTHENTICATION,
        _ => exit_code::FAILURE,
    }
}

pub fn show_overview() -> Result<()> {
    println!("🧰 toolshed - small personal utilities");
    println!();
    println!("Email (whitelisted recipients only):");
    println!("  ✉️  toolshed send self -s 'Subject' -b 'Body'   # Send to an alias");
    println!("  🔍 toolshed send self -s 'Hi' -b 'x' --dry-run  # Preview without sending");
    println!("  📇 toolshed aliases                            # List whitelist aliases");
    println!("  🚚 toolshed drivers [NAME]                     # Transport drivers and setup help");
    println!();
    println!("GitHub:");
    println!("  🔎 toolshed search <terms> --language rust      # Search repositories via gh");
    println!();
    println!("💡 First time? Run 'toolshed setup --from you@example.com'");
    Ok(())
}
