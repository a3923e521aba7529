use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dispatch::{DispatchError, DispatchSettings};

/// Main configuration structure for toolshed
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ToolshedConfig {
    /// send-email settings
    pub mail: MailConfig,
    /// Repository search defaults
    pub search: SearchConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MailConfig {
    /// Sender address written to the From header
    pub from: Option<String>,
    /// Whitelist file (`~` is expanded)
    pub whitelist: String,
    /// Driver credentials file (`~` is expanded)
    pub credentials: String,
    /// Driver used when `send` gets no `--driver`
    pub driver: String,
    /// Upper bound for one transport invocation
    pub transport_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SearchConfig {
    /// Default result count
    pub limit: u32,
    /// Keep archived repositories in results
    pub include_archived: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ObservabilityConfig {
    /// Log level when neither TOOLSHED_LOG nor RUST_LOG is set
    pub log_level: String,
    /// Emit JSON log lines
    pub json: bool,
}

impl Default for ToolshedConfig {
    fn default() -> Self {
        Self {
            mail: MailConfig {
                from: None,
                whitelist: "~/.config/toolshed/whitelist".to_string(),
                credentials: "~/.config/toolshed/credentials".to_string(),
                driver: "gmail".to_string(),
                transport_timeout_seconds: 60,
            },
            search: SearchConfig {
                limit: 30,
                include_archived: false,
            },
            observability: ObservabilityConfig {
                log_level: "warn".to_string(),
                json: false,
            },
        }
    }
}

/// Per-user configuration directory (`$XDG_CONFIG_HOME/toolshed` on Linux)
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("toolshed"))
}

/// Expand `~` and environment variables in a configured path.
pub fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(_) => PathBuf::from(shellexpand::tilde(raw).into_owned()),
    }
}

impl ToolshedConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. User configuration file ($XDG_CONFIG_HOME/toolshed/config.toml)
    /// 3. ./toolshed.toml
    /// 4. An explicit `--config` file (must exist)
    /// 5. Environment variables (TOOLSHED__MAIL__FROM, ...)
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(dir) = config_dir() {
            let user_file = dir.join("config.toml");
            if user_file.exists() {
                builder = builder.add_source(File::from(user_file));
            }
        }

        if Path::new("toolshed.toml").exists() {
            builder = builder.add_source(File::with_name("toolshed"));
        }

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(DispatchError::ConfigMissing {
                    what: format!("configuration file {} does not exist", path.display()),
                }
                .into());
            }
            builder = builder.add_source(File::from(path.to_path_buf()));
        }

        builder = builder.add_source(
            Environment::with_prefix("TOOLSHED")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: ToolshedConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Render as the TOML written by `toolshed setup`
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }

    pub fn whitelist_path(&self) -> PathBuf {
        expand_path(&self.mail.whitelist)
    }

    pub fn credentials_path(&self) -> PathBuf {
        expand_path(&self.mail.credentials)
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            sender: self.mail.from.clone().filter(|from| !from.trim().is_empty()),
            whitelist: self.whitelist_path(),
            credentials: self.credentials_path(),
            transport_timeout: Duration::from_secs(self.mail.transport_timeout_seconds.max(1)),
            spool_dir: std::env::temp_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[mail]").unwrap();
        writeln!(file, "from = \"me@example.com\"").unwrap();
        writeln!(file, "driver = \"outbox\"").unwrap();
        writeln!(file, "[search]").unwrap();
        writeln!(file, "limit = 5").unwrap();

        let config = ToolshedConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.mail.from.as_deref(), Some("me@example.com"));
        assert_eq!(config.mail.driver, "outbox");
        assert_eq!(config.search.limit, 5);
        // Untouched keys keep their defaults.
        assert_eq!(config.mail.transport_timeout_seconds, 60);
        assert_eq!(config.observability.log_level, "warn");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ToolshedConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DispatchError>(),
            Some(DispatchError::ConfigMissing { .. })
        ));
    }

    #[test]
    fn test_save_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = ToolshedConfig::default();
        config.mail.from = Some("me@example.com".to_string());

        std::fs::write(&path, config.to_toml().unwrap()).unwrap();
        assert_eq!(ToolshedConfig::load(Some(&path)).unwrap().mail, config.mail);
    }

    #[test]
    fn test_tilde_expanded() {
        let expanded = expand_path("~/whitelist");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.ends_with("whitelist"));
    }

    #[test]
    fn test_blank_sender_treated_as_missing() {
        let mut config = ToolshedConfig::default();
        config.mail.from = Some("  ".to_string());
        assert_eq!(config.dispatch_settings().sender, None);
    }
}
