//! `toolshed setup`: writes starter configuration, whitelist and credentials files.
//!
//! Existing files are left alone unless `--force` is given, and the
//! credentials file is created readable by its owner only.

use crate::config::{config_dir, ToolshedConfig};
use crate::fs::FileSystemOperations;
use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::sync::Arc;

const WHITELIST_HEADER: &str = "\
# toolshed whitelist: one recipient per line
#   <email> <alias> [<alias> ...]
# Lines starting with '#' are ignored. Each alias must appear on exactly one line.
";

const CREDENTIALS_TEMPLATE: &str = "\
# toolshed driver credentials (KEY=value). Environment variables take precedence.

# gmail: create an app password at https://myaccount.google.com/apppasswords
GMAIL_USER=
GMAIL_APP_PASSWORD=

# smtp
SMTP_URL=
SMTP_USER=
SMTP_PASSWORD=

# sendmail
# SENDMAIL_PATH=/usr/sbin/sendmail

# outbox
# OUTBOX_PATH=~/mail/outbox.mbox
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupPaths {
    pub config_file: PathBuf,
    pub whitelist: PathBuf,
    pub credentials: PathBuf,
}

impl SetupPaths {
    pub fn from_config(config: &ToolshedConfig) -> Result<Self> {
        let dir = config_dir()
            .ok_or_else(|| anyhow!("Could not determine the user configuration directory"))?;
        Ok(Self {
            config_file: dir.join("config.toml"),
            whitelist: config.whitelist_path(),
            credentials: config.credentials_path(),
        })
    }
}

struct Template {
    label: &'static str,
    path: PathBuf,
    contents: String,
    private: bool,
}

pub struct SetupCommand {
    pub paths: SetupPaths,
    pub from: Option<String>,
    pub force: bool,
    pub dry_run: bool,
    fs_ops: Arc<dyn FileSystemOperations>,
}

impl SetupCommand {
    pub fn new(paths: SetupPaths, force: bool, dry_run: bool, fs_ops: Arc<dyn FileSystemOperations>) -> Self {
        Self {
            paths,
            from: None,
            force,
            dry_run,
            fs_ops,
        }
    }

    pub fn with_from(mut self, from: Option<String>) -> Self {
        self.from = from.filter(|f| !f.trim().is_empty());
        self
    }

    pub async fn execute(&self, base: &ToolshedConfig) -> Result<()> {
        if let Some(from) = &self.from {
            if !from.contains('@') {
                return Err(anyhow!("Sender address '{from}' does not look like an email address"));
            }
        }

        if self.dry_run {
            println!("🧰 TOOLSHED SETUP (DRY RUN)");
        } else {
            println!("🧰 TOOLSHED SETUP");
        }
        println!();

        let mut written = 0;
        for template in self.templates(base)? {
            if self.write_template(&template).await? {
                written += 1;
            }
        }

        println!();
        if self.dry_run {
            println!("🔍 Dry run: no files were changed");
        } else {
            println!("✅ Setup complete ({written} file(s) written)");
        }
        println!();
        println!("🚀 Next steps:");
        println!("   • Add recipients to {}", self.paths.whitelist.display());
        println!("   • Fill in driver credentials in {}", self.paths.credentials.display());
        println!("   • toolshed drivers gmail       # Driver setup help");
        println!("   • toolshed send self -s 'Hi' -b 'Hello' --dry-run");
        Ok(())
    }

    fn templates(&self, base: &ToolshedConfig) -> Result<Vec<Template>> {
        let mut config = base.clone();
        if self.from.is_some() {
            config.mail.from = self.from.clone();
        }
        config.mail.whitelist = self.paths.whitelist.to_string_lossy().into_owned();
        config.mail.credentials = self.paths.credentials.to_string_lossy().into_owned();

        Ok(vec![
            Template {
                label: "configuration",
                path: self.paths.config_file.clone(),
                contents: config.to_toml()?,
                private: false,
            },
            Template {
                label: "whitelist",
                path: self.paths.whitelist.clone(),
                contents: whitelist_template(self.from.as_deref()),
                private: false,
            },
            Template {
                label: "credentials",
                path: self.paths.credentials.clone(),
                contents: CREDENTIALS_TEMPLATE.to_string(),
                private: true,
            },
        ])
    }

    /// Returns whether the file was (or would be) written.
    async fn write_template(&self, template: &Template) -> Result<bool> {
        let path = template.path.to_string_lossy();
        if self.fs_ops.exists(&path) && !self.force {
            println!("⏭️  {} exists, leaving it untouched: {path}", template.label);
            return Ok(false);
        }

        if self.dry_run {
            println!("Would create {}: {path}", template.label);
            return Ok(true);
        }

        if let Some(parent) = template.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.fs_ops
                .create_dir_all(&parent.to_string_lossy())
                .await
                .map_err(|e| anyhow!("Failed to create {}: {e}", parent.display()))?;
        }
        self.fs_ops
            .write(&path, template.contents.as_bytes(), template.private)
            .await
            .map_err(|e| anyhow!("Failed to write {path}: {e}"))?;

        println!("📝 Wrote {}: {path}", template.label);
        Ok(true)
    }
}

fn whitelist_template(from: Option<&str>) -> String {
    let mut contents = WHITELIST_HEADER.to_string();
    if let Some(from) = from {
        contents.push_str(&format!("{from} self me\n"));
    }
    contents
}
