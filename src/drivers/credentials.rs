//! Driver credential store
//!
//! Credentials live in a dotenv-style `KEY=value` file shared by all
//! drivers; each driver reads its own namespaced keys (`GMAIL_USER`,
//! `SMTP_URL`, ...). A process environment variable with the same name
//! takes precedence over the file.

use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    values: HashMap<String, String>,
    file_present: bool,
}

impl CredentialStore {
    /// Read the credentials file. A missing file yields an empty store so
    /// environment-only setups keep working; parse errors are reported.
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No credentials file");
            return Ok(Self::default());
        }

        let mut values = HashMap::new();
        let entries = dotenvy::from_path_iter(path).map_err(|e| e.to_string())?;
        for entry in entries {
            let (key, value) = entry.map_err(|e| e.to_string())?;
            values.insert(key, value);
        }
        Ok(Self {
            values,
            file_present: true,
        })
    }

    pub fn file_present(&self) -> bool {
        self.file_present
    }

    /// Look up `key`, environment first, then the file. Empty values count as unset.
    pub fn get(&self, key: &str) -> Option<String> {
        let present = |v: &String| !v.trim().is_empty();
        std::env::var(key)
            .ok()
            .filter(present)
            .or_else(|| self.values.get(key).cloned().filter(present))
    }

    #[cfg(test)]
    pub(crate) fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            values: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            file_present: true,
        }
    }
}
