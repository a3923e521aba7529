//! Whitelist-backed address book
//!
//! The whitelist is a plain text file with one recipient per line:
//!
//! ```text
//! # comment
//! alice@example.com self me
//! bob@example.com bob work
//! ```
//!
//! The first token is the canonical address, the remaining tokens are
//! aliases. The address itself also resolves. An alias that appears on two
//! different lines is a configuration error and never resolves.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressBookError {
    #[error("Whitelist not found at {}", .path.display())]
    Missing { path: PathBuf },
    #[error("Failed to read whitelist {}: {message}", .path.display())]
    Unreadable { path: PathBuf, message: String },
    #[error("Unknown alias '{alias}'. Known aliases:\n{}", render_listing(.known))]
    NotFound { alias: String, known: Vec<AliasGroup> },
    #[error("Alias '{alias}' is defined on more than one whitelist line (lines {first_line} and {second_line})")]
    DuplicateAlias {
        alias: String,
        first_line: usize,
        second_line: usize,
    },
}

/// One whitelist line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressEntry {
    pub email: String,
    pub aliases: Vec<String>,
    /// 1-based line number in the source file.
    pub line: usize,
}

impl AddressEntry {
    fn matches(&self, alias: &str) -> bool {
        self.email == alias || self.aliases.iter().any(|a| a == alias)
    }
}

/// Human-readable view of an entry: `self, me → a@x.com`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasGroup {
    pub email: String,
    pub aliases: Vec<String>,
}

impl fmt::Display for AliasGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.aliases.is_empty() {
            write!(f, "{}", self.email)
        } else {
            write!(f, "{} → {}", self.aliases.join(", "), self.email)
        }
    }
}

fn render_listing(groups: &[AliasGroup]) -> String {
    if groups.is_empty() {
        return "  (whitelist is empty)".to_string();
    }
    groups
        .iter()
        .map(|g| format!("  {g}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// An alias found on more than one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasConflict {
    pub alias: String,
    pub lines: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct AddressBook {
    entries: Vec<AddressEntry>,
}

impl AddressBook {
    /// Read and parse the whitelist. Called once per resolution; nothing is cached.
    pub fn load(path: &Path) -> Result<Self, AddressBookError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AddressBookError::Missing {
                    path: path.to_path_buf(),
                }
            } else {
                AddressBookError::Unreadable {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
            }
        })?;
        let book = Self::parse(&contents);
        tracing::debug!(path = %path.display(), entries = book.entries.len(), "Loaded whitelist");
        Ok(book)
    }

    pub fn parse(source: &str) -> Self {
        let mut entries = Vec::new();
        for (idx, raw) in source.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut tokens = line.split_whitespace().map(str::to_string);
            let Some(email) = tokens.next() else { continue };
            if !email.contains('@') {
                tracing::warn!(line = idx + 1, token = %email, "Whitelist entry does not look like an email address");
            }
            let mut aliases: Vec<String> = Vec::new();
            for token in tokens {
                if token != email && !aliases.contains(&token) {
                    aliases.push(token);
                }
            }
            entries.push(AddressEntry {
                email,
                aliases,
                line: idx + 1,
            });
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[AddressEntry] {
        &self.entries
    }

    /// Resolve an alias (or a canonical address) to its canonical address.
    ///
    /// Every line is scanned; a second matching line aborts with
    /// [`AddressBookError::DuplicateAlias`] even when both lines name the
    /// same address.
    pub fn resolve(&self, alias: &str) -> Result<&str, AddressBookError> {
        let mut found: Option<&AddressEntry> = None;
        for entry in &self.entries {
            if !entry.matches(alias) {
                continue;
            }
            if let Some(first) = found {
                return Err(AddressBookError::DuplicateAlias {
                    alias: alias.to_string(),
                    first_line: first.line,
                    second_line: entry.line,
                });
            }
            found = Some(entry);
        }

        match found {
            Some(entry) => Ok(&entry.email),
            None => Err(AddressBookError::NotFound {
                alias: alias.to_string(),
                known: self.list_aliases(),
            }),
        }
    }

    pub fn list_aliases(&self) -> Vec<AliasGroup> {
        self.entries
            .iter()
            .map(|e| AliasGroup {
                email: e.email.clone(),
                aliases: e.aliases.clone(),
            })
            .collect()
    }

    /// Every token that would fail resolution with a duplicate error.
    pub fn conflicts(&self) -> Vec<AliasConflict> {
        let mut seen: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for entry in &self.entries {
            for token in std::iter::once(&entry.email).chain(entry.aliases.iter()) {
                seen.entry(token.as_str()).or_default().push(entry.line);
            }
        }
        seen.into_iter()
            .filter(|(_, lines)| lines.len() > 1)
            .map(|(alias, lines)| AliasConflict {
                alias: alias.to_string(),
                lines,
            })
            .collect()
    }
}
