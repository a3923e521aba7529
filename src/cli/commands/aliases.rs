use crate::address_book::{AddressBook, AddressBookError, AliasConflict};
use crate::config::ToolshedConfig;
use crate::dispatch::DispatchError;
use anyhow::Result;

pub struct AliasesCommand {
    pub check: bool,
}

impl AliasesCommand {
    pub fn new() -> Self {
        Self { check: false }
    }

    pub fn with_check(mut self, check: bool) -> Self {
        self.check = check;
        self
    }

    pub async fn execute(&self, config: &ToolshedConfig) -> Result<()> {
        let path = config.whitelist_path();
        let book = AddressBook::load(&path).map_err(DispatchError::from)?;

        println!("📇 Whitelist: {}", path.display());
        let groups = book.list_aliases();
        if groups.is_empty() {
            println!("   (no entries)");
        }
        for group in &groups {
            println!("   {group}");
        }

        let conflicts = book.conflicts();
        if conflicts.is_empty() {
            return Ok(());
        }

        println!();
        println!("⚠️  Aliases defined on more than one line (they will not resolve):");
        for conflict in &conflicts {
            println!("   {}", describe_conflict(conflict));
        }

        if self.check {
            let first = &conflicts[0];
            return Err(DispatchError::from(AddressBookError::DuplicateAlias {
                alias: first.alias.clone(),
                first_line: first.lines[0],
                second_line: first.lines[1],
            })
            .into());
        }
        Ok(())
    }
}

impl Default for AliasesCommand {
    fn default() -> Self {
        Self::new()
    }
}

fn describe_conflict(conflict: &AliasConflict) -> String {
    let lines = conflict
        .lines
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("{} (lines {lines})", conflict.alias)
}
