use crate::config::ToolshedConfig;
use crate::external::{GhRepositorySearch, RepoSummary, RepositorySearch, SearchQuery};
use anyhow::Result;
use std::sync::Arc;

use super::process_executor;

pub struct SearchCommand {
    pub query: SearchQuery,
    pub json: bool,
    backend: Arc<dyn RepositorySearch>,
}

impl SearchCommand {
    pub fn new(query: SearchQuery, json: bool) -> Self {
        Self {
            query,
            json,
            backend: Arc::new(GhRepositorySearch::new(process_executor())),
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn RepositorySearch>) -> Self {
        self.backend = backend;
        self
    }

    /// Fill unset options from the `[search]` configuration section.
    pub fn query_from(
        terms: Vec<String>,
        limit: Option<u32>,
        config: &ToolshedConfig,
    ) -> SearchQuery {
        SearchQuery {
            terms,
            limit: limit.unwrap_or(config.search.limit).max(1),
            include_archived: config.search.include_archived,
            ..SearchQuery::default()
        }
    }

    pub async fn execute(&self) -> Result<()> {
        let repos = self.backend.search(&self.query).await?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&repos)?);
        } else {
            print!("{}", render_table(&repos));
        }
        Ok(())
    }
}

pub fn render_table(repos: &[RepoSummary]) -> String {
    if repos.is_empty() {
        return "🔎 No repositories matched\n".to_string();
    }

    let width = repos
        .iter()
        .map(|r| r.full_name.len())
        .max()
        .unwrap_or(0);

    let mut out = format!("🔎 {} repositories\n", repos.len());
    for repo in repos {
        let language = repo.language.as_deref().unwrap_or("-");
        let description = repo.description.as_deref().unwrap_or("").trim();
        out.push_str(&format!(
            "  ⭐ {:>6}  {:<width$}  {:<10}  {}\n",
            repo.stargazers_count,
            repo.full_name,
            language,
            truncate(description, 60),
        ));
    }
    out
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
