//! External tool abstractions
//!
//! Trait-based wrappers around the programs this crate shells out to, so
//! the decision-making code can be tested without spawning processes.

pub mod command;
pub mod github;

pub use command::{CommandError, CommandExecutor, CommandOutput, CommandRequest, ProcessCommandExecutor};
pub use github::{GhRepositorySearch, RepoSummary, RepositorySearch, SearchError, SearchQuery, SortKey};

#[cfg(any(test, feature = "testing"))]
pub use command::MockCommandExecutor;
#[cfg(any(test, feature = "testing"))]
pub use github::MockRepositorySearch;
