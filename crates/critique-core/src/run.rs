//! Run identity: one review execution for a (repository, pull-request) pair.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Sortable run token derived from the submission timestamp (UTC,
/// `%Y%m%d%H%M%S`). Lexical order is chronological order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn generate() -> Self {
        RunId(Utc::now().format("%Y%m%d%H%M%S").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RunId {
    fn from(value: String) -> Self {
        RunId(value)
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        RunId(value.to_string())
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Addresses one run's event stream.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunKey {
    pub repo: String,
    pub pr_number: u64,
    pub run_id: RunId,
}

impl RunKey {
    pub fn new(repo: &str, pr_number: u64, run_id: RunId) -> Self {
        RunKey {
            repo: repo.to_string(),
            pr_number,
            run_id,
        }
    }

    /// Stream address in the external key scheme.
    pub fn stream_name(&self) -> String {
        format!("review:stream:{}:{}:{}", self.repo, self.pr_number, self.run_id)
    }
}

impl std::fmt::Display for RunKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}@{}", self.repo, self.pr_number, self.run_id)
    }
}
