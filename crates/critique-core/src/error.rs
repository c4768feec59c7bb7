//! Error taxonomy for the review engine.
//!
//! Failures are recovered at the smallest enclosing scope that can still make
//! forward progress: a tool error stays inside its step, a step failure stays
//! inside its file, a task failure stays inside the run. Only diff retrieval
//! (and the one-time tool catalog discovery) can abort a whole run.

use thiserror::Error;

/// A charge that would cross a cost meter's ceiling. The meter is left
/// untouched when this is returned.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("budget exceeded: charge of ${cost:.6} would pass the ${ceiling:.6} ceiling (${remaining:.6} remaining)")]
pub struct BudgetExceeded {
    pub cost: f64,
    pub remaining: f64,
    pub ceiling: f64,
}

/// Failure inside the model-call collaborator.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("model API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("model returned an empty completion")]
    EmptyCompletion,
}

/// Failure of a metered model call: either the call itself or its charge.
#[derive(Error, Debug)]
pub enum ModelCallError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Budget(#[from] BudgetExceeded),
}

/// Structured decoding failed even after the one bounded repair attempt.
/// Carries both the original decode error and whatever went wrong on the
/// repair path (its call, its charge, or its decode).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("structured decode failed: {original}; repair attempt: {repair}")]
pub struct ParseFailure {
    pub original: String,
    pub repair: String,
}

/// One tool invocation failed. Never fatal to the step that issued it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("tool transport error: {0}")]
    Transport(String),

    #[error("tool '{tool}' failed: {message}")]
    Invocation { tool: String, message: String },
}

/// Failure of the diff-retrieval collaborator. Terminal for the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiffError {
    #[error("repository URL not understood: {0}")]
    InvalidRepoUrl(String),

    #[error("pull request {pr_number} not found in {repo_url}")]
    NotFound { repo_url: String, pr_number: u64 },

    #[error("diff retrieval failed: {0}")]
    Network(String),

    #[error("no reviewable files in {repo_url}#{pr_number}")]
    EmptyChangeSet { repo_url: String, pr_number: u64 },
}

/// Failure inside the event log or run registry backend.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("event payload serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("event log backend error: {0}")]
    Backend(String),
}

/// Run-level terminal error. Everything else degrades to a recorded failure
/// somewhere inside the run's results.
#[derive(Error, Debug)]
pub enum ReviewError {
    #[error(transparent)]
    Diff(#[from] DiffError),

    #[error("tool catalog discovery failed: {0}")]
    ToolDiscovery(#[from] ToolError),

    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// Result type for run-level operations.
pub type Result<T> = std::result::Result<T, ReviewError>;
