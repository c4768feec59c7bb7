//! critique-core: pull-request review orchestration engine.
//!
//! Splits a change set into independent per-file review tasks, runs each
//! through a plan -> tool calls -> assessment pipeline, and streams progress
//! through an append-only per-run event log that any number of readers can
//! tail or replay:
//! - `budget`: cost metering for bounded model-call paths
//! - `parser`: strict JSON decoding with a one-shot model repair path
//! - `step` / `task`: the per-file review state machine
//! - `scheduler`: scatter-gather dispatch, yielding in completion order
//! - `stream`: the event log and run registry
//! - `orchestrator`: the run-level coordinator
//!
//! External collaborators (model calls, tool invocation, diff retrieval, the
//! log backend) sit behind traits and are injected, never ambient.

pub mod budget;
pub mod config;
pub mod diff;
pub mod error;
pub mod events;
pub mod model;
pub mod orchestrator;
pub mod parser;
pub mod plan;
pub mod prompt;
pub mod run;
pub mod scheduler;
pub mod step;
pub mod stream;
pub mod task;
pub mod telemetry;
pub mod tools;

pub use budget::{CostMeter, CostRates};
pub use config::ReviewConfig;
pub use diff::{repo_name_from_url, split_unified_diff, ChangeSet, DiffSource, GithubDiffSource};
pub use error::{
    BudgetExceeded, DiffError, ModelCallError, ModelError, ParseFailure, Result, ReviewError,
    StreamError, ToolError,
};
pub use events::{EventId, EventKind, EventRecord, ReviewEvent};
pub use model::{Completion, ModelCaller, ModelClient, OpenAiClient};
pub use orchestrator::{ReviewComment, ReviewOrchestrator, SUMMARY_FILE};
pub use parser::RepairingParser;
pub use plan::{FileReviewResult, ReviewPlan, StepOutcome, StepSpec, ToolInvocation, SYSTEM_FILE};
pub use run::{RunId, RunKey};
pub use scheduler::scatter;
pub use step::StepExecutor;
pub use stream::{EventLog, MemoryEventLog};
pub use task::FileReviewTask;
pub use telemetry::init_tracing;
pub use tools::{HttpToolBroker, ToolBroker};

/// Engine version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
