//! Top-level review coordination.
//!
//! The orchestrator resolves the change set, discovers the tool catalog once,
//! fans one task out per file, folds results into a running aggregate as they
//! complete, and finishes with one consolidation call. Collaborators are
//! injected, never looked up from ambient state.

use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::config::ReviewConfig;
use crate::diff::{repo_name_from_url, DiffSource};
use crate::error::{DiffError, ReviewError};
use crate::events::ReviewEvent;
use crate::model::{ModelCaller, ModelClient};
use crate::plan::FileReviewResult;
use crate::prompt;
use crate::run::{RunId, RunKey};
use crate::scheduler::scatter;
use crate::stream::EventLog;
use crate::task::FileReviewTask;
use crate::tools::ToolBroker;

/// File-path sentinel on the final consolidated item.
pub const SUMMARY_FILE: &str = "PR_SUMMARY";

/// One item of the lazily consumed review output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewComment {
    pub file_path: String,
    pub comment: String,
}

/// Coordinates one review run end to end.
#[derive(Clone)]
pub struct ReviewOrchestrator {
    model: Arc<dyn ModelClient>,
    tools: Arc<dyn ToolBroker>,
    diffs: Arc<dyn DiffSource>,
    log: Arc<dyn EventLog>,
    config: ReviewConfig,
}

impl ReviewOrchestrator {
    pub fn new(
        model: Arc<dyn ModelClient>,
        tools: Arc<dyn ToolBroker>,
        diffs: Arc<dyn DiffSource>,
        log: Arc<dyn EventLog>,
        config: ReviewConfig,
    ) -> Self {
        ReviewOrchestrator {
            model,
            tools,
            diffs,
            log,
            config,
        }
    }

    /// Run a review, yielding one `{file_path, comment}` item per file in
    /// completion order, then the consolidated summary under
    /// [`SUMMARY_FILE`].
    ///
    /// Diff retrieval and tool discovery happen before this returns, so the
    /// only terminal failures surface here. Dropping the receiver never
    /// stops the run: events keep flowing to the log until the stream closes
    /// with a `summary` or `error` event.
    pub async fn review(
        &self,
        repo_url: &str,
        pr_number: u64,
        run_id: Option<RunId>,
    ) -> Result<mpsc::Receiver<ReviewComment>, ReviewError> {
        let run_id = run_id.unwrap_or_else(RunId::generate);
        let repo = repo_name_from_url(repo_url);
        let run = RunKey::new(&repo, pr_number, run_id.clone());

        // Register first so the run is discoverable before any event lands.
        self.log.register_run(&repo, pr_number, &run_id).await?;

        info!(run = %run, repo = %repo_url, pr = pr_number, "orchestrating review");

        let change_set = self.diffs.pr_diff(repo_url, pr_number).await?;
        if change_set.is_empty() {
            return Err(DiffError::EmptyChangeSet {
                repo_url: repo_url.to_string(),
                pr_number,
            }
            .into());
        }

        // Discover the catalog once; every task of the run shares it.
        let tool_catalog = self.tools.list_tools().await?;

        let tasks: Vec<_> = change_set
            .into_iter()
            .map(|(file_path, diff)| {
                FileReviewTask {
                    run: run.clone(),
                    repo_url: repo_url.to_string(),
                    pr_number,
                    file_path,
                    diff,
                    tool_catalog: tool_catalog.clone(),
                    plan_schema: prompt::PLAN_SCHEMA.to_string(),
                    config: self.config.clone(),
                    model: self.model.clone(),
                    tools: self.tools.clone(),
                    log: self.log.clone(),
                }
                .run()
            })
            .collect();

        let (sender, receiver) = mpsc::channel(16);
        let orchestrator = self.clone();
        let repo_url = repo_url.to_string();
        tokio::spawn(async move {
            orchestrator.gather(run, repo_url, pr_number, tasks, sender).await;
        });

        Ok(receiver)
    }

    /// Fire-and-forget submission: the run id comes back synchronously once
    /// the run is registered and dispatched; progress is observable only
    /// through the event log.
    pub async fn submit(&self, repo_url: &str, pr_number: u64) -> Result<RunId, ReviewError> {
        let run_id = RunId::generate();
        let mut receiver = self.review(repo_url, pr_number, Some(run_id.clone())).await?;
        tokio::spawn(async move { while receiver.recv().await.is_some() {} });
        Ok(run_id)
    }

    async fn gather<F>(
        &self,
        run: RunKey,
        repo_url: String,
        pr_number: u64,
        tasks: Vec<F>,
        sender: mpsc::Sender<ReviewComment>,
    ) where
        F: Future<Output = FileReviewResult> + Send + 'static,
    {
        let mut aggregate = String::new();
        let mut results = scatter(tasks);

        while let Some(result) = results.next().await {
            let comment = result.render_summary();
            aggregate.push_str(&comment);
            aggregate.push_str(&format!("\n{}\n", "-".repeat(40)));
            // The consumer may be gone; the run carries on regardless.
            let _ = sender
                .send(ReviewComment {
                    file_path: result.file_path.clone(),
                    comment,
                })
                .await;
        }

        info!(run = %run, "generating consolidated summary");
        let summary = ModelCaller::new(self.model.clone(), &self.config.model, self.config.call_meter());
        match summary
            .call(&prompt::summary_prompt(&repo_url, pr_number, &aggregate))
            .await
        {
            Ok(text) => {
                self.publish(&run, ReviewEvent::summary(json!({ "summary": text }))).await;
                let _ = sender
                    .send(ReviewComment {
                        file_path: SUMMARY_FILE.to_string(),
                        comment: format!("# Consolidated PR Summary\n\n{text}"),
                    })
                    .await;
            }
            Err(e) => {
                // Non-terminal: per-file results already delivered stand.
                error!(run = %run, error = %e, "consolidation failed");
                self.publish(&run, ReviewEvent::error("", &format!("Failed to generate summary: {e}")))
                    .await;
                let _ = sender
                    .send(ReviewComment {
                        file_path: SUMMARY_FILE.to_string(),
                        comment: format!("Failed to generate summary: {e}"),
                    })
                    .await;
            }
        }
    }

    async fn publish(&self, run: &RunKey, event: ReviewEvent) {
        if let Err(e) = self.log.append(run, event).await {
            error!(run = %run, error = %e, "failed to publish event");
        }
    }
}
