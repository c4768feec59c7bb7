//! Per-file review pipeline: plan generation, then sequential step execution.
//!
//! One task owns one file's plan and result for its whole lifetime and hands
//! the result back by value when done. Steps run strictly in plan order; a
//! failed step is assumed to invalidate downstream context, so the remainder
//! of the plan is not attempted.

use std::sync::Arc;

use tracing::{error, info};

use crate::config::ReviewConfig;
use crate::events::ReviewEvent;
use crate::model::{ModelCaller, ModelClient};
use crate::parser::RepairingParser;
use crate::plan::{FileReviewResult, ReviewPlan, StepOutcome};
use crate::prompt;
use crate::run::RunKey;
use crate::step::StepExecutor;
use crate::stream::EventLog;
use crate::tools::ToolBroker;

/// Reviews a single file of the change set; produces exactly one result.
pub struct FileReviewTask {
    pub run: RunKey,
    pub repo_url: String,
    pub pr_number: u64,
    pub file_path: String,
    pub diff: String,
    /// Catalog description shared across all tasks of the run.
    pub tool_catalog: String,
    pub plan_schema: String,
    pub config: ReviewConfig,
    pub model: Arc<dyn ModelClient>,
    pub tools: Arc<dyn ToolBroker>,
    pub log: Arc<dyn EventLog>,
}

impl FileReviewTask {
    pub async fn run(self) -> FileReviewResult {
        info!(run = %self.run, file = %self.file_path, "starting review");

        // Fresh meters per task: concurrent files must not starve each
        // other's budget.
        let model = ModelCaller::new(self.model.clone(), &self.config.model, self.config.call_meter());
        let parser = RepairingParser::new(ModelCaller::new(
            self.model.clone(),
            &self.config.repair_model,
            self.config.repair_meter(),
        ));

        let mut result = FileReviewResult::new(&self.file_path);

        // PlanGeneration
        let plan_context = prompt::plan_prompt(
            &self.repo_url,
            self.pr_number,
            &self.plan_schema,
            &self.tool_catalog,
            &self.file_path,
            &self.diff,
        );
        let plan_value = match model.call(&plan_context).await {
            Ok(text) => match parser.parse(&text, &self.plan_schema).await {
                Ok(value) => value,
                Err(e) => return self.plan_failed(result, e.to_string()).await,
            },
            Err(e) => return self.plan_failed(result, e.to_string()).await,
        };
        let plan = match ReviewPlan::from_value(&plan_value) {
            Ok(plan) => plan,
            Err(e) => {
                return self
                    .plan_failed(result, format!("plan did not match schema: {e}"))
                    .await
            }
        };

        info!(file = %self.file_path, steps = plan.steps.len(), "plan generated");
        self.publish(ReviewEvent::plan(&self.file_path, plan_value)).await;

        // StepLoop
        let executor = StepExecutor {
            model: &model,
            parser: &parser,
            tools: self.tools.as_ref(),
            repo_url: &self.repo_url,
            diff: &self.diff,
        };
        for (index, step) in plan.steps.iter().enumerate() {
            info!(file = %self.file_path, step = %step.name, position = index + 1, "executing step");
            let outcome = executor.execute(step).await;
            match &outcome {
                StepOutcome::Ok { step_name, result } => {
                    self.publish(ReviewEvent::step(&self.file_path, step_name, result.clone()))
                        .await;
                }
                StepOutcome::Failed { step_name, error } => {
                    error!(file = %self.file_path, step = %step_name, error = %error, "step failed");
                    self.publish(ReviewEvent::error(
                        &self.file_path,
                        &format!("step '{step_name}' failed: {error}"),
                    ))
                    .await;
                }
            }
            let failed = outcome.is_failure();
            result.steps.push(outcome);
            if failed {
                break;
            }
        }

        // Done
        result
    }

    /// Planning is not retried beyond the parser's own repair attempt: the
    /// file terminates with the error as a single failed pseudo-step.
    async fn plan_failed(&self, mut result: FileReviewResult, error: String) -> FileReviewResult {
        error!(file = %self.file_path, error = %error, "plan generation failed");
        self.publish(ReviewEvent::error(&self.file_path, &error)).await;
        result.steps.push(StepOutcome::Failed {
            step_name: "plan".to_string(),
            error,
        });
        result
    }

    /// Event publication is side-channel reporting; a broken log never takes
    /// down the review itself.
    async fn publish(&self, event: ReviewEvent) {
        if let Err(e) = self.log.append(&self.run, event).await {
            error!(run = %self.run, error = %e, "failed to publish event");
        }
    }
}
