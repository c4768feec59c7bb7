//! Single-step execution: tool fan-out, then model assessment.

use tracing::warn;

use crate::model::ModelCaller;
use crate::parser::RepairingParser;
use crate::plan::{StepOutcome, StepSpec};
use crate::prompt;
use crate::tools::ToolBroker;

/// Executes one plan step against a fixed file context.
pub struct StepExecutor<'a> {
    pub model: &'a ModelCaller,
    pub parser: &'a RepairingParser,
    pub tools: &'a dyn ToolBroker,
    pub repo_url: &'a str,
    pub diff: &'a str,
}

impl StepExecutor<'_> {
    /// Invoke the step's tools in listed order, folding every output into the
    /// assessment context (one failing tool never aborts the others), then
    /// assess the step with the model. Failures are not retried here; the
    /// only retry in the system is the parser's repair path.
    pub async fn execute(&self, step: &StepSpec) -> StepOutcome {
        let mut tool_outputs = String::new();
        for invocation in &step.tools {
            match self.tools.call_tool(&invocation.tool, invocation.args.clone()).await {
                Ok(value) => {
                    tool_outputs.push_str(&format!("[{}]\n{}\n", invocation.tool, value));
                }
                Err(e) => {
                    warn!(tool = %invocation.tool, error = %e, "tool invocation failed");
                    tool_outputs.push_str(&format!("[{}] error: {}\n", invocation.tool, e));
                }
            }
        }

        let context =
            prompt::step_prompt(self.repo_url, &step.description, self.diff, &tool_outputs);
        let response = match self.model.call(&context).await {
            Ok(text) => text,
            Err(e) => {
                return StepOutcome::Failed {
                    step_name: step.name.clone(),
                    error: e.to_string(),
                }
            }
        };

        // Step responses are free-form structured feedback; no schema hint.
        match self.parser.parse(&response, "").await {
            Ok(result) => StepOutcome::Ok {
                step_name: step.name.clone(),
                result,
            },
            Err(e) => StepOutcome::Failed {
                step_name: step.name.clone(),
                error: e.to_string(),
            },
        }
    }
}
