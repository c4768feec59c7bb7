//! Per-file review data model: plans, step outcomes, file results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// File-path tag on synthetic results produced when a task dies outside its
/// own error handling.
pub const SYSTEM_FILE: &str = "system";

/// One tool invocation requested by a plan step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

/// One unit of per-file review work, optionally preceded by tool calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tools: Vec<ToolInvocation>,
}

/// Ordered review steps for one file. Immutable once decoded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewPlan {
    pub steps: Vec<StepSpec>,
}

impl ReviewPlan {
    /// Decode a plan from parsed model output.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }
}

/// Result of one executed step: a structured payload or an error description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Ok { step_name: String, result: Value },
    Failed { step_name: String, error: String },
}

impl StepOutcome {
    pub fn step_name(&self) -> &str {
        match self {
            StepOutcome::Ok { step_name, .. } => step_name,
            StepOutcome::Failed { step_name, .. } => step_name,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, StepOutcome::Failed { .. })
    }
}

/// Terminal outcome of one file's review: step outcomes in plan order, cut
/// short at the first failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReviewResult {
    pub file_path: String,
    pub steps: Vec<StepOutcome>,
}

impl FileReviewResult {
    pub fn new(file_path: &str) -> Self {
        FileReviewResult {
            file_path: file_path.to_string(),
            steps: Vec::new(),
        }
    }

    /// Synthetic result for a task that died outside its own error handling;
    /// keeps the gather loop yielding exactly one result per task.
    pub fn system_error(message: &str) -> Self {
        FileReviewResult {
            file_path: SYSTEM_FILE.to_string(),
            steps: vec![StepOutcome::Failed {
                step_name: "scheduler".to_string(),
                error: message.to_string(),
            }],
        }
    }

    /// Per-file block of the aggregate comment.
    pub fn render_summary(&self) -> String {
        let mut out = format!("File: {}\n", self.file_path);
        for step in &self.steps {
            match step {
                StepOutcome::Ok { step_name, result } => {
                    out.push_str(&format!("- {step_name}: {result}\n"));
                }
                StepOutcome::Failed { step_name, error } => {
                    out.push_str(&format!("- {step_name}: [Error] {error}\n"));
                }
            }
        }
        out
    }
}
