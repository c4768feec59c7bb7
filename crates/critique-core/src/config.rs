//! Engine configuration: model ids, token rates, per-path budgets.

use std::env;

use crate::budget::{CostMeter, CostRates};

pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";
const DEFAULT_INPUT_RATE: f64 = 0.10 / 10e6;
const DEFAULT_OUTPUT_RATE: f64 = 0.40 / 10e6;
const DEFAULT_CALL_BUDGET: f64 = 0.5;
const DEFAULT_REPAIR_BUDGET: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct ReviewConfig {
    /// Model used for planning, step assessment, and consolidation.
    pub model: String,
    /// Model used by the JSON-repair path.
    pub repair_model: String,
    pub rates: CostRates,
    /// Ceiling for each primary call path (one per file task, one for the
    /// consolidation call).
    pub call_budget: f64,
    /// Ceiling for each repair chain.
    pub repair_budget: f64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        ReviewConfig {
            model: DEFAULT_MODEL.to_string(),
            repair_model: DEFAULT_MODEL.to_string(),
            rates: CostRates {
                input_per_token: DEFAULT_INPUT_RATE,
                output_per_token: DEFAULT_OUTPUT_RATE,
            },
            call_budget: DEFAULT_CALL_BUDGET,
            repair_budget: DEFAULT_REPAIR_BUDGET,
        }
    }
}

impl ReviewConfig {
    /// Defaults with environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(model) = env::var("REVIEW_MODEL") {
            config.model = model;
        }
        if let Ok(model) = env::var("JSON_REPAIR_MODEL") {
            config.repair_model = model;
        }
        if let Ok(budget) = env::var("JSON_REPAIR_MAX_BUDGET") {
            if let Ok(budget) = budget.parse() {
                config.repair_budget = budget;
            }
        }
        config
    }

    /// Fresh meter for one primary call path.
    pub fn call_meter(&self) -> CostMeter {
        CostMeter::new(self.rates, self.call_budget)
    }

    /// Fresh meter for one repair chain.
    pub fn repair_meter(&self) -> CostMeter {
        CostMeter::new(self.rates, self.repair_budget)
    }
}
