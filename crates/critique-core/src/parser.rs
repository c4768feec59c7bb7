//! Structured-response parsing with a bounded JSON-repair path.
//!
//! Generated structured output is unreliable. Strict decoding is tried first
//! and costs nothing when it works; on failure, one repair call is made under
//! its own cost meter and the repaired text is decoded exactly once. There is
//! no retry beyond that, so a malformed response can never trigger unbounded
//! spend.

use serde_json::Value;
use tracing::warn;

use crate::budget::CostMeter;
use crate::error::ParseFailure;
use crate::model::ModelCaller;
use crate::prompt;

/// Decodes model text into JSON, repairing once on failure.
pub struct RepairingParser {
    repair: ModelCaller,
}

impl RepairingParser {
    /// `repair` carries its own meter; one parser instance bounds one repair
    /// chain.
    pub fn new(repair: ModelCaller) -> Self {
        RepairingParser { repair }
    }

    pub async fn parse(&self, raw: &str, schema_hint: &str) -> Result<Value, ParseFailure> {
        let stripped = strip_code_fences(raw);
        let original = match serde_json::from_str::<Value>(stripped) {
            Ok(value) => return Ok(value),
            Err(e) => e.to_string(),
        };

        warn!(error = %original, "strict decode failed, attempting repair");
        let repaired = match self.repair.call(&prompt::repair_prompt(schema_hint, raw)).await {
            Ok(text) => text,
            Err(e) => {
                return Err(ParseFailure {
                    original,
                    repair: e.to_string(),
                })
            }
        };

        serde_json::from_str::<Value>(strip_code_fences(&repaired)).map_err(|e| ParseFailure {
            original,
            repair: e.to_string(),
        })
    }

    pub fn repair_meter(&self) -> &CostMeter {
        self.repair.meter()
    }
}

/// Models habitually wrap JSON in a markdown fence; tolerate that.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\r', '\n']);
    match rest.strip_suffix("```") {
        Some(inner) => inner.trim(),
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::CostRates;
    use crate::error::ModelError;
    use crate::model::{Completion, ModelClient};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingModel {
        response: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ModelClient for CountingModel {
        async fn complete(&self, _prompt: &str, _model: &str) -> Result<Completion, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Completion {
                text: self.response.to_string(),
                tokens_in: 10,
                tokens_out: 10,
            })
        }
    }

    fn parser_with(model: Arc<CountingModel>, ceiling: f64) -> RepairingParser {
        let rates = CostRates {
            input_per_token: 0.001,
            output_per_token: 0.001,
        };
        RepairingParser::new(ModelCaller::new(model, "repair-model", CostMeter::new(rates, ceiling)))
    }

    #[tokio::test]
    async fn valid_json_never_touches_the_repair_path() {
        let model = Arc::new(CountingModel {
            response: "{}",
            calls: AtomicUsize::new(0),
        });
        let parser = parser_with(model.clone(), 1.0);

        let value = parser.parse(r#"{"steps": []}"#, "").await.expect("parses");
        assert_eq!(value["steps"], serde_json::json!([]));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
        assert_eq!(parser.repair_meter().spent(), 0.0);
    }

    #[tokio::test]
    async fn fenced_json_is_accepted_without_repair() {
        let model = Arc::new(CountingModel {
            response: "{}",
            calls: AtomicUsize::new(0),
        });
        let parser = parser_with(model.clone(), 1.0);

        let raw = "```json\n{\"verdict\": \"pass\"}\n```";
        let value = parser.parse(raw, "").await.expect("parses");
        assert_eq!(value["verdict"], "pass");
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn repair_recovers_malformed_output_exactly_once() {
        let model = Arc::new(CountingModel {
            response: r#"{"verdict": "pass"}"#,
            calls: AtomicUsize::new(0),
        });
        let parser = parser_with(model.clone(), 1.0);

        let value = parser.parse("verdict: pass", "").await.expect("repaired");
        assert_eq!(value["verdict"], "pass");
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert!(parser.repair_meter().spent() > 0.0);
    }

    #[tokio::test]
    async fn failed_repair_carries_both_errors() {
        let model = Arc::new(CountingModel {
            response: "still not json",
            calls: AtomicUsize::new(0),
        });
        let parser = parser_with(model.clone(), 1.0);

        let err = parser.parse("not json either", "").await.expect_err("fails");
        assert!(!err.original.is_empty());
        assert!(!err.repair.is_empty());
        // Exactly one repair attempt, never a retry.
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_repair_budget_surfaces_as_parse_failure() {
        let model = Arc::new(CountingModel {
            response: "{}",
            calls: AtomicUsize::new(0),
        });
        // Ceiling below the cost of a single repair call.
        let parser = parser_with(model.clone(), 0.001);

        let err = parser.parse("not json", "").await.expect_err("refused");
        assert!(err.repair.contains("budget exceeded"));
    }

    #[test]
    fn fence_stripping_handles_plain_and_tagged_fences() {
        assert_eq!(strip_code_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {} "), "{}");
        // An unterminated fence is left alone for the decoder to reject.
        assert_eq!(strip_code_fences("```json\n{}"), "```json\n{}");
    }
}
