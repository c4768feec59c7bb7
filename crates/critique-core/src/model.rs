//! Model-call collaborator boundary.
//!
//! The engine treats the language model as an opaque function: prompt in,
//! text out, token usage accounted. [`ModelClient`] is the seam; the
//! [`OpenAiClient`] implementation talks to any OpenAI-compatible
//! chat-completions endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::budget::CostMeter;
use crate::error::{BudgetExceeded, ModelCallError, ModelError};

/// One completion with its token accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
}

/// Opaque model call: prompt in, text out.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, prompt: &str, model: &str) -> Result<Completion, ModelError>;
}

/// Binds a client, a model id, and the cost meter for one bounded call path.
///
/// The caller of the raw client is responsible for cost accounting; this
/// wrapper does it: each completion is charged against the meter, a charge
/// that crosses the ceiling turns the call into a refusal, and once the
/// ceiling is fully consumed further calls are refused before being issued.
pub struct ModelCaller {
    client: Arc<dyn ModelClient>,
    model: String,
    meter: CostMeter,
}

impl ModelCaller {
    pub fn new(client: Arc<dyn ModelClient>, model: &str, meter: CostMeter) -> Self {
        ModelCaller {
            client,
            model: model.to_string(),
            meter,
        }
    }

    pub async fn call(&self, prompt: &str) -> Result<String, ModelCallError> {
        if self.meter.exhausted() {
            return Err(BudgetExceeded {
                cost: 0.0,
                remaining: self.meter.remaining(),
                ceiling: self.meter.ceiling(),
            }
            .into());
        }

        let completion = self.client.complete(prompt, &self.model).await?;
        let cost = self.meter.charge(completion.tokens_in, completion.tokens_out)?;
        debug!(
            model = %self.model,
            tokens_in = completion.tokens_in,
            tokens_out = completion.tokens_out,
            cost,
            "model call completed"
        );
        Ok(completion.text)
    }

    pub fn meter(&self) -> &CostMeter {
        &self.meter
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible HTTP client
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        OpenAiClient {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn complete(&self, prompt: &str, model: &str) -> Result<Completion, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self.http.post(&url).bearer_auth(&self.api_key).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response.json().await?;
        let usage = body.usage.unwrap_or_default();
        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ModelError::EmptyCompletion)?;

        Ok(Completion {
            text,
            tokens_in: usage.prompt_tokens,
            tokens_out: usage.completion_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::CostRates;

    struct FixedModel {
        text: &'static str,
        tokens_out: u64,
    }

    #[async_trait]
    impl ModelClient for FixedModel {
        async fn complete(&self, _prompt: &str, _model: &str) -> Result<Completion, ModelError> {
            Ok(Completion {
                text: self.text.to_string(),
                tokens_in: 10,
                tokens_out: self.tokens_out,
            })
        }
    }

    fn rates() -> CostRates {
        CostRates {
            input_per_token: 0.01,
            output_per_token: 0.01,
        }
    }

    #[tokio::test]
    async fn caller_charges_the_meter_per_call() {
        let client = Arc::new(FixedModel {
            text: "ok",
            tokens_out: 10,
        });
        let caller = ModelCaller::new(client, "test-model", CostMeter::new(rates(), 1.0));

        let text = caller.call("hello").await.expect("call succeeds");
        assert_eq!(text, "ok");
        assert!((caller.meter().spent() - 0.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn caller_refuses_a_charge_that_crosses_the_ceiling() {
        let client = Arc::new(FixedModel {
            text: "ok",
            tokens_out: 100,
        });
        let caller = ModelCaller::new(client, "test-model", CostMeter::new(rates(), 0.5));

        let err = caller.call("hello").await.expect_err("over budget");
        assert!(matches!(err, ModelCallError::Budget(_)));
        assert_eq!(caller.meter().spent(), 0.0);
    }

    #[tokio::test]
    async fn caller_refuses_before_issuing_once_exhausted() {
        let client = Arc::new(FixedModel {
            text: "ok",
            tokens_out: 10,
        });
        // Exactly one call fits.
        let caller = ModelCaller::new(client, "test-model", CostMeter::new(rates(), 0.2));

        caller.call("first").await.expect("first call fits");
        let err = caller.call("second").await.expect_err("meter exhausted");
        assert!(matches!(err, ModelCallError::Budget(_)));
    }

    #[test]
    fn chat_request_serializes_to_the_wire_shape() {
        let request = ChatRequest {
            model: "gpt-4.1-nano",
            messages: vec![ChatMessage {
                role: "user",
                content: "review this",
            }],
        };
        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value["model"], "gpt-4.1-nano");
        assert_eq!(value["messages"][0]["role"], "user");
    }

    #[test]
    fn chat_response_tolerates_missing_usage() {
        let body = r#"{"choices":[{"message":{"content":"hi"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).expect("parse");
        assert!(parsed.usage.is_none());
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hi"));
    }
}
