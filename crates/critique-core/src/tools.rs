//! Tool-invocation collaborator boundary.
//!
//! Static analysis, AST queries, and any other per-step augmentation run
//! behind this seam. Tool errors are reported to the step that issued them
//! and never abort it.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ToolError;

/// Opaque tool capability: discover the catalog once, invoke by name.
#[async_trait]
pub trait ToolBroker: Send + Sync {
    /// Model-readable description of every available tool.
    async fn list_tools(&self) -> Result<String, ToolError>;

    /// Invoke one tool with JSON arguments.
    async fn call_tool(&self, name: &str, args: Value) -> Result<Value, ToolError>;
}

/// Broker for an HTTP tool server: `GET {base}/tools` for the catalog,
/// `POST {base}/tools/{name}` to invoke.
pub struct HttpToolBroker {
    http: reqwest::Client,
    base_url: String,
}

impl HttpToolBroker {
    pub fn new(base_url: &str) -> Self {
        HttpToolBroker {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ToolBroker for HttpToolBroker {
    async fn list_tools(&self) -> Result<String, ToolError> {
        let url = format!("{}/tools", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ToolError::Transport(format!(
                "tool catalog request returned {}",
                response.status()
            )));
        }
        response
            .text()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))
    }

    async fn call_tool(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let url = format!("{}/tools/{}", self.base_url, name);
        let response = self
            .http
            .post(&url)
            .json(&args)
            .send()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ToolError::Invocation {
                tool: name.to_string(),
                message: body,
            });
        }

        // Tool servers are not obliged to answer in JSON.
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}
