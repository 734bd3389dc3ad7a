//! HTTP transport for remote actions

use std::time::Duration;

use serde::Serialize;

use super::action::{Action, ActionResult};
use crate::config::McpConfig;
use crate::nlu::Entities;
use crate::{Error, Result};

/// Request body sent to the endpoint
#[derive(Serialize)]
struct ActionRequest<'a> {
    action: &'a str,
    parameters: &'a Entities,
}

/// Posts actions to an HTTP endpoint with fixed-delay retries
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl HttpTransport {
    /// Create a transport for the configured endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: &McpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Mcp(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            retry_attempts: config.retry_attempts.max(1),
            retry_delay: config.retry_delay,
        })
    }

    /// Execute an action, retrying failed attempts
    pub async fn execute(&self, action: &Action) -> ActionResult {
        let body = ActionRequest {
            action: &action.action_type,
            parameters: &action.parameters,
        };

        for attempt in 1..=self.retry_attempts {
            match self.attempt(&body).await {
                Ok(response) => return Self::parse_reply(response).await,
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        attempts = self.retry_attempts,
                        error = %e,
                        "HTTP action request failed"
                    );
                }
            }

            if attempt < self.retry_attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        ActionResult::failure("Failed to execute action after multiple attempts")
    }

    /// Send one request; only a 200 reply counts as delivered
    async fn attempt(&self, body: &ActionRequest<'_>) -> Result<reqwest::Response> {
        let response = self.client.post(&self.endpoint).json(body).send().await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Mcp(format!("status {status}: {text}")));
        }

        Ok(response)
    }

    /// Decode a delivered reply; a malformed body is a failure, not a retry
    async fn parse_reply(response: reqwest::Response) -> ActionResult {
        match response.json::<ActionResult>().await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "invalid HTTP action response");
                ActionResult::failure(format!("Invalid response from endpoint: {e}"))
            }
        }
    }
}
