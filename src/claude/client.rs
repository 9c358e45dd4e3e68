// HTTP client for Claude API

use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

use super::retry::{with_retry, RetryPolicy};
use super::types::{MessageRequest, MessageResponse};

pub const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT_SECS: u64 = 120;

pub struct ClaudeClient {
    client: Client,
    api_key: String,
    api_url: String,
    retry: RetryPolicy,
}

impl ClaudeClient {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_endpoint(api_key, CLAUDE_API_URL.to_string())
    }

    /// Client against a non-default endpoint (proxies, test servers)
    pub fn with_endpoint(api_key: String, api_url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key,
            api_url,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Send a message to Claude API with retry logic
    pub async fn send_message(&self, request: &MessageRequest) -> Result<MessageResponse> {
        with_retry(self.retry, || self.send_message_once(request)).await
    }

    /// Send a single message request (no retry)
    async fn send_message_once(&self, request: &MessageRequest) -> Result<MessageResponse> {
        tracing::debug!(model = %request.model, "Sending request to Claude API");

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .context("Failed to send request to Claude API")?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "Claude API request failed\n\nStatus: {}\nBody: {}",
                status,
                error_body
            );
        }

        let message_response: MessageResponse = response
            .json()
            .await
            .context("Failed to parse Claude API response")?;

        tracing::debug!(
            id = %message_response.id,
            stop_reason = ?message_response.stop_reason,
            "Received response"
        );

        Ok(message_response)
    }
}
