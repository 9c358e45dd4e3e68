// Claude generator implementation

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::claude::{ClaudeClient, Message, MessageRequest, MessageResponse};

use super::{Generator, GeneratorResponse, ResponseMetadata};

pub const REVIEWER_SYSTEM_PROMPT: &str = "\
You are a senior browser engineer reviewing bug analyses that will be handed to an \
automated coding agent. You are precise, you never invent file paths, and you always \
answer with a single JSON object and nothing else.";

/// Claude API generator implementation
pub struct ClaudeGenerator {
    client: Arc<ClaudeClient>,
    model: String,
    max_tokens: u32,
}

impl ClaudeGenerator {
    pub fn new(client: Arc<ClaudeClient>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            client,
            model: model.into(),
            max_tokens,
        }
    }

    fn convert_to_unified(&self, response: MessageResponse) -> GeneratorResponse {
        GeneratorResponse {
            text: response.text(),
            metadata: ResponseMetadata {
                generator: "claude".to_string(),
                model: response.model,
                stop_reason: response.stop_reason,
            },
        }
    }
}

#[async_trait]
impl Generator for ClaudeGenerator {
    async fn generate(&self, messages: Vec<Message>) -> Result<GeneratorResponse> {
        let request = MessageRequest::with_context(&self.model, self.max_tokens, messages)
            .with_system(REVIEWER_SYSTEM_PROMPT);

        let response = self.client.send_message(&request).await?;
        Ok(self.convert_to_unified(response))
    }

    fn name(&self) -> &str {
        "Claude API"
    }
}
