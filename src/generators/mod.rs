// Unified generator interface for LLM backends

use anyhow::Result;
use async_trait::async_trait;

use crate::claude::Message;

pub mod claude;

pub use claude::ClaudeGenerator;

/// Anything that can turn a conversation into a text reply
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate response with full conversation context
    async fn generate(&self, messages: Vec<Message>) -> Result<GeneratorResponse>;

    /// Get generator name for logging
    fn name(&self) -> &str;
}

/// Unified response format
#[derive(Debug, Clone)]
pub struct GeneratorResponse {
    /// Primary text response
    pub text: String,

    /// Metadata about generation
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Default)]
pub struct ResponseMetadata {
    pub generator: String,
    pub model: String,
    pub stop_reason: Option<String>,
}
