// Claude API client

pub mod client;
pub mod retry;
pub mod types;

pub use client::ClaudeClient;
pub use retry::{with_retry, RetryPolicy};
pub use types::{ContentBlock, Message, MessageRequest, MessageResponse};
