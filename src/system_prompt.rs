//! System prompt and request shape for assistant replies

use crate::llm::LlmRequest;

/// Instruction sent ahead of every user prompt
pub const SYSTEM_PROMPT: &str = "You are a helpful AI assistant. Provide responses that are appropriate in length and detail for what the user is asking. Be natural and comprehensive when needed, concise when appropriate.";

pub const REPLY_TEMPERATURE: f32 = 0.7;
pub const REPLY_MAX_TOKENS: u32 = 4000;

/// Build the single-turn completion request for a user prompt.
///
/// Replies see only the triggering message, not the conversation history.
pub fn reply_request(prompt: &str) -> LlmRequest {
    LlmRequest::single_turn(Some(SYSTEM_PROMPT), prompt)
        .with_temperature(REPLY_TEMPERATURE)
        .with_max_tokens(REPLY_MAX_TOKENS)
}
