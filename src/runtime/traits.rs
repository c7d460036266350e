//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the session runtime with mock implementations.

use crate::backend::{BackendError, RestBackend};
use crate::cache::CacheError;
use crate::llm::{LlmError, ModelRegistry};
use crate::session::{Conversation, Message};
use crate::system_prompt::reply_request;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Remote store of conversations and messages
#[async_trait]
pub trait ConversationBackend: Send + Sync {
    /// Every conversation of the user, messages included
    async fn fetch_conversations(&self, user_id: &str) -> Result<Vec<Conversation>, BackendError>;

    /// Register a conversation started on this client
    async fn create_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), BackendError>;

    /// Record one appended message
    async fn forward_message(
        &self,
        user_id: &str,
        conversation_id: &str,
        message: &Message,
    ) -> Result<(), BackendError>;
}

/// Produces the assistant reply to a single user prompt
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Synchronous key/value cache on the local device
pub trait LocalCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ConversationBackend + ?Sized> ConversationBackend for Arc<T> {
    async fn fetch_conversations(&self, user_id: &str) -> Result<Vec<Conversation>, BackendError> {
        (**self).fetch_conversations(user_id).await
    }

    async fn create_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), BackendError> {
        (**self)
            .create_conversation(user_id, conversation_id, created_at)
            .await
    }

    async fn forward_message(
        &self,
        user_id: &str,
        conversation_id: &str,
        message: &Message,
    ) -> Result<(), BackendError> {
        (**self)
            .forward_message(user_id, conversation_id, message)
            .await
    }
}

#[async_trait]
impl<T: ReplyGenerator + ?Sized> ReplyGenerator for Arc<T> {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        (**self).generate(prompt).await
    }
}

impl<T: LocalCache + ?Sized> LocalCache for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        (**self).set(key, value)
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

#[async_trait]
impl ConversationBackend for RestBackend {
    async fn fetch_conversations(&self, user_id: &str) -> Result<Vec<Conversation>, BackendError> {
        RestBackend::fetch_conversations(self, user_id).await
    }

    async fn create_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), BackendError> {
        self.register_conversation(user_id, conversation_id, created_at)
            .await
    }

    async fn forward_message(
        &self,
        user_id: &str,
        conversation_id: &str,
        message: &Message,
    ) -> Result<(), BackendError> {
        RestBackend::forward_message(self, user_id, conversation_id, message).await
    }
}

/// Adapter to use `ModelRegistry` as `ReplyGenerator`
pub struct RegistryReplyGenerator {
    registry: Arc<ModelRegistry>,
}

impl RegistryReplyGenerator {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ReplyGenerator for RegistryReplyGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let llm = self
            .registry
            .default()
            .ok_or_else(|| LlmError::unknown("No reply model configured"))?;

        let response = llm.complete(&reply_request(prompt)).await?;
        if response.text.trim().is_empty() {
            return Err(LlmError::malformed("Reply model returned no text"));
        }
        Ok(response.text)
    }
}
