use super::{BackendConversation, BackendError, BackendMessage};
use crate::session::{Conversation, Message};
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// HTTP client for the conversation backend
#[derive(Clone)]
pub struct RestBackend {
    client: Client,
    base_url: String,
}

impl RestBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn list_conversations(
        &self,
        user_id: &str,
    ) -> Result<Vec<BackendConversation>, BackendError> {
        self.get_json(&format!("/conversations/{user_id}")).await
    }

    pub async fn create_conversation(
        &self,
        conversation: &BackendConversation,
    ) -> Result<BackendConversation, BackendError> {
        self.post_json("/conversations/", conversation).await
    }

    pub async fn list_messages(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<BackendMessage>, BackendError> {
        self.get_json(&format!("/messages/{conversation_id}")).await
    }

    pub async fn create_message(
        &self,
        message: &BackendMessage,
    ) -> Result<BackendMessage, BackendError> {
        self.post_json("/messages/", message).await
    }

    /// Load every conversation of a user with its messages.
    ///
    /// Messages are fetched per conversation in parallel. A failed message
    /// lookup falls back to whatever the conversation record embeds.
    pub async fn fetch_conversations(
        &self,
        user_id: &str,
    ) -> Result<Vec<Conversation>, BackendError> {
        let records = self.list_conversations(user_id).await?;

        let lookups = records.iter().map(|record| async move {
            let id = record.id.as_deref()?;
            match self.list_messages(id).await {
                Ok(messages) => Some(messages),
                Err(e) => {
                    tracing::warn!(conversation_id = %id, error = %e, "Message fetch failed, using embedded messages");
                    None
                }
            }
        });
        let fetched = futures::future::join_all(lookups).await;

        let conversations: Vec<Conversation> = records
            .into_iter()
            .zip(fetched)
            .filter_map(|(record, messages)| record.into_conversation(user_id, messages))
            .collect();

        tracing::debug!(user_id = %user_id, count = conversations.len(), "Fetched remote conversations");
        Ok(conversations)
    }

    pub async fn register_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), BackendError> {
        self.create_conversation(&BackendConversation::new_for(user_id, conversation_id, created_at))
            .await
            .map(drop)
    }

    pub async fn forward_message(
        &self,
        user_id: &str,
        conversation_id: &str,
        message: &Message,
    ) -> Result<(), BackendError> {
        self.create_message(&BackendMessage::from_message(user_id, conversation_id, message))
            .await
            .map(drop)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
    }
}
