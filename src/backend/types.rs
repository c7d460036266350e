//! Wire types shared with the conversation backend

use crate::session::{Conversation, Message, Sender};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// `user_id` recorded for messages written by the reply generator
pub const ASSISTANT_USER_ID: &str = "assistant";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendMessage {
    #[serde(rename = "_id", alias = "id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub content: String,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl BackendMessage {
    /// Outgoing record for a message appended in the session
    pub fn from_message(user_id: &str, conversation_id: &str, message: &Message) -> Self {
        let author = match message.sender {
            Sender::User => user_id,
            Sender::Assistant => ASSISTANT_USER_ID,
        };
        Self {
            id: Some(message.id.clone()),
            user_id: author.to_string(),
            content: message.text.clone(),
            timestamp: Some(message.created_at),
            conversation_id: Some(conversation_id.to_string()),
        }
    }

    /// A stored message belongs to the user iff it carries their id
    fn into_message(self, session_user: &str, fallback_id: String, fallback_ts: DateTime<Utc>) -> Message {
        let sender = if self.user_id == session_user {
            Sender::User
        } else {
            Sender::Assistant
        };
        Message {
            id: self.id.unwrap_or(fallback_id),
            text: self.content,
            sender,
            created_at: self.timestamp.unwrap_or(fallback_ts),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConversation {
    #[serde(rename = "_id", alias = "id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_ids: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub messages: Vec<BackendMessage>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

impl BackendConversation {
    /// Creation payload: one owner and no messages
    pub fn new_for(user_id: &str, conversation_id: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Some(conversation_id.to_string()),
            user_ids: vec![user_id.to_string()],
            messages: Vec::new(),
            created_at: Some(created_at),
        }
    }

    /// Map into the session model.
    ///
    /// `fetched` replaces the embedded messages when the per-conversation
    /// lookup succeeded. Records without an id are dropped.
    pub fn into_conversation(
        self,
        session_user: &str,
        fetched: Option<Vec<BackendMessage>>,
    ) -> Option<Conversation> {
        let id = self.id?;
        let created_at = self.created_at.unwrap_or_else(Utc::now);
        let raw = fetched.unwrap_or(self.messages);

        let mut messages: Vec<Message> = raw
            .into_iter()
            .enumerate()
            .map(|(i, m)| m.into_message(session_user, format!("{id}-{i}"), created_at))
            .collect();
        messages.sort_by_key(|m| m.created_at);

        Some(Conversation::from_messages(id, created_at, messages))
    }
}

/// Accepts RFC 3339 or a naive `YYYY-MM-DDTHH:MM:SS[.f]` taken as UTC
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<BackendMessage>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<BackendMessage>>::deserialize(deserializer)?.unwrap_or_default())
}
