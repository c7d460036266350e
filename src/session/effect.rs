//! Effects produced by state transitions

use super::state::{Conversation, Message};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Fetch the user's conversations from the backend and the local cache
    LoadConversations { user_id: String },

    /// Ask the reply generator for an answer (spawns as background task)
    GenerateReply {
        conversation_id: String,
        request_id: String,
        prompt: String,
    },

    /// Register a locally started conversation with the backend (fire-and-forget)
    CreateRemoteConversation {
        user_id: String,
        conversation_id: String,
        created_at: DateTime<Utc>,
    },

    /// Forward an appended message to the backend (fire-and-forget)
    ForwardMessage {
        user_id: String,
        conversation_id: String,
        message: Message,
    },

    /// Write the full conversation set to the local cache
    PersistLocally {
        user_id: String,
        conversations: Vec<Conversation>,
    },

    /// Show a non-blocking notice to the user
    Notify(Notification),
}

/// Severity of a user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Error,
}

/// A non-blocking, user-visible notice
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub description: String,
}

impl Effect {
    pub fn persist(user_id: &str, conversations: &[Conversation]) -> Self {
        Effect::PersistLocally {
            user_id: user_id.to_string(),
            conversations: conversations.to_vec(),
        }
    }

    pub fn forward(user_id: &str, conversation_id: &str, message: Message) -> Self {
        Effect::ForwardMessage {
            user_id: user_id.to_string(),
            conversation_id: conversation_id.to_string(),
            message,
        }
    }

    pub fn generate_reply(conversation_id: &str, request: &Message) -> Self {
        Effect::GenerateReply {
            conversation_id: conversation_id.to_string(),
            request_id: request.id.clone(),
            prompt: request.text.clone(),
        }
    }

    pub fn notify_info(title: &str, description: &str) -> Self {
        Effect::Notify(Notification {
            level: NotificationLevel::Info,
            title: title.to_string(),
            description: description.to_string(),
        })
    }

    pub fn notify_error(title: &str, description: &str) -> Self {
        Effect::Notify(Notification {
            level: NotificationLevel::Error,
            title: title.to_string(),
            description: description.to_string(),
        })
    }
}
