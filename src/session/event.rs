//! Events that drive the session state machine
//!
//! Ids and timestamps are generated by whoever raises the event, so that
//! `transition` stays pure.

use super::state::Conversation;
use chrono::{DateTime, Utc};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // Identity provider events
    SignedIn {
        user_id: String,
    },
    SignedOut,

    // Load completion
    ConversationsLoaded {
        user_id: String,
        /// Backend result; the error is already rendered for display
        remote: Result<Vec<Conversation>, String>,
        /// Whatever the local cache held for this user
        cached: Vec<Conversation>,
    },

    // User actions
    StartConversation {
        conversation_id: String,
        created_at: DateTime<Utc>,
        first_message: Option<NewMessage>,
    },
    SelectConversation {
        conversation_id: String,
    },
    DeleteConversation {
        conversation_id: String,
    },
    SendUserMessage {
        /// Target conversation; `None` means the active one
        conversation_id: Option<String>,
        message: NewMessage,
        /// Used only when the send is redirected to a new conversation
        fallback_conversation_id: String,
    },

    // Reply generator completion
    ReplyGenerated {
        conversation_id: String,
        /// Id of the user message the reply answers
        request_id: String,
        message_id: String,
        created_at: DateTime<Utc>,
        outcome: Result<String, String>,
    },
}

/// A user message about to be appended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl NewMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

impl Event {
    /// Translate an identity-provider auth change into an event
    pub fn auth_changed(user_id: Option<String>) -> Self {
        match user_id {
            Some(user_id) => Event::SignedIn { user_id },
            None => Event::SignedOut,
        }
    }

    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Event::SignedIn { .. } => "signed_in",
            Event::SignedOut => "signed_out",
            Event::ConversationsLoaded { .. } => "conversations_loaded",
            Event::StartConversation { .. } => "start_conversation",
            Event::SelectConversation { .. } => "select_conversation",
            Event::DeleteConversation { .. } => "delete_conversation",
            Event::SendUserMessage { .. } => "send_user_message",
            Event::ReplyGenerated { .. } => "reply_generated",
        }
    }
}
