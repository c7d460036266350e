//! Session and conversation state types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Title shown for a conversation with no user message yet
pub const NEW_CHAT_TITLE: &str = "New Chat";

/// Maximum number of characters kept from the first user message
pub const TITLE_MAX_CHARS: usize = 30;

/// Assistant text appended when reply generation fails
pub const FALLBACK_REPLY: &str =
    "Sorry, I encountered an error while generating a response. Please try again.";

// ============================================================================
// Messages
// ============================================================================

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Assistant,
}

/// A single chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub text: String,
    pub sender: Sender,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(id: impl Into<String>, text: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            sender: Sender::User,
            created_at,
        }
    }

    pub fn assistant(
        id: impl Into<String>,
        text: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            sender: Sender::Assistant,
            created_at,
        }
    }
}

// ============================================================================
// Conversation
// ============================================================================

/// A titled, append-only thread of messages.
///
/// `title`, `last_message_text` and `updated_at` are always re-derived from
/// `messages`; the only mutation is [`Conversation::append`]. Deserialized
/// values are re-derived too, so a stale cache entry cannot carry a title
/// that disagrees with its messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ConversationRecord")]
pub struct Conversation {
    id: String,
    title: String,
    last_message_text: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    messages: Vec<Message>,
}

/// Wire shape used for deserialization; derived fields are ignored.
#[derive(Deserialize)]
struct ConversationRecord {
    id: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    messages: Vec<Message>,
}

impl From<ConversationRecord> for Conversation {
    fn from(record: ConversationRecord) -> Self {
        Conversation::from_messages(record.id, record.created_at, record.messages)
    }
}

impl Conversation {
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self::from_messages(id, created_at, Vec::new())
    }

    pub fn from_messages(
        id: impl Into<String>,
        created_at: DateTime<Utc>,
        messages: Vec<Message>,
    ) -> Self {
        let mut conversation = Self {
            id: id.into(),
            title: String::new(),
            last_message_text: String::new(),
            created_at,
            updated_at: created_at,
            messages,
        };
        conversation.rederive();
        conversation
    }

    /// Append a message at the tail and refresh the derived fields
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
        self.rederive();
    }

    fn rederive(&mut self) {
        self.title = derive_title(&self.messages);
        self.last_message_text = self
            .messages
            .last()
            .map(|m| m.text.clone())
            .unwrap_or_default();
        self.updated_at = self
            .messages
            .last()
            .map_or(self.created_at, |m| m.created_at.max(self.created_at));
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn last_message_text(&self) -> &str {
        &self.last_message_text
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}

/// Title is the first user message cut to [`TITLE_MAX_CHARS`] characters,
/// with an ellipsis when something was cut.
pub fn derive_title(messages: &[Message]) -> String {
    messages
        .iter()
        .find(|m| m.sender == Sender::User)
        .map_or_else(|| NEW_CHAT_TITLE.to_string(), |m| truncate_title(&m.text))
}

fn truncate_title(text: &str) -> String {
    let mut chars = text.chars();
    let prefix: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{prefix}...")
    } else {
        prefix
    }
}

// ============================================================================
// Session State
// ============================================================================

/// Lifecycle phase of the whole session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No user; nothing is held
    #[default]
    LoggedOut,
    /// Signed in, conversation list being fetched
    Loading,
    /// Signed in with no conversations (the "ready to chat" screen)
    Empty,
    /// Signed in with at least one conversation, one of them active
    HasConversations,
}

impl Phase {
    /// Signed in and past the initial load
    pub fn is_settled(self) -> bool {
        matches!(self, Phase::Empty | Phase::HasConversations)
    }
}

/// Per-conversation reply status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Idle,
    AwaitingReply,
}

/// Authoritative session state.
///
/// Only `transition` produces new values of this type; readers get clones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct SessionState {
    pub user_id: Option<String>,
    pub phase: Phase,
    /// Most recently updated first, unique by id
    pub conversations: Vec<Conversation>,
    pub active_conversation_id: Option<String>,
    /// Conversations with a reply generation in flight, keyed to the id of
    /// the user message that requested it. A completion carrying any other
    /// request id is stale.
    pub awaiting_reply: BTreeMap<String, String>,
}

impl SessionState {
    /// Fresh state for a user whose conversations are being fetched
    pub fn loading(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            phase: Phase::Loading,
            ..Self::default()
        }
    }

    pub fn conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub(crate) fn conversation_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    pub fn active_conversation(&self) -> Option<&Conversation> {
        self.active_conversation_id
            .as_deref()
            .and_then(|id| self.conversation(id))
    }

    pub fn reply_status(&self, id: &str) -> ReplyStatus {
        if self.awaiting_reply.contains_key(id) {
            ReplyStatus::AwaitingReply
        } else {
            ReplyStatus::Idle
        }
    }

    /// Restore recency order after conversations changed (stable for ties)
    pub(crate) fn sort_by_recency(&mut self) {
        self.conversations
            .sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    }

    /// Id of the most recently updated conversation, if any. Ties go to the
    /// earliest listed, matching the head of [`Self::sort_by_recency`].
    pub(crate) fn most_recent_id(&self) -> Option<String> {
        self.conversations
            .iter()
            .min_by_key(|c| Reverse(c.updated_at))
            .map(|c| c.id.clone())
    }

    /// Phase implied by the conversation list of a signed-in session
    pub(crate) fn settled_phase(&self) -> Phase {
        if self.conversations.is_empty() {
            Phase::Empty
        } else {
            Phase::HasConversations
        }
    }

    /// Check every structural invariant; returns the first violation.
    #[cfg(test)]
    pub fn check_invariants(&self) -> Result<(), String> {
        use std::collections::HashSet;

        if let Some(active) = &self.active_conversation_id {
            if self.conversation(active).is_none() {
                return Err(format!("active conversation {active} does not exist"));
            }
        }
        let mut seen = HashSet::new();
        for conv in &self.conversations {
            if !seen.insert(conv.id.as_str()) {
                return Err(format!("duplicate conversation id {}", conv.id));
            }
            if conv.title != derive_title(&conv.messages) {
                return Err(format!("stale title on {}", conv.id));
            }
        }
        for id in self.awaiting_reply.keys() {
            if self.conversation(id).is_none() {
                return Err(format!("awaiting reply on missing conversation {id}"));
            }
        }
        if self.user_id.is_none()
            && (!self.conversations.is_empty()
                || self.active_conversation_id.is_some()
                || self.phase != Phase::LoggedOut)
        {
            return Err("logged-out state holds session data".to_string());
        }
        if self.phase == Phase::HasConversations && self.active_conversation_id.is_none() {
            return Err("has conversations but none active".to_string());
        }
        Ok(())
    }
}
