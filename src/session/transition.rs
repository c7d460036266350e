//! Pure state transition function
//!
//! Every mutation of the session goes through [`transition`]. It performs
//! no I/O: backend writes, cache writes and reply generation are returned
//! as [`Effect`]s for the runtime to execute.

use super::state::{Conversation, Message, Phase, ReplyStatus, SessionState, FALLBACK_REPLY};
use super::{Effect, Event, NewMessage};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    /// The event changes nothing (duplicate or stale completion)
    fn unchanged(state: &SessionState) -> Self {
        Self::new(state.clone())
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Reasons a user action is rejected. State is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Not signed in")]
    NotSignedIn,
    #[error("Conversations are still loading")]
    SessionLoading,
    #[error("Message text is empty")]
    EmptyMessage,
    #[error("Conversation not found: {0}")]
    UnknownConversation(String),
    #[error("Conversation already exists: {0}")]
    DuplicateConversation(String),
    #[error("A reply is still being generated for conversation {0}")]
    ReplyPending(String),
}

/// Pure transition function
pub fn transition(state: &SessionState, event: Event) -> Result<TransitionResult, TransitionError> {
    match event {
        // ============================================================
        // Identity
        // ============================================================
        Event::SignedIn { user_id } => {
            if state.user_id.as_deref() == Some(user_id.as_str()) {
                // Auth providers re-announce the current user; keep the session
                return Ok(TransitionResult::unchanged(state));
            }
            Ok(TransitionResult::new(SessionState::loading(&user_id))
                .with_effect(Effect::LoadConversations { user_id }))
        }

        Event::SignedOut => {
            if state.user_id.is_none() {
                return Ok(TransitionResult::unchanged(state));
            }
            Ok(TransitionResult::new(SessionState::default()).with_effect(
                Effect::notify_info("Logged out", "You have been successfully logged out."),
            ))
        }

        Event::ConversationsLoaded {
            user_id,
            remote,
            cached,
        } => {
            if state.phase != Phase::Loading || state.user_id.as_deref() != Some(user_id.as_str())
            {
                // Signed out or switched user while the fetch was in flight
                return Ok(TransitionResult::unchanged(state));
            }
            Ok(apply_loaded(&user_id, remote, cached))
        }

        // ============================================================
        // Conversation management
        // ============================================================
        Event::StartConversation {
            conversation_id,
            created_at,
            first_message,
        } => {
            let user_id = require_session(state)?;
            start_conversation(state, user_id, conversation_id, created_at, first_message)
        }

        Event::SelectConversation { conversation_id } => {
            require_session(state)?;
            if state.conversation(&conversation_id).is_none() {
                return Err(TransitionError::UnknownConversation(conversation_id));
            }
            let mut new_state = state.clone();
            new_state.active_conversation_id = Some(conversation_id);
            new_state.phase = Phase::HasConversations;
            Ok(TransitionResult::new(new_state))
        }

        Event::DeleteConversation { conversation_id } => {
            let user_id = require_session(state)?;
            if state.conversation(&conversation_id).is_none() {
                return Err(TransitionError::UnknownConversation(conversation_id));
            }

            let mut new_state = state.clone();
            new_state.conversations.retain(|c| c.id() != conversation_id);
            new_state.awaiting_reply.remove(&conversation_id);
            if new_state.active_conversation_id.as_deref() == Some(conversation_id.as_str()) {
                new_state.active_conversation_id = new_state.most_recent_id();
            }
            new_state.phase = new_state.settled_phase();

            let persist = Effect::persist(user_id, &new_state.conversations);
            Ok(TransitionResult::new(new_state)
                .with_effect(persist)
                .with_effect(Effect::notify_info(
                    "Chat deleted",
                    "The chat has been removed from your history.",
                )))
        }

        // ============================================================
        // Messaging
        // ============================================================
        Event::SendUserMessage {
            conversation_id,
            message,
            fallback_conversation_id,
        } => {
            let user_id = require_session(state)?;
            if message.text.trim().is_empty() {
                return Err(TransitionError::EmptyMessage);
            }

            let target = conversation_id.or_else(|| state.active_conversation_id.clone());
            let Some(target) = target else {
                // No active conversation: the first message starts one
                let created_at = message.created_at;
                return start_conversation(
                    state,
                    user_id,
                    fallback_conversation_id,
                    created_at,
                    Some(message),
                );
            };

            if state.conversation(&target).is_none() {
                return Err(TransitionError::UnknownConversation(target));
            }
            if state.reply_status(&target) == ReplyStatus::AwaitingReply {
                return Err(TransitionError::ReplyPending(target));
            }

            let mut new_state = state.clone();
            let appended = Message::user(message.id, message.text, message.created_at);
            if let Some(conv) = new_state.conversation_mut(&target) {
                conv.append(appended.clone());
            }
            new_state
                .awaiting_reply
                .insert(target.clone(), appended.id.clone());
            new_state.sort_by_recency();

            let persist = Effect::persist(user_id, &new_state.conversations);
            let generate = Effect::generate_reply(&target, &appended);
            Ok(TransitionResult::new(new_state).with_effects([
                persist,
                Effect::forward(user_id, &target, appended),
                generate,
            ]))
        }

        Event::ReplyGenerated {
            conversation_id,
            request_id,
            message_id,
            created_at,
            outcome,
        } => {
            // Check-before-apply: the conversation may be gone (deleted,
            // signed out), no longer waiting, or waiting on a newer request
            // issued after a sign-out and sign-in.
            let Some(user_id) = state.user_id.as_deref() else {
                return Ok(TransitionResult::unchanged(state));
            };
            if state.awaiting_reply.get(&conversation_id) != Some(&request_id)
                || state.conversation(&conversation_id).is_none()
            {
                return Ok(TransitionResult::unchanged(state));
            }

            let (text, failed) = match outcome {
                Ok(text) => (text, false),
                Err(_) => (FALLBACK_REPLY.to_string(), true),
            };

            let mut new_state = state.clone();
            let reply = Message::assistant(message_id, text, created_at);
            if let Some(conv) = new_state.conversation_mut(&conversation_id) {
                conv.append(reply.clone());
            }
            new_state.awaiting_reply.remove(&conversation_id);
            new_state.sort_by_recency();

            let persist = Effect::persist(user_id, &new_state.conversations);
            let mut result = TransitionResult::new(new_state)
                .with_effect(persist)
                .with_effect(Effect::forward(user_id, &conversation_id, reply));
            if failed {
                result = result.with_effect(Effect::notify_error(
                    "Error",
                    "Failed to generate AI response. Please try again.",
                ));
            }
            Ok(result)
        }
    }
}

// Helper functions

/// The session must be signed in and past the initial load
fn require_session(state: &SessionState) -> Result<&str, TransitionError> {
    match (state.user_id.as_deref(), state.phase) {
        (None, _) | (_, Phase::LoggedOut) => Err(TransitionError::NotSignedIn),
        (Some(_), Phase::Loading) => Err(TransitionError::SessionLoading),
        (Some(user_id), Phase::Empty | Phase::HasConversations) => Ok(user_id),
    }
}

fn start_conversation(
    state: &SessionState,
    user_id: &str,
    conversation_id: String,
    created_at: DateTime<Utc>,
    first_message: Option<NewMessage>,
) -> Result<TransitionResult, TransitionError> {
    if state.conversation(&conversation_id).is_some() {
        return Err(TransitionError::DuplicateConversation(conversation_id));
    }
    if first_message
        .as_ref()
        .is_some_and(|m| m.text.trim().is_empty())
    {
        return Err(TransitionError::EmptyMessage);
    }

    let mut conversation = Conversation::new(&conversation_id, created_at);
    let mut new_state = state.clone();
    let mut follow_up = Vec::new();
    if let Some(message) = first_message {
        let appended = Message::user(message.id, message.text, message.created_at);
        conversation.append(appended.clone());
        new_state
            .awaiting_reply
            .insert(conversation_id.clone(), appended.id.clone());
        let generate = Effect::generate_reply(&conversation_id, &appended);
        follow_up.push(Effect::forward(user_id, &conversation_id, appended));
        follow_up.push(generate);
    }

    new_state.conversations.push(conversation);
    new_state.sort_by_recency();
    new_state.active_conversation_id = Some(conversation_id.clone());
    new_state.phase = Phase::HasConversations;

    let persist = Effect::persist(user_id, &new_state.conversations);
    Ok(TransitionResult::new(new_state)
        .with_effect(Effect::CreateRemoteConversation {
            user_id: user_id.to_string(),
            conversation_id,
            created_at,
        })
        .with_effect(persist)
        .with_effects(follow_up)
        .with_effect(Effect::notify_info(
            "New chat started",
            "You can now start a fresh conversation.",
        )))
}

/// Fold a finished load into a settled session
fn apply_loaded(
    user_id: &str,
    remote: Result<Vec<Conversation>, String>,
    cached: Vec<Conversation>,
) -> TransitionResult {
    let (conversations, failure) = match remote {
        Ok(remote) => (merge_conversations(remote, cached), None),
        // Fail open: whatever the cache holds is still a usable session
        Err(message) => (dedupe(cached), Some(message)),
    };

    let mut new_state = SessionState::loading(user_id);
    new_state.conversations = conversations;
    new_state.sort_by_recency();
    new_state.active_conversation_id = new_state.most_recent_id();
    new_state.phase = new_state.settled_phase();

    let persist = Effect::persist(user_id, &new_state.conversations);
    let mut result = TransitionResult::new(new_state).with_effect(persist);
    if let Some(message) = failure {
        result = result.with_effect(Effect::notify_error(
            "Could not load conversations",
            &message,
        ));
    }
    result
}

/// Union by id. For an id present on both sides the copy with more messages
/// wins; ties go to the backend copy.
fn merge_conversations(remote: Vec<Conversation>, cached: Vec<Conversation>) -> Vec<Conversation> {
    let mut merged = dedupe(remote);
    let mut index: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id().to_string(), i))
        .collect();

    for local in cached {
        match index.get(local.id()) {
            Some(&i) => {
                if local.messages().len() > merged[i].messages().len() {
                    merged[i] = local;
                }
            }
            None => {
                index.insert(local.id().to_string(), merged.len());
                merged.push(local);
            }
        }
    }
    merged
}

/// Keep the first occurrence of each id
fn dedupe(conversations: Vec<Conversation>) -> Vec<Conversation> {
    let mut seen = std::collections::HashSet::new();
    conversations
        .into_iter()
        .filter(|c| seen.insert(c.id().to_string()))
        .collect()
}
