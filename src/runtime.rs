//! Runtime owning the conversation session
//!
//! A single task holds the [`SessionState`] and feeds every command and
//! completion through [`transition`](crate::session::transition). Callers talk
//! to it through a cloneable [`SessionHandle`].

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

use executor::SessionRuntime;
pub use traits::*;

use crate::session::{Event, NewMessage, Notification, SessionState, TransitionError};
use chrono::Utc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

/// Updates pushed to subscribers (SSE clients, tests)
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    /// The session state changed
    Snapshot(SessionState),
    Notification(Notification),
    /// A command was rejected
    Error { message: String },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Rejected(#[from] TransitionError),
    #[error("Session runtime has stopped")]
    Stopped,
}

/// A user action plus the channel its outcome is reported on
pub(crate) struct Command {
    pub event: Event,
    pub ack: oneshot::Sender<Result<(), TransitionError>>,
}

/// Cloneable handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: mpsc::Sender<Command>,
    state_rx: watch::Receiver<SessionState>,
    update_tx: broadcast::Sender<SessionUpdate>,
}

impl SessionHandle {
    /// Current state
    pub fn snapshot(&self) -> SessionState {
        self.state_rx.borrow().clone()
    }

    #[cfg(test)]
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.update_tx.subscribe()
    }

    /// Start a conversation and make it active; returns its id
    pub async fn start_conversation(
        &self,
        first_message: Option<String>,
    ) -> Result<String, SessionError> {
        let conversation_id = uuid::Uuid::new_v4().to_string();
        self.dispatch(Event::StartConversation {
            conversation_id: conversation_id.clone(),
            created_at: Utc::now(),
            first_message: first_message.map(NewMessage::new),
        })
        .await?;
        Ok(conversation_id)
    }

    pub async fn select_conversation(&self, conversation_id: &str) -> Result<(), SessionError> {
        self.dispatch(Event::SelectConversation {
            conversation_id: conversation_id.to_string(),
        })
        .await
    }

    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<(), SessionError> {
        self.dispatch(Event::DeleteConversation {
            conversation_id: conversation_id.to_string(),
        })
        .await
    }

    /// Send a user message to `conversation_id`, or to the active
    /// conversation when `None` (a new one is started if there is none)
    pub async fn send_message(
        &self,
        conversation_id: Option<String>,
        text: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.dispatch(Event::SendUserMessage {
            conversation_id,
            message: NewMessage::new(text),
            fallback_conversation_id: uuid::Uuid::new_v4().to_string(),
        })
        .await
    }

    async fn dispatch(&self, event: Event) -> Result<(), SessionError> {
        let (ack, outcome) = oneshot::channel();
        self.command_tx
            .send(Command { event, ack })
            .await
            .map_err(|_| SessionError::Stopped)?;
        outcome.await.map_err(|_| SessionError::Stopped)??;
        Ok(())
    }
}

/// Spawn a session runtime on the current tokio runtime
pub fn spawn_session<B, G, C>(
    backend: B,
    generator: G,
    cache: C,
    auth_rx: watch::Receiver<Option<String>>,
) -> SessionHandle
where
    B: ConversationBackend + 'static,
    G: ReplyGenerator + 'static,
    C: LocalCache + 'static,
{
    let (runtime, handle) = SessionRuntime::new(backend, generator, cache, auth_rx);
    tokio::spawn(runtime.run());
    handle
}
