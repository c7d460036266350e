//! Session runtime executor

use super::traits::{ConversationBackend, LocalCache, ReplyGenerator};
use super::{Command, SessionHandle, SessionUpdate};
use crate::cache;
use crate::session::{transition, Conversation, Effect, Event, SessionState, TransitionError};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};

const COMMAND_BUFFER: usize = 32;
const COMPLETION_BUFFER: usize = 64;
const UPDATE_BUFFER: usize = 128;

/// Generic session runtime that can work with any backend, generator, and cache
pub struct SessionRuntime<B, G, C>
where
    B: ConversationBackend + 'static,
    G: ReplyGenerator + 'static,
    C: LocalCache + 'static,
{
    state: SessionState,
    backend: Arc<B>,
    generator: Arc<G>,
    cache: Arc<C>,
    command_rx: mpsc::Receiver<Command>,
    /// Completions of spawned I/O come back here
    completion_tx: mpsc::Sender<Event>,
    completion_rx: mpsc::Receiver<Event>,
    auth_rx: watch::Receiver<Option<String>>,
    state_tx: watch::Sender<SessionState>,
    update_tx: broadcast::Sender<SessionUpdate>,
}

impl<B, G, C> SessionRuntime<B, G, C>
where
    B: ConversationBackend + 'static,
    G: ReplyGenerator + 'static,
    C: LocalCache + 'static,
{
    pub fn new(
        backend: B,
        generator: G,
        cache: C,
        auth_rx: watch::Receiver<Option<String>>,
    ) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (completion_tx, completion_rx) = mpsc::channel(COMPLETION_BUFFER);
        let (state_tx, state_rx) = watch::channel(SessionState::default());
        let (update_tx, _) = broadcast::channel(UPDATE_BUFFER);

        let handle = SessionHandle {
            command_tx,
            state_rx,
            update_tx: update_tx.clone(),
        };

        let runtime = Self {
            state: SessionState::default(),
            backend: Arc::new(backend),
            generator: Arc::new(generator),
            cache: Arc::new(cache),
            command_rx,
            completion_tx,
            completion_rx,
            auth_rx,
            state_tx,
            update_tx,
        };

        (runtime, handle)
    }

    /// Process commands, completions and auth changes until every handle is dropped
    pub async fn run(mut self) {
        tracing::info!("Starting session runtime");

        // A user may already be signed in when the runtime starts
        let initial = self.auth_rx.borrow_and_update().clone();
        if initial.is_some() {
            let _ = self.process_event(Event::auth_changed(initial));
        }

        let mut auth_open = true;
        loop {
            tokio::select! {
                command = self.command_rx.recv() => {
                    let Some(Command { event, ack }) = command else { break };
                    let outcome = self.process_event(event);
                    // The caller may have given up waiting
                    let _ = ack.send(outcome);
                }
                Some(event) = self.completion_rx.recv() => {
                    let _ = self.process_event(event);
                }
                changed = self.auth_rx.changed(), if auth_open => {
                    if changed.is_ok() {
                        let user_id = self.auth_rx.borrow_and_update().clone();
                        let _ = self.process_event(Event::auth_changed(user_id));
                    } else {
                        tracing::warn!("Identity provider closed its auth stream");
                        auth_open = false;
                    }
                }
            }
        }

        tracing::info!("Session runtime stopped");
    }

    fn process_event(&mut self, event: Event) -> Result<(), TransitionError> {
        let name = event.name();

        let result = match transition(&self.state, event) {
            Ok(r) => r,
            Err(e) => {
                // Rejections are user-facing (e.g. "reply still pending")
                tracing::debug!(event = name, error = %e, "Event rejected");
                let _ = self.update_tx.send(SessionUpdate::Error {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        if result.new_state != self.state {
            self.state = result.new_state;
            tracing::debug!(
                event = name,
                phase = ?self.state.phase,
                conversations = self.state.conversations.len(),
                active = ?self.state.active_conversation().map(Conversation::id),
                "Session state changed"
            );
            self.state_tx.send_replace(self.state.clone());
            let _ = self
                .update_tx
                .send(SessionUpdate::Snapshot(self.state.clone()));
        }

        for effect in result.effects {
            self.execute_effect(effect);
        }

        Ok(())
    }

    /// Execute an effect; network work is spawned and reports back as an event
    fn execute_effect(&self, effect: Effect) {
        match effect {
            Effect::LoadConversations { user_id } => {
                let backend = self.backend.clone();
                let cache = self.cache.clone();
                let completion_tx = self.completion_tx.clone();

                tokio::spawn(async move {
                    let remote = backend
                        .fetch_conversations(&user_id)
                        .await
                        .map_err(|e| {
                            tracing::warn!(user_id = %user_id, error = %e, "Failed to load conversations");
                            e.to_string()
                        });
                    let cached = cache::load_conversations(cache.as_ref(), &user_id);

                    let _ = completion_tx
                        .send(Event::ConversationsLoaded {
                            user_id,
                            remote,
                            cached,
                        })
                        .await;
                });
            }

            Effect::GenerateReply {
                conversation_id,
                request_id,
                prompt,
            } => {
                let generator = self.generator.clone();
                let completion_tx = self.completion_tx.clone();

                tokio::spawn(async move {
                    tracing::info!(
                        conversation_id = %conversation_id,
                        request_id = %request_id,
                        "Generating reply (background)"
                    );
                    let outcome = generator.generate(&prompt).await.map_err(|e| {
                        tracing::error!(
                            conversation_id = %conversation_id,
                            kind = ?e.kind,
                            error = %e,
                            "Reply generation failed"
                        );
                        e.to_string()
                    });

                    let _ = completion_tx
                        .send(Event::ReplyGenerated {
                            conversation_id,
                            request_id,
                            message_id: uuid::Uuid::new_v4().to_string(),
                            created_at: Utc::now(),
                            outcome,
                        })
                        .await;
                });
            }

            Effect::CreateRemoteConversation {
                user_id,
                conversation_id,
                created_at,
            } => {
                let backend = self.backend.clone();
                tokio::spawn(async move {
                    if let Err(e) = backend
                        .create_conversation(&user_id, &conversation_id, created_at)
                        .await
                    {
                        tracing::warn!(conversation_id = %conversation_id, error = %e, "Failed to create remote conversation");
                    }
                });
            }

            Effect::ForwardMessage {
                user_id,
                conversation_id,
                message,
            } => {
                let backend = self.backend.clone();
                tokio::spawn(async move {
                    if let Err(e) = backend
                        .forward_message(&user_id, &conversation_id, &message)
                        .await
                    {
                        tracing::warn!(
                            conversation_id = %conversation_id,
                            message_id = %message.id,
                            error = %e,
                            "Failed to forward message"
                        );
                    }
                });
            }

            Effect::PersistLocally {
                user_id,
                conversations,
            } => {
                cache::store_conversations(self.cache.as_ref(), &user_id, &conversations);
            }

            Effect::Notify(notification) => {
                tracing::info!(
                    level = ?notification.level,
                    title = %notification.title,
                    "Notification"
                );
                let _ = self
                    .update_tx
                    .send(SessionUpdate::Notification(notification));
            }
        }
    }
}
