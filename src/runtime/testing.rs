//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use super::{spawn_session, SessionHandle, SessionUpdate};
use crate::auth::{AuthError, IdentityProvider, UserProfile};
use crate::backend::BackendError;
use crate::cache::CacheError;
use crate::llm::LlmError;
use crate::session::{Conversation, Message, SessionState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch, Notify};

// ============================================================================
// Mock Backend
// ============================================================================

/// In-memory backend that stores what is written to it
#[derive(Default)]
pub struct MockBackend {
    conversations: Mutex<HashMap<String, Vec<Conversation>>>,
    fail_fetch: AtomicBool,
    fail_writes: AtomicBool,
    /// Record of `(user_id, conversation_id)` creations
    pub created: Mutex<Vec<(String, String)>>,
    /// Record of `(conversation_id, message)` forwards
    pub forwarded: Mutex<Vec<(String, Message)>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the remote store for a user
    pub fn with_conversations(self, user_id: &str, conversations: Vec<Conversation>) -> Self {
        self.conversations
            .lock()
            .unwrap()
            .insert(user_id.to_string(), conversations);
        self
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn forwarded_texts(&self, conversation_id: &str) -> Vec<String> {
        self.forwarded
            .lock()
            .unwrap()
            .iter()
            .filter(|(cid, _)| cid == conversation_id)
            .map(|(_, m)| m.text.clone())
            .collect()
    }

    fn write_error(&self) -> Result<(), BackendError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BackendError::Status {
                status: 500,
                body: "mock write failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ConversationBackend for MockBackend {
    async fn fetch_conversations(&self, user_id: &str) -> Result<Vec<Conversation>, BackendError> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(BackendError::Status {
                status: 503,
                body: "mock fetch failure".to_string(),
            });
        }
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), BackendError> {
        self.created
            .lock()
            .unwrap()
            .push((user_id.to_string(), conversation_id.to_string()));
        self.write_error()?;

        let mut store = self.conversations.lock().unwrap();
        let list = store.entry(user_id.to_string()).or_default();
        // A forwarded message may have arrived first
        match list.iter_mut().find(|c| c.id() == conversation_id) {
            Some(existing) => {
                *existing = Conversation::from_messages(
                    conversation_id,
                    created_at,
                    existing.messages().to_vec(),
                );
            }
            None => list.push(Conversation::new(conversation_id, created_at)),
        }
        Ok(())
    }

    async fn forward_message(
        &self,
        user_id: &str,
        conversation_id: &str,
        message: &Message,
    ) -> Result<(), BackendError> {
        self.forwarded
            .lock()
            .unwrap()
            .push((conversation_id.to_string(), message.clone()));
        self.write_error()?;

        let mut store = self.conversations.lock().unwrap();
        let list = store.entry(user_id.to_string()).or_default();
        match list.iter_mut().find(|c| c.id() == conversation_id) {
            Some(conversation) => conversation.append(message.clone()),
            None => list.push(Conversation::from_messages(
                conversation_id,
                message.created_at,
                vec![message.clone()],
            )),
        }
        Ok(())
    }
}

// ============================================================================
// Mock Reply Generators
// ============================================================================

/// Reply generator that returns queued replies
#[derive(Default)]
pub struct MockReplyGenerator {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    /// Record of all prompts received
    pub prompts: Mutex<Vec<String>>,
}

impl MockReplyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_reply(&self, reply: impl Into<String>) {
        self.replies.lock().unwrap().push_back(Ok(reply.into()));
    }

    pub fn queue_error(&self, error: LlmError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplyGenerator for MockReplyGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock reply queued")))
    }
}

/// Reply generator that echoes the prompt after a per-prompt delay
pub struct DelayedMockReplyGenerator {
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    /// Notified when a request starts (for test synchronization)
    pub request_started: Arc<Notify>,
}

impl DelayedMockReplyGenerator {
    pub fn new(default_delay: Duration) -> Self {
        Self {
            delays: HashMap::new(),
            default_delay,
            request_started: Arc::new(Notify::new()),
        }
    }

    pub fn with_delay(mut self, prompt: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(prompt.into(), delay);
        self
    }

    pub fn reply_for(prompt: &str) -> String {
        format!("Reply to: {prompt}")
    }
}

#[async_trait]
impl ReplyGenerator for DelayedMockReplyGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.request_started.notify_waiters();
        let delay = self.delays.get(prompt).copied().unwrap_or(self.default_delay);
        tokio::time::sleep(delay).await;
        Ok(Self::reply_for(prompt))
    }
}

// ============================================================================
// In-Memory Cache
// ============================================================================

#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }
}

impl LocalCache for InMemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entry(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ============================================================================
// Mock Identity Provider
// ============================================================================

/// Identity provider with a fixed account table
pub struct MockIdentity {
    accounts: Mutex<HashMap<String, (String, UserProfile)>>,
    auth_tx: watch::Sender<Option<String>>,
    current: Mutex<Option<UserProfile>>,
}

impl MockIdentity {
    pub fn new() -> Self {
        let (auth_tx, _) = watch::channel(None);
        Self {
            accounts: Mutex::new(HashMap::new()),
            auth_tx,
            current: Mutex::new(None),
        }
    }

    pub fn with_account(self, email: &str, password: &str, user_id: &str) -> Self {
        let profile = UserProfile {
            user_id: user_id.to_string(),
            email: email.to_string(),
            display_name: None,
        };
        self.accounts
            .lock()
            .unwrap()
            .insert(email.to_string(), (password.to_string(), profile));
        self
    }

    /// Force the auth state, as if the provider restored a session
    pub fn set_user(&self, user_id: Option<&str>) {
        *self.current.lock().unwrap() = user_id.map(|id| UserProfile {
            user_id: id.to_string(),
            email: format!("{id}@example.com"),
            display_name: None,
        });
        self.auth_tx.send_replace(user_id.map(str::to_string));
    }

    fn publish(&self, profile: Option<UserProfile>) {
        let user_id = profile.as_ref().map(|p| p.user_id.clone());
        *self.current.lock().unwrap() = profile;
        self.auth_tx.send_replace(user_id);
    }
}

impl Default for MockIdentity {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for MockIdentity {
    fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.auth_tx.subscribe()
    }

    fn current_user(&self) -> Option<UserProfile> {
        self.current.lock().unwrap().clone()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserProfile, AuthError> {
        let profile = match self.accounts.lock().unwrap().get(email) {
            Some((expected, profile)) if expected == password => profile.clone(),
            _ => return Err(AuthError::InvalidCredentials),
        };
        self.publish(Some(profile.clone()));
        Ok(profile)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<UserProfile, AuthError> {
        let profile = {
            let mut accounts = self.accounts.lock().unwrap();
            if accounts.contains_key(email) {
                return Err(AuthError::EmailExists);
            }
            let profile = UserProfile {
                user_id: format!("uid-{}", accounts.len() + 1),
                email: email.to_string(),
                display_name: Some(display_name.to_string()),
            };
            accounts.insert(email.to_string(), (password.to_string(), profile.clone()));
            profile
        };
        self.publish(Some(profile.clone()));
        Ok(profile)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.publish(None);
        Ok(())
    }
}

// ============================================================================
// Test Session Builder
// ============================================================================

/// Helper for building test sessions with minimal boilerplate
pub struct TestSession<G: ReplyGenerator + 'static> {
    pub backend: Arc<MockBackend>,
    pub generator: Arc<G>,
    pub cache: Arc<InMemoryCache>,
    pub identity: Arc<MockIdentity>,
    pub handle: SessionHandle,
    pub updates: broadcast::Receiver<SessionUpdate>,
}

impl TestSession<MockReplyGenerator> {
    /// Create a test session with instant mocks
    pub fn builder() -> TestSessionBuilder<MockReplyGenerator> {
        TestSessionBuilder {
            backend: MockBackend::new(),
            generator: MockReplyGenerator::new(),
            cache: InMemoryCache::new(),
            identity: MockIdentity::new(),
        }
    }
}

pub struct TestSessionBuilder<G> {
    backend: MockBackend,
    generator: G,
    cache: InMemoryCache,
    identity: MockIdentity,
}

impl<G: ReplyGenerator + 'static> TestSessionBuilder<G> {
    pub fn backend(mut self, backend: MockBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn cache(mut self, cache: InMemoryCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn identity(mut self, identity: MockIdentity) -> Self {
        self.identity = identity;
        self
    }

    pub fn generator<H: ReplyGenerator + 'static>(self, generator: H) -> TestSessionBuilder<H> {
        TestSessionBuilder {
            backend: self.backend,
            generator,
            cache: self.cache,
            identity: self.identity,
        }
    }

    pub fn build(self) -> TestSession<G> {
        let backend = Arc::new(self.backend);
        let generator = Arc::new(self.generator);
        let cache = Arc::new(self.cache);
        let identity = Arc::new(self.identity);

        let handle = spawn_session(
            backend.clone(),
            generator.clone(),
            cache.clone(),
            identity.subscribe(),
        );
        let updates = handle.subscribe();

        TestSession {
            backend,
            generator,
            cache,
            identity,
            handle,
            updates,
        }
    }
}

const WAIT: Duration = Duration::from_secs(2);

impl<G: ReplyGenerator + 'static> TestSession<G> {
    /// Sign in and wait for the initial load to settle
    pub async fn sign_in(&self, user_id: &str) -> SessionState {
        self.identity.set_user(Some(user_id));
        self.wait_for(|s| s.user_id.as_deref() == Some(user_id) && s.phase.is_settled())
            .await
            .expect("session did not settle after sign-in")
    }

    pub async fn sign_out(&self) -> SessionState {
        self.identity.set_user(None);
        self.wait_for(|s| s.user_id.is_none())
            .await
            .expect("session did not clear after sign-out")
    }

    /// Wait until the state satisfies `predicate`, returning that state
    pub async fn wait_for(&self, predicate: impl Fn(&SessionState) -> bool) -> Option<SessionState> {
        let mut rx = self.handle.watch();
        tokio::time::timeout(WAIT, async {
            loop {
                {
                    let state = rx.borrow_and_update();
                    if predicate(&state) {
                        return state.clone();
                    }
                }
                if rx.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        })
        .await
        .ok()
    }

    /// Wait for a notification with the given title
    pub async fn wait_for_notification(&mut self, title: &str) -> bool {
        let deadline = tokio::time::Instant::now() + WAIT;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.updates.recv()).await {
                Ok(Ok(SessionUpdate::Notification(n))) if n.title == title => return true,
                _ => continue,
            }
        }
        false
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{chats_key, load_conversations};
    use crate::session::state::FALLBACK_REPLY;
    use crate::session::{Phase, ReplyStatus, Sender, TransitionError};
    use crate::runtime::SessionError;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn remote_conversation(id: &str, text: &str, secs: i64) -> Conversation {
        Conversation::from_messages(
            id,
            at(secs),
            vec![Message::user(format!("{id}-m"), text, at(secs))],
        )
    }

    fn idle(state: &SessionState) -> bool {
        state.awaiting_reply.is_empty()
    }

    #[tokio::test]
    async fn test_sign_in_loads_and_activates_most_recent() {
        let backend = MockBackend::new().with_conversations(
            "alice",
            vec![
                remote_conversation("old", "First question", 10),
                remote_conversation("new", "Latest question", 20),
            ],
        );
        let session = TestSession::builder().backend(backend).build();

        let state = session.sign_in("alice").await;
        assert_eq!(state.phase, Phase::HasConversations);
        assert_eq!(state.active_conversation_id.as_deref(), Some("new"));
        assert_eq!(state.conversations[0].title(), "Latest question");
    }

    #[tokio::test]
    async fn test_fetch_failure_falls_back_to_cache() {
        let cache = InMemoryCache::new();
        crate::cache::store_conversations(
            &cache,
            "alice",
            &[remote_conversation("cached", "Offline copy", 5)],
        );
        let backend = MockBackend::new();
        backend.set_fail_fetch(true);
        let mut session = TestSession::builder().backend(backend).cache(cache).build();

        let state = session.sign_in("alice").await;
        assert_eq!(state.active_conversation_id.as_deref(), Some("cached"));
        assert!(session.wait_for_notification("Could not load conversations").await);
    }

    #[tokio::test]
    async fn test_fetch_failure_without_cache_is_empty() {
        let backend = MockBackend::new();
        backend.set_fail_fetch(true);
        let session = TestSession::builder().backend(backend).build();

        let state = session.sign_in("alice").await;
        assert_eq!(state.phase, Phase::Empty);
        assert!(state.conversations.is_empty());
    }

    #[tokio::test]
    async fn test_start_with_message_generates_once() {
        let session = TestSession::builder().build();
        session.generator.queue_reply("Hi! How can I help?");
        session.sign_in("alice").await;

        let id = session
            .handle
            .start_conversation(Some("Hello world".to_string()))
            .await
            .unwrap();

        let state = session
            .wait_for(|s| s.conversation(&id).is_some_and(|c| c.messages().len() == 2))
            .await
            .unwrap();
        let conversation = state.conversation(&id).unwrap();
        assert_eq!(conversation.title(), "Hello world");
        assert_eq!(conversation.messages()[1].sender, Sender::Assistant);
        assert_eq!(conversation.last_message_text(), "Hi! How can I help?");
        assert_eq!(session.generator.recorded_prompts(), vec!["Hello world".to_string()]);
        assert_eq!(state.reply_status(&id), ReplyStatus::Idle);
    }

    #[tokio::test]
    async fn test_empty_start_makes_no_reply_request() {
        let mut session = TestSession::builder().build();
        session.sign_in("alice").await;

        let id = session.handle.start_conversation(None).await.unwrap();
        assert!(session.wait_for_notification("New chat started").await);

        let state = session.handle.snapshot();
        assert_eq!(state.active_conversation_id.as_deref(), Some(id.as_str()));
        assert_eq!(state.conversation(&id).unwrap().title(), "New Chat");
        assert!(session.generator.recorded_prompts().is_empty());
    }

    #[tokio::test]
    async fn test_reply_failure_appends_fallback_and_notifies() {
        let mut session = TestSession::builder().build();
        session.generator.queue_error(LlmError::server_error("upstream down"));
        session.sign_in("alice").await;

        let id = session.handle.start_conversation(None).await.unwrap();
        session.handle.send_message(Some(id.clone()), "Are you there?").await.unwrap();

        let state = session
            .wait_for(|s| s.conversation(&id).is_some_and(|c| c.messages().len() == 2))
            .await
            .unwrap();
        assert_eq!(state.conversation(&id).unwrap().last_message_text(), FALLBACK_REPLY);
        assert!(session.wait_for_notification("Error").await);
    }

    #[tokio::test]
    async fn test_send_while_reply_pending_is_rejected() {
        let session = TestSession::builder()
            .generator(DelayedMockReplyGenerator::new(Duration::from_millis(300)))
            .build();
        session.sign_in("alice").await;

        let id = session
            .handle
            .start_conversation(Some("First".to_string()))
            .await
            .unwrap();
        let err = session
            .handle
            .send_message(Some(id.clone()), "Second")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Rejected(TransitionError::ReplyPending(ref pending)) if *pending == id
        ));

        session.wait_for(idle).await.unwrap();
        session.handle.send_message(Some(id), "Second").await.unwrap();
    }

    #[tokio::test]
    async fn test_forward_failure_does_not_block() {
        let session = TestSession::builder().build();
        session.backend.set_fail_writes(true);
        session.generator.queue_reply("Still here.");
        session.sign_in("alice").await;

        let id = session
            .handle
            .start_conversation(Some("Hello?".to_string()))
            .await
            .unwrap();

        let state = session
            .wait_for(|s| s.conversation(&id).is_some_and(|c| c.messages().len() == 2))
            .await
            .unwrap();
        assert_eq!(state.conversation(&id).unwrap().last_message_text(), "Still here.");
    }

    #[tokio::test]
    async fn test_writes_are_forwarded_with_assistant_replies() {
        let session = TestSession::builder().build();
        session.generator.queue_reply("Paris.");
        session.sign_in("alice").await;

        let id = session
            .handle
            .start_conversation(Some("Capital of France?".to_string()))
            .await
            .unwrap();
        session.wait_for(|s| s.conversation(&id).is_some_and(|c| c.messages().len() == 2) && idle(s))
            .await
            .unwrap();

        // Forwarding is fire-and-forget; give the spawned write a moment
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            session.backend.created.lock().unwrap().clone(),
            vec![("alice".to_string(), id.clone())]
        );
        assert_eq!(
            session.backend.forwarded_texts(&id),
            vec!["Capital of France?".to_string(), "Paris.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_sign_out_and_back_in_restores_from_backend() {
        let session = TestSession::builder().build();
        session.generator.queue_reply("Noted.");
        session.sign_in("alice").await;

        let id = session
            .handle
            .start_conversation(Some("Remember this".to_string()))
            .await
            .unwrap();
        session
            .wait_for(|s| s.conversation(&id).is_some_and(|c| c.messages().len() == 2))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let before = session.handle.snapshot().conversations;

        let cleared = session.sign_out().await;
        assert_eq!(cleared, SessionState::default());

        // Drop the local copy so only the backend can restore it
        session.cache.set(&chats_key("alice"), "[]").unwrap();
        let restored = session.sign_in("alice").await;
        assert_eq!(restored.conversations, before);
        assert_eq!(restored.active_conversation_id.as_deref(), Some(id.as_str()));
    }

    #[tokio::test]
    async fn test_concurrent_replies_resolve_independently() {
        let generator = DelayedMockReplyGenerator::new(Duration::from_millis(10))
            .with_delay("slow question", Duration::from_millis(300));
        let session = TestSession::builder().generator(generator).build();
        session.sign_in("alice").await;

        let slow = session
            .handle
            .start_conversation(Some("slow question".to_string()))
            .await
            .unwrap();
        let fast = session
            .handle
            .start_conversation(Some("fast question".to_string()))
            .await
            .unwrap();

        // The fast one lands while the slow one is still pending
        let state = session
            .wait_for(|s| s.reply_status(&fast) == ReplyStatus::Idle)
            .await
            .unwrap();
        assert_eq!(state.reply_status(&slow), ReplyStatus::AwaitingReply);
        assert_eq!(
            state.conversation(&fast).unwrap().last_message_text(),
            DelayedMockReplyGenerator::reply_for("fast question")
        );

        let state = session.wait_for(idle).await.unwrap();
        assert_eq!(
            state.conversation(&slow).unwrap().last_message_text(),
            DelayedMockReplyGenerator::reply_for("slow question")
        );
        assert_eq!(state.conversation(&slow).unwrap().messages().len(), 2);
    }

    #[tokio::test]
    async fn test_reply_after_delete_is_discarded() {
        let session = TestSession::builder()
            .generator(DelayedMockReplyGenerator::new(Duration::from_millis(100)))
            .build();
        session.sign_in("alice").await;

        let id = session
            .handle
            .start_conversation(Some("Never mind".to_string()))
            .await
            .unwrap();
        session.handle.delete_conversation(&id).await.unwrap();

        tokio::time::sleep(Duration::from_millis(250)).await;
        let state = session.handle.snapshot();
        assert!(state.conversation(&id).is_none());
        assert!(state.awaiting_reply.is_empty());
        assert_eq!(state.phase, Phase::Empty);
    }

    #[tokio::test]
    async fn test_reply_after_sign_out_is_discarded() {
        let session = TestSession::builder()
            .generator(DelayedMockReplyGenerator::new(Duration::from_millis(100)))
            .build();
        session.sign_in("alice").await;
        session
            .handle
            .start_conversation(Some("Quick one".to_string()))
            .await
            .unwrap();

        session.sign_out().await;
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(session.handle.snapshot(), SessionState::default());
    }

    #[tokio::test]
    async fn test_reply_from_previous_sign_in_does_not_answer_new_message() {
        let generator = DelayedMockReplyGenerator::new(Duration::from_millis(10))
            .with_delay("first", Duration::from_millis(300))
            .with_delay("second", Duration::from_millis(700));
        let session = TestSession::builder().generator(generator).build();
        session.sign_in("alice").await;

        let id = session
            .handle
            .start_conversation(Some("first".to_string()))
            .await
            .unwrap();
        session.sign_out().await;

        let state = session.sign_in("alice").await;
        assert!(state.conversation(&id).is_some());
        session
            .handle
            .send_message(Some(id.clone()), "second")
            .await
            .unwrap();

        let state = session
            .wait_for(|s| {
                s.conversation(&id)
                    .is_some_and(|c| c.messages().len() == 3)
                    && idle(s)
            })
            .await
            .unwrap();
        let texts: Vec<_> = state
            .conversation(&id)
            .unwrap()
            .messages()
            .iter()
            .map(|m| m.text.clone())
            .collect();
        assert_eq!(
            texts,
            vec![
                "first".to_string(),
                "second".to_string(),
                DelayedMockReplyGenerator::reply_for("second"),
            ]
        );
    }

    #[tokio::test]
    async fn test_cache_written_under_user_key() {
        let session = TestSession::builder().build();
        session.sign_in("alice").await;

        let id = session.handle.start_conversation(None).await.unwrap();
        let cached = load_conversations(session.cache.as_ref(), "alice");
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id(), id);
        assert!(session.cache.entry(&chats_key("bob")).is_none());
    }

    #[tokio::test]
    async fn test_commands_rejected_when_signed_out() {
        let session = TestSession::builder().build();
        let err = session.handle.start_conversation(None).await.unwrap_err();
        assert!(matches!(err, SessionError::Rejected(TransitionError::NotSignedIn)));
    }

    #[tokio::test]
    async fn test_mock_identity_drives_session() {
        let session = TestSession::builder().build();
        let identity = MockIdentity::new().with_account("a@example.com", "pw", "alice");

        assert!(matches!(
            identity.sign_in("a@example.com", "nope").await,
            Err(AuthError::InvalidCredentials)
        ));
        let profile = identity.sign_in("a@example.com", "pw").await.unwrap();
        assert_eq!(profile.user_id, "alice");
        assert_eq!(identity.current_user(), Some(profile));

        // The builder's own identity is what the runtime listens to
        session.identity.set_user(Some("alice"));
        assert!(session.wait_for(|s| s.user_id.as_deref() == Some("alice")).await.is_some());
    }
}
