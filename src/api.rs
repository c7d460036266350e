//! Local HTTP API over the session
//!
//! Exposes the session operations as JSON endpoints and streams state
//! snapshots and notifications over SSE.

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::auth::IdentityProvider;
use crate::runtime::SessionHandle;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub session: SessionHandle,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    pub fn new(session: SessionHandle, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { session, identity }
    }
}
