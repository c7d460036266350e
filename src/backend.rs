//! REST client for the conversation backend
//!
//! The backend stores conversations and their messages. Reads happen once per
//! sign-in; writes are fire-and-forget from the session runtime.

mod client;
mod types;

pub use client::RestBackend;
pub use types::{BackendConversation, BackendMessage, ASSISTANT_USER_ID};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode backend response: {0}")]
    Decode(String),
}
