//! API request and response types

use crate::auth::UserProfile;
use crate::session::SessionState;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(alias = "name")]
    pub display_name: String,
}

/// Request to start a conversation, optionally with its first message
#[derive(Debug, Default, Deserialize)]
pub struct StartConversationRequest {
    #[serde(default)]
    pub first_message: Option<String>,
}

/// Request to send a message; without an id it goes to the active conversation
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserProfile,
}

/// Current user plus the session snapshot
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: Option<UserProfile>,
    pub session: SessionState,
}

#[derive(Debug, Serialize)]
pub struct StartConversationResponse {
    pub conversation_id: String,
    pub session: SessionState,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
