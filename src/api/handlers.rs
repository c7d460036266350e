//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    AuthResponse, ErrorResponse, SendMessageRequest, SessionResponse, SignInRequest,
    SignUpRequest, StartConversationRequest, StartConversationResponse, SuccessResponse,
};
use super::AppState;
use crate::auth::AuthError;
use crate::runtime::SessionError;
use crate::session::TransitionError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Identity
        .route("/api/auth/sign-in", post(sign_in))
        .route("/api/auth/sign-up", post(sign_up))
        .route("/api/auth/sign-out", post(sign_out))
        // Session snapshot and live updates
        .route("/api/session", get(get_session))
        .route("/api/events", get(stream_events))
        // Conversations
        .route("/api/conversations", post(start_conversation))
        .route("/api/conversations/:id", axum::routing::delete(delete_conversation))
        .route("/api/conversations/:id/select", post(select_conversation))
        // Messaging
        .route("/api/messages", post(send_message))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Identity
// ============================================================

async fn sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = state.identity.sign_in(&req.email, &req.password).await?;
    Ok(Json(AuthResponse { user }))
}

async fn sign_up(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = state
        .identity
        .sign_up(&req.email, &req.password, &req.display_name)
        .await?;
    Ok(Json(AuthResponse { user }))
}

async fn sign_out(State(state): State<AppState>) -> Result<Json<SuccessResponse>, AppError> {
    state.identity.sign_out().await?;
    Ok(Json(SuccessResponse::ok()))
}

// ============================================================
// Session
// ============================================================

async fn get_session(State(state): State<AppState>) -> Json<SessionResponse> {
    Json(SessionResponse {
        user: state.identity.current_user(),
        session: state.session.snapshot(),
    })
}

async fn stream_events(State(state): State<AppState>) -> impl IntoResponse {
    // Subscribe before taking the snapshot so no update falls in between
    let updates = state.session.subscribe();
    sse_stream(state.session.snapshot(), updates)
}

// ============================================================
// Conversations
// ============================================================

async fn start_conversation(
    State(state): State<AppState>,
    body: Option<Json<StartConversationRequest>>,
) -> Result<Json<StartConversationResponse>, AppError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let conversation_id = state.session.start_conversation(req.first_message).await?;
    Ok(Json(StartConversationResponse {
        conversation_id,
        session: state.session.snapshot(),
    }))
}

async fn select_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.session.select_conversation(&id).await?;
    Ok(Json(SuccessResponse::ok()))
}

async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.session.delete_conversation(&id).await?;
    Ok(Json(SuccessResponse::ok()))
}

async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    state
        .session
        .send_message(req.conversation_id, req.text)
        .await?;
    Ok(Json(SuccessResponse::ok()))
}

async fn get_version() -> &'static str {
    concat!("chatnest ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    BadGateway(String),
    Unavailable(String),
    Internal(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        let message = e.to_string();
        match e {
            SessionError::Rejected(TransitionError::NotSignedIn) => AppError::Unauthorized(message),
            SessionError::Rejected(TransitionError::UnknownConversation(_)) => {
                AppError::NotFound(message)
            }
            SessionError::Rejected(
                TransitionError::SessionLoading
                | TransitionError::ReplyPending(_)
                | TransitionError::DuplicateConversation(_),
            ) => AppError::Conflict(message),
            SessionError::Rejected(TransitionError::EmptyMessage) => AppError::BadRequest(message),
            SessionError::Stopped => AppError::Internal(message),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        let message = e.to_string();
        match e {
            AuthError::InvalidCredentials => AppError::Unauthorized(message),
            AuthError::EmailExists => AppError::Conflict(message),
            AuthError::WeakPassword(_) | AuthError::InvalidEmail | AuthError::MissingField(_) => {
                AppError::BadRequest(message)
            }
            AuthError::NotConfigured => AppError::Unavailable(message),
            AuthError::Provider(_) | AuthError::Request(_) => AppError::BadGateway(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}
