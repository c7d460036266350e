//! Identity provider seam
//!
//! The session runtime only sees the auth-change stream; the local API uses
//! the sign-in/up/out operations.

mod firebase;

pub use firebase::FirebaseIdentity;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// Signed-in user as reported by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub user_id: String,
    pub email: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("An account with this email already exists")]
    EmailExists,
    #[error("Password is too weak: {0}")]
    WeakPassword(String),
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("{0}")]
    MissingField(&'static str),
    #[error("Identity provider is not configured")]
    NotConfigured,
    #[error("Identity provider error: {0}")]
    Provider(String),
    #[error("Identity request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Email/password identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Auth-change stream: `Some(user_id)` while signed in
    fn subscribe(&self) -> watch::Receiver<Option<String>>;

    fn current_user(&self) -> Option<UserProfile>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserProfile, AuthError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<UserProfile, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;
}

#[async_trait]
impl<T: IdentityProvider + ?Sized> IdentityProvider for Arc<T> {
    fn subscribe(&self) -> watch::Receiver<Option<String>> {
        (**self).subscribe()
    }

    fn current_user(&self) -> Option<UserProfile> {
        (**self).current_user()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserProfile, AuthError> {
        (**self).sign_in(email, password).await
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<UserProfile, AuthError> {
        (**self).sign_up(email, password, display_name).await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        (**self).sign_out().await
    }
}

/// Reject blank credentials before any network round trip
pub(crate) fn validate_credentials(email: &str, password: &str) -> Result<(), AuthError> {
    if email.trim().is_empty() {
        return Err(AuthError::MissingField("Email is required"));
    }
    if password.is_empty() {
        return Err(AuthError::MissingField("Password is required"));
    }
    Ok(())
}
