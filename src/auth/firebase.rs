//! Firebase Identity Toolkit adapter (email/password accounts)

use super::{validate_credentials, AuthError, IdentityProvider, UserProfile};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

pub struct FirebaseIdentity {
    client: Client,
    api_key: String,
    base_url: String,
    auth_tx: watch::Sender<Option<String>>,
    profile: Mutex<Option<UserProfile>>,
}

impl FirebaseIdentity {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, AuthError> {
        Self::with_base_url(api_key, IDENTITY_TOOLKIT_URL, timeout)
    }

    pub fn with_base_url(api_key: String, base_url: &str, timeout: Duration) -> Result<Self, AuthError> {
        let client = Client::builder().timeout(timeout).build()?;
        let (auth_tx, _) = watch::channel(None);
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_tx,
            profile: Mutex::new(None),
        })
    }

    async fn call<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T, AuthError> {
        if self.api_key.is_empty() {
            return Err(AuthError::NotConfigured);
        }

        let response = self
            .client
            .post(format!("{}/accounts:{method}", self.base_url))
            .query(&[("key", &self.api_key)])
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let code = serde_json::from_str::<ErrorEnvelope>(&text)
                .map_or(text, |e| e.error.message);
            return Err(classify(&code));
        }

        serde_json::from_str(&text)
            .map_err(|e| AuthError::Provider(format!("Unexpected response: {e}")))
    }

    fn publish(&self, profile: Option<UserProfile>) {
        let user_id = profile.as_ref().map(|p| p.user_id.clone());
        if let Ok(mut current) = self.profile.lock() {
            *current = profile;
        }
        // send_replace stores the value even with no receivers
        self.auth_tx.send_replace(user_id);
    }
}

/// Map an Identity Toolkit error code (e.g. `WEAK_PASSWORD : ...`) to an error
fn classify(code: &str) -> AuthError {
    let (head, detail) = code.split_once(" : ").unwrap_or((code, ""));
    match head.trim() {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "USER_DISABLED" => {
            AuthError::InvalidCredentials
        }
        "EMAIL_EXISTS" => AuthError::EmailExists,
        "WEAK_PASSWORD" => AuthError::WeakPassword(detail.to_string()),
        "INVALID_EMAIL" | "MISSING_EMAIL" => AuthError::InvalidEmail,
        _ => AuthError::Provider(code.to_string()),
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.auth_tx.subscribe()
    }

    fn current_user(&self) -> Option<UserProfile> {
        self.profile.lock().ok().and_then(|p| p.clone())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserProfile, AuthError> {
        validate_credentials(email, password)?;

        let account: AccountResponse = self
            .call("signInWithPassword", &PasswordRequest::new(email, password))
            .await?;

        let profile = account.into_profile(email);
        tracing::info!(user_id = %profile.user_id, "Signed in");
        self.publish(Some(profile.clone()));
        Ok(profile)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<UserProfile, AuthError> {
        validate_credentials(email, password)?;
        if display_name.trim().is_empty() {
            return Err(AuthError::MissingField("Name is required"));
        }

        let account: AccountResponse = self
            .call("signUp", &PasswordRequest::new(email, password))
            .await?;

        // The account exists from here on; a failed profile update only
        // loses the display name.
        let update = UpdateProfileRequest {
            id_token: &account.id_token,
            display_name,
            return_secure_token: false,
        };
        let display_name = match self.call::<_, serde_json::Value>("update", &update).await {
            Ok(_) => Some(display_name.to_string()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to set display name");
                None
            }
        };

        let profile = UserProfile {
            display_name,
            ..account.into_profile(email)
        };
        tracing::info!(user_id = %profile.user_id, "Account created");
        self.publish(Some(profile.clone()));
        Ok(profile)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.publish(None);
        tracing::info!("Signed out");
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

impl<'a> PasswordRequest<'a> {
    fn new(email: &'a str, password: &'a str) -> Self {
        Self {
            email,
            password,
            return_secure_token: true,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest<'a> {
    id_token: &'a str,
    display_name: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    #[serde(default)]
    id_token: String,
    email: Option<String>,
    display_name: Option<String>,
}

impl AccountResponse {
    fn into_profile(self, email: &str) -> UserProfile {
        UserProfile {
            user_id: self.local_id,
            email: self.email.unwrap_or_else(|| email.to_string()),
            display_name: self.display_name.filter(|n| !n.is_empty()),
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}
