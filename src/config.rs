//! Startup configuration read from the environment

use crate::llm::{LlmConfig, Provider};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub backend_url: String,
    pub cache_path: PathBuf,
    /// Applies to every outbound HTTP client
    pub http_timeout: Duration,
    pub firebase_api_key: Option<String>,
    pub llm: LlmConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("CHATNEST_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let backend_url =
            lookup("CHATNEST_BACKEND_URL").unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

        let cache_path = lookup("CHATNEST_CACHE_PATH").map_or_else(
            || {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".chatnest").join("cache.db")
            },
            PathBuf::from,
        );

        let http_timeout = Duration::from_secs(
            lookup("CHATNEST_HTTP_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
        );

        let llm = LlmConfig {
            mistral_api_key: lookup(Provider::Mistral.api_key_env_var()),
            gemini_api_key: lookup(Provider::Gemini.api_key_env_var()),
            default_model: lookup("CHATNEST_REPLY_MODEL"),
            timeout: http_timeout,
        };

        Self {
            port,
            backend_url,
            cache_path,
            http_timeout,
            firebase_api_key: lookup("FIREBASE_API_KEY").filter(|k| !k.is_empty()),
            llm,
        }
    }
}
