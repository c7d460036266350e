//! Model definitions for the supported reply providers

use super::gemini::GeminiModel;
use super::mistral::MistralModel;
use super::{GeminiService, LlmService, MistralService};
use std::sync::Arc;
use std::time::Duration;

/// LLM provider enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Mistral,
    Gemini,
}

impl Provider {
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::Mistral => "Mistral AI",
            Provider::Gemini => "Google Gemini",
        }
    }

    /// Environment variable holding this provider's API key
    pub fn api_key_env_var(self) -> &'static str {
        match self {
            Provider::Mistral => "MISTRAL_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
        }
    }
}

/// Model definition with metadata
#[derive(Debug, Clone)]
pub struct ModelDef {
    /// User-facing model ID (e.g., "mistral-large")
    pub id: &'static str,
    pub provider: Provider,
    pub description: &'static str,
    /// Factory function to create the service
    pub factory: fn(&str, Duration) -> Result<Arc<dyn LlmService>, String>,
}

/// Get all available model definitions, preferred default first
pub fn all_models() -> &'static [ModelDef] {
    &[
        ModelDef {
            id: "mistral-large",
            provider: Provider::Mistral,
            description: "Mistral Large (default reply model)",
            factory: |api_key, timeout| {
                MistralService::new(api_key.to_string(), MistralModel::Large, timeout)
                    .map(|s| Arc::new(s) as Arc<dyn LlmService>)
                    .map_err(|e| e.message)
            },
        },
        ModelDef {
            id: "mistral-small",
            provider: Provider::Mistral,
            description: "Mistral Small (fast, cheap)",
            factory: |api_key, timeout| {
                MistralService::new(api_key.to_string(), MistralModel::Small, timeout)
                    .map(|s| Arc::new(s) as Arc<dyn LlmService>)
                    .map_err(|e| e.message)
            },
        },
        ModelDef {
            id: "gemini-flash",
            provider: Provider::Gemini,
            description: "Gemini 2.0 Flash",
            factory: |api_key, timeout| {
                GeminiService::new(api_key.to_string(), GeminiModel::Flash, timeout)
                    .map(|s| Arc::new(s) as Arc<dyn LlmService>)
                    .map_err(|e| e.message)
            },
        },
        ModelDef {
            id: "gemini-pro",
            provider: Provider::Gemini,
            description: "Gemini 1.5 Pro",
            factory: |api_key, timeout| {
                GeminiService::new(api_key.to_string(), GeminiModel::Pro, timeout)
                    .map(|s| Arc::new(s) as Arc<dyn LlmService>)
                    .map_err(|e| e.message)
            },
        },
    ]
}
