//! Model registry for managing available LLM providers

use super::{all_models, LlmService, LoggingService, ModelDef, Provider};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Configuration for LLM providers
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub mistral_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    /// Default model ID
    pub default_model: Option<String>,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            mistral_api_key: None,
            gemini_api_key: None,
            default_model: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Registry of available LLM models
pub struct ModelRegistry {
    services: HashMap<String, Arc<dyn LlmService>>,
    default_model: Option<String>,
}

impl ModelRegistry {
    pub fn new(config: &LlmConfig) -> Self {
        let mut services: HashMap<String, Arc<dyn LlmService>> = HashMap::new();
        let mut first_available = None;

        for model_def in all_models() {
            if let Some(service) = Self::try_create_model(model_def, config) {
                first_available.get_or_insert(model_def.id);
                services.insert(model_def.id.to_string(), service);
            }
        }

        // A configured default that has no key falls back to the first usable model
        let default_model = config
            .default_model
            .clone()
            .filter(|id| {
                let known = services.contains_key(id);
                if !known {
                    tracing::warn!(model = %id, "Configured reply model is unavailable");
                }
                known
            })
            .or_else(|| first_available.map(str::to_string));

        Self {
            services,
            default_model,
        }
    }

    fn try_create_model(model_def: &ModelDef, config: &LlmConfig) -> Option<Arc<dyn LlmService>> {
        let api_key = match model_def.provider {
            Provider::Mistral => config.mistral_api_key.as_ref()?,
            Provider::Gemini => config.gemini_api_key.as_ref()?,
        };

        if api_key.is_empty() {
            return None;
        }

        match (model_def.factory)(api_key, config.timeout) {
            Ok(service) => {
                tracing::debug!(
                    model = model_def.id,
                    provider = model_def.provider.display_name(),
                    description = model_def.description,
                    "Registered model"
                );
                Some(Arc::new(LoggingService::new(service)))
            }
            Err(e) => {
                tracing::warn!(model = model_def.id, error = %e, "Failed to create model");
                None
            }
        }
    }

    /// Get a model by ID
    pub fn get(&self, model_id: &str) -> Option<Arc<dyn LlmService>> {
        self.services.get(model_id).cloned()
    }

    /// Get the default model
    pub fn default(&self) -> Option<Arc<dyn LlmService>> {
        self.get(self.default_model.as_deref()?)
    }

    pub fn default_model_id(&self) -> Option<&str> {
        self.default_model.as_deref()
    }

    /// List all available model IDs
    pub fn available_models(&self) -> Vec<String> {
        let mut models: Vec<_> = self.services.keys().cloned().collect();
        models.sort();
        models
    }

    pub fn has_models(&self) -> bool {
        !self.services.is_empty()
    }
}
