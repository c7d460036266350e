//! Mistral chat-completions provider (`OpenAI`-compatible wire format)

use super::types::{LlmRequest, LlmResponse, Usage};
use super::{LlmError, LlmService};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MISTRAL_CHAT_URL: &str = "https://api.mistral.ai/v1/chat/completions";

/// Mistral models
#[derive(Debug, Clone, Copy)]
pub enum MistralModel {
    Large,
    Small,
}

impl MistralModel {
    pub fn api_name(self) -> &'static str {
        match self {
            MistralModel::Large => "mistral-large-latest",
            MistralModel::Small => "mistral-small-latest",
        }
    }

    pub fn model_id(self) -> &'static str {
        match self {
            MistralModel::Large => "mistral-large",
            MistralModel::Small => "mistral-small",
        }
    }
}

/// Mistral service implementation
pub struct MistralService {
    client: Client,
    api_key: String,
    model: MistralModel,
    base_url: String,
    model_id: String,
}

impl MistralService {
    pub fn new(api_key: String, model: MistralModel, timeout: Duration) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model,
            base_url: MISTRAL_CHAT_URL.to_string(),
            model_id: model.model_id().to_string(),
        })
    }

    fn translate_request(&self, request: &LlmRequest) -> MistralRequest {
        let mut messages = Vec::new();

        if let Some(system) = &request.system {
            messages.push(MistralMessage {
                role: "system".to_string(),
                content: Some(system.clone()),
            });
        }

        messages.push(MistralMessage {
            role: "user".to_string(),
            content: Some(request.prompt.clone()),
        });

        MistralRequest {
            model: self.model.api_name().to_string(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }

    fn normalize_response(resp: MistralResponse) -> Result<LlmResponse, LlmError> {
        let text = resp
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::malformed("Unexpected response format from Mistral AI"))?;

        let usage = resp.usage.map_or_else(Usage::default, |u| Usage {
            input_tokens: u64::from(u.prompt_tokens),
            output_tokens: u64::from(u.completion_tokens),
        });

        Ok(LlmResponse { text, usage })
    }
}

#[async_trait]
impl LlmService for MistralService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let mistral_request = self.translate_request(request);

        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&mistral_request)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<MistralErrorResponse>(&body)
                .map_or(body, |e| e.message);
            return Err(LlmError::from_status(status, &message));
        }

        let mistral_response: MistralResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::malformed(format!("Failed to parse response: {e}")))?;

        Self::normalize_response(mistral_response)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// Mistral API types

#[derive(Debug, Serialize)]
struct MistralRequest {
    model: String,
    messages: Vec<MistralMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MistralMessage {
    role: String,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MistralResponse {
    choices: Vec<MistralChoice>,
    usage: Option<MistralUsage>,
}

#[derive(Debug, Deserialize)]
struct MistralChoice {
    message: MistralMessage,
}

#[derive(Debug, Deserialize)]
struct MistralUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct MistralErrorResponse {
    message: String,
}
