// OpenAI API client (also works with OpenAI-compatible APIs like LM Studio)
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ai::provider::{AIMessage, AIProvider};
use crate::error::{AppError, Result};

pub struct OpenAIProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct OpenAIMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: Option<OpenAIResponseMessage>,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIError {
    error: OpenAIErrorDetail,
}

#[derive(Deserialize)]
struct OpenAIErrorDetail {
    message: String,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

impl OpenAIProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_base_url(api_key, model, "https://api.openai.com/v1".to_string())
    }

    pub fn with_base_url(api_key: String, model: String, base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_default();

        Self {
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn unreachable(&self, err: reqwest::Error) -> AppError {
        AppError::BackendUnavailable {
            backend: self.name().to_string(),
            detail: err.to_string(),
        }
    }

    async fn error_from(&self, response: reqwest::Response) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        // Try to parse error message
        let message = serde_json::from_str::<OpenAIError>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);

        AppError::Backend {
            backend: self.name().to_string(),
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl AIProvider for OpenAIProvider {
    async fn is_available(&self) -> bool {
        if self.api_key.is_empty() {
            return false;
        }
        self.list_models().await.is_ok()
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/models", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        if !response.status().is_success() {
            return Err(self.error_from(response).await);
        }

        let models: ModelList = response.json().await?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }

    async fn complete(&self, messages: Vec<AIMessage>) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = OpenAIRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| OpenAIMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: 0.3,
            max_tokens: 2000,
        };

        tracing::debug!(model = %self.model, messages = messages.len(), "openai chat request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        if !response.status().is_success() {
            return Err(self.error_from(response).await);
        }

        let openai_response: OpenAIResponse = response.json().await?;

        openai_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AppError::EmptyResponse(self.name().to_string()))
    }

    fn name(&self) -> &'static str {
        "OpenAI"
    }
}
