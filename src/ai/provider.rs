// AI Provider trait and types
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ai::ollama::OllamaProvider;
use crate::ai::openai::OpenAIProvider;
use crate::error::{AppError, Result};

/// AI Provider types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum AIProviderType {
    /// Self-hosted Ollama server
    Ollama,
    /// OpenAI API or any OpenAI-compatible server
    OpenAI,
    /// Disabled
    Disabled,
}

impl Default for AIProviderType {
    fn default() -> Self {
        AIProviderType::Ollama
    }
}

impl AIProviderType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "ollama" | "local" => Some(AIProviderType::Ollama),
            "openai" => Some(AIProviderType::OpenAI),
            "disabled" | "none" => Some(AIProviderType::Disabled),
            _ => None,
        }
    }
}

/// AI Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AIConfig {
    /// Currently active provider
    pub provider_type: AIProviderType,

    /// Ollama settings
    pub ollama_url: String,
    pub ollama_model: String,

    /// OpenAI settings
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,

    /// Emails per model call
    pub batch_size: usize,
}

impl Default for AIConfig {
    fn default() -> Self {
        Self {
            provider_type: AIProviderType::Ollama,
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "llama3.2:latest".to_string(),
            openai_api_key: String::new(),
            openai_model: "gpt-4o-mini".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            batch_size: crate::ai::analyzer::DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Message for AI chat
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AIMessage {
    pub role: Role,
    pub content: String,
}

impl AIMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// AI Provider trait - all providers must implement this
#[async_trait]
pub trait AIProvider: Send + Sync {
    /// Check if the provider is reachable and configured
    async fn is_available(&self) -> bool;

    /// Models the backend can serve
    async fn list_models(&self) -> Result<Vec<String>>;

    /// Generate a completion from messages
    async fn complete(&self, messages: Vec<AIMessage>) -> Result<String>;

    /// Get provider name for display
    fn name(&self) -> &'static str;
}

/// Send a system instruction, prior turns and a new prompt; returns the raw reply text.
pub async fn chat(
    provider: &dyn AIProvider,
    system: &str,
    history: &[AIMessage],
    prompt: &str,
) -> Result<String> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(AIMessage::system(system));
    messages.extend(
        history
            .iter()
            .filter(|m| m.role != Role::System)
            .cloned(),
    );
    messages.push(AIMessage::user(prompt));

    let reply = provider.complete(messages).await?;
    if reply.trim().is_empty() {
        return Err(AppError::EmptyResponse(provider.name().to_string()));
    }
    Ok(reply)
}

/// Build the configured backend
pub fn create_provider(config: &AIConfig) -> Result<Box<dyn AIProvider>> {
    match config.provider_type {
        AIProviderType::Ollama => Ok(Box::new(OllamaProvider::new(
            config.ollama_url.clone(),
            config.ollama_model.clone(),
        ))),
        AIProviderType::OpenAI => {
            if config.openai_api_key.trim().is_empty() {
                return Err(AppError::Config(
                    "OpenAI API key is missing. Set OPENAI_API_KEY or openai_api_key in the config file."
                        .to_string(),
                ));
            }
            Ok(Box::new(OpenAIProvider::with_base_url(
                config.openai_api_key.clone(),
                config.openai_model.clone(),
                config.openai_base_url.clone(),
            )))
        }
        AIProviderType::Disabled => Err(AppError::Config(
            "No AI provider configured. Set AI_PROVIDER to 'openai' or 'ollama'.".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        seen: Mutex<Vec<AIMessage>>,
        reply: String,
    }

    #[async_trait]
    impl AIProvider for Recorder {
        async fn is_available(&self) -> bool {
            true
        }

        async fn list_models(&self) -> Result<Vec<String>> {
            Ok(vec!["test".to_string()])
        }

        async fn complete(&self, messages: Vec<AIMessage>) -> Result<String> {
            *self.seen.lock().unwrap() = messages;
            Ok(self.reply.clone())
        }

        fn name(&self) -> &'static str {
            "Recorder"
        }
    }

    #[tokio::test]
    async fn test_chat_orders_system_history_prompt() {
        let provider = Recorder { seen: Mutex::new(Vec::new()), reply: "ok".to_string() };
        let history = vec![AIMessage::user("hi"), AIMessage::assistant("hello")];

        let reply = chat(&provider, "be brief", &history, "what now?").await.unwrap();
        assert_eq!(reply, "ok");

        let seen = provider.seen.lock().unwrap();
        let roles: Vec<Role> = seen.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(seen[3].content, "what now?");
    }

    #[tokio::test]
    async fn test_chat_rejects_blank_reply() {
        let provider = Recorder { seen: Mutex::new(Vec::new()), reply: "  \n".to_string() };
        let err = chat(&provider, "sys", &[], "prompt").await.unwrap_err();
        assert!(matches!(err, AppError::EmptyResponse(_)));
    }

    #[test]
    fn test_create_provider_requires_openai_key() {
        let config = AIConfig {
            provider_type: AIProviderType::OpenAI,
            ..AIConfig::default()
        };
        assert!(matches!(create_provider(&config), Err(AppError::Config(_))));

        let disabled = AIConfig {
            provider_type: AIProviderType::Disabled,
            ..AIConfig::default()
        };
        assert!(matches!(create_provider(&disabled), Err(AppError::Config(_))));

        let ollama = create_provider(&AIConfig::default()).unwrap();
        assert_eq!(ollama.name(), "Ollama");
    }
}
