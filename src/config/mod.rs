use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ai::provider::{AIConfig, AIProviderType};
use crate::error::{AppError, Result};

pub const GMAIL_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.modify",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GmailConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_uri: String,
    pub token_uri: String,
    /// Gmail REST API root
    pub api_base: String,
    pub scopes: Vec<String>,
    // Retrieval settings
    pub days_back: u32,
    pub max_results: u32,
    pub include_body: bool,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "http://localhost:3000/api/auth/callback".to_string(),
            auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
            api_base: "https://gmail.googleapis.com".to_string(),
            scopes: GMAIL_SCOPES.iter().map(|s| s.to_string()).collect(),
            days_back: 30,
            max_results: 100,
            include_body: true,
        }
    }
}

impl GmailConfig {
    /// Client id and secret are needed before any OAuth round trip
    pub fn validate(&self) -> Result<()> {
        let client_id = self.client_id.trim();
        if client_id.is_empty() || client_id == "YOUR_CLIENT_ID_HERE" {
            return Err(AppError::Config(
                "Google client id is missing. Set GOOGLE_CLIENT_ID or gmail.client_id in the config file."
                    .to_string(),
            ));
        }
        if self.client_secret.trim().is_empty() {
            return Err(AppError::Config(
                "Google client secret is missing. Set GOOGLE_CLIENT_SECRET or gmail.client_secret in the config file."
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ai: AIConfig,
    pub gmail: GmailConfig,
    pub server: ServerConfig,
    pub default_tone: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ai: AIConfig::default(),
            gmail: GmailConfig::default(),
            server: ServerConfig::default(),
            default_tone: "professional".to_string(),
        }
    }
}

pub fn config_dir() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| AppError::Config("Could not find config directory".to_string()))?
        .join("mailassist");

    if !dir.exists() {
        fs::create_dir_all(&dir)?;
    }

    Ok(dir)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.json"))
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{} must be a number, got '{}'", name, value)))
}

impl AppConfig {
    /// Missing file means defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            AppError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Config file from the user config directory, then the process environment
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Environment variables win over file values; empty variables are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("GOOGLE_CLIENT_ID") {
            self.gmail.client_id = v;
        }
        if let Some(v) = var("GOOGLE_CLIENT_SECRET") {
            self.gmail.client_secret = v;
        }
        if let Some(v) = var("GOOGLE_REDIRECT_URI") {
            self.gmail.redirect_uri = v;
        }
        if let Some(v) = var("DAYS_BACK") {
            self.gmail.days_back = parse_number("DAYS_BACK", &v)?;
        }
        if let Some(v) = var("MAX_RESULTS") {
            self.gmail.max_results = parse_number("MAX_RESULTS", &v)?;
        }
        if let Some(v) = var("INCLUDE_BODY") {
            self.gmail.include_body = v.trim().eq_ignore_ascii_case("true");
        }

        if let Some(v) = var("AI_PROVIDER") {
            self.ai.provider_type = AIProviderType::parse(&v).ok_or_else(|| {
                AppError::Config(format!(
                    "AI_PROVIDER must be 'openai', 'ollama' or 'disabled', got '{}'",
                    v
                ))
            })?;
        }
        if let Some(v) = var("OPENAI_API_KEY") {
            self.ai.openai_api_key = v;
        }
        if let Some(v) = var("OPENAI_MODEL") {
            self.ai.openai_model = v;
        }
        if let Some(v) = var("OPENAI_BASE_URL") {
            self.ai.openai_base_url = v;
        }
        if let Some(v) = var("OLLAMA_URL") {
            self.ai.ollama_url = v;
        }
        if let Some(v) = var("OLLAMA_MODEL") {
            self.ai.ollama_model = v;
        }
        if let Some(v) = var("AI_BATCH_SIZE") {
            self.ai.batch_size = parse_number("AI_BATCH_SIZE", &v)?;
        }

        if let Some(v) = var("BIND_ADDR") {
            self.server.bind_addr = v;
        }
        Ok(())
    }
}
