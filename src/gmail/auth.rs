// OAuth2 authorization-code flow against Google's endpoints

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::GmailConfig;
use crate::error::{AppError, Result};
use crate::gmail::client::GmailClient;

/// Tokens are treated as expired this long before Google says so
const EXPIRY_SKEW_SECS: i64 = 60;

const BACKEND: &str = "Google OAuth";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl OAuthToken {
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|at| Utc::now() + Duration::seconds(EXPIRY_SKEW_SECS) >= at)
            .unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

impl From<TokenResponse> for OAuthToken {
    fn from(resp: TokenResponse) -> Self {
        Self {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token,
            expires_at: Some(Utc::now() + Duration::seconds(resp.expires_in.unwrap_or(3600))),
            scope: resp.scope,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

pub struct OAuthClient {
    client: reqwest::Client,
    config: GmailConfig,
}

impl OAuthClient {
    pub fn new(config: GmailConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Consent URL the user is sent to
    pub fn authorization_url(&self, state: Option<&str>) -> Result<String> {
        if self.config.client_id.trim().is_empty() {
            return Err(AppError::Config(
                "Google client id is missing. Set GOOGLE_CLIENT_ID.".to_string(),
            ));
        }

        let scope_string = self.config.scopes.join(" ");
        let mut url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            self.config.auth_uri,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(&scope_string),
        );
        if let Some(state) = state {
            url.push_str(&format!("&state={}", urlencoding::encode(state)));
        }
        Ok(url)
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        self.config.validate()?;

        let resp = self
            .client
            .post(&self.config.token_uri)
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::BackendUnavailable {
                backend: BACKEND.to_string(),
                detail: e.to_string(),
            })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json().await?);
        }

        let body = resp.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::BAD_REQUEST || status == reqwest::StatusCode::UNAUTHORIZED {
            tracing::warn!("Token request rejected ({}): {}", status, body);
            return Err(AppError::AuthRequired);
        }
        Err(AppError::Backend {
            backend: BACKEND.to_string(),
            status: status.as_u16(),
            message: body,
        })
    }

    pub async fn exchange_code(&self, code: &str) -> Result<OAuthToken> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AppError::InvalidInput("authorization code is empty".to_string()));
        }

        let resp = self
            .token_request(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .await?;
        tracing::info!("Exchanged authorization code for tokens");
        Ok(resp.into())
    }

    /// Google usually omits the refresh token here, so the old one is kept.
    pub async fn refresh(&self, refresh_token: &str) -> Result<OAuthToken> {
        let resp = self
            .token_request(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .await?;

        let mut token = OAuthToken::from(resp);
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }
        tracing::info!("Refreshed access token");
        Ok(token)
    }

    /// Return a usable token, refreshing it first when expired
    pub async fn ensure_fresh(&self, token: OAuthToken) -> Result<OAuthToken> {
        if !token.is_expired() {
            return Ok(token);
        }
        match token.refresh_token.as_deref() {
            Some(refresh_token) => self.refresh(refresh_token).await,
            None => Err(AppError::AuthRequired),
        }
    }
}

/// Probe the profile endpoint with the given access token
pub async fn check_status(gmail: &GmailClient, access_token: Option<&str>) -> AuthStatus {
    let Some(token) = access_token.filter(|t| !t.is_empty()) else {
        return AuthStatus {
            authenticated: false,
            email: None,
        };
    };

    match gmail.profile(token).await {
        Ok(profile) => AuthStatus {
            authenticated: true,
            email: Some(profile.email_address),
        },
        Err(e) => {
            tracing::info!("Stored access token is not valid: {}", e);
            AuthStatus {
                authenticated: false,
                email: None,
            }
        }
    }
}
