pub mod ai;
pub mod config;
pub mod crypto;
pub mod error;
pub mod gmail;
pub mod logging;
pub mod model;
pub mod store;

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use ai::{AIMessage, AIProvider, Role};
use config::AppConfig;
use error::{AppError, Result};
use gmail::{check_status, GmailClient, OAuthClient};
use model::{EmailItem, TaskStatus};
use store::{StoredTask, TaskStore};

pub const ACCESS_COOKIE: &str = "gmail_access_token";
pub const REFRESH_COOKIE: &str = "gmail_refresh_token";

const REFRESH_COOKIE_MAX_AGE: i64 = 30 * 24 * 60 * 60;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    // None when no backend is configured; AI routes then fail with a config error
    pub provider: Option<Arc<dyn AIProvider>>,
    pub gmail: Arc<GmailClient>,
    pub oauth: Arc<OAuthClient>,
    pub tasks: Arc<Mutex<TaskStore>>,
}

impl AppState {
    pub fn new(config: AppConfig, provider: Option<Arc<dyn AIProvider>>) -> Self {
        let gmail = GmailClient::with_base_url(config.gmail.api_base.clone());
        let oauth = OAuthClient::new(config.gmail.clone());
        Self {
            config: Arc::new(config),
            provider,
            gmail: Arc::new(gmail),
            oauth: Arc::new(oauth),
            tasks: Arc::new(Mutex::new(TaskStore::new())),
        }
    }

    fn provider(&self) -> Result<&dyn AIProvider> {
        self.provider.as_deref().ok_or_else(|| {
            AppError::Config(
                "No AI provider configured. Set AI_PROVIDER to 'openai' or 'ollama'.".to_string(),
            )
        })
    }
}

// === Cookies ===

fn session_cookie(name: &str, value: &str, max_age: i64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        name, value, max_age
    )
}

fn expired_cookie(name: &str) -> String {
    session_cookie(name, "", 0)
}

fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .filter(|(key, _)| key.trim() == name)
        .map(|(_, value)| unquote(value.trim()))
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Cookie values may be sent wrapped in double quotes
fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn access_token(headers: &HeaderMap) -> Result<String> {
    read_cookie(headers, ACCESS_COOKIE).ok_or(AppError::AuthRequired)
}

fn access_max_age(token: &gmail::OAuthToken) -> i64 {
    token
        .expires_at
        .map(|at| (at - chrono::Utc::now()).num_seconds().max(0))
        .unwrap_or(3600)
}

// === Auth routes ===

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn auth_google(State(state): State<AppState>) -> Result<Redirect> {
    let url = state.oauth.authorization_url(None)?;
    Ok(Redirect::to(&url))
}

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

async fn auth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Response> {
    if let Some(error) = params.error {
        return Err(AppError::InvalidInput(format!("authorization denied: {}", error)));
    }
    let code = params
        .code
        .ok_or_else(|| AppError::InvalidInput("missing authorization code".to_string()))?;

    let token = state.oauth.exchange_code(&code).await?;

    let mut cookies = vec![(
        SET_COOKIE,
        session_cookie(ACCESS_COOKIE, &token.access_token, access_max_age(&token)),
    )];
    if let Some(refresh) = &token.refresh_token {
        cookies.push((
            SET_COOKIE,
            session_cookie(REFRESH_COOKIE, refresh, REFRESH_COOKIE_MAX_AGE),
        ));
    }

    Ok((AppendHeaders(cookies), Redirect::to("/")).into_response())
}

async fn auth_status(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let access = read_cookie(&headers, ACCESS_COOKIE);
    let status = check_status(&state.gmail, access.as_deref()).await;
    if status.authenticated {
        return Json(status).into_response();
    }

    // Access token gone or rejected: try the refresh cookie once
    if let Some(refresh) = read_cookie(&headers, REFRESH_COOKIE) {
        match state.oauth.refresh(&refresh).await {
            Ok(token) => {
                let refreshed = check_status(&state.gmail, Some(&token.access_token)).await;
                if refreshed.authenticated {
                    let cookie =
                        session_cookie(ACCESS_COOKIE, &token.access_token, access_max_age(&token));
                    return (AppendHeaders([(SET_COOKIE, cookie)]), Json(refreshed))
                        .into_response();
                }
            }
            Err(e) => tracing::info!("Refreshing session failed: {}", e),
        }
    }

    let cleared = [
        (SET_COOKIE, expired_cookie(ACCESS_COOKIE)),
        (SET_COOKIE, expired_cookie(REFRESH_COOKIE)),
    ];
    (AppendHeaders(cleared), Json(status)).into_response()
}

async fn logout() -> Response {
    let cleared = [
        (SET_COOKIE, expired_cookie(ACCESS_COOKIE)),
        (SET_COOKIE, expired_cookie(REFRESH_COOKIE)),
    ];
    (AppendHeaders(cleared), Json(json!({ "ok": true }))).into_response()
}

// === Emails ===

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailQuery {
    days: Option<u32>,
    max: Option<u32>,
    include_body: Option<bool>,
}

async fn list_emails(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<EmailQuery>,
) -> Result<Json<Value>> {
    let token = access_token(&headers)?;
    let settings = &state.config.gmail;
    let days_back = query.days.unwrap_or(settings.days_back);
    let max_results = query.max.unwrap_or(settings.max_results);

    let emails = state
        .gmail
        .fetch_recent(
            &token,
            days_back,
            max_results,
            query.include_body.unwrap_or(settings.include_body),
        )
        .await?;

    Ok(Json(json!({
        "totalEmails": emails.len(),
        "daysBack": days_back,
        "emails": emails,
    })))
}

// === AI ===

async fn ai_status(State(state): State<AppState>) -> Json<Value> {
    let Some(provider) = state.provider.as_deref() else {
        return Json(json!({
            "configured": false,
            "provider": state.config.ai.provider_type,
            "available": false,
            "models": [],
        }));
    };

    let available = provider.is_available().await;
    let models = if available {
        provider.list_models().await.unwrap_or_default()
    } else {
        Vec::new()
    };
    Json(json!({
        "configured": true,
        "provider": provider.name(),
        "available": available,
        "models": models,
    }))
}

#[derive(Deserialize)]
struct CategorizeRequest {
    emails: Vec<EmailItem>,
}

async fn ai_categorize(
    State(state): State<AppState>,
    Json(request): Json<CategorizeRequest>,
) -> Result<Json<Value>> {
    let result =
        ai::categorize_emails(state.provider()?, &request.emails, state.config.ai.batch_size)
            .await?;

    Ok(Json(json!({
        "categorizations": result.records,
        "fallbackCount": result.fallback_count,
    })))
}

#[derive(Deserialize)]
struct TasksRequest {
    emails: Vec<EmailItem>,
    tone: Option<String>,
}

async fn ai_tasks(
    State(state): State<AppState>,
    Json(request): Json<TasksRequest>,
) -> Result<Json<Value>> {
    let tone = request
        .tone
        .unwrap_or_else(|| state.config.default_tone.clone());
    let result = ai::generate_tasks(
        state.provider()?,
        &request.emails,
        &tone,
        state.config.ai.batch_size,
    )
    .await?;

    let stored = state.tasks.lock().await.add(result.records);
    Ok(Json(json!({
        "tasks": stored,
        "fallbackCount": result.fallback_count,
    })))
}

#[derive(Deserialize)]
struct ReplyRequest {
    email: EmailItem,
    tone: Option<String>,
    instructions: Option<String>,
}

async fn ai_reply(
    State(state): State<AppState>,
    Json(request): Json<ReplyRequest>,
) -> Result<Json<Value>> {
    let tone = request
        .tone
        .unwrap_or_else(|| state.config.default_tone.clone());
    let reply = ai::draft_reply(
        state.provider()?,
        &request.email,
        &tone,
        request.instructions.as_deref(),
    )
    .await?;
    Ok(Json(json!({ "reply": reply })))
}

#[derive(Deserialize)]
struct ChatRequest {
    messages: Vec<AIMessage>,
    #[serde(default)]
    emails: Vec<EmailItem>,
}

/// The last user message is the question, everything before it is history
async fn ai_chat(
    State(state): State<AppState>,
    Json(mut request): Json<ChatRequest>,
) -> Result<Json<Value>> {
    let question = match request.messages.pop() {
        Some(message) if message.role == Role::User => message.content,
        _ => {
            return Err(AppError::InvalidInput(
                "the last message must come from the user".to_string(),
            ))
        }
    };

    let reply = ai::ask_assistant(
        state.provider()?,
        &request.messages,
        &question,
        &request.emails,
    )
    .await?;
    Ok(Json(json!({ "reply": reply })))
}

// === Tasks ===

async fn list_tasks(State(state): State<AppState>) -> Json<Vec<StoredTask>> {
    Json(state.tasks.lock().await.list().to_vec())
}

#[derive(Deserialize)]
struct UpdateTaskRequest {
    status: TaskStatus,
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateTaskRequest>,
) -> Result<Json<StoredTask>> {
    let task = state.tasks.lock().await.update_status(&id, request.status)?;
    Ok(Json(task))
}

async fn delete_task(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode> {
    state.tasks.lock().await.remove(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/google", get(auth_google))
        .route("/api/auth/callback", get(auth_callback))
        .route("/api/auth/status", get(auth_status))
        .route("/api/auth/logout", post(logout))
        .route("/api/emails", get(list_emails))
        .route("/api/ai/status", get(ai_status))
        .route("/api/ai/categorize", post(ai_categorize))
        .route("/api/ai/tasks", post(ai_tasks))
        .route("/api/ai/reply", post(ai_reply))
        .route("/api/ai/chat", post(ai_chat))
        .route("/api/tasks", get(list_tasks))
        .route("/api/tasks/{id}", patch(update_task).delete(delete_task))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the HTTP API until Ctrl-C
pub async fn run(config: AppConfig) -> Result<()> {
    let provider: Option<Arc<dyn AIProvider>> = match ai::create_provider(&config.ai) {
        Ok(provider) => {
            tracing::info!("Using {} for AI features", provider.name());
            Some(Arc::from(provider))
        }
        Err(e) => {
            tracing::warn!("AI features disabled: {}", e);
            None
        }
    };

    let bind_addr = config.server.bind_addr.clone();
    let app = router(AppState::new(config, provider));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}
