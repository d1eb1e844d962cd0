// Gmail REST API client
use base64::Engine;
use chrono::{Duration, Local};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::model::EmailItem;

pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com";

const METADATA_HEADERS: [&str; 4] = ["Subject", "From", "To", "Date"];

#[derive(Debug, Deserialize)]
struct MessageListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageDetail {
    id: String,
    #[serde(default)]
    thread_id: String,
    #[serde(default)]
    label_ids: Vec<String>,
    #[serde(default)]
    snippet: String,
    payload: Option<MessagePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagePart {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    headers: Vec<Header>,
    body: Option<MessageBody>,
    #[serde(default)]
    parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub email_address: String,
    #[serde(default)]
    pub messages_total: u64,
}

pub struct GmailClient {
    client: reqwest::Client,
    base_url: String,
}

/// Gmail bodies are URL-safe base64, with or without padding
fn decode_body(data: &str) -> Option<String> {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(data.trim().trim_end_matches('='))
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

/// Concatenated text/plain content of a part tree
fn collect_plain_text(part: &MessagePart, out: &mut String) {
    if part.mime_type == "text/plain" {
        if let Some(text) = part
            .body
            .as_ref()
            .and_then(|b| b.data.as_deref())
            .and_then(decode_body)
        {
            out.push_str(&text);
        }
    }
    for child in &part.parts {
        collect_plain_text(child, out);
    }
}

fn header<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

impl MessageDetail {
    fn into_item(self, include_body: bool) -> EmailItem {
        let payload = self.payload.unwrap_or_default();
        let headers = &payload.headers;

        let body = if include_body {
            let mut text = String::new();
            collect_plain_text(&payload, &mut text);
            Some(text).filter(|t| !t.trim().is_empty())
        } else {
            None
        };

        EmailItem {
            id: self.id,
            thread_id: self.thread_id,
            subject: header(headers, "Subject").unwrap_or("No Subject").to_string(),
            sender: header(headers, "From").unwrap_or("Unknown").to_string(),
            recipient: header(headers, "To").unwrap_or("Unknown").to_string(),
            date: header(headers, "Date").unwrap_or("Unknown").to_string(),
            snippet: self.snippet,
            body,
            labels: self.label_ids,
        }
    }
}

/// `after:YYYY/MM/DD` for the given look-back window
pub fn recent_filter(days_back: u32) -> String {
    let date_after = Local::now() - Duration::days(i64::from(days_back));
    format!("after:{}", date_after.format("%Y/%m/%d"))
}

impl GmailClient {
    pub fn new() -> Self {
        Self::with_base_url(GMAIL_API_BASE.to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get(
        &self,
        access_token: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response> {
        let url = format!("{}/gmail/v1/users/me/{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::FetchFailed(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AppError::AuthRequired);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::FetchFailed(format!("API error {}: {}", status, body)));
        }
        Ok(response)
    }

    /// Lightweight authenticated call, used to check whether a token still works
    pub async fn profile(&self, access_token: &str) -> Result<Profile> {
        let response = self.get(access_token, "profile", &[]).await?;
        response
            .json()
            .await
            .map_err(|e| AppError::FetchFailed(format!("Failed to parse profile: {}", e)))
    }

    async fn list_message_ids(
        &self,
        access_token: &str,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<String>> {
        let response = self
            .get(
                access_token,
                "messages",
                &[
                    ("q", query.to_string()),
                    ("maxResults", max_results.to_string()),
                ],
            )
            .await?;

        let list: MessageListResponse = response
            .json()
            .await
            .map_err(|e| AppError::FetchFailed(format!("Failed to parse message list: {}", e)))?;
        Ok(list.messages.into_iter().map(|m| m.id).collect())
    }

    pub async fn get_message(
        &self,
        access_token: &str,
        id: &str,
        include_body: bool,
    ) -> Result<EmailItem> {
        let mut query = Vec::new();
        if include_body {
            query.push(("format", "full".to_string()));
        } else {
            query.push(("format", "metadata".to_string()));
            query.extend(
                METADATA_HEADERS
                    .iter()
                    .map(|h| ("metadataHeaders", h.to_string())),
            );
        }

        let response = self
            .get(access_token, &format!("messages/{}", id), &query)
            .await?;
        let detail: MessageDetail = response
            .json()
            .await
            .map_err(|e| AppError::FetchFailed(format!("Failed to parse message {}: {}", id, e)))?;
        Ok(detail.into_item(include_body))
    }

    /// Recent messages, newest first as Gmail lists them. Messages that fail to
    /// load are logged and skipped.
    pub async fn fetch_recent(
        &self,
        access_token: &str,
        days_back: u32,
        max_results: u32,
        include_body: bool,
    ) -> Result<Vec<EmailItem>> {
        let filter = recent_filter(days_back);
        tracing::info!("Using filter: {}", filter);

        let ids = self.list_message_ids(access_token, &filter, max_results).await?;
        tracing::info!("Found {} emails to retrieve", ids.len());

        let mut emails = Vec::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            tracing::debug!("Retrieving email {}/{}: {}", i + 1, ids.len(), id);
            match self.get_message(access_token, id, include_body).await {
                Ok(item) => emails.push(item),
                Err(e) => tracing::warn!("Error retrieving email {}: {}", id, e),
            }
        }

        tracing::info!("Successfully retrieved {} emails", emails.len());
        Ok(emails)
    }
}

impl Default for GmailClient {
    fn default() -> Self {
        Self::new()
    }
}
