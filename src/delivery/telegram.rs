//! Telegram Bot API client
//!
//! ## Methods used
//!
//! - `sendMessage` (JSON, optional `reply_markup`)
//! - `sendPhoto` / `sendDocument` (multipart upload)
//! - `answerCallbackQuery`
//! - `getUpdates` (long polling)
//!
//! ## Fault mapping
//!
//! - `parameters.retry_after` present → `RetryAfter(n)`
//! - connect / timeout / 5xx / 429 → `Transient`
//! - anything else the API rejects → `Permanent`

use super::transport::{Attachment, ChatId, Keyboard, Transport, TransportError};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Extra slack on top of the long-poll timeout before the request itself times out
const POLL_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: ChatId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: ChatId,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a Keyboard>,
}

#[derive(Serialize)]
struct AnswerCallback<'a> {
    callback_query_id: &'a str,
}

#[derive(Serialize)]
struct GetUpdates {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 2],
}

/// Map a rejected call onto the retry taxonomy
pub fn classify_failure(status: u16, description: &str, retry_after: Option<u64>) -> TransportError {
    if let Some(secs) = retry_after {
        return TransportError::RetryAfter(secs);
    }
    if status == 429 || status >= 500 {
        TransportError::Transient(format!("HTTP {}: {}", status, description))
    } else {
        TransportError::Permanent(format!("HTTP {}: {}", status, description))
    }
}

fn network_fault(err: reqwest::Error) -> TransportError {
    if err.is_builder() {
        TransportError::Permanent(err.to_string())
    } else {
        TransportError::Transient(err.to_string())
    }
}

pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str, timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Permanent(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, TransportError> {
        let response = request.send().await.map_err(network_fault)?;
        let status = response.status();
        let body: ApiResponse<T> = response.json().await.map_err(|e| {
            if status.is_success() {
                TransportError::Permanent(format!("{}: malformed response: {}", method, e))
            } else {
                classify_failure(status.as_u16(), &e.to_string(), None)
            }
        })?;

        match body {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse {
                description,
                parameters,
                ..
            } => {
                let description = description.unwrap_or_else(|| "no description".to_string());
                let retry_after = parameters.and_then(|p| p.retry_after);
                Err(classify_failure(status.as_u16(), &description, retry_after))
            }
        }
    }

    async fn upload(
        &self,
        method: &str,
        field: &str,
        mime: &str,
        chat: ChatId,
        attachment: &Attachment,
        caption: Option<&str>,
    ) -> Result<(), TransportError> {
        let part = Part::bytes(attachment.bytes.clone())
            .file_name(attachment.file_name.clone())
            .mime_str(mime)
            .map_err(|e| TransportError::Permanent(e.to_string()))?;

        let mut form = Form::new()
            .text("chat_id", chat.to_string())
            .part(field.to_string(), part);
        if let Some(caption) = caption {
            form = form.text("caption", caption.to_string());
        }

        let request = self.http.post(self.method_url(method)).multipart(form);
        self.call::<serde_json::Value>(method, request).await?;
        Ok(())
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TransportError> {
        let body = GetUpdates {
            offset,
            timeout: timeout_secs,
            allowed_updates: ["message", "callback_query"],
        };
        let request = self
            .http
            .post(self.method_url("getUpdates"))
            .timeout(Duration::from_secs(timeout_secs) + POLL_GRACE)
            .json(&body);
        self.call("getUpdates", request).await
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        let body = SendMessage {
            chat_id: chat,
            text,
            reply_markup: keyboard,
        };
        let request = self.http.post(self.method_url("sendMessage")).json(&body);
        self.call::<serde_json::Value>("sendMessage", request).await?;
        Ok(())
    }

    async fn send_image(
        &self,
        chat: ChatId,
        image: &Attachment,
        caption: Option<&str>,
    ) -> Result<(), TransportError> {
        self.upload("sendPhoto", "photo", "image/png", chat, image, caption)
            .await
    }

    async fn send_document(
        &self,
        chat: ChatId,
        document: &Attachment,
        caption: Option<&str>,
    ) -> Result<(), TransportError> {
        self.upload("sendDocument", "document", "text/csv", chat, document, caption)
            .await
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        let body = AnswerCallback {
            callback_query_id: callback_id,
        };
        let request = self
            .http
            .post(self.method_url("answerCallbackQuery"))
            .json(&body);
        self.call::<bool>("answerCallbackQuery", request).await?;
        Ok(())
    }
}
