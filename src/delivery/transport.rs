//! Transport seam between the report pipeline and the chat service

use async_trait::async_trait;
use serde::Serialize;

/// Conversation identifier on the chat service
pub type ChatId = i64;

/// Fault taxonomy for outbound sends
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Network hiccup or server-side failure, worth retrying
    #[error("transient transport fault: {0}")]
    Transient(String),

    /// Server asked for a mandatory pause before the next attempt
    #[error("rate limited: retry after {0}s")]
    RetryAfter(u64),

    /// Request rejected as-is
    #[error("permanent transport fault: {0}")]
    Permanent(String),
}

/// Named byte payload uploaded as a photo or document
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyboardButton {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

/// Reply markup, serialized in the Bot API shape
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Keyboard {
    Reply {
        keyboard: Vec<Vec<KeyboardButton>>,
        resize_keyboard: bool,
    },
    Inline {
        inline_keyboard: Vec<Vec<InlineButton>>,
    },
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError>;

    async fn send_image(
        &self,
        chat: ChatId,
        image: &Attachment,
        caption: Option<&str>,
    ) -> Result<(), TransportError>;

    async fn send_document(
        &self,
        chat: ChatId,
        document: &Attachment,
        caption: Option<&str>,
    ) -> Result<(), TransportError>;

    /// Dismiss the client-side spinner of a pressed inline button
    async fn answer_callback(&self, _callback_id: &str) -> Result<(), TransportError> {
        Ok(())
    }
}
