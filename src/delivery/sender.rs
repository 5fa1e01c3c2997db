//! Transport wrapped in the retry policy

use super::retry::RetryPolicy;
use super::transport::{Attachment, ChatId, Keyboard, Transport, TransportError};
use std::sync::Arc;

#[derive(Clone)]
pub struct RetryingSender {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl RetryingSender {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        self.policy
            .run("message", || self.transport.send_text(chat, text, keyboard))
            .await
    }

    pub async fn send_image(
        &self,
        chat: ChatId,
        image: &Attachment,
        caption: Option<&str>,
    ) -> Result<(), TransportError> {
        self.policy
            .run("photo", || self.transport.send_image(chat, image, caption))
            .await
    }

    pub async fn send_document(
        &self,
        chat: ChatId,
        document: &Attachment,
        caption: Option<&str>,
    ) -> Result<(), TransportError> {
        self.policy
            .run("document", || {
                self.transport.send_document(chat, document, caption)
            })
            .await
    }

    /// Single attempt: a stale callback id is not worth waiting for
    pub async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        self.transport.answer_callback(callback_id).await
    }
}
