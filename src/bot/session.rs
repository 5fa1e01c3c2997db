//! Per-conversation flow state
//!
//! Each chat walks kind → period → (custom range text) → generation.
//! Transitions only fire from the expected step, so a stale button press
//! or a double click cannot start a second generation.

use crate::delivery::ChatId;
use crate::report_core::{Purpose, ReportKind};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStep {
    AwaitingKind,
    AwaitingPeriod,
    AwaitingRange,
    Generating,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub purpose: Purpose,
    pub step: FlowStep,
    pub kind: Option<ReportKind>,
}

#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<ChatId, Session>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) a flow; any previous flow in the chat is dropped
    pub async fn begin(&self, chat: ChatId, purpose: Purpose) {
        self.sessions.write().await.insert(
            chat,
            Session {
                purpose,
                step: FlowStep::AwaitingKind,
                kind: None,
            },
        );
    }

    pub async fn get(&self, chat: ChatId) -> Option<Session> {
        self.sessions.read().await.get(&chat).cloned()
    }

    pub async fn choose_kind(&self, chat: ChatId, kind: ReportKind) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&chat)?;
        if session.step != FlowStep::AwaitingKind {
            return None;
        }
        session.kind = Some(kind);
        session.step = FlowStep::AwaitingPeriod;
        Some(session.clone())
    }

    pub async fn await_range(&self, chat: ChatId) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&chat) {
            Some(session) if session.step == FlowStep::AwaitingPeriod => {
                session.step = FlowStep::AwaitingRange;
                true
            }
            _ => false,
        }
    }

    pub async fn is_awaiting_range(&self, chat: ChatId) -> bool {
        matches!(
            self.sessions.read().await.get(&chat),
            Some(Session {
                step: FlowStep::AwaitingRange,
                ..
            })
        )
    }

    /// Claim the session for generation from `expected`; returns purpose and kind
    pub async fn start_generation(
        &self,
        chat: ChatId,
        expected: FlowStep,
    ) -> Option<(Purpose, ReportKind)> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&chat)?;
        if session.step != expected {
            return None;
        }
        let kind = session.kind?;
        session.step = FlowStep::Generating;
        Some((session.purpose, kind))
    }

    /// End a generation; a flow begun meanwhile is left in place
    pub async fn finish_generation(&self, chat: ChatId) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get(&chat) {
            Some(session) if session.step == FlowStep::Generating => {
                sessions.remove(&chat);
                true
            }
            _ => false,
        }
    }
}
