//! Routes inbound updates through the selection flow into the pipeline

use super::keyboards::{
    kind_keyboard, main_keyboard, period_keyboard, CALLBACK_KIND_PREFIX, CALLBACK_PERIOD_PREFIX,
};
use super::session::{FlowStep, SessionManager};
use crate::context::ServiceContext;
use crate::delivery::telegram::{CallbackQuery, Message, Update, User};
use crate::delivery::{ChatId, DeliveryPipeline, GenerationRequest, TransportError};
use crate::report_core::period::{parse_custom_range, CUSTOM_RANGE_SEPARATOR};
use crate::report_core::{PeriodSelection, PeriodToken, Purpose, ReportKind};
use crate::store::{ParticipantProfile, StoreError};
use chrono::NaiveDate;
use std::sync::Arc;

const RANGE_FORMAT_HINT: &str = "YYYY-MM-DD - YYYY-MM-DD";

pub const SERVICE_UNAVAILABLE: &str = "⚠️ Service is temporarily unavailable. Please try again later.";

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// `/report@my_bot extra` → `report`
fn command_name(text: &str) -> Option<&str> {
    let command = text.strip_prefix('/')?.split_whitespace().next()?;
    command.split('@').next()
}

fn update_chat(update: &Update) -> Option<ChatId> {
    match (&update.callback_query, &update.message) {
        (Some(query), _) => query.message.as_ref().map(|m| m.chat.id),
        (None, Some(message)) => Some(message.chat.id),
        (None, None) => None,
    }
}

fn profile_of(user: &User) -> ParticipantProfile {
    let profile = ParticipantProfile::new(user.id).with_names(&user.first_name, user.last_name.clone());
    match &user.username {
        Some(username) => profile.with_username(username),
        None => profile,
    }
}

pub fn greeting(first_name: &str) -> String {
    format!(
        "👋 Hi, {}! I'm an analytics bot.\n\n\
         I collect data, build reports and export them to CSV.\n\n\
         Commands:\n\
         /report - build a report\n\
         /stats - view statistics",
        first_name
    )
}

pub fn progress_notice(kind: ReportKind, purpose: Purpose, period_label: &str) -> String {
    format!(
        "⏳ Generating {} {} for {}...",
        kind.as_str(),
        purpose.as_str(),
        period_label
    )
}

pub struct Dispatcher {
    ctx: Arc<ServiceContext>,
    sessions: Arc<SessionManager>,
    pipeline: DeliveryPipeline,
    today: fn() -> NaiveDate,
}

impl Dispatcher {
    pub fn new(ctx: Arc<ServiceContext>, sessions: Arc<SessionManager>) -> Self {
        Self {
            pipeline: DeliveryPipeline::new(ctx.clone()),
            ctx,
            sessions,
            today: local_today,
        }
    }

    /// Pin "today" for period resolution
    pub fn with_clock(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Store faults become a notice to the chat; transport faults propagate
    pub async fn handle_update(&self, update: Update) -> Result<(), DispatchError> {
        let update_id = update.update_id;
        let chat = update_chat(&update);

        let result = if let Some(query) = update.callback_query {
            self.handle_callback(query).await
        } else if let Some(message) = update.message {
            self.handle_message(message).await
        } else {
            log::debug!("⏭️  Update {} carries nothing we handle", update_id);
            Ok(())
        };

        match result {
            Err(DispatchError::Store(e)) => {
                log::error!("❌ Store unavailable for update {}: {}", update_id, e);
                if let Some(chat) = chat {
                    if let Err(e) = self.say(chat, SERVICE_UNAVAILABLE, None).await {
                        log::error!("❌ Unavailable notice to chat {} not sent: {}", chat, e);
                    }
                }
                Ok(())
            }
            other => other,
        }
    }

    async fn observe(&self, user: &User) -> Result<(), StoreError> {
        self.ctx.store.upsert_participant(&profile_of(user)).await
    }

    async fn say(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&crate::delivery::Keyboard>,
    ) -> Result<(), DispatchError> {
        self.ctx.sender.send_text(chat, text, keyboard).await?;
        Ok(())
    }

    async fn handle_message(&self, message: Message) -> Result<(), DispatchError> {
        let chat = message.chat.id;
        let Some(user) = message.from.as_ref() else {
            log::debug!("⏭️  Message {} has no sender", message.message_id);
            return Ok(());
        };
        self.observe(user).await?;

        let Some(text) = message.text.as_deref().map(str::trim) else {
            return Ok(());
        };

        match command_name(text) {
            Some("start") => {
                self.ctx.store.record_activity(user.id, "start", None).await?;
                self.say(chat, &greeting(&user.first_name), Some(&main_keyboard()))
                    .await
            }
            Some("report") => self.begin_flow(chat, user, Purpose::Report).await,
            Some("stats") => self.begin_flow(chat, user, Purpose::Stats).await,
            Some(other) => {
                log::debug!("⏭️  Unknown command /{} in chat {}", other, chat);
                Ok(())
            }
            None => self.custom_range_text(chat, text).await,
        }
    }

    async fn begin_flow(
        &self,
        chat: ChatId,
        user: &User,
        purpose: Purpose,
    ) -> Result<(), DispatchError> {
        let action = match purpose {
            Purpose::Report => "report",
            Purpose::Stats => "stats",
        };
        self.ctx.store.record_activity(user.id, action, None).await?;
        self.sessions.begin(chat, purpose).await;

        let prompt = match purpose {
            Purpose::Report => "📊 Which report would you like to build?",
            Purpose::Stats => "📈 Which statistics would you like to see?",
        };
        self.say(chat, prompt, Some(&kind_keyboard())).await
    }

    async fn custom_range_text(&self, chat: ChatId, text: &str) -> Result<(), DispatchError> {
        if !self.sessions.is_awaiting_range(chat).await {
            log::debug!("⏭️  Free text outside a range prompt in chat {}", chat);
            return Ok(());
        }

        match parse_custom_range(text) {
            Ok(_) => {
                self.launch(
                    chat,
                    FlowStep::AwaitingRange,
                    PeriodSelection::Custom(text.to_string()),
                )
                .await
            }
            Err(e) => {
                log::debug!("📝 Rejected range {:?} in chat {}: {}", text, chat, e);
                let prompt = format!(
                    "❌ Invalid date format. Please enter the range as {}",
                    RANGE_FORMAT_HINT
                );
                self.say(chat, &prompt, None).await
            }
        }
    }

    async fn handle_callback(&self, query: CallbackQuery) -> Result<(), DispatchError> {
        if let Err(e) = self.ctx.sender.answer_callback(&query.id).await {
            log::warn!("⚠️  Could not answer callback {}: {}", query.id, e);
        }
        self.observe(&query.from).await?;

        let Some(chat) = query.message.as_ref().map(|m| m.chat.id) else {
            log::debug!("⏭️  Callback {} without a message", query.id);
            return Ok(());
        };
        let data = query.data.as_deref().unwrap_or_default();

        if let Some(kind) = data.strip_prefix(CALLBACK_KIND_PREFIX) {
            self.kind_selected(chat, kind).await
        } else if let Some(token) = data.strip_prefix(CALLBACK_PERIOD_PREFIX) {
            self.period_selected(chat, PeriodToken::parse(token)).await
        } else {
            log::debug!("⏭️  Unknown callback data {:?} in chat {}", data, chat);
            Ok(())
        }
    }

    async fn kind_selected(&self, chat: ChatId, raw: &str) -> Result<(), DispatchError> {
        let Ok(kind) = raw.parse::<ReportKind>() else {
            log::debug!("⏭️  Unknown report kind {:?} in chat {}", raw, chat);
            return Ok(());
        };
        let Some(session) = self.sessions.choose_kind(chat, kind).await else {
            log::debug!("⏭️  Kind selection out of step in chat {}", chat);
            return Ok(());
        };

        let text = format!(
            "Selected {} type: {}\n\nChoose a period:",
            session.purpose.as_str(),
            kind.title()
        );
        self.say(chat, &text, Some(&period_keyboard())).await
    }

    async fn period_selected(&self, chat: ChatId, token: PeriodToken) -> Result<(), DispatchError> {
        if token == PeriodToken::Custom {
            if !self.sessions.await_range(chat).await {
                log::debug!("⏭️  Custom range requested out of step in chat {}", chat);
                return Ok(());
            }
            let prompt = format!(
                "📅 Enter the date range as {}\nFor example: 2024-01-01{}2024-01-31",
                RANGE_FORMAT_HINT, CUSTOM_RANGE_SEPARATOR
            );
            return self.say(chat, &prompt, None).await;
        }

        self.launch(chat, FlowStep::AwaitingPeriod, PeriodSelection::Token(token))
            .await
    }

    async fn launch(
        &self,
        chat: ChatId,
        expected: FlowStep,
        period: PeriodSelection,
    ) -> Result<(), DispatchError> {
        let Some((purpose, kind)) = self.sessions.start_generation(chat, expected).await else {
            log::debug!("⏭️  Period selection out of step in chat {}", chat);
            return Ok(());
        };

        let today = (self.today)();
        if let Ok(range) = period.resolve(today) {
            let notice = progress_notice(kind, purpose, &period.label(&range));
            if let Err(e) = self.ctx.sender.send_text(chat, &notice, None).await {
                log::error!("❌ Progress notice to chat {} not sent: {}", chat, e);
            }
        }

        let run = self
            .pipeline
            .run(GenerationRequest {
                chat_id: chat,
                kind,
                purpose,
                period,
                today,
            })
            .await;
        if !self.sessions.finish_generation(chat).await {
            log::debug!("🔁 chat {} started a new flow during generation", chat);
        }

        log::info!(
            "📦 chat {}: {} {} finished as {:?}",
            chat,
            kind.as_str(),
            purpose.as_str(),
            run.outcome
        );
        Ok(())
    }
}
