//! Delivery pipeline - one generation request end-to-end
//!
//! ```text
//! Requested → RangeResolved → Aggregated ─┬─▶ Empty (notice, terminal)
//!                                         └─▶ Rendered → Exported (reports)
//!                                                 → Delivering → Cleaned → Done
//!
//! Errored is reachable from any non-terminal state:
//!   - bad range      → notice, stop
//!   - later failures → notice, then Cleaned → Done
//! ```

use super::scratch::Artifact;
use super::transport::{Attachment, ChatId, TransportError};
use crate::bot::keyboards::main_keyboard;
use crate::context::ServiceContext;
use crate::report_core::{
    chart, exporter, stats, Aggregator, DateRange, ExportError, PeriodError, PeriodSelection,
    Purpose, RenderError, ReportKind,
};
use crate::store::StoreError;
use chrono::NaiveDate;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Requested,
    RangeResolved,
    Aggregated,
    Empty,
    Rendered,
    Exported,
    Delivering,
    Cleaned,
    Done,
    Errored,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Period(#[from] PeriodError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("artifact I/O failed: {0}")]
    Artifact(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    Delivered,
    NoData,
    /// Range could not be resolved; nothing was generated
    Rejected(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRun {
    /// Every state visited, in order
    pub trace: Vec<PipelineState>,
    pub outcome: PipelineOutcome,
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub chat_id: ChatId,
    pub kind: ReportKind,
    pub purpose: Purpose,
    pub period: PeriodSelection,
    pub today: NaiveDate,
}

enum Generated {
    NoData,
    Delivered,
}

struct Trace {
    chat_id: ChatId,
    states: Vec<PipelineState>,
}

impl Trace {
    fn enter(&mut self, state: PipelineState) {
        log::debug!("🔀 chat {} → {:?}", self.chat_id, state);
        self.states.push(state);
    }

    fn finish(self, outcome: PipelineOutcome) -> PipelineRun {
        PipelineRun {
            trace: self.states,
            outcome,
        }
    }
}

pub fn no_data_notice(kind: ReportKind, period_label: &str) -> String {
    match kind {
        ReportKind::Sales => format!("📭 No sales data for {}.", period_label),
        ReportKind::Activity => format!("📭 No activity data for {}.", period_label),
    }
}

pub fn acknowledgement(purpose: Purpose) -> &'static str {
    match purpose {
        Purpose::Report => "✅ Report generated successfully!",
        Purpose::Stats => "✅ Statistics loaded successfully!",
    }
}

pub struct DeliveryPipeline {
    ctx: Arc<ServiceContext>,
}

impl DeliveryPipeline {
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    pub async fn run(&self, request: GenerationRequest) -> PipelineRun {
        let chat = request.chat_id;
        let mut trace = Trace {
            chat_id: chat,
            states: Vec::new(),
        };
        trace.enter(PipelineState::Requested);

        let range = match request.period.resolve(request.today) {
            Ok(range) => range,
            Err(err) => {
                trace.enter(PipelineState::Errored);
                log::warn!("⚠️  chat {}: {}", chat, err);
                let notice = format!(
                    "❌ {}. Please use the format YYYY-MM-DD - YYYY-MM-DD",
                    err
                );
                self.notify(chat, &notice).await;
                return trace.finish(PipelineOutcome::Rejected(err.to_string()));
            }
        };
        trace.enter(PipelineState::RangeResolved);

        let label = request.period.label(&range);
        let mut artifacts = Vec::new();

        let outcome = match self
            .generate(&request, &range, &label, &mut trace, &mut artifacts)
            .await
        {
            Ok(Generated::NoData) => return trace.finish(PipelineOutcome::NoData),
            Ok(Generated::Delivered) => {
                log::info!(
                    "✅ Delivered {} {} for {} to chat {}",
                    request.kind.as_str(),
                    request.purpose.as_str(),
                    label,
                    chat
                );
                PipelineOutcome::Delivered
            }
            Err(err) => {
                trace.enter(PipelineState::Errored);
                log::error!(
                    "❌ {} {} for chat {} failed: {}",
                    request.kind.as_str(),
                    request.purpose.as_str(),
                    chat,
                    err
                );
                let notice = match request.purpose {
                    Purpose::Report => format!("⚠️ Failed to generate the report: {}", err),
                    Purpose::Stats => format!("⚠️ Failed to load statistics: {}", err),
                };
                self.notify(chat, &notice).await;
                PipelineOutcome::Failed(err.to_string())
            }
        };

        for artifact in &artifacts {
            self.ctx.scratch.remove(artifact).await;
        }
        trace.enter(PipelineState::Cleaned);

        if let Err(e) = self
            .ctx
            .sender
            .send_text(chat, acknowledgement(request.purpose), Some(&main_keyboard()))
            .await
        {
            log::error!("❌ Acknowledgement to chat {} not sent: {}", chat, e);
        }
        trace.enter(PipelineState::Done);

        trace.finish(outcome)
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        range: &DateRange,
        label: &str,
        trace: &mut Trace,
        artifacts: &mut Vec<Artifact>,
    ) -> Result<Generated, PipelineError> {
        let chat = request.chat_id;
        let kind = request.kind;

        let aggregation = Aggregator::new(self.ctx.store.clone())
            .collect(kind, range)
            .await?;
        trace.enter(PipelineState::Aggregated);

        if aggregation.is_empty() {
            trace.enter(PipelineState::Empty);
            self.ctx
                .sender
                .send_text(chat, &no_data_notice(kind, label), None)
                .await?;
            return Ok(Generated::NoData);
        }

        let png = chart::render(&aggregation.table, kind, label)?;
        let chart_file = self
            .ctx
            .scratch
            .persist(&format!("{}_chart", kind.as_str()), "png", &png)
            .await?;
        artifacts.push(chart_file.clone());
        trace.enter(PipelineState::Rendered);

        let export_file = match request.purpose {
            Purpose::Report => {
                let csv = exporter::export(&aggregation.table)?;
                let prefix = format!(
                    "{}_report_{}_to_{}",
                    kind.as_str(),
                    range.start(),
                    range.end()
                );
                let file = self.ctx.scratch.persist(&prefix, "csv", &csv).await?;
                artifacts.push(file.clone());
                trace.enter(PipelineState::Exported);
                Some(file)
            }
            Purpose::Stats => None,
        };

        trace.enter(PipelineState::Delivering);

        if request.purpose == Purpose::Stats {
            let summary = stats::format_summary(&aggregation, label, &self.ctx.currency);
            self.ctx.sender.send_text(chat, &summary, None).await?;
        }

        let image: Attachment = chart_file.load().await?;
        let caption = format!("📈 {} chart for {}", kind.title(), label);
        self.ctx
            .sender
            .send_image(chat, &image, Some(&caption))
            .await?;

        if let Some(file) = export_file {
            let document = file.load().await?;
            let caption = format!("📄 {} report for {} (CSV)", kind.title(), label);
            self.ctx
                .sender
                .send_document(chat, &document, Some(&caption))
                .await?;
        }

        Ok(Generated::Delivered)
    }

    /// Best-effort notice; a failed send is only logged
    async fn notify(&self, chat: ChatId, text: &str) {
        if let Err(e) = self.ctx.sender.send_text(chat, text, None).await {
            log::error!("❌ Notice to chat {} not sent: {}", chat, e);
        }
    }
}
