//! End-to-end pipeline and dispatcher runs against SQLite and a recording transport

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tallybot::bot::{Dispatcher, SessionManager, SERVICE_UNAVAILABLE};
use tallybot::context::ServiceContext;
use tallybot::delivery::telegram::Update;
use tallybot::delivery::{
    Attachment, ChatId, DeliveryPipeline, GenerationRequest, Keyboard, PipelineOutcome,
    PipelineState, RetryPolicy, RetryingSender, ScratchDir, Sleeper, Transport, TransportError,
};
use tallybot::report_core::{DateRange, PeriodSelection, PeriodToken, Purpose, ReportKind};
use tallybot::store::{
    ActivityEvent, EventStore, NewSale, Participant, ParticipantProfile, SaleEvent,
    SqliteEventStore, StoreError,
};
use tempfile::TempDir;

const CHAT: ChatId = 42;

#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Text(String),
    Image(Attachment),
    Document(Attachment),
}

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
    answered: Mutex<Vec<String>>,
    fail_images: bool,
    /// Texts starting with this prefix are rejected
    fail_text_prefix: Option<&'static str>,
    /// Next photo upload is rate limited for this many seconds
    image_rate_limit: Mutex<Option<u64>>,
}

impl RecordingTransport {
    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn images(&self) -> usize {
        self.sent()
            .iter()
            .filter(|s| matches!(s, Sent::Image(_)))
            .count()
    }

    fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text(t) => Some(t),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(
        &self,
        _chat: ChatId,
        text: &str,
        _keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        if let Some(prefix) = self.fail_text_prefix {
            if text.starts_with(prefix) {
                return Err(TransportError::Permanent("message rejected".into()));
            }
        }
        self.sent.lock().unwrap().push(Sent::Text(text.to_string()));
        Ok(())
    }

    async fn send_image(
        &self,
        _chat: ChatId,
        image: &Attachment,
        _caption: Option<&str>,
    ) -> Result<(), TransportError> {
        if self.fail_images {
            return Err(TransportError::Permanent("photo rejected".into()));
        }
        if let Some(secs) = self.image_rate_limit.lock().unwrap().take() {
            return Err(TransportError::RetryAfter(secs));
        }
        self.sent.lock().unwrap().push(Sent::Image(image.clone()));
        Ok(())
    }

    async fn send_document(
        &self,
        _chat: ChatId,
        document: &Attachment,
        _caption: Option<&str>,
    ) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(Sent::Document(document.clone()));
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        self.answered.lock().unwrap().push(callback_id.to_string());
        Ok(())
    }
}

/// Records requested delays without waiting
#[derive(Default)]
struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

/// Store whose every call fails as if the database were gone
struct UnavailableStore;

#[async_trait]
impl EventStore for UnavailableStore {
    async fn record_sale(&self, _sale: NewSale) -> Result<i64, StoreError> {
        Err(StoreError::Unavailable("disk gone".into()))
    }

    async fn upsert_participant_at(
        &self,
        _profile: &ParticipantProfile,
        _at: NaiveDateTime,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk gone".into()))
    }

    async fn record_activity_at(
        &self,
        _actor_id: i64,
        _action_type: &str,
        _metadata: Option<&str>,
        _at: NaiveDateTime,
    ) -> Result<i64, StoreError> {
        Err(StoreError::Unavailable("disk gone".into()))
    }

    async fn sales_between(&self, _range: &DateRange) -> Result<Vec<SaleEvent>, StoreError> {
        Err(StoreError::Unavailable("disk gone".into()))
    }

    async fn activity_between(&self, _range: &DateRange) -> Result<Vec<ActivityEvent>, StoreError> {
        Err(StoreError::Unavailable("disk gone".into()))
    }

    async fn participant(&self, _actor_id: i64) -> Result<Option<Participant>, StoreError> {
        Err(StoreError::Unavailable("disk gone".into()))
    }

    async fn clear_sales(&self) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable("disk gone".into()))
    }
}

struct Harness {
    _dir: TempDir,
    scratch: ScratchDir,
    store: Arc<dyn EventStore>,
    transport: Arc<RecordingTransport>,
    ctx: Arc<ServiceContext>,
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn fixed_today() -> NaiveDate {
    day(2024, 3, 13)
}

fn harness_with(transport: RecordingTransport, store: Option<Arc<dyn EventStore>>) -> Harness {
    harness_with_policy(transport, store, RetryPolicy::new(1, Duration::ZERO))
}

fn harness_with_policy(
    transport: RecordingTransport,
    store: Option<Arc<dyn EventStore>>,
    policy: RetryPolicy,
) -> Harness {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn EventStore> = match store {
        Some(store) => store,
        None => Arc::new(SqliteEventStore::open(dir.path().join("events.db")).unwrap()),
    };
    let scratch = ScratchDir::new(dir.path().join("scratch"));
    scratch.prepare().unwrap();

    let transport = Arc::new(transport);
    let sender = RetryingSender::new(transport.clone(), policy);
    let ctx = Arc::new(ServiceContext {
        store: store.clone(),
        sender,
        scratch: scratch.clone(),
        currency: "UAH".to_string(),
    });

    Harness {
        _dir: dir,
        scratch,
        store,
        transport,
        ctx,
    }
}

fn harness() -> Harness {
    harness_with(RecordingTransport::default(), None)
}

fn request(kind: ReportKind, purpose: Purpose, period: PeriodSelection) -> GenerationRequest {
    GenerationRequest {
        chat_id: CHAT,
        kind,
        purpose,
        period,
        today: fixed_today(),
    }
}

fn scratch_is_empty(scratch: &ScratchDir) -> bool {
    std::fs::read_dir(scratch.path()).unwrap().count() == 0
}

async fn seed_sales(store: &dyn EventStore) {
    for (name, amount, date) in [
        ("Laptop", 30_000.0, day(2024, 3, 1)),
        ("Laptop", 12_500.5, day(2024, 3, 2)),
        ("Tablet", 9_000.0, day(2024, 3, 2)),
    ] {
        store
            .record_sale(NewSale {
                product_id: 1,
                product_name: name.to_string(),
                amount,
                occurred_on: date,
                actor_id: 7,
            })
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_empty_window_sends_exactly_one_notice() {
    let h = harness();
    let run = DeliveryPipeline::new(h.ctx.clone())
        .run(request(
            ReportKind::Sales,
            Purpose::Report,
            PeriodSelection::Token(PeriodToken::Month),
        ))
        .await;

    assert_eq!(run.outcome, PipelineOutcome::NoData);
    assert_eq!(
        run.trace,
        vec![
            PipelineState::Requested,
            PipelineState::RangeResolved,
            PipelineState::Aggregated,
            PipelineState::Empty,
        ]
    );
    assert_eq!(
        h.transport.sent(),
        vec![Sent::Text("📭 No sales data for this month.".to_string())]
    );
    assert!(scratch_is_empty(&h.scratch));
}

#[tokio::test]
async fn test_report_sends_chart_then_csv_then_ack() {
    let h = harness();
    seed_sales(h.store.as_ref()).await;

    let run = DeliveryPipeline::new(h.ctx.clone())
        .run(request(
            ReportKind::Sales,
            Purpose::Report,
            PeriodSelection::Token(PeriodToken::Month),
        ))
        .await;

    assert_eq!(run.outcome, PipelineOutcome::Delivered);
    assert_eq!(
        run.trace,
        vec![
            PipelineState::Requested,
            PipelineState::RangeResolved,
            PipelineState::Aggregated,
            PipelineState::Rendered,
            PipelineState::Exported,
            PipelineState::Delivering,
            PipelineState::Cleaned,
            PipelineState::Done,
        ]
    );

    let sent = h.transport.sent();
    assert_eq!(sent.len(), 3);
    match &sent[0] {
        Sent::Image(image) => {
            assert!(image.file_name.starts_with("sales_chart_"));
            assert!(image.file_name.ends_with(".png"));
            assert_eq!(&image.bytes[..4], &[0x89, b'P', b'N', b'G']);
        }
        other => panic!("expected chart first, got {:?}", other),
    }
    match &sent[1] {
        Sent::Document(doc) => {
            assert!(doc
                .file_name
                .starts_with("sales_report_2024-03-01_to_2024-03-31_"));
            let csv = String::from_utf8(doc.bytes.clone()).unwrap();
            assert!(csv.starts_with("category,date,value"));
            assert!(csv.contains("Laptop,2024-03-02,12500.5"));
            assert!(csv.contains("Tablet,2024-03-02,9000"));
        }
        other => panic!("expected CSV second, got {:?}", other),
    }
    assert_eq!(sent[2], Sent::Text("✅ Report generated successfully!".to_string()));
    assert!(scratch_is_empty(&h.scratch));
}

#[tokio::test]
async fn test_stats_send_summary_before_chart() {
    let h = harness();
    let at = day(2024, 3, 12).and_hms_opt(10, 0, 0).unwrap();
    h.store
        .upsert_participant_at(&ParticipantProfile::new(7).with_username("ann"), at)
        .await
        .unwrap();
    h.store.record_activity_at(7, "report", None, at).await.unwrap();
    h.store.record_activity_at(7, "stats", None, at).await.unwrap();

    let run = DeliveryPipeline::new(h.ctx.clone())
        .run(request(
            ReportKind::Activity,
            Purpose::Stats,
            PeriodSelection::Token(PeriodToken::Week),
        ))
        .await;

    assert_eq!(run.outcome, PipelineOutcome::Delivered);
    assert!(!run.trace.contains(&PipelineState::Exported));

    let sent = h.transport.sent();
    assert_eq!(sent.len(), 3);
    match &sent[0] {
        Sent::Text(summary) => {
            assert!(summary.starts_with("📊 Activity statistics for this week:"));
            assert!(summary.contains("📈 Total actions: 2"));
            assert!(summary.contains("- ann: 2 actions"));
        }
        other => panic!("expected summary first, got {:?}", other),
    }
    assert!(matches!(sent[1], Sent::Image(_)));
    assert_eq!(sent[2], Sent::Text("✅ Statistics loaded successfully!".to_string()));
}

#[tokio::test]
async fn test_inverted_custom_range_is_rejected() {
    let h = harness();
    seed_sales(h.store.as_ref()).await;

    let run = DeliveryPipeline::new(h.ctx.clone())
        .run(request(
            ReportKind::Sales,
            Purpose::Report,
            PeriodSelection::Custom("2024-03-10 - 2024-03-01".to_string()),
        ))
        .await;

    assert!(matches!(run.outcome, PipelineOutcome::Rejected(_)));
    assert_eq!(
        run.trace,
        vec![PipelineState::Requested, PipelineState::Errored]
    );
    assert_eq!(h.transport.texts().len(), 1);
    assert!(!h
        .transport
        .sent()
        .iter()
        .any(|s| matches!(s, Sent::Image(_) | Sent::Document(_))));
}

#[tokio::test]
async fn test_store_failure_reports_then_cleans_up_and_acks() {
    let h = harness_with(RecordingTransport::default(), Some(Arc::new(UnavailableStore)));

    let run = DeliveryPipeline::new(h.ctx.clone())
        .run(request(
            ReportKind::Sales,
            Purpose::Report,
            PeriodSelection::Token(PeriodToken::Day),
        ))
        .await;

    assert!(matches!(run.outcome, PipelineOutcome::Failed(_)));
    assert_eq!(
        &run.trace[run.trace.len() - 3..],
        &[
            PipelineState::Errored,
            PipelineState::Cleaned,
            PipelineState::Done,
        ]
    );
    let texts = h.transport.texts();
    assert_eq!(texts.len(), 2);
    assert!(texts[0].starts_with("⚠️ Failed to generate the report"));
    assert_eq!(texts[1], "✅ Report generated successfully!");
}

#[tokio::test]
async fn test_send_failure_still_removes_artifacts() {
    let transport = RecordingTransport {
        fail_images: true,
        ..Default::default()
    };
    let h = harness_with(transport, None);
    seed_sales(h.store.as_ref()).await;

    let run = DeliveryPipeline::new(h.ctx.clone())
        .run(request(
            ReportKind::Sales,
            Purpose::Report,
            PeriodSelection::Token(PeriodToken::Month),
        ))
        .await;

    assert!(matches!(run.outcome, PipelineOutcome::Failed(_)));
    assert!(run.trace.contains(&PipelineState::Delivering));
    assert_eq!(run.trace.last(), Some(&PipelineState::Done));
    assert!(scratch_is_empty(&h.scratch));
    assert!(!h
        .transport
        .sent()
        .iter()
        .any(|s| matches!(s, Sent::Document(_))));
}

fn month_report() -> GenerationRequest {
    request(
        ReportKind::Sales,
        Purpose::Report,
        PeriodSelection::Token(PeriodToken::Month),
    )
}

#[tokio::test]
async fn test_failed_ack_still_counts_as_delivered() {
    let transport = RecordingTransport {
        fail_text_prefix: Some("✅"),
        ..Default::default()
    };
    let h = harness_with(transport, None);
    seed_sales(h.store.as_ref()).await;

    let run = DeliveryPipeline::new(h.ctx.clone()).run(month_report()).await;

    assert_eq!(run.outcome, PipelineOutcome::Delivered);
    assert_eq!(
        &run.trace[run.trace.len() - 2..],
        &[PipelineState::Cleaned, PipelineState::Done]
    );
    assert!(h.transport.texts().is_empty());
    assert_eq!(h.transport.sent().len(), 2);
    assert!(scratch_is_empty(&h.scratch));
}

#[tokio::test]
async fn test_failed_error_notice_still_cleans_up_and_acks() {
    let transport = RecordingTransport {
        fail_text_prefix: Some("⚠️"),
        ..Default::default()
    };
    let h = harness_with(transport, Some(Arc::new(UnavailableStore)));

    let run = DeliveryPipeline::new(h.ctx.clone()).run(month_report()).await;

    assert!(matches!(run.outcome, PipelineOutcome::Failed(_)));
    assert_eq!(
        &run.trace[run.trace.len() - 3..],
        &[
            PipelineState::Errored,
            PipelineState::Cleaned,
            PipelineState::Done,
        ]
    );
    assert_eq!(h.transport.texts(), vec!["✅ Report generated successfully!"]);
}

#[tokio::test]
async fn test_rate_limited_photo_waits_exactly_and_is_delivered() {
    let sleeper = Arc::new(RecordingSleeper::default());
    let transport = RecordingTransport {
        image_rate_limit: Mutex::new(Some(3)),
        ..Default::default()
    };
    // One attempt: the rate-limit wait must not use it up
    let policy = RetryPolicy::new(1, Duration::from_secs(1)).with_sleeper(sleeper.clone());
    let h = harness_with_policy(transport, None, policy);
    seed_sales(h.store.as_ref()).await;

    let run = DeliveryPipeline::new(h.ctx.clone()).run(month_report()).await;

    assert_eq!(run.outcome, PipelineOutcome::Delivered);
    assert_eq!(*sleeper.slept.lock().unwrap(), vec![Duration::from_secs(3)]);
    assert_eq!(h.transport.images(), 1);
    assert!(h.transport.image_rate_limit.lock().unwrap().is_none());
}

fn message(update_id: i64, text: &str) -> Update {
    serde_json::from_value(serde_json::json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id,
            "chat": {"id": CHAT},
            "from": {"id": 7, "is_bot": false, "first_name": "Ann", "username": "ann"},
            "text": text
        }
    }))
    .unwrap()
}

fn callback(update_id: i64, data: &str) -> Update {
    serde_json::from_value(serde_json::json!({
        "update_id": update_id,
        "callback_query": {
            "id": format!("cb{}", update_id),
            "from": {"id": 7, "is_bot": false, "first_name": "Ann", "username": "ann"},
            "message": {"message_id": 1, "chat": {"id": CHAT}},
            "data": data
        }
    }))
    .unwrap()
}

#[tokio::test]
async fn test_custom_range_flow_reprompts_then_generates() {
    let h = harness();
    let dispatcher =
        Dispatcher::new(h.ctx.clone(), Arc::new(SessionManager::new())).with_clock(fixed_today);

    dispatcher.handle_update(message(1, "/report")).await.unwrap();
    dispatcher.handle_update(callback(2, "report_sales")).await.unwrap();
    dispatcher.handle_update(callback(3, "period_custom")).await.unwrap();
    dispatcher.handle_update(message(4, "last week")).await.unwrap();
    dispatcher
        .handle_update(message(5, "2024-03-01 - 2024-03-05"))
        .await
        .unwrap();

    let texts = h.transport.texts();
    assert_eq!(texts[0], "📊 Which report would you like to build?");
    assert!(texts[1].starts_with("Selected report type: Sales"));
    assert!(texts[2].starts_with("📅 Enter the date range"));
    assert!(texts[3].starts_with("❌ Invalid date format"));
    assert_eq!(
        texts[4],
        "⏳ Generating sales report for period 2024-03-01 - 2024-03-05..."
    );
    assert_eq!(texts[5], "📭 No sales data for period 2024-03-01 - 2024-03-05.");
    assert_eq!(texts.len(), 6);

    // Session cleared: a late period press is ignored
    assert!(dispatcher.sessions().get(CHAT).await.is_none());
    dispatcher.handle_update(callback(6, "period_day")).await.unwrap();
    assert_eq!(h.transport.texts().len(), 6);

    let user = h.store.participant(7).await.unwrap().unwrap();
    assert_eq!(user.display_name, "ann");
}

#[tokio::test]
async fn test_stray_callback_without_session_is_ignored() {
    let h = harness();
    let dispatcher =
        Dispatcher::new(h.ctx.clone(), Arc::new(SessionManager::new())).with_clock(fixed_today);

    dispatcher.handle_update(callback(1, "period_week")).await.unwrap();
    dispatcher.handle_update(callback(2, "report_activity")).await.unwrap();

    assert!(h.transport.sent().is_empty());
    // The presser is still registered
    assert!(h.store.participant(7).await.unwrap().is_some());
}

#[tokio::test]
async fn test_store_outage_tells_the_user() {
    let h = harness_with(RecordingTransport::default(), Some(Arc::new(UnavailableStore)));
    let dispatcher =
        Dispatcher::new(h.ctx.clone(), Arc::new(SessionManager::new())).with_clock(fixed_today);

    dispatcher.handle_update(message(1, "/report")).await.unwrap();
    assert_eq!(
        h.transport.sent(),
        vec![Sent::Text(SERVICE_UNAVAILABLE.to_string())]
    );
    assert!(dispatcher.sessions().get(CHAT).await.is_none());

    // The button press is acknowledged before the store is touched
    dispatcher.handle_update(callback(2, "report_sales")).await.unwrap();
    assert_eq!(*h.transport.answered.lock().unwrap(), vec!["cb2".to_string()]);
    assert_eq!(h.transport.texts(), vec![SERVICE_UNAVAILABLE, SERVICE_UNAVAILABLE]);
}
