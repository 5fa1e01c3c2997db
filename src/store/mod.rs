//! Event Store - durable record of sales, participants and their actions
//!
//! ```text
//! dispatcher ──upsert/record──▶ EventStore ◀──range queries── Aggregator
//!                                   │
//!                          SqliteEventStore (WAL)
//! ```
//!
//! Range queries are inclusive on both bounds. Activity queries extend the
//! end date to 23:59:59 because activity carries a time of day.

pub mod seed;
pub mod sqlite_store;
pub mod types;

pub use seed::seed_demo_sales;
pub use sqlite_store::SqliteEventStore;
pub use types::{ActivityEvent, NewSale, Participant, ParticipantProfile, SaleEvent};

use crate::report_core::period::DateRange;
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, Timelike};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying storage could not be reached or failed mid-query.
    /// Fatal for the current request, never retried.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid sale: {0}")]
    InvalidSale(String),

    #[error("unknown participant: {0}")]
    UnknownParticipant(i64),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Queryable store consumed by the report pipeline and the bot surface
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert a sale and return its surrogate id
    async fn record_sale(&self, sale: NewSale) -> Result<i64, StoreError>;

    /// Insert or refresh a participant as of `at`
    ///
    /// `last_active_at` never moves backwards.
    async fn upsert_participant_at(
        &self,
        profile: &ParticipantProfile,
        at: NaiveDateTime,
    ) -> Result<(), StoreError>;

    /// Insert an activity event as of `at` and touch the owner's `last_active_at`
    async fn record_activity_at(
        &self,
        actor_id: i64,
        action_type: &str,
        metadata: Option<&str>,
        at: NaiveDateTime,
    ) -> Result<i64, StoreError>;

    async fn sales_between(&self, range: &DateRange) -> Result<Vec<SaleEvent>, StoreError>;

    async fn activity_between(&self, range: &DateRange) -> Result<Vec<ActivityEvent>, StoreError>;

    async fn participant(&self, actor_id: i64) -> Result<Option<Participant>, StoreError>;

    /// Remove every sale (demo reseeding only)
    async fn clear_sales(&self) -> Result<usize, StoreError>;

    async fn upsert_participant(&self, profile: &ParticipantProfile) -> Result<(), StoreError> {
        self.upsert_participant_at(profile, now()).await
    }

    async fn record_activity(
        &self,
        actor_id: i64,
        action_type: &str,
        metadata: Option<&str>,
    ) -> Result<i64, StoreError> {
        self.record_activity_at(actor_id, action_type, metadata, now())
            .await
    }
}

/// Local wall-clock time truncated to whole seconds (storage precision)
pub fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}
