//! Record types persisted by the event store

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Storage format for activity timestamps and participant times.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Storage format for sale dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A recorded sale (immutable once written)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleEvent {
    pub id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub amount: f64,
    pub occurred_on: NaiveDate,
    pub actor_id: i64,
}

/// Sale payload before the store assigns an id
#[derive(Debug, Clone, PartialEq)]
pub struct NewSale {
    pub product_id: i64,
    pub product_name: String,
    pub amount: f64,
    pub occurred_on: NaiveDate,
    pub actor_id: i64,
}

/// Identity fields observed on every interaction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticipantProfile {
    pub actor_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl ParticipantProfile {
    pub fn new(actor_id: i64) -> Self {
        Self {
            actor_id,
            ..Default::default()
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_names(mut self, first: impl Into<String>, last: Option<String>) -> Self {
        self.first_name = Some(first.into());
        self.last_name = last;
        self
    }

    /// Username if set, else "first last", else the numeric id.
    pub fn display_name(&self) -> String {
        display_name_from_parts(
            self.actor_id,
            self.username.as_deref(),
            self.first_name.as_deref(),
            self.last_name.as_deref(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub actor_id: i64,
    pub display_name: String,
    pub first_seen_at: NaiveDateTime,
    pub last_active_at: NaiveDateTime,
}

/// A typed action performed by a participant (immutable once written)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: i64,
    pub actor_id: i64,
    pub action_type: String,
    pub occurred_at: NaiveDateTime,
    pub metadata: Option<String>,
}

pub(crate) fn display_name_from_parts(
    actor_id: i64,
    username: Option<&str>,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> String {
    if let Some(name) = username.map(str::trim).filter(|s| !s.is_empty()) {
        return name.to_string();
    }

    let joined = [first_name, last_name]
        .iter()
        .flatten()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if joined.is_empty() {
        actor_id.to_string()
    } else {
        joined
    }
}
