//! Aggregator - store range queries folded into AggregateTables

use super::kind::ReportKind;
use super::period::DateRange;
use super::table::AggregateTable;
use crate::store::{ActivityEvent, EventStore, SaleEvent, StoreError};
use std::collections::HashMap;
use std::sync::Arc;

/// How many participants the activity statistics list
pub const TOP_PARTICIPANTS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantTally {
    pub actor_id: i64,
    pub display_name: String,
    pub actions: u64,
}

/// Result of one aggregation pass
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub kind: ReportKind,
    pub range: DateRange,
    pub table: AggregateTable,
    /// Most active participants (activity only, empty for sales)
    pub leaders: Vec<ParticipantTally>,
}

impl Aggregation {
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Sum sale amounts per (product name, date)
pub fn sales_table(sales: &[SaleEvent]) -> AggregateTable {
    let mut table = AggregateTable::new();
    for sale in sales {
        table.add(&sale.product_name, sale.occurred_on, sale.amount);
    }
    table
}

/// Count activity events per (action type, calendar date)
pub fn activity_table(events: &[ActivityEvent]) -> AggregateTable {
    let mut table = AggregateTable::new();
    for event in events {
        table.add(&event.action_type, event.occurred_at.date(), 1.0);
    }
    table
}

/// Top `n` actors by event count; ties keep first-appearance order
pub fn top_participants(events: &[ActivityEvent], n: usize) -> Vec<(i64, u64)> {
    let mut order: Vec<i64> = Vec::new();
    let mut counts: HashMap<i64, u64> = HashMap::new();

    for event in events {
        let count = counts.entry(event.actor_id).or_insert_with(|| {
            order.push(event.actor_id);
            0
        });
        *count += 1;
    }

    let mut tallies: Vec<(i64, u64)> = order
        .into_iter()
        .map(|actor| (actor, counts[&actor]))
        .collect();
    // sort_by is stable
    tallies.sort_by(|a, b| b.1.cmp(&a.1));
    tallies.truncate(n);
    tallies
}

pub struct Aggregator {
    store: Arc<dyn EventStore>,
}

impl Aggregator {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Empty table (not an error) when no sale falls in the range
    pub async fn aggregate_sales(&self, range: &DateRange) -> Result<AggregateTable, StoreError> {
        let sales = self.store.sales_between(range).await?;
        log::debug!("📥 {} sales between {}", sales.len(), range);
        Ok(sales_table(&sales))
    }

    /// Table plus the stats-only leader board, with one store scan per kind
    pub async fn collect(
        &self,
        kind: ReportKind,
        range: &DateRange,
    ) -> Result<Aggregation, StoreError> {
        let (table, leaders) = match kind {
            ReportKind::Sales => (self.aggregate_sales(range).await?, Vec::new()),
            ReportKind::Activity => {
                let events = self.store.activity_between(range).await?;
                log::debug!("📥 {} activity events between {}", events.len(), range);
                let leaders = self
                    .name_leaders(top_participants(&events, TOP_PARTICIPANTS))
                    .await?;
                (activity_table(&events), leaders)
            }
        };

        Ok(Aggregation {
            kind,
            range: *range,
            table,
            leaders,
        })
    }

    async fn name_leaders(
        &self,
        tallies: Vec<(i64, u64)>,
    ) -> Result<Vec<ParticipantTally>, StoreError> {
        let mut leaders = Vec::with_capacity(tallies.len());
        for (actor_id, actions) in tallies {
            let display_name = match self.store.participant(actor_id).await? {
                Some(participant) => participant.display_name,
                None => actor_id.to_string(),
            };
            leaders.push(ParticipantTally {
                actor_id,
                display_name,
                actions,
            });
        }
        Ok(leaders)
    }
}
