//! Report Core - period → aggregate → chart / export
//!
//! ```text
//! PeriodSelection ──resolve──▶ DateRange
//!     ↓
//! Aggregator (EventStore range query) ──▶ AggregateTable (+ leaders)
//!     ├──▶ chart::render   → PNG bytes
//!     ├──▶ exporter::export → CSV bytes (reports)
//!     └──▶ stats::format_summary → text (stats)
//! ```

pub mod aggregator;
pub mod chart;
pub mod exporter;
pub mod kind;
pub mod period;
pub mod stats;
pub mod table;

pub use aggregator::{Aggregation, Aggregator, ParticipantTally};
pub use chart::RenderError;
pub use exporter::ExportError;
pub use kind::{Purpose, ReportKind};
pub use period::{DateRange, PeriodError, PeriodSelection, PeriodToken};
pub use table::{AggregateRow, AggregateTable};
