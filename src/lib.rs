//! tallybot - sales and activity reporting over a chat bot
//!
//! ```text
//! Telegram ──getUpdates──▶ bot::Dispatcher ──▶ delivery::DeliveryPipeline
//!                                                 ├─ report_core (period, aggregate, chart, CSV)
//!                                                 ├─ store (SQLite events)
//!                                                 └─ RetryingSender ──▶ Telegram
//! ```

pub mod bot;
pub mod config;
pub mod context;
pub mod delivery;
pub mod report_core;
pub mod store;
