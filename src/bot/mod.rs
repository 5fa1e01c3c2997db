//! Bot surface - commands and button presses into generation requests
//!
//! ```text
//! getUpdates ──▶ run_polling ──spawn──▶ Dispatcher::handle_update
//!                                          ├─ SessionManager (kind → period → range)
//!                                          └─ DeliveryPipeline::run
//! ```

pub mod dispatcher;
pub mod keyboards;
pub mod polling;
pub mod session;

pub use dispatcher::{DispatchError, Dispatcher, SERVICE_UNAVAILABLE};
pub use polling::run_polling;
pub use session::{FlowStep, Session, SessionManager};
