//! Services shared by every request handler

use crate::delivery::{RetryingSender, ScratchDir};
use crate::store::EventStore;
use std::sync::Arc;

/// Built once at startup and passed to handlers; no process-wide globals
pub struct ServiceContext {
    pub store: Arc<dyn EventStore>,
    pub sender: RetryingSender,
    pub scratch: ScratchDir,
    /// Currency code appended to sales amounts
    pub currency: String,
}
