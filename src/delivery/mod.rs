//! Delivery - getting generated artifacts to the requester
//!
//! ```text
//! DeliveryPipeline
//!     ├─ ScratchDir      (chart / CSV files awaiting upload)
//!     └─ RetryingSender  (RetryPolicy + Sleeper)
//!            └─ dyn Transport ── TelegramClient (reqwest)
//! ```

pub mod pipeline;
pub mod retry;
pub mod scratch;
pub mod sender;
pub mod telegram;
pub mod transport;

pub use pipeline::{
    DeliveryPipeline, GenerationRequest, PipelineError, PipelineOutcome, PipelineRun,
    PipelineState,
};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use scratch::{Artifact, ScratchDir};
pub use sender::RetryingSender;
pub use telegram::TelegramClient;
pub use transport::{Attachment, ChatId, InlineButton, Keyboard, KeyboardButton, Transport, TransportError};
