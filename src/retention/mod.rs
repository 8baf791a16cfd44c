//! Sliding-window retention engine: keeps each managed channel at its
//! configured number of most-recent messages.

mod backfill;
mod queue;
mod ready;
mod router;
mod trimmer;

pub use crate::transport::slack::MessageTs;
pub use backfill::{BackfillReport, HistoryBackfiller};
pub use queue::BoundedHistoryQueue;
pub use ready::{ReadyGuard, ReadySignal};
pub use router::{EventRecipient, EventRouter, RouterExit, RouterHandle, RouterState};
pub use trimmer::{LiveMessageTrimmer, TrimmerFeatures, TrimmerReport, TrimmerState};
