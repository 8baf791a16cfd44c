use super::queue::BoundedHistoryQueue;
use super::ready::ReadySignal;
use crate::error::RetentionError;
use crate::transport::slack::{ChatApi, MessageEvent};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimmerState {
    AwaitingBackfill,
    Active,
    Closed,
}

impl fmt::Display for TrimmerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AwaitingBackfill => "awaiting-backfill",
            Self::Active => "active",
            Self::Closed => "closed",
        })
    }
}

/// Which live behaviours are switched on for a channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrimmerFeatures {
    pub monitor_size: bool,
    pub log_messages: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrimmerReport {
    pub received: usize,
    /// Live identifiers the queue already covered.
    pub skipped: usize,
    pub deleted: usize,
    pub failed_deletes: usize,
}

/// Keeps a channel at its retention size once the backfill has settled.
///
/// Every live message pushes its identifier and pops the oldest one, whose
/// message is then deleted. Nothing is popped before the ready signal fires.
pub struct LiveMessageTrimmer {
    channel_id: String,
    api: Arc<dyn ChatApi>,
    queue: BoundedHistoryQueue,
    ready: ReadySignal,
    events: mpsc::Receiver<MessageEvent>,
    features: TrimmerFeatures,
    state: TrimmerState,
}

impl LiveMessageTrimmer {
    pub fn new(
        api: Arc<dyn ChatApi>,
        queue: BoundedHistoryQueue,
        ready: ReadySignal,
        events: mpsc::Receiver<MessageEvent>,
        features: TrimmerFeatures,
    ) -> Self {
        Self {
            channel_id: queue.channel_id().to_string(),
            api,
            queue,
            ready,
            events,
            features,
            state: TrimmerState::AwaitingBackfill,
        }
    }

    fn transition(&mut self, next: TrimmerState) {
        tracing::debug!(
            channel_id = %self.channel_id,
            from = %self.state,
            to = %next,
            "Trimmer state change"
        );
        self.state = next;
    }

    /// Runs until the event feed closes. An empty queue at pop time is fatal.
    pub async fn run(mut self) -> Result<TrimmerReport, RetentionError> {
        let mut report = TrimmerReport::default();

        self.ready.wait().await;
        self.transition(TrimmerState::Active);
        tracing::info!(
            channel_id = %self.channel_id,
            window = self.queue.len(),
            "Monitoring channel"
        );

        while let Some(event) = self.events.recv().await {
            report.received += 1;
            if let Err(error) = self.handle(&event, &mut report).await {
                self.transition(TrimmerState::Closed);
                tracing::error!(channel_id = %self.channel_id, %error, "Trimmer cannot continue");
                return Err(error);
            }
        }

        self.transition(TrimmerState::Closed);
        tracing::info!(
            channel_id = %self.channel_id,
            deleted = report.deleted,
            "Event feed closed; trimmer stopped"
        );
        Ok(report)
    }

    async fn handle(
        &self,
        event: &MessageEvent,
        report: &mut TrimmerReport,
    ) -> Result<(), RetentionError> {
        if self.features.log_messages {
            tracing::debug!(
                channel_id = %self.channel_id,
                ts = %event.ts,
                user = event.user.as_deref().unwrap_or("-"),
                "Message logging requested but not supported"
            );
        }

        if !self.features.monitor_size {
            return Ok(());
        }

        if !self.queue.push_if_newer(event.ts.clone()) {
            report.skipped += 1;
            tracing::debug!(
                channel_id = %self.channel_id,
                ts = %event.ts,
                "Live message already tracked; skipping"
            );
            return Ok(());
        }

        let oldest = self.queue.pop_oldest()?;
        match self.api.delete_message(&self.channel_id, &oldest).await {
            Ok(()) => report.deleted += 1,
            Err(error) => {
                report.failed_deletes += 1;
                tracing::warn!(
                    channel_id = %self.channel_id,
                    ts = %oldest,
                    %error,
                    "Unable to delete message"
                );
            }
        }
        Ok(())
    }
}
