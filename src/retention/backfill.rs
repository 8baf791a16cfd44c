use super::queue::BoundedHistoryQueue;
use super::ready::ReadySignal;
use crate::error::RetentionError;
use crate::transport::slack::{ChatApi, HISTORY_PAGE_CAP, HistoryPage, HistoryRequest, MessageTs};
use std::sync::Arc;

/// Counters from one backfill pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub pages: usize,
    pub pushed: usize,
    pub deleted: usize,
    pub failed_deletes: usize,
}

/// Where phase one stopped.
enum Window {
    /// History ran out before the window filled.
    Exhausted,
    /// The window is full; everything older than `before` goes.
    Filled { before: Option<MessageTs> },
}

/// Establishes a channel's retained window at startup.
///
/// Phase one walks history newest-first and queues up to `retention`
/// identifiers, each older page ahead of the newer ones. Phase two deletes
/// everything older than that window. The ready signal fires when `run` returns, whatever the outcome.
pub struct HistoryBackfiller {
    channel_id: String,
    api: Arc<dyn ChatApi>,
    queue: BoundedHistoryQueue,
    ready: ReadySignal,
    retention: usize,
}

impl HistoryBackfiller {
    pub fn new(
        api: Arc<dyn ChatApi>,
        queue: BoundedHistoryQueue,
        ready: ReadySignal,
        retention: usize,
    ) -> Self {
        Self {
            channel_id: queue.channel_id().to_string(),
            api,
            queue,
            ready,
            retention,
        }
    }

    pub async fn run(self) -> Result<BackfillReport, RetentionError> {
        let _ready = self.ready.guard();
        let mut report = BackfillReport::default();

        tracing::info!(
            channel_id = %self.channel_id,
            retention = self.retention,
            "Cleaning channel history"
        );

        let Window::Filled { before } = self.fill_window(&mut report).await? else {
            tracing::info!(
                channel_id = %self.channel_id,
                kept = report.pushed,
                "History is within the retention size; nothing to delete"
            );
            return Ok(report);
        };

        self.delete_older(before, &mut report).await?;

        tracing::info!(
            channel_id = %self.channel_id,
            kept = report.pushed,
            deleted = report.deleted,
            failed = report.failed_deletes,
            "Channel history cleaned"
        );
        Ok(report)
    }

    async fn fill_window(&self, report: &mut BackfillReport) -> Result<Window, RetentionError> {
        let mut remaining = self.retention;
        let mut before: Option<MessageTs> = None;

        while remaining > 0 {
            let request = HistoryRequest {
                before: before.clone(),
                limit: remaining.min(HISTORY_PAGE_CAP),
            };
            let page = self.fetch(&request).await?;
            report.pages += 1;

            // Each page is older than everything already queued.
            self.queue
                .prepend_older(page.messages.iter().map(|message| &message.ts));
            report.pushed += page.messages.len();
            remaining = remaining.saturating_sub(page.messages.len());

            tracing::debug!(
                channel_id = %self.channel_id,
                fetched = page.messages.len(),
                remaining,
                "Retained history page"
            );

            match page.oldest() {
                Some(oldest) if page.has_more => before = Some(oldest.clone()),
                _ => return Ok(Window::Exhausted),
            }
        }

        Ok(Window::Filled { before })
    }

    /// Phase two: delete every message strictly older than `before`.
    async fn delete_older(
        &self,
        mut before: Option<MessageTs>,
        report: &mut BackfillReport,
    ) -> Result<(), RetentionError> {
        loop {
            let request = HistoryRequest {
                before: before.clone(),
                limit: HISTORY_PAGE_CAP,
            };
            let page = self.fetch(&request).await?;
            report.pages += 1;

            for message in &page.messages {
                match self.api.delete_message(&self.channel_id, &message.ts).await {
                    Ok(()) => report.deleted += 1,
                    Err(error) => {
                        report.failed_deletes += 1;
                        tracing::warn!(
                            channel_id = %self.channel_id,
                            ts = %message.ts,
                            %error,
                            "Unable to delete message"
                        );
                    }
                }
            }

            tracing::debug!(
                channel_id = %self.channel_id,
                deleted = report.deleted,
                "Deleted history page"
            );

            match page.oldest() {
                Some(oldest) if page.has_more => before = Some(oldest.clone()),
                _ => return Ok(()),
            }
        }
    }

    async fn fetch(&self, request: &HistoryRequest) -> Result<HistoryPage, RetentionError> {
        self.api
            .fetch_history_page(&self.channel_id, request)
            .await
            .map_err(|source| {
                let error = RetentionError::Fetch {
                    channel_id: self.channel_id.clone(),
                    source,
                };
                tracing::error!(channel_id = %self.channel_id, %error, "Backfill aborted");
                error
            })
    }
}
