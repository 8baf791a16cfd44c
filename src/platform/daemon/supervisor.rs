use super::shutdown::{ShutdownOutcome, drain_workers};
use crate::config::{ChannelMonitorConfig, Config};
use crate::error::RetentionError;
use crate::retention::{
    BoundedHistoryQueue, EventRouter, HistoryBackfiller, LiveMessageTrimmer, ReadySignal,
    RouterExit, RouterHandle, TrimmerFeatures, TrimmerReport,
};
use crate::transport::slack::{ChatApi, EventFeed};
use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorSettings {
    /// Pending router registrations.
    pub router_buffer: usize,
    /// Pending live events per channel, and on the platform feed.
    pub channel_buffer: usize,
    pub shutdown_timeout: Duration,
}

impl SupervisorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            router_buffer: config.router_buffer,
            channel_buffer: config.channel_buffer,
            shutdown_timeout: config.shutdown_timeout(),
        }
    }
}

/// How a supervised task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    Finished,
    /// The process should shut down.
    CannotContinue(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub name: String,
    pub exit: WorkerExit,
}

/// Why `run_until_stopped` returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Interrupted,
    CannotContinue { worker: String, reason: String },
    AllFinished,
}

/// Owns every per-channel task plus the single event router.
pub struct Supervisor {
    api: Arc<dyn ChatApi>,
    feed: Option<Box<dyn EventFeed>>,
    router: Option<RouterHandle>,
    settings: SupervisorSettings,
    cancel: CancellationToken,
    workers: JoinSet<WorkerReport>,
}

impl Supervisor {
    pub fn new(
        api: Arc<dyn ChatApi>,
        feed: Box<dyn EventFeed>,
        settings: SupervisorSettings,
    ) -> Self {
        Self {
            api,
            feed: Some(feed),
            router: None,
            settings,
            cancel: CancellationToken::new(),
            workers: JoinSet::new(),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn router_started(&self) -> bool {
        self.router.is_some()
    }

    /// Handle to the event router, starting the feed and router on first use.
    fn ensure_router(&mut self) -> Result<RouterHandle> {
        if let Some(handle) = &self.router {
            return Ok(handle.clone());
        }

        let feed = self
            .feed
            .take()
            .context("event feed already consumed without a running router")?;
        let (feed_tx, feed_rx) = mpsc::channel(self.settings.channel_buffer.max(1));
        let (router, handle) =
            EventRouter::new(feed_rx, self.settings.router_buffer, self.cancel.clone());

        let cancel = self.cancel.clone();
        self.workers.spawn(async move {
            feed.run(feed_tx, cancel).await;
            WorkerReport {
                name: "event-feed".into(),
                exit: WorkerExit::Finished,
            }
        });
        self.workers.spawn(async move {
            let exit = match router.run().await {
                RouterExit::AuthRevoked => {
                    WorkerExit::CannotContinue("Slack credentials were revoked".into())
                }
                RouterExit::FeedClosed | RouterExit::Cancelled => WorkerExit::Finished,
            };
            WorkerReport {
                name: "event-router".into(),
                exit,
            }
        });

        tracing::info!("Event router started");
        self.router = Some(handle.clone());
        Ok(handle)
    }

    /// Start retention for one channel: a backfiller, plus a live trimmer
    /// when the channel wants live events.
    pub async fn monitor_channel(&mut self, channel: &ChannelMonitorConfig) -> Result<()> {
        let queue = BoundedHistoryQueue::new(channel.channel_id.clone());
        let ready = ReadySignal::new();

        if channel.needs_live_feed() {
            let router = self.ensure_router()?;
            let (events_tx, events_rx) = mpsc::channel(self.settings.channel_buffer.max(1));
            router
                .register(channel.channel_id.clone(), events_tx)
                .await
                .with_context(|| format!("register channel {}", channel.channel_name))?;

            let trimmer = LiveMessageTrimmer::new(
                Arc::clone(&self.api),
                queue.clone(),
                ready.clone(),
                events_rx,
                TrimmerFeatures {
                    monitor_size: channel.monitor_size,
                    log_messages: channel.log_messages,
                },
            );
            self.spawn_cancellable(format!("trimmer:{}", channel.channel_id), async move {
                trimmer_exit(trimmer.run().await)
            });
        }

        let backfiller =
            HistoryBackfiller::new(Arc::clone(&self.api), queue, ready, channel.backfill_size());
        let channel_id = channel.channel_id.clone();
        self.spawn_cancellable(format!("backfill:{channel_id}"), async move {
            // Fetch failures stay local to the channel.
            match backfiller.run().await {
                Ok(report) => tracing::debug!(%channel_id, ?report, "Backfill finished"),
                Err(error) => tracing::debug!(%channel_id, %error, "Backfill gave up"),
            }
            WorkerExit::Finished
        });

        Ok(())
    }

    fn spawn_cancellable<F>(&mut self, name: String, work: F)
    where
        F: Future<Output = WorkerExit> + Send + 'static,
    {
        let cancel = self.cancel.clone();
        self.workers.spawn(async move {
            let exit = tokio::select! {
                exit = work => exit,
                () = cancel.cancelled() => WorkerExit::Finished,
            };
            WorkerReport { name, exit }
        });
    }

    /// Wait for `stop`, a worker that cannot continue, or every worker finishing.
    pub async fn run_until_stopped<F>(&mut self, stop: F) -> StopReason
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(stop);

        loop {
            tokio::select! {
                () = &mut stop => return StopReason::Interrupted,
                joined = self.workers.join_next() => match joined {
                    None => return StopReason::AllFinished,
                    Some(Ok(WorkerReport { name, exit: WorkerExit::Finished })) => {
                        tracing::info!(worker = %name, "Worker finished");
                    }
                    Some(Ok(WorkerReport { name, exit: WorkerExit::CannotContinue(reason) })) => {
                        tracing::error!(worker = %name, %reason, "Worker cannot continue");
                        return StopReason::CannotContinue { worker: name, reason };
                    }
                    Some(Err(error)) => {
                        tracing::error!(%error, "Worker task failed");
                    }
                },
            }
        }
    }

    /// Broadcast cancellation, then give workers `shutdown_timeout` to finish.
    pub async fn shutdown(mut self) -> ShutdownOutcome {
        drain_workers(&mut self.workers, &self.cancel, self.settings.shutdown_timeout).await
    }
}

/// A trimmer error means the channel's window can no longer be kept.
fn trimmer_exit(result: Result<TrimmerReport, RetentionError>) -> WorkerExit {
    match result {
        Ok(_) => WorkerExit::Finished,
        Err(error) => WorkerExit::CannotContinue(error.to_string()),
    }
}
