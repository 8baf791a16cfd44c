use super::client::SlackApiClient;
use super::events::{RtmFrame, SlackEvent, decode_frame};
use anyhow::{Context, Result};
use futures_util::{Sink, SinkExt, StreamExt};
use serde_json::json;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

const INITIAL_BACKOFF_SECS: u64 = 1;
const MAX_BACKOFF_SECS: u64 = 60;

/// Source of live platform events feeding the event router.
///
/// The feed stops when `tx` is closed or `cancel` fires; dropping `tx` on
/// return closes the router's input.
pub trait EventFeed: Send {
    fn run(
        self: Box<Self>,
        tx: mpsc::Sender<SlackEvent>,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = ()> + Send>>;
}

/// How one websocket session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// The server closed or said goodbye; connect again.
    Reconnect,
    /// The router stopped listening.
    FeedClosed,
    Cancelled,
}

/// Keeps an RTM websocket open, reconnecting with backoff, and forwards decoded events.
pub struct RtmListener {
    client: Arc<SlackApiClient>,
    ping_interval: Duration,
    connection_count: u64,
    next_ping_id: u64,
}

impl RtmListener {
    pub fn new(client: Arc<SlackApiClient>, ping_interval: Duration) -> Self {
        Self {
            client,
            ping_interval,
            connection_count: 0,
            next_ping_id: 1,
        }
    }

    pub async fn listen(mut self, tx: mpsc::Sender<SlackEvent>, cancel: CancellationToken) {
        let mut backoff = INITIAL_BACKOFF_SECS;

        loop {
            if cancel.is_cancelled() || tx.is_closed() {
                return;
            }

            tracing::info!("Connecting to RTM");
            let session = match self.client.connect_rtm().await {
                Ok(session) => session,
                Err(error) if error.is_auth_failure() => {
                    tracing::error!(%error, "RTM connection rejected credentials");
                    let _ = tx.send(SlackEvent::InvalidAuth).await;
                    return;
                }
                Err(error) => {
                    tracing::warn!(%error, backoff_secs = backoff, "RTM connect failed; retrying");
                    if !sleep_or_cancel(Duration::from_secs(backoff), &cancel).await {
                        return;
                    }
                    backoff = backoff.saturating_mul(2).min(MAX_BACKOFF_SECS);
                    continue;
                }
            };

            match self.run_session(&session.url, &tx, &cancel).await {
                Ok(SessionEnd::Reconnect) => {
                    tracing::warn!("RTM socket closed; reconnecting");
                    backoff = INITIAL_BACKOFF_SECS;
                }
                Ok(SessionEnd::FeedClosed | SessionEnd::Cancelled) => return,
                Err(error) => {
                    tracing::warn!(error = %format!("{error:#}"), "RTM session error; reconnecting");
                }
            }

            if !sleep_or_cancel(Duration::from_secs(backoff), &cancel).await {
                return;
            }
            backoff = backoff.saturating_mul(2).min(MAX_BACKOFF_SECS);
        }
    }

    async fn run_session(
        &mut self,
        url: &str,
        tx: &mpsc::Sender<SlackEvent>,
        cancel: &CancellationToken,
    ) -> Result<SessionEnd> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .context("connect Slack RTM websocket")?;
        let (mut write, mut read) = ws_stream.split();

        self.connection_count += 1;
        let connected = SlackEvent::Connected {
            connection_count: self.connection_count,
        };
        if tx.send(connected).await.is_err() {
            return Ok(SessionEnd::FeedClosed);
        }

        let mut ping = interval(self.ping_interval);
        // The first tick completes immediately; skip it so pings start one interval in.
        ping.tick().await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(SessionEnd::Cancelled);
                }
                _ = ping.tick() => {
                    self.send_ping(&mut write).await?;
                }
                message = read.next() => {
                    let Some(message) = message else {
                        return Ok(SessionEnd::Reconnect);
                    };
                    let message = message.context("read Slack RTM message")?;
                    match message {
                        Message::Text(text) => {
                            if let Some(end) = forward_frame(&text, tx).await {
                                return Ok(end);
                            }
                        }
                        Message::Close(frame) => {
                            tracing::debug!(?frame, "RTM close frame");
                            return Ok(SessionEnd::Reconnect);
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    async fn send_ping<WsSink>(&mut self, write: &mut WsSink) -> Result<()>
    where
        WsSink: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    {
        let payload = json!({
            "id": self.next_ping_id,
            "type": "ping",
            "time": chrono::Utc::now().timestamp_millis(),
        });
        self.next_ping_id += 1;
        write
            .send(Message::Text(payload.to_string().into()))
            .await
            .context("send Slack RTM ping")
    }
}

impl EventFeed for RtmListener {
    fn run(
        self: Box<Self>,
        tx: mpsc::Sender<SlackEvent>,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(self.listen(tx, cancel))
    }
}

/// Decode one text frame and pass it on. Returns how the session should end, if it should.
async fn forward_frame(text: &str, tx: &mpsc::Sender<SlackEvent>) -> Option<SessionEnd> {
    let decoded = match decode_frame(text) {
        Ok(decoded) => decoded,
        Err(error) => {
            tracing::warn!(%error, "dropping undecodable RTM frame");
            return None;
        }
    };

    let event = match decoded.frame {
        RtmFrame::Goodbye => return Some(SessionEnd::Reconnect),
        RtmFrame::Pong { time } => time.map(latency_since).map(SlackEvent::LatencyReport),
        _ => decoded.into_event(),
    };

    match event {
        Some(event) => tx
            .send(event)
            .await
            .is_err()
            .then_some(SessionEnd::FeedClosed),
        None => None,
    }
}

fn latency_since(sent_at_ms: i64) -> Duration {
    let elapsed = chrono::Utc::now().timestamp_millis().saturating_sub(sent_at_ms);
    Duration::from_millis(u64::try_from(elapsed).unwrap_or(0))
}

/// Sleep unless cancelled first. Returns false on cancellation.
async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}
