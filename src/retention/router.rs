use crate::error::RetentionError;
use crate::transport::slack::{MessageEvent, SlackEvent};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

/// A channel's trimmer asking to receive that channel's live messages.
#[derive(Debug)]
pub struct EventRecipient {
    pub channel_id: String,
    pub events: mpsc::Sender<MessageEvent>,
}

/// Cloneable handle for registering recipients with a running router.
#[derive(Debug, Clone)]
pub struct RouterHandle {
    registrations: mpsc::Sender<EventRecipient>,
}

impl RouterHandle {
    /// Route `channel_id`'s messages to `events`. A later registration for
    /// the same channel replaces the earlier one.
    pub async fn register(
        &self,
        channel_id: impl Into<String>,
        events: mpsc::Sender<MessageEvent>,
    ) -> Result<(), RetentionError> {
        let channel_id = channel_id.into();
        self.registrations
            .send(EventRecipient {
                channel_id: channel_id.clone(),
                events,
            })
            .await
            .map_err(|_| RetentionError::RouterClosed { channel_id })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterState {
    Connecting,
    Listening,
    Terminated,
}

impl fmt::Display for RouterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connecting => "connecting",
            Self::Listening => "listening",
            Self::Terminated => "terminated",
        })
    }
}

/// Why the router stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterExit {
    FeedClosed,
    AuthRevoked,
    Cancelled,
}

/// Single loop fanning the platform event feed out to per-channel trimmers.
pub struct EventRouter {
    feed: mpsc::Receiver<SlackEvent>,
    registrations: mpsc::Receiver<EventRecipient>,
    recipients: HashMap<String, mpsc::Sender<MessageEvent>>,
    state: RouterState,
    cancel: CancellationToken,
}

impl EventRouter {
    pub fn new(
        feed: mpsc::Receiver<SlackEvent>,
        buffer: usize,
        cancel: CancellationToken,
    ) -> (Self, RouterHandle) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let router = Self {
            feed,
            registrations: rx,
            recipients: HashMap::new(),
            state: RouterState::Connecting,
            cancel,
        };
        (router, RouterHandle { registrations: tx })
    }

    fn transition(&mut self, next: RouterState) {
        if self.state != next {
            tracing::debug!(from = %self.state, to = %next, "Router state change");
            self.state = next;
        }
    }

    pub async fn run(mut self) -> RouterExit {
        let mut registrations_open = true;

        let exit = loop {
            tokio::select! {
                biased;

                registration = self.registrations.recv(), if registrations_open => {
                    match registration {
                        Some(recipient) => self.register(recipient),
                        None => registrations_open = false,
                    }
                }
                event = self.feed.recv() => {
                    let Some(event) = event else {
                        tracing::warn!("Slack event feed closed");
                        break RouterExit::FeedClosed;
                    };
                    if let Some(exit) = self.dispatch(event) {
                        break exit;
                    }
                }
                () = self.cancel.cancelled() => break RouterExit::Cancelled,
            }
        };

        self.transition(RouterState::Terminated);
        exit
    }

    fn register(&mut self, recipient: EventRecipient) {
        tracing::info!(channel_id = %recipient.channel_id, "Channel registered for live events");
        self.recipients.insert(recipient.channel_id, recipient.events);
    }

    fn dispatch(&mut self, event: SlackEvent) -> Option<RouterExit> {
        match event {
            SlackEvent::Hello => {
                tracing::info!("Slack said hello");
                self.transition(RouterState::Listening);
            }
            SlackEvent::Connected { connection_count } => {
                tracing::info!(connection_count, "Connected to Slack");
                self.transition(RouterState::Listening);
            }
            SlackEvent::LatencyReport(latency) => {
                tracing::debug!(latency_ms = latency.as_millis(), "Current latency");
            }
            SlackEvent::ProtocolError { code, message } => {
                tracing::warn!(code, %message, "Slack RTM error");
            }
            SlackEvent::InvalidAuth => {
                tracing::error!("Invalid credentials; cannot continue");
                return Some(RouterExit::AuthRevoked);
            }
            SlackEvent::Message(message) => self.forward(message),
            SlackEvent::Other(kind) => tracing::trace!(%kind, "Ignoring event"),
        }
        None
    }

    /// Hand a live message to its channel without waiting; a full channel
    /// buffer drops the message so other channels keep flowing.
    fn forward(&mut self, message: MessageEvent) {
        if !message.is_plain() {
            return;
        }
        let Some(recipient) = self.recipients.get(&message.channel) else {
            return;
        };
        let channel_id = message.channel.clone();
        match recipient.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                tracing::warn!(%channel_id, ts = %dropped.ts, "Channel buffer full; dropping live message");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(%channel_id, "Trimmer stopped listening; unregistering channel");
                self.recipients.remove(&channel_id);
            }
        }
    }
}
