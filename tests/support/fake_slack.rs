#![allow(dead_code)]

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use slack_janitor::error::SlackApiError;
use slack_janitor::transport::slack::{
    ApiFuture, ChatApi, EventFeed, HistoryMessage, HistoryPage, HistoryRequest, MessageEvent,
    MessageTs, SlackEvent,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const CHANNEL: &str = "C0JANITOR";

/// Identifier of the `i`-th message ever sent to the fake channel.
pub fn ts(i: usize) -> MessageTs {
    MessageTs::new(format!("1700000000.{i:06}"))
}

pub fn live_message(i: usize) -> MessageEvent {
    MessageEvent {
        channel: CHANNEL.into(),
        user: Some("U0CREW".into()),
        ts: ts(i),
        text: format!("message {i}"),
        subtype: None,
    }
}

#[derive(Default)]
struct State {
    /// Oldest first.
    history: Vec<MessageTs>,
    deleted: Vec<MessageTs>,
    requests: Vec<HistoryRequest>,
    fail_fetches_from: Option<usize>,
    undeletable: HashSet<MessageTs>,
}

/// In-memory single-channel Slack: newest-first pages, deletes remove messages.
#[derive(Clone, Default)]
pub struct FakeSlack {
    state: Arc<Mutex<State>>,
}

impl FakeSlack {
    /// Channel holding messages `0..count`.
    pub fn with_history(count: usize) -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().history = (0..count).map(ts).collect();
        fake
    }

    /// Every history call from the `n`-th onward (zero based) fails.
    pub fn fail_fetches_from(&self, n: usize) {
        self.state.lock().unwrap().fail_fetches_from = Some(n);
    }

    pub fn refuse_delete(&self, ts: MessageTs) {
        self.state.lock().unwrap().undeletable.insert(ts);
    }

    /// A new message appears in the channel.
    pub fn post(&self, ts: MessageTs) {
        self.state.lock().unwrap().history.push(ts);
    }

    pub fn deleted(&self) -> Vec<MessageTs> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn remaining(&self) -> Vec<MessageTs> {
        self.state.lock().unwrap().history.clone()
    }

    pub fn requests(&self) -> Vec<HistoryRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    fn page(&self, request: &HistoryRequest) -> Result<HistoryPage, SlackApiError> {
        let mut state = self.state.lock().unwrap();
        let call = state.requests.len();
        state.requests.push(request.clone());
        if state.fail_fetches_from.is_some_and(|n| call >= n) {
            return Err(SlackApiError::Api {
                method: "conversations.history",
                error: "fatal_error".into(),
            });
        }

        let older: Vec<&MessageTs> = state
            .history
            .iter()
            .filter(|ts| request.before.as_ref().is_none_or(|before| *ts < before))
            .collect();
        let messages: Vec<HistoryMessage> = older
            .iter()
            .rev()
            .take(request.limit)
            .map(|ts| HistoryMessage {
                ts: (*ts).clone(),
                user: Some("U0CREW".into()),
                text: String::new(),
                subtype: None,
            })
            .collect();
        let has_more = older.len() > messages.len();
        Ok(HistoryPage { messages, has_more })
    }

    fn remove(&self, ts: &MessageTs) -> Result<(), SlackApiError> {
        let mut state = self.state.lock().unwrap();
        if state.undeletable.contains(ts) {
            return Err(SlackApiError::Api {
                method: "chat.delete",
                error: "cant_delete_message".into(),
            });
        }
        let Some(position) = state.history.iter().position(|held| held == ts) else {
            return Err(SlackApiError::Api {
                method: "chat.delete",
                error: "message_not_found".into(),
            });
        };
        state.history.remove(position);
        state.deleted.push(ts.clone());
        Ok(())
    }
}

impl ChatApi for FakeSlack {
    fn fetch_history_page<'a>(
        &'a self,
        channel_id: &'a str,
        request: &'a HistoryRequest,
    ) -> ApiFuture<'a, HistoryPage> {
        assert_eq!(channel_id, CHANNEL);
        Box::pin(async move { self.page(request) })
    }

    fn delete_message<'a>(&'a self, channel_id: &'a str, ts: &'a MessageTs) -> ApiFuture<'a, ()> {
        assert_eq!(channel_id, CHANNEL);
        Box::pin(async move { self.remove(ts) })
    }
}

/// Event feed driven by the test through an mpsc sender.
pub struct ScriptedFeed {
    script: mpsc::Receiver<SlackEvent>,
}

impl ScriptedFeed {
    pub fn new() -> (Self, mpsc::Sender<SlackEvent>) {
        let (tx, rx) = mpsc::channel(64);
        (Self { script: rx }, tx)
    }
}

impl EventFeed for ScriptedFeed {
    fn run(
        mut self: Box<Self>,
        tx: mpsc::Sender<SlackEvent>,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            loop {
                let event = tokio::select! {
                    () = cancel.cancelled() => return,
                    event = self.script.recv() => event,
                };
                let Some(event) = event else { return };
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        })
    }
}

/// Poll `check` until it holds or a second passes.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
