//! Slack data shapes shared by the Web API client, the RTM feed and the
//! retention engine.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Server-assigned message timestamp (`"1501234567.000200"`).
///
/// Unique per message within a channel and ordered by send time. Ordering
/// compares the seconds part numerically and the fractional part as text,
/// so identifiers of different widths still sort correctly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageTs(String);

impl MessageTs {
    pub fn new(ts: impl Into<String>) -> Self {
        Self(ts.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn parts(&self) -> (&str, &str) {
        let (secs, frac) = self.0.split_once('.').unwrap_or((self.0.as_str(), ""));
        (secs.trim_start_matches('0'), frac)
    }
}

impl Ord for MessageTs {
    fn cmp(&self, other: &Self) -> Ordering {
        let (secs, frac) = self.parts();
        let (other_secs, other_frac) = other.parts();
        secs.len()
            .cmp(&other_secs.len())
            .then_with(|| secs.cmp(other_secs))
            .then_with(|| frac.cmp(other_frac))
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for MessageTs {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MessageTs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageTs {
    fn from(ts: &str) -> Self {
        Self::new(ts)
    }
}

/// One message as returned by `conversations.history`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryMessage {
    pub ts: MessageTs,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub subtype: Option<String>,
}

/// One page of channel history, newest message first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryPage {
    pub messages: Vec<HistoryMessage>,
    pub has_more: bool,
}

impl HistoryPage {
    /// Oldest message on the page; the boundary for the next, older page.
    pub fn oldest(&self) -> Option<&MessageTs> {
        self.messages.last().map(|message| &message.ts)
    }
}

/// Which slice of history to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    /// Only messages strictly older than this. `None` starts from the newest message.
    pub before: Option<MessageTs>,
    pub limit: usize,
}

/// A live message event delivered over the RTM feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageEvent {
    pub channel: String,
    #[serde(default)]
    pub user: Option<String>,
    pub ts: MessageTs,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub subtype: Option<String>,
}

impl MessageEvent {
    /// Plain user messages carry no subtype; edits, joins and bot posts do.
    pub fn is_plain(&self) -> bool {
        self.subtype.as_deref().is_none_or(str::is_empty)
    }
}
