//! Slack Web API and RTM plumbing.

pub mod api;
pub mod client;
pub mod events;
pub mod rtm;
pub mod types;

pub use api::{ApiFuture, ChatApi, HISTORY_PAGE_CAP};
pub use client::{AuthIdentity, RtmSession, SlackApiClient};
pub use events::SlackEvent;
pub use rtm::{EventFeed, RtmListener};
pub use types::{HistoryMessage, HistoryPage, HistoryRequest, MessageEvent, MessageTs};
