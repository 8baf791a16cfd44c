use super::types::{HistoryPage, HistoryRequest, MessageTs};
use crate::error::SlackApiError;
use std::future::Future;
use std::pin::Pin;

/// Largest page `conversations.history` will return in one call.
pub const HISTORY_PAGE_CAP: usize = 1000;

pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SlackApiError>> + Send + 'a>>;

/// History and deletion operations the retention engine needs from the chat platform.
pub trait ChatApi: Send + Sync {
    /// Fetch one page of channel history, newest message first.
    fn fetch_history_page<'a>(
        &'a self,
        channel_id: &'a str,
        request: &'a HistoryRequest,
    ) -> ApiFuture<'a, HistoryPage>;

    /// Delete a single message.
    fn delete_message<'a>(&'a self, channel_id: &'a str, ts: &'a MessageTs) -> ApiFuture<'a, ()>;
}
