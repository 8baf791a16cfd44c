use crate::error::RetentionError;
use crate::transport::slack::MessageTs;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// FIFO of message identifiers for one channel, oldest at the head.
///
/// The queue enforces no cap of its own; the trimmer's push-then-pop
/// discipline keeps its length at the retention size. Clones share the
/// same underlying sequence.
#[derive(Debug, Clone)]
pub struct BoundedHistoryQueue {
    channel_id: Arc<str>,
    entries: Arc<Mutex<VecDeque<MessageTs>>>,
}

impl BoundedHistoryQueue {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: Arc::from(channel_id.into()),
            entries: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<MessageTs>> {
        // Every critical section leaves the deque consistent, so a poisoned
        // lock still guards valid data.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, ts: MessageTs) {
        self.lock().push_back(ts);
    }

    /// Insert a page of older identifiers at the head.
    ///
    /// `newest_first` is in history-page order; after the call the head holds
    /// the oldest of them and the queue stays oldest-to-newest.
    pub fn prepend_older<'a>(&self, newest_first: impl IntoIterator<Item = &'a MessageTs>) {
        let mut entries = self.lock();
        for ts in newest_first {
            entries.push_front(ts.clone());
        }
    }

    /// Append `ts` only if it is newer than the current tail. Returns whether it was pushed.
    pub fn push_if_newer(&self, ts: MessageTs) -> bool {
        let mut entries = self.lock();
        if entries.back().is_some_and(|newest| *newest >= ts) {
            return false;
        }
        entries.push_back(ts);
        true
    }

    pub fn pop_oldest(&self) -> Result<MessageTs, RetentionError> {
        self.lock()
            .pop_front()
            .ok_or_else(|| RetentionError::EmptyQueue {
                channel_id: self.channel_id.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn newest(&self) -> Option<MessageTs> {
        self.lock().back().cloned()
    }

    /// Copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<MessageTs> {
        self.lock().iter().cloned().collect()
    }
}
