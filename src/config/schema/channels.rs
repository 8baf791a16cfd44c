use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One `[channels.<name>]` table as written in the configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChannelEntry {
    /// Number of most-recent messages to keep. Absent means the channel is not managed.
    #[serde(default)]
    pub size_limit: Option<i64>,
    /// Keep trimming live traffic after the initial cleanup.
    #[serde(default)]
    pub monitor_size: bool,
    /// Reserved: forward message content elsewhere. Accepted, not acted on.
    #[serde(default)]
    pub log_messages: bool,
}

/// Resolved, immutable per-channel settings handed to the retention engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMonitorConfig {
    pub channel_id: String,
    pub channel_name: String,
    pub retention_size: usize,
    pub monitor_size: bool,
    pub log_messages: bool,
}

impl ChannelMonitorConfig {
    /// Whether the channel needs a live trimmer subscribed to the event router.
    pub fn needs_live_feed(&self) -> bool {
        self.monitor_size || self.log_messages
    }

    /// Number of identifiers the backfill keeps.
    ///
    /// With live trimming the first live message pops one identifier, so the
    /// backfill keeps one extra to hold the window at `retention_size`.
    pub fn backfill_size(&self) -> usize {
        if self.monitor_size {
            self.retention_size.saturating_add(1)
        } else {
            self.retention_size
        }
    }
}

/// Match configured channel names against the workspace directory (name -> id).
///
/// Unknown names, missing limits and negative limits are logged and skipped.
pub fn resolve_channels(
    entries: &BTreeMap<String, ChannelEntry>,
    directory: &HashMap<String, String>,
) -> Vec<ChannelMonitorConfig> {
    let mut resolved = Vec::with_capacity(entries.len());
    for (name, entry) in entries {
        let Some(channel_id) = directory.get(name) else {
            tracing::warn!(channel = %name, "channel does not exist; skipping");
            continue;
        };

        let Some(size_limit) = entry.size_limit else {
            tracing::warn!(channel = %name, %channel_id, "no size-limit configured; skipping");
            continue;
        };
        let Ok(retention_size) = usize::try_from(size_limit) else {
            tracing::warn!(channel = %name, %channel_id, size_limit, "invalid size limit; skipping");
            continue;
        };

        tracing::info!(channel = %name, %channel_id, "found request for channel");
        resolved.push(ChannelMonitorConfig {
            channel_id: channel_id.clone(),
            channel_name: name.clone(),
            retention_size,
            monitor_size: entry.monitor_size,
            log_messages: entry.log_messages,
        });
    }
    resolved
}
