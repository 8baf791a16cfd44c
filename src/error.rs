use std::path::PathBuf;
use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for the janitor.
///
/// Each subsystem defines its own error variant. Startup code matches on
/// these to decide whether to exit; orchestration glue continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum JanitorError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Credentials ─────────────────────────────────────────────────────
    #[error("auth: {0}")]
    Auth(#[from] AuthError),

    // ── Slack Web API ───────────────────────────────────────────────────
    #[error("slack: {0}")]
    Slack(#[from] SlackApiError),

    // ── Retention engine ────────────────────────────────────────────────
    #[error("retention: {0}")]
    Retention(#[from] RetentionError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("validation failed: {0}")]
    Validation(String),
}

// ─── Credential errors ───────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("could not determine the home directory")]
    HomeDirUnavailable,

    #[error("failed to read credentials file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode credentials file {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no slack token available for user <{username}>")]
    MissingSlackToken { username: String },

    #[error("could not get user id for user <{username}>")]
    UnknownUser { username: String },
}

// ─── Slack Web API errors ────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SlackApiError {
    #[error("slack {method} request failed: {source}")]
    Transport {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("slack {method} failed with status {status}: {body}")]
    Status {
        method: &'static str,
        status: u16,
        body: String,
    },

    #[error("slack {method} failed: {error}")]
    Api { method: &'static str, error: String },

    #[error("failed to decode slack {method} response: {message}")]
    Decode {
        method: &'static str,
        message: String,
    },
}

impl SlackApiError {
    /// Whether the platform rejected our credentials rather than the request.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Api { error, .. } => matches!(
                error.as_str(),
                "invalid_auth"
                    | "not_authed"
                    | "account_inactive"
                    | "token_revoked"
                    | "token_expired"
            ),
            Self::Status { status, .. } => *status == 401,
            _ => false,
        }
    }
}

// ─── Live event decoding ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum EventDecodeError {
    #[error("event frame is not valid json: {0}")]
    Json(#[source] serde_json::Error),

    #[error("event frame has unexpected shape: {0}")]
    Shape(String),
}

// ─── Retention engine errors ─────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum RetentionError {
    #[error("channel {channel_id}: unable to get the channel history: {source}")]
    Fetch {
        channel_id: String,
        #[source]
        source: SlackApiError,
    },

    #[error("channel {channel_id}: history queue empty while trimming")]
    EmptyQueue { channel_id: String },

    #[error("channel {channel_id}: event router is no longer accepting registrations")]
    RouterClosed { channel_id: String },
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, JanitorError>;
