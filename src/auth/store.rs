use crate::error::AuthError;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AmqpCredentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Decoded credentials document.
///
/// Only the slack section is consumed here; the other sections are shared
/// with sibling tools and are accepted so a complete file still decodes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialStore {
    #[serde(default)]
    pub amqp: Option<AmqpCredentials>,
    /// username -> token
    #[serde(default)]
    pub slack: HashMap<String, String>,
    #[serde(default)]
    pub google: Option<serde_json::Value>,
}

impl CredentialStore {
    pub fn load_from_disk(path: &Path) -> Result<Self, AuthError> {
        let contents = fs::read_to_string(path).map_err(|source| AuthError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| AuthError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn slack_available(&self, username: &str) -> bool {
        self.slack_token(username).is_some()
    }

    pub fn slack_token(&self, username: &str) -> Option<&str> {
        self.slack
            .get(username)
            .map(|token| token.trim())
            .filter(|token| !token.is_empty())
    }

    pub fn require_slack_token(&self, username: &str) -> Result<String, AuthError> {
        self.slack_token(username)
            .map(ToOwned::to_owned)
            .ok_or_else(|| AuthError::MissingSlackToken {
                username: username.to_string(),
            })
    }
}
