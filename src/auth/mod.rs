//! Credentials file shared by the swarm tools.

use crate::config::Config;
use crate::error::AuthError;
use directories::UserDirs;
use std::path::PathBuf;

mod store;

pub use store::{AmqpCredentials, CredentialStore};

const CREDENTIALS_FILENAME: &str = ".project8_authentications.json";

/// Where the credentials file lives: the configured override, or the home directory.
pub fn credentials_path(config: &Config) -> Result<PathBuf, AuthError> {
    if let Some(path) = config.auth_file_path() {
        return Ok(path);
    }
    UserDirs::new()
        .map(|dirs| dirs.home_dir().join(CREDENTIALS_FILENAME))
        .ok_or(AuthError::HomeDirUnavailable)
}

/// Load the credentials file and pick the token for the configured username.
pub fn load_slack_token(config: &Config) -> Result<String, AuthError> {
    let path = credentials_path(config)?;
    let store = CredentialStore::load_from_disk(&path)?;
    tracing::debug!(path = %path.display(), "credentials loaded");
    store.require_slack_token(&config.username)
}
