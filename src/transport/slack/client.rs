use super::api::{ApiFuture, ChatApi};
use super::types::{HistoryMessage, HistoryPage, HistoryRequest, MessageTs};
use crate::error::SlackApiError;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

const LIST_PAGE_LIMIT: usize = 200;
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Debug, Deserialize)]
struct SlackEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    messages: Vec<HistoryMessage>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct UsersResponse {
    #[serde(default)]
    members: Vec<SlackUser>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ChannelsResponse {
    #[serde(default)]
    channels: Vec<SlackChannelInfo>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct RtmConnectResponse {
    url: String,
    #[serde(default, rename = "self")]
    identity: Option<SlackUser>,
}

#[derive(Debug, Deserialize)]
struct AuthTestResponse {
    user_id: String,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    team: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SlackUser {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SlackChannelInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_archived: bool,
}

/// Identity the token authenticates as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthIdentity {
    pub user_id: String,
    pub user: Option<String>,
    pub team: Option<String>,
}

/// Result of `rtm.connect`: where to open the websocket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtmSession {
    pub url: String,
    pub self_id: Option<String>,
}

fn cursor_of(metadata: Option<&ResponseMetadata>) -> Option<String> {
    metadata
        .map(|meta| meta.next_cursor.trim())
        .filter(|cursor| !cursor.is_empty())
        .map(ToOwned::to_owned)
}

fn truncate_body(body: &str) -> String {
    if body.len() <= ERROR_BODY_LIMIT {
        return body.to_string();
    }
    let mut end = ERROR_BODY_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}

/// Slack Web API client making bearer-token calls against `slack-api-base`.
#[derive(Clone)]
pub struct SlackApiClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl SlackApiClient {
    pub fn new(api_base: &str, token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, SlackApiError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|source| SlackApiError::Transport { method, source })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| SlackApiError::Transport { method, source })?;

        if !status.is_success() {
            return Err(SlackApiError::Status {
                method,
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        // Slack returns 200 for most app-level errors; check the "ok" field
        let envelope: SlackEnvelope =
            serde_json::from_str(&body).map_err(|e| SlackApiError::Decode {
                method,
                message: e.to_string(),
            })?;
        if !envelope.ok {
            return Err(SlackApiError::Api {
                method,
                error: envelope.error.unwrap_or_else(|| "unknown".into()),
            });
        }

        serde_json::from_str(&body).map_err(|e| SlackApiError::Decode {
            method,
            message: e.to_string(),
        })
    }

    pub async fn auth_test(&self) -> Result<AuthIdentity, SlackApiError> {
        let response: AuthTestResponse = self
            .call("auth.test", self.http.post(self.url("auth.test")))
            .await?;
        Ok(AuthIdentity {
            user_id: response.user_id,
            user: response.user,
            team: response.team,
        })
    }

    /// Every user in the workspace, following `users.list` cursors.
    pub async fn list_users(&self) -> Result<Vec<SlackUser>, SlackApiError> {
        let mut users = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut params = vec![("limit", LIST_PAGE_LIMIT.to_string())];
            if let Some(cursor) = &cursor {
                params.push(("cursor", cursor.clone()));
            }
            let response: UsersResponse = self
                .call(
                    "users.list",
                    self.http.get(self.url("users.list")).query(&params),
                )
                .await?;
            users.extend(response.members);

            cursor = cursor_of(response.response_metadata.as_ref());
            if cursor.is_none() {
                return Ok(users);
            }
        }
    }

    pub async fn find_user_id(&self, username: &str) -> Result<Option<String>, SlackApiError> {
        let users = self.list_users().await?;
        Ok(users
            .into_iter()
            .find(|user| user.name == username)
            .map(|user| user.id))
    }

    /// Map of channel name to channel id for every non-archived public channel.
    pub async fn list_channels(&self) -> Result<HashMap<String, String>, SlackApiError> {
        let mut directory = HashMap::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut params = vec![
                ("limit", LIST_PAGE_LIMIT.to_string()),
                ("exclude_archived", "true".to_string()),
                ("types", "public_channel".to_string()),
            ];
            if let Some(cursor) = &cursor {
                params.push(("cursor", cursor.clone()));
            }
            let response: ChannelsResponse = self
                .call(
                    "conversations.list",
                    self.http.get(self.url("conversations.list")).query(&params),
                )
                .await?;
            for channel in response.channels.into_iter().filter(|c| !c.is_archived) {
                tracing::debug!(channel = %channel.name, channel_id = %channel.id, "channel listed");
                directory.insert(channel.name, channel.id);
            }

            cursor = cursor_of(response.response_metadata.as_ref());
            if cursor.is_none() {
                return Ok(directory);
            }
        }
    }

    pub async fn history(
        &self,
        channel_id: &str,
        request: &HistoryRequest,
    ) -> Result<HistoryPage, SlackApiError> {
        let mut params = vec![
            ("channel", channel_id.to_string()),
            ("limit", request.limit.to_string()),
        ];
        if let Some(before) = &request.before {
            params.push(("latest", before.to_string()));
            params.push(("inclusive", "false".to_string()));
        }

        let response: HistoryResponse = self
            .call(
                "conversations.history",
                self.http
                    .get(self.url("conversations.history"))
                    .query(&params),
            )
            .await?;
        Ok(HistoryPage {
            messages: response.messages,
            has_more: response.has_more,
        })
    }

    pub async fn delete(&self, channel_id: &str, ts: &MessageTs) -> Result<(), SlackApiError> {
        let body = serde_json::json!({
            "channel": channel_id,
            "ts": ts.as_str(),
        });
        let _: SlackEnvelope = self
            .call(
                "chat.delete",
                self.http.post(self.url("chat.delete")).json(&body),
            )
            .await?;
        Ok(())
    }

    pub async fn connect_rtm(&self) -> Result<RtmSession, SlackApiError> {
        let response: RtmConnectResponse = self
            .call("rtm.connect", self.http.get(self.url("rtm.connect")))
            .await?;
        Ok(RtmSession {
            url: response.url,
            self_id: response.identity.map(|identity| identity.id),
        })
    }
}

impl ChatApi for SlackApiClient {
    fn fetch_history_page<'a>(
        &'a self,
        channel_id: &'a str,
        request: &'a HistoryRequest,
    ) -> ApiFuture<'a, HistoryPage> {
        Box::pin(self.history(channel_id, request))
    }

    fn delete_message<'a>(&'a self, channel_id: &'a str, ts: &'a MessageTs) -> ApiFuture<'a, ()> {
        Box::pin(self.delete(channel_id, ts))
    }
}
