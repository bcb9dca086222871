//! Slack API Client
//!
//! HTTP client for the two Web API methods the relay needs: `users.info` and
//! `conversations.members`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::error::CommonError;
use tracing::{error, trace};

use crate::types::{
    ChatUser, SlackConversationMembersResponse, SlackResponseMetadata, SlackUsersInfoResponse,
};

pub const SLACK_API_BASE: &str = "https://slack.com/api";

/// Page size requested from `conversations.members`
const MEMBERS_PAGE_SIZE: u32 = 200;

/// Read access to Slack users and channel rosters
#[async_trait]
pub trait ChatClientLike: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<ChatUser, CommonError>;

    /// Every member id of the channel, across all pages
    async fn list_channel_members(&self, channel_id: &str) -> Result<Vec<String>, CommonError>;
}

/// HTTP client for Slack API
#[derive(Clone)]
pub struct SlackClient {
    client: Client,
    bot_token: String,
    base_url: String,
}

impl SlackClient {
    /// Create a new Slack client with the given bot token
    pub fn new(bot_token: String, timeout: Duration) -> Result<Self, CommonError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            bot_token,
            base_url: SLACK_API_BASE.to_string(),
        })
    }

    /// Point the client at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        method: &str,
        query: &[(&str, &str)],
    ) -> Result<T, SlackClientError> {
        let response = self
            .client
            .get(format!("{}/{}", self.base_url, method))
            .header("Authorization", format!("Bearer {}", self.bot_token))
            .query(query)
            .send()
            .await
            .map_err(SlackClientError::Request)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(SlackClientError::Request)?;

        if !status.is_success() {
            error!(status = %status, method = %method, "Slack API returned an HTTP error");
            return Err(SlackClientError::Status { status, body });
        }

        serde_json::from_str(&body).map_err(|e| SlackClientError::Parse { body, error: e })
    }

    /// Fetch a user's profile via `users.info`
    pub async fn users_info(&self, user_id: &str) -> Result<ChatUser, SlackClientError> {
        trace!(user_id = %user_id, "Fetching Slack user");

        let result: SlackUsersInfoResponse =
            self.get_json("users.info", &[("user", user_id)]).await?;

        if !result.ok {
            error!(error = ?result.error, user_id = %user_id, "Slack API error");
            return Err(SlackClientError::Api {
                error: result.error.unwrap_or_else(|| "unknown".to_string()),
                response_metadata: result.response_metadata,
            });
        }

        result
            .user
            .map(ChatUser::from)
            .ok_or_else(|| SlackClientError::Api {
                error: "missing_user".to_string(),
                response_metadata: None,
            })
    }

    /// Collect every member of a channel, following `next_cursor` until it
    /// comes back empty.
    pub async fn conversations_members(
        &self,
        channel_id: &str,
    ) -> Result<Vec<String>, SlackClientError> {
        let limit = MEMBERS_PAGE_SIZE.to_string();
        let mut members = Vec::new();
        let mut cursor = String::new();

        loop {
            trace!(channel_id = %channel_id, cursor = %cursor, "Fetching channel members page");

            let mut query = vec![("channel", channel_id), ("limit", limit.as_str())];
            if !cursor.is_empty() {
                query.push(("cursor", cursor.as_str()));
            }

            let page: SlackConversationMembersResponse =
                self.get_json("conversations.members", &query).await?;

            if !page.ok {
                error!(error = ?page.error, channel_id = %channel_id, "Slack API error");
                return Err(SlackClientError::Api {
                    error: page.error.unwrap_or_else(|| "unknown".to_string()),
                    response_metadata: None,
                });
            }

            members.extend(page.members);

            match page.response_metadata.and_then(|SlackResponseMetadata { next_cursor }| {
                next_cursor.filter(|c| !c.is_empty())
            }) {
                Some(next) => cursor = next,
                None => break,
            }
        }

        trace!(channel_id = %channel_id, count = members.len(), "Fetched channel members");
        Ok(members)
    }
}

#[async_trait]
impl ChatClientLike for SlackClient {
    async fn get_user(&self, user_id: &str) -> Result<ChatUser, CommonError> {
        self.users_info(user_id)
            .await
            .map_err(|e| e.into_common(user_id))
    }

    async fn list_channel_members(&self, channel_id: &str) -> Result<Vec<String>, CommonError> {
        self.conversations_members(channel_id)
            .await
            .map_err(|e| e.into_common(channel_id))
    }
}

/// Errors that can occur when interacting with Slack API
#[derive(Debug, thiserror::Error)]
pub enum SlackClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to parse response: {error}, body: {body}")]
    Parse {
        body: String,
        #[source]
        error: serde_json::Error,
    },

    #[error("Slack API returned HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Slack API error: {error}")]
    Api {
        error: String,
        response_metadata: Option<Value>,
    },
}

impl SlackClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SlackClientError::Api { error, .. }
                if error == "user_not_found" || error == "channel_not_found"
        )
    }

    fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            SlackClientError::Api { error, .. }
                if error == "invalid_auth" || error == "not_authed"
        )
    }

    fn into_common(self, lookup_id: &str) -> CommonError {
        if self.is_not_found() {
            return CommonError::NotFound {
                msg: self.to_string(),
                lookup_id: lookup_id.to_string(),
                source: Some(self.into()),
            };
        }
        if self.is_auth_failure() {
            return CommonError::Authentication {
                msg: self.to_string(),
                source: Some(self.into()),
            };
        }
        match self {
            SlackClientError::Request(e) => CommonError::ReqwestError { source: e },
            SlackClientError::Parse { .. } | SlackClientError::Status { .. } => {
                CommonError::InvalidResponse {
                    msg: self.to_string(),
                    source: Some(self.into()),
                }
            }
            SlackClientError::Api { .. } => CommonError::Unknown(self.into()),
        }
    }
}
