//! Box API Client
//!
//! Group, membership and collaboration calls against the Box Content API,
//! authenticated with an enterprise access token.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use shared::error::CommonError;
use tokio::sync::Mutex;
use tracing::{debug, error, info, trace, warn};

use crate::config::BoxAppConfig;
use crate::logic::auth::{AccessTokenProvider, EnterpriseAuthenticator};
use crate::types::{
    AccessibleBy, AddMemberOutcome, BoxCollaboration, BoxCollection, BoxErrorBody, BoxGroup,
    BoxGroupMembership, BoxItem, BoxUser, CollaborationRole, CreateCollaborationRequest,
    CreateGroupMembershipRequest, CreateGroupRequest, GroupRole, IdRef, MIRROR_GROUP_DESCRIPTION,
    MIRROR_GROUP_INVITABILITY, RemoveMemberOutcome,
};

pub const BOX_API_BASE: &str = "https://api.box.com";

/// Largest page Box returns for the collection endpoints used here
const PAGE_LIMIT: u64 = 1000;

/// Group, membership and collaboration operations on the storage platform
#[async_trait]
pub trait StorageClientLike: Send + Sync {
    /// Find the group with exactly this name, creating it when absent
    async fn find_or_create_group(&self, name: &str) -> Result<BoxGroup, CommonError>;

    async fn find_user_by_email(&self, email: &str) -> Result<BoxUser, CommonError>;

    async fn is_member(&self, group_id: &str, user_id: &str) -> Result<bool, CommonError>;

    async fn add_member(
        &self,
        group_id: &str,
        user_id: &str,
        role: GroupRole,
    ) -> Result<AddMemberOutcome, CommonError>;

    /// Remove the membership whose user login matches `email`
    async fn remove_member(
        &self,
        group_id: &str,
        email: &str,
    ) -> Result<RemoveMemberOutcome, CommonError>;

    /// Create a collaboration on `item` for the group, acting as the Box user
    /// `as_user`
    async fn create_collaboration(
        &self,
        group_id: &str,
        item: &BoxItem,
        role: CollaborationRole,
        as_user: &str,
    ) -> Result<BoxCollaboration, CommonError>;
}

/// HTTP client for the Box API
#[derive(Clone)]
pub struct BoxClient {
    client: Client,
    base_url: String,
    tokens: Arc<AccessTokenProvider>,
    group_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl BoxClient {
    /// Client for an enterprise service account described by `config`
    pub fn from_app_config(config: &BoxAppConfig, timeout: Duration) -> Result<Self, CommonError> {
        let client = Client::builder().timeout(timeout).build()?;
        let auth = EnterpriseAuthenticator::new(config, client.clone())?;
        Ok(Self::with_client(
            client,
            AccessTokenProvider::Enterprise(auth),
        ))
    }

    pub fn new(tokens: AccessTokenProvider, timeout: Duration) -> Result<Self, CommonError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, tokens))
    }

    fn with_client(client: Client, tokens: AccessTokenProvider) -> Self {
        Self {
            client,
            base_url: BOX_API_BASE.to_string(),
            tokens: Arc::new(tokens),
            group_locks: Arc::new(DashMap::new()),
        }
    }

    /// Point the client at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, BoxClientError> {
        let token = self.tokens.access_token().await?;
        Ok(self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(token))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, BoxClientError> {
        let response = request.send().await.map_err(BoxClientError::Request)?;
        let status = response.status();
        let body = response.text().await.map_err(BoxClientError::Request)?;

        if !status.is_success() {
            return Err(BoxClientError::from_error_body(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| BoxClientError::Parse { body, error: e })
    }

    async fn send_empty(&self, request: RequestBuilder) -> Result<(), BoxClientError> {
        let response = request.send().await.map_err(BoxClientError::Request)?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.map_err(BoxClientError::Request)?;
        Err(BoxClientError::from_error_body(status, &body))
    }

    /// Fetch every entry of an offset-paginated collection
    async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, BoxClientError> {
        let mut entries = Vec::new();
        let mut offset: u64 = 0;
        let limit = PAGE_LIMIT.to_string();

        loop {
            let offset_param = offset.to_string();
            let request = self
                .request(Method::GET, path)
                .await?
                .query(query)
                .query(&[("limit", limit.as_str()), ("offset", offset_param.as_str())]);

            let page: BoxCollection<T> = self.send_json(request).await?;
            let fetched = page.entries.len() as u64;
            entries.extend(page.entries);
            offset += fetched;

            trace!(path = %path, fetched, offset, "Fetched Box collection page");

            let exhausted = match page.total_count {
                Some(total) => offset >= total,
                None => fetched < page.limit.unwrap_or(PAGE_LIMIT),
            };
            if fetched == 0 || exhausted {
                break;
            }
        }

        Ok(entries)
    }

    pub async fn find_group(&self, name: &str) -> Result<Option<BoxGroup>, BoxClientError> {
        let groups: Vec<BoxGroup> = self
            .get_all("/2.0/groups", &[("filter_term", name)])
            .await?;
        Ok(groups.into_iter().find(|g| g.name == name))
    }

    pub async fn create_group(&self, name: &str) -> Result<BoxGroup, BoxClientError> {
        let request = self
            .request(Method::POST, "/2.0/groups")
            .await?
            .json(&CreateGroupRequest {
                name,
                description: MIRROR_GROUP_DESCRIPTION,
                invitability_level: MIRROR_GROUP_INVITABILITY,
            });
        let group: BoxGroup = self.send_json(request).await?;
        info!(group_id = %group.id, name = %name, "Created Box group");
        Ok(group)
    }

    pub async fn search_users(&self, email: &str) -> Result<Vec<BoxUser>, BoxClientError> {
        let request = self
            .request(Method::GET, "/2.0/users")
            .await?
            .query(&[("filter_term", email), ("user_type", "all")]);
        let page: BoxCollection<BoxUser> = self.send_json(request).await?;
        Ok(page.entries)
    }

    pub async fn user_memberships(
        &self,
        user_id: &str,
    ) -> Result<Vec<BoxGroupMembership>, BoxClientError> {
        self.get_all(&format!("/2.0/users/{user_id}/memberships"), &[])
            .await
    }

    pub async fn group_memberships(
        &self,
        group_id: &str,
    ) -> Result<Vec<BoxGroupMembership>, BoxClientError> {
        self.get_all(&format!("/2.0/groups/{group_id}/memberships"), &[])
            .await
    }

    pub async fn create_membership(
        &self,
        group_id: &str,
        user_id: &str,
        role: GroupRole,
    ) -> Result<BoxGroupMembership, BoxClientError> {
        let request = self
            .request(Method::POST, "/2.0/group_memberships")
            .await?
            .json(&CreateGroupMembershipRequest {
                user: IdRef { id: user_id },
                group: IdRef { id: group_id },
                role,
            });
        self.send_json(request).await
    }

    pub async fn delete_membership(&self, membership_id: &str) -> Result<(), BoxClientError> {
        let request = self
            .request(
                Method::DELETE,
                &format!("/2.0/group_memberships/{membership_id}"),
            )
            .await?;
        self.send_empty(request).await
    }

    pub async fn post_collaboration(
        &self,
        group_id: &str,
        item: &BoxItem,
        role: CollaborationRole,
        as_user: &str,
    ) -> Result<BoxCollaboration, BoxClientError> {
        let request = self
            .request(Method::POST, "/2.0/collaborations")
            .await?
            .header("As-User", as_user)
            .json(&CreateCollaborationRequest {
                item,
                accessible_by: AccessibleBy {
                    kind: "group",
                    id: group_id,
                },
                role,
            });
        self.send_json(request).await
    }

    fn group_lock(&self, name: &str) -> Arc<Mutex<()>> {
        self.group_locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    /// Forget the lock for `name` once no caller holds or waits on it
    fn release_group_lock(&self, name: &str) {
        self.group_locks
            .remove_if(name, |_, lock| Arc::strong_count(lock) == 1);
    }

    async fn find_or_create_group_locked(&self, name: &str) -> Result<BoxGroup, BoxClientError> {
        if let Some(group) = self.find_group(name).await? {
            debug!(group_id = %group.id, name = %name, "Found existing Box group");
            return Ok(group);
        }
        self.create_group(name).await
    }
}

#[async_trait]
impl StorageClientLike for BoxClient {
    async fn find_or_create_group(&self, name: &str) -> Result<BoxGroup, CommonError> {
        // Two lookups racing past `find_group` would create duplicate groups
        let lock = self.group_lock(name);
        let result = {
            let _guard = lock.lock().await;
            self.find_or_create_group_locked(name).await
        };
        drop(lock);
        self.release_group_lock(name);

        result.map_err(|e| e.into_common(name))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<BoxUser, CommonError> {
        let users = self
            .search_users(email)
            .await
            .map_err(|e| e.into_common(email))?;

        let exact = users
            .iter()
            .position(|u| u.login.eq_ignore_ascii_case(email));
        let user = match exact {
            Some(index) => users.into_iter().nth(index),
            None => users.into_iter().next(),
        };

        user.ok_or_else(|| CommonError::NotFound {
            msg: format!("no Box user with email {email}"),
            lookup_id: email.to_string(),
            source: None,
        })
    }

    async fn is_member(&self, group_id: &str, user_id: &str) -> Result<bool, CommonError> {
        let memberships = self
            .user_memberships(user_id)
            .await
            .map_err(|e| e.into_common(user_id))?;
        Ok(memberships
            .iter()
            .any(|m| m.group.as_ref().is_some_and(|g| g.id == group_id)))
    }

    async fn add_member(
        &self,
        group_id: &str,
        user_id: &str,
        role: GroupRole,
    ) -> Result<AddMemberOutcome, CommonError> {
        if self.is_member(group_id, user_id).await? {
            warn!(group_id = %group_id, user_id = %user_id, "User is already a group member");
            return Ok(AddMemberOutcome::AlreadyMember);
        }

        let membership = self
            .create_membership(group_id, user_id, role)
            .await
            .map_err(|e| e.into_common(user_id))?;
        info!(
            group_id = %group_id,
            user_id = %user_id,
            membership_id = %membership.id,
            "Added user to Box group"
        );
        Ok(AddMemberOutcome::Added)
    }

    async fn remove_member(
        &self,
        group_id: &str,
        email: &str,
    ) -> Result<RemoveMemberOutcome, CommonError> {
        let memberships = self
            .group_memberships(group_id)
            .await
            .map_err(|e| e.into_common(group_id))?;

        let membership = memberships.into_iter().find(|m| {
            m.user
                .as_ref()
                .is_some_and(|u| u.login.eq_ignore_ascii_case(email))
        });

        let Some(membership) = membership else {
            warn!(group_id = %group_id, email = %email, "No group membership to remove");
            return Ok(RemoveMemberOutcome::NotMember);
        };

        self.delete_membership(&membership.id)
            .await
            .map_err(|e| e.into_common(&membership.id))?;
        info!(
            group_id = %group_id,
            membership_id = %membership.id,
            "Removed user from Box group"
        );
        Ok(RemoveMemberOutcome::Removed)
    }

    async fn create_collaboration(
        &self,
        group_id: &str,
        item: &BoxItem,
        role: CollaborationRole,
        as_user: &str,
    ) -> Result<BoxCollaboration, CommonError> {
        let collaboration = self
            .post_collaboration(group_id, item, role, as_user)
            .await
            .map_err(|e| e.into_common(&item.id))?;
        info!(
            group_id = %group_id,
            item_type = %item.kind,
            item_id = %item.id,
            collaboration_id = %collaboration.id,
            "Created Box collaboration"
        );
        Ok(collaboration)
    }
}

/// Errors that can occur when interacting with Box API
#[derive(Debug, thiserror::Error)]
pub enum BoxClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to parse response: {error}, body: {body}")]
    Parse {
        body: String,
        #[source]
        error: serde_json::Error,
    },

    #[error("Box API error ({status}): {}", .message.as_deref().unwrap_or("no message"))]
    Api {
        status: u16,
        code: Option<String>,
        message: Option<String>,
        request_id: Option<String>,
    },

    #[error("Box authentication failed: {error}")]
    Auth {
        error: String,
        description: Option<String>,
    },
}

impl BoxClientError {
    fn from_error_body(status: StatusCode, body: &str) -> Self {
        let parsed: BoxErrorBody = serde_json::from_str(body).unwrap_or_default();
        error!(
            status = %status,
            code = ?parsed.code,
            request_id = ?parsed.request_id,
            "Box API error"
        );
        BoxClientError::Api {
            status: status.as_u16(),
            code: parsed.code,
            message: parsed.message,
            request_id: parsed.request_id,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BoxClientError::Api { status: 404, .. })
    }

    pub(crate) fn into_common(self, lookup_id: &str) -> CommonError {
        if self.is_not_found() {
            return CommonError::NotFound {
                msg: self.to_string(),
                lookup_id: lookup_id.to_string(),
                source: Some(self.into()),
            };
        }
        match self {
            BoxClientError::Request(e) => CommonError::ReqwestError { source: e },
            BoxClientError::Parse { .. } => CommonError::InvalidResponse {
                msg: self.to_string(),
                source: Some(self.into()),
            },
            BoxClientError::Auth { .. } | BoxClientError::Api { status: 401, .. } => {
                CommonError::Authentication {
                    msg: self.to_string(),
                    source: Some(self.into()),
                }
            }
            BoxClientError::Api { .. } => CommonError::Unknown(self.into()),
        }
    }
}
