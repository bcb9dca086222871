//! Box API type definitions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shared::error::CommonError;

/// Description given to every group the relay creates
pub const MIRROR_GROUP_DESCRIPTION: &str = "Slack channel collaboration group";

/// Who may invite users into a group the relay creates
pub const MIRROR_GROUP_INVITABILITY: &str = "all_managed_users";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxGroup {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxUser {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Primary email address
    #[serde(default)]
    pub login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoxGroupMembership {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<BoxUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<BoxGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoxCollaboration {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Offset-paginated collection envelope
#[derive(Debug, Clone, Deserialize)]
pub struct BoxCollection<T> {
    #[serde(default = "Vec::new")]
    pub entries: Vec<T>,
    #[serde(default)]
    pub total_count: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

/// Body of a non-2xx Box API response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoxErrorBody {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxItemType {
    File,
    Folder,
}

impl BoxItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoxItemType::File => "file",
            BoxItemType::Folder => "folder",
        }
    }
}

impl fmt::Display for BoxItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoxItemType {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(BoxItemType::File),
            "folder" => Ok(BoxItemType::Folder),
            other => Err(CommonError::InvalidRequest {
                msg: format!("unknown item type '{other}', expected 'file' or 'folder'"),
                source: None,
            }),
        }
    }
}

/// A file or folder a collaboration is attached to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxItem {
    #[serde(rename = "type")]
    pub kind: BoxItemType,
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupRole {
    Member,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaborationRole {
    Viewer,
    Previewer,
    Uploader,
    Editor,
    #[serde(rename = "co-owner")]
    CoOwner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddMemberOutcome {
    Added,
    AlreadyMember,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveMemberOutcome {
    Removed,
    NotMember,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateGroupRequest<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub invitability_level: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct IdRef<'a> {
    pub id: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateGroupMembershipRequest<'a> {
    pub user: IdRef<'a>,
    pub group: IdRef<'a>,
    pub role: GroupRole,
}

#[derive(Debug, Serialize)]
pub(crate) struct AccessibleBy<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateCollaborationRequest<'a> {
    pub item: &'a BoxItem,
    pub accessible_by: AccessibleBy<'a>,
    pub role: CollaborationRole,
}
