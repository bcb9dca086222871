//! The `/boxadd` slash command
//!
//! `/boxadd <file|folder> <id>` shares a Box item with the channel's mirror
//! group, acting as the Box user behind the invoking Slack user.

use box_api::StorageClientLike;
use box_api::types::{BoxItem, BoxItemType, CollaborationRole};
use shared::error::CommonError;
use slack::ChatClientLike;
use slack::types::SlashCommand;
use tracing::{error, info, warn};

use crate::logic::mirror_group_name;

pub const BOX_ADD_COMMAND: &str = "/boxadd";
pub const USAGE_MESSAGE: &str = "Usage: /boxadd [file|folder] [ID]";
pub const USER_NOT_FOUND_MESSAGE: &str =
    "Could not find a Box account matching your Slack email address.";

/// Parse the command text into the item to share
pub fn parse_box_add_command(text: &str) -> Option<BoxItem> {
    let mut tokens = text.split_whitespace();
    let (Some(kind), Some(id), None) = (tokens.next(), tokens.next(), tokens.next()) else {
        return None;
    };

    let kind: BoxItemType = kind.parse().ok()?;
    if !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some(BoxItem {
        kind,
        id: id.to_string(),
    })
}

/// Reply sent back to the invoking user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandReply {
    Usage,
    UserNotFound,
    Shared { item: BoxItem },
    Failed { item: BoxItem },
}

impl CommandReply {
    pub fn text(&self) -> String {
        match self {
            CommandReply::Usage => USAGE_MESSAGE.to_string(),
            CommandReply::UserNotFound => USER_NOT_FOUND_MESSAGE.to_string(),
            CommandReply::Shared { item } => format!(
                "Shared {} {} with this channel's Box group.",
                item.kind, item.id
            ),
            CommandReply::Failed { item } => format!(
                "Something went wrong sharing {} {} with this channel's Box group.",
                item.kind, item.id
            ),
        }
    }
}

pub async fn handle_box_add<C, S>(chat: &C, storage: &S, command: &SlashCommand) -> CommandReply
where
    C: ChatClientLike + ?Sized,
    S: StorageClientLike + ?Sized,
{
    let Some(item) = parse_box_add_command(&command.text) else {
        warn!(text = %command.text, "Invalid /boxadd arguments");
        return CommandReply::Usage;
    };

    match share_with_channel(chat, storage, command, &item).await {
        Ok(reply) => reply,
        Err(e) => {
            error!(
                channel_id = %command.channel_id,
                user_id = %command.user_id,
                item_id = %item.id,
                error = %e,
                "Failed to share Box item with channel"
            );
            CommandReply::Failed { item }
        }
    }
}

async fn share_with_channel<C, S>(
    chat: &C,
    storage: &S,
    command: &SlashCommand,
    item: &BoxItem,
) -> Result<CommandReply, CommonError>
where
    C: ChatClientLike + ?Sized,
    S: StorageClientLike + ?Sized,
{
    let group = storage
        .find_or_create_group(&mirror_group_name(&command.channel_id))
        .await?;

    let requester = match chat.get_user(&command.user_id).await {
        Ok(user) => user,
        Err(e) if e.is_not_found() => {
            warn!(user_id = %command.user_id, "Slash command user not found in Slack");
            return Ok(CommandReply::UserNotFound);
        }
        Err(e) => return Err(e),
    };
    let Some(email) = requester.email.as_deref() else {
        warn!(user_id = %requester.id, "Slash command user has no email address");
        return Ok(CommandReply::UserNotFound);
    };

    let box_user = match storage.find_user_by_email(email).await {
        Ok(user) => user,
        Err(e) if e.is_not_found() => {
            warn!(email = %email, "No Box user for slash command user");
            return Ok(CommandReply::UserNotFound);
        }
        Err(e) => return Err(e),
    };

    storage
        .create_collaboration(&group.id, item, CollaborationRole::Viewer, &box_user.id)
        .await?;
    info!(
        group_id = %group.id,
        item_type = %item.kind,
        item_id = %item.id,
        as_user = %box_user.id,
        "Shared Box item with channel group"
    );

    Ok(CommandReply::Shared { item: item.clone() })
}
