//! Channel membership to group membership sync
//!
//! One Slack channel event at a time, no persisted state. The mirror group is
//! resolved first. A bot or system actor triggers a full roster sync of the
//! channel; a human actor with an email is added on join and removed on leave.

use box_api::StorageClientLike;
use box_api::types::{AddMemberOutcome, BoxGroup, GroupRole, RemoveMemberOutcome};
use futures::StreamExt;
use futures::stream;
use shared::error::CommonError;
use slack::ChatClientLike;
use slack::types::{ChannelEventKind, ChatUser};
use tracing::{debug, error, info, warn};

use crate::logic::mirror_group_name;

/// Default number of roster members synced at once
pub const DEFAULT_ROSTER_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    BotOrSystem,
    NoEmail,
    UnknownChatUser,
    NoStorageUser,
}

/// What happened to a single member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberOutcome {
    Added,
    AlreadyMember,
    Removed,
    NotMember,
    Skipped(SkipReason),
}

impl From<AddMemberOutcome> for MemberOutcome {
    fn from(outcome: AddMemberOutcome) -> Self {
        match outcome {
            AddMemberOutcome::Added => MemberOutcome::Added,
            AddMemberOutcome::AlreadyMember => MemberOutcome::AlreadyMember,
        }
    }
}

impl From<RemoveMemberOutcome> for MemberOutcome {
    fn from(outcome: RemoveMemberOutcome) -> Self {
        match outcome {
            RemoveMemberOutcome::Removed => MemberOutcome::Removed,
            RemoveMemberOutcome::NotMember => MemberOutcome::NotMember,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedMember {
    pub user_id: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedMember {
    pub user_id: String,
    pub error: String,
}

/// Result of a roster sync. Every listed channel member lands in exactly one
/// bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterSyncReport {
    pub group_id: String,
    pub added: Vec<String>,
    pub already_member: Vec<String>,
    pub skipped: Vec<SkippedMember>,
    pub failed: Vec<FailedMember>,
}

impl RosterSyncReport {
    pub fn total(&self) -> usize {
        self.added.len() + self.already_member.len() + self.skipped.len() + self.failed.len()
    }

    fn record(&mut self, user_id: String, result: Result<MemberOutcome, CommonError>) {
        match result {
            Ok(MemberOutcome::Added) => self.added.push(user_id),
            Ok(MemberOutcome::AlreadyMember) => self.already_member.push(user_id),
            Ok(MemberOutcome::Skipped(reason)) => {
                self.skipped.push(SkippedMember { user_id, reason })
            }
            // Roster sync only adds
            Ok(MemberOutcome::Removed | MemberOutcome::NotMember) => {
                self.already_member.push(user_id)
            }
            Err(e) => self.failed.push(FailedMember {
                user_id,
                error: e.to_string(),
            }),
        }
    }
}

/// A channel event with its acting user already resolved
#[derive(Debug, Clone)]
pub struct ChannelEvent {
    pub kind: ChannelEventKind,
    pub channel_id: String,
    pub actor: ChatUser,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSyncOutcome {
    Roster(RosterSyncReport),
    Member {
        user_id: String,
        outcome: MemberOutcome,
    },
    Ignored {
        event_type: String,
    },
}

pub async fn handle_channel_event<C, S>(
    chat: &C,
    storage: &S,
    event: &ChannelEvent,
    roster_concurrency: usize,
) -> Result<ChannelSyncOutcome, CommonError>
where
    C: ChatClientLike + ?Sized,
    S: StorageClientLike + ?Sized,
{
    let group_name = mirror_group_name(&event.channel_id);
    let group = storage.find_or_create_group(&group_name).await?;
    debug!(channel_id = %event.channel_id, group_id = %group.id, "Resolved mirror group");

    if event.actor.is_bot_or_system() {
        let report =
            sync_channel_roster(chat, storage, &group, &event.channel_id, roster_concurrency)
                .await?;
        return Ok(ChannelSyncOutcome::Roster(report));
    }

    let Some(email) = event.actor.email.as_deref() else {
        warn!(user_id = %event.actor.id, "Skipping user without an email address");
        return Ok(ChannelSyncOutcome::Member {
            user_id: event.actor.id.clone(),
            outcome: MemberOutcome::Skipped(SkipReason::NoEmail),
        });
    };

    let outcome = match &event.kind {
        ChannelEventKind::MemberJoined => add_by_email(storage, &group, email).await?,
        ChannelEventKind::MemberLeft => {
            let outcome = storage.remove_member(&group.id, email).await?;
            MemberOutcome::from(outcome)
        }
        ChannelEventKind::Other(event_type) => {
            debug!(event_type = %event_type, "Ignoring channel event");
            return Ok(ChannelSyncOutcome::Ignored {
                event_type: event_type.clone(),
            });
        }
    };

    Ok(ChannelSyncOutcome::Member {
        user_id: event.actor.id.clone(),
        outcome,
    })
}

/// Add every human channel member with an email to the group. Members are
/// independent: one failing never stops the others.
pub async fn sync_channel_roster<C, S>(
    chat: &C,
    storage: &S,
    group: &BoxGroup,
    channel_id: &str,
    concurrency: usize,
) -> Result<RosterSyncReport, CommonError>
where
    C: ChatClientLike + ?Sized,
    S: StorageClientLike + ?Sized,
{
    let members = chat.list_channel_members(channel_id).await?;
    info!(
        channel_id = %channel_id,
        group_id = %group.id,
        members = members.len(),
        "Syncing channel roster"
    );

    let results: Vec<(String, Result<MemberOutcome, CommonError>)> = stream::iter(members)
        .map(|user_id| async move {
            let result = sync_roster_member(chat, storage, group, &user_id).await;
            (user_id, result)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut report = RosterSyncReport {
        group_id: group.id.clone(),
        ..Default::default()
    };
    for (user_id, result) in results {
        if let Err(e) = &result {
            error!(user_id = %user_id, error = %e, "Failed to sync roster member");
        }
        report.record(user_id, result);
    }

    info!(
        channel_id = %channel_id,
        added = report.added.len(),
        already_member = report.already_member.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "Channel roster sync finished"
    );
    Ok(report)
}

async fn sync_roster_member<C, S>(
    chat: &C,
    storage: &S,
    group: &BoxGroup,
    user_id: &str,
) -> Result<MemberOutcome, CommonError>
where
    C: ChatClientLike + ?Sized,
    S: StorageClientLike + ?Sized,
{
    let user = match chat.get_user(user_id).await {
        Ok(user) => user,
        Err(e) if e.is_not_found() => {
            warn!(user_id = %user_id, "Roster member not found in Slack");
            return Ok(MemberOutcome::Skipped(SkipReason::UnknownChatUser));
        }
        Err(e) => return Err(e),
    };

    if user.is_bot_or_system() {
        return Ok(MemberOutcome::Skipped(SkipReason::BotOrSystem));
    }
    let Some(email) = user.email.as_deref() else {
        warn!(user_id = %user_id, "Skipping user without an email address");
        return Ok(MemberOutcome::Skipped(SkipReason::NoEmail));
    };

    add_by_email(storage, group, email).await
}

async fn add_by_email<S>(
    storage: &S,
    group: &BoxGroup,
    email: &str,
) -> Result<MemberOutcome, CommonError>
where
    S: StorageClientLike + ?Sized,
{
    let box_user = match storage.find_user_by_email(email).await {
        Ok(user) => user,
        Err(e) if e.is_not_found() => {
            warn!(email = %email, "No Box user for Slack email");
            return Ok(MemberOutcome::Skipped(SkipReason::NoStorageUser));
        }
        Err(e) => return Err(e),
    };

    let outcome = storage
        .add_member(&group.id, &box_user.id, GroupRole::Member)
        .await?;
    Ok(MemberOutcome::from(outcome))
}
