//! Workflows that translate Slack activity into Box changes
//!
//! - `group_sync`: channel membership events to group memberships
//! - `command`: the `/boxadd` slash command

pub mod command;
pub mod group_sync;

/// Prefix of every mirror group name
pub const MIRROR_GROUP_PREFIX: &str = "slack-";

/// Name of the Box group mirroring a Slack channel
pub fn mirror_group_name(channel_id: &str) -> String {
    format!("{MIRROR_GROUP_PREFIX}{channel_id}")
}

#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;

        #[test]
        fn test_mirror_group_name() {
            assert_eq!(mirror_group_name("C024BE91L"), "slack-C024BE91L");
            assert_eq!(mirror_group_name("C1"), mirror_group_name("C1"));
            assert_ne!(mirror_group_name("C1"), mirror_group_name("C2"));
        }
    }
}
