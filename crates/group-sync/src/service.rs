use std::sync::Arc;

use box_api::StorageClientLike;
use slack::ChatClientLike;
use slack::types::SlackConfiguration;

use crate::logic::group_sync::DEFAULT_ROSTER_CONCURRENCY;

/// Shared state of the webhook router
pub struct RelayService {
    pub chat: Arc<dyn ChatClientLike>,
    pub storage: Arc<dyn StorageClientLike>,
    pub slack: SlackConfiguration,
    pub roster_concurrency: usize,
}

/// Parameters for creating a RelayService
pub struct RelayServiceParams {
    pub chat: Arc<dyn ChatClientLike>,
    pub storage: Arc<dyn StorageClientLike>,
    pub slack: SlackConfiguration,
    pub roster_concurrency: Option<usize>,
}

impl RelayService {
    pub fn new(params: RelayServiceParams) -> Self {
        Self {
            chat: params.chat,
            storage: params.storage,
            slack: params.slack,
            roster_concurrency: params
                .roster_concurrency
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_ROSTER_CONCURRENCY),
        }
    }
}
