//! `relay serve` configuration
//!
//! Flags fall back to environment variables (loaded from `.env` files at
//! startup). Secrets live in two JSON files: one for Slack, one generated by
//! the Box developer console.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use box_api::{BoxAppConfig, BoxClient};
use clap::Parser;
use group_sync::logic::group_sync::DEFAULT_ROSTER_CONCURRENCY;
use group_sync::{RelayService, RelayServiceParams};
use shared::error::CommonError;
use slack::{SlackClient, SlackConfiguration};
use tracing::{debug, info};

#[derive(Debug, Clone, Parser)]
pub struct ServeParams {
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,
    /// JSON file with `verificationToken`, `botToken` and optional `signingSecret`
    #[arg(long, env = "SLACK_CONFIG_PATH", default_value = "config/slack.json")]
    pub slack_config: PathBuf,
    /// Box app settings JSON as downloaded from the developer console
    #[arg(long, env = "BOX_CONFIG_PATH", default_value = "config/box.json")]
    pub box_config: PathBuf,
    /// Channel members synced at once during a roster sync
    #[arg(long, env = "ROSTER_CONCURRENCY", default_value_t = DEFAULT_ROSTER_CONCURRENCY)]
    pub roster_concurrency: usize,
    /// Timeout for every outbound Slack and Box request
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,
}

impl ServeParams {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

pub fn load_slack_config(path: &Path) -> Result<SlackConfiguration, CommonError> {
    debug!(path = %path.display(), "Loading Slack configuration");

    let raw = std::fs::read_to_string(path).map_err(|e| CommonError::InvalidRequest {
        msg: format!("could not read Slack config {}: {e}", path.display()),
        source: Some(e.into()),
    })?;
    let config: SlackConfiguration =
        serde_json::from_str(&raw).map_err(|e| CommonError::InvalidRequest {
            msg: format!("could not parse Slack config {}: {e}", path.display()),
            source: Some(e.into()),
        })?;
    config.validate()?;
    Ok(config)
}

/// Load both configuration files and build the clients behind the router
pub fn build_service(params: &ServeParams) -> Result<RelayService, CommonError> {
    let slack_config = load_slack_config(&params.slack_config)?;
    let box_config = BoxAppConfig::load_from_file(&params.box_config)?;
    info!(
        box_client_id = %box_config.box_app_settings.client_id,
        signature_verification = slack_config.signing_secret.is_some(),
        "Loaded relay configuration"
    );

    let chat = SlackClient::new(slack_config.bot_token.clone(), params.request_timeout())?;
    let storage = BoxClient::from_app_config(&box_config, params.request_timeout())?;

    Ok(RelayService::new(RelayServiceParams {
        chat: Arc::new(chat),
        storage: Arc::new(storage),
        slack: slack_config,
        roster_concurrency: Some(params.roster_concurrency),
    }))
}
