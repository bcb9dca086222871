//! Logic module for the Slack side of the relay
//!
//! Contains:
//! - SlackClient for making HTTP requests to Slack API
//! - Webhook body decoding and classification
//! - Verification token and request signature checks

mod client;
pub mod verification;
mod webhook;

pub use client::{ChatClientLike, SLACK_API_BASE, SlackClient, SlackClientError};
pub use webhook::{WebhookAction, classify, decode_webhook_body};
