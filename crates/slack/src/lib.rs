//! Slack integration for the relay
//!
//! This crate provides:
//! - Types for the payloads Slack delivers to the webhook (`types` module)
//! - Webhook decoding, classification and request verification (`logic` module)
//! - A Web API client behind the `ChatClientLike` seam

pub mod logic;
pub mod types;

pub use logic::{ChatClientLike, SlackClient};
pub use types::{ChatUser, SlackConfiguration};
