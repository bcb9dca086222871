//! Box integration for the relay
//!
//! Wraps the Box Content API in enterprise service-account mode: group
//! find-or-create, user lookup by email, group membership management and
//! collaboration creation.

pub mod config;
pub mod logic;
pub mod types;

pub use config::BoxAppConfig;
pub use logic::{AccessTokenProvider, BoxClient, StorageClientLike};
