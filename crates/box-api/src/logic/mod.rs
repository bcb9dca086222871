//! Logic module for the Box side of the relay
//!
//! Contains:
//! - Enterprise JWT authentication and token caching
//! - BoxClient and the `StorageClientLike` seam the workflows depend on

pub mod auth;
mod client;

pub use auth::{AccessTokenProvider, EnterpriseAuthenticator};
pub use client::{BOX_API_BASE, BoxClient, BoxClientError, StorageClientLike};
