//! Slack to Box group sync
//!
//! The webhook router and the two workflows it dispatches to:
//! - channel membership events keep a Box "mirror group" per channel in sync
//! - `/boxadd` shares a Box file or folder with a channel's mirror group
//!
//! ## Usage
//!
//! ```rust,ignore
//! let service = RelayService::new(params);
//! let (router, _) = group_sync::router::create_router().split_for_parts();
//! let router = router.with_state(Arc::new(service));
//! ```

pub mod logic;
pub mod router;
pub mod service;

#[cfg(test)]
mod test;

pub use service::{RelayService, RelayServiceParams};
