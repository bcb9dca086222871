//! Test utilities for the group-sync crate.
//!
//! In-memory implementations of the chat and storage seams that record every
//! mutation, so workflow and router tests can assert on side effects without
//! any HTTP traffic.
