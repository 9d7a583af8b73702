//! # parley-sessions
//!
//! Durable mapping from conversation thread to the agent's opaque session
//! token.
//!
//! - [`SessionCache`]: in-memory map guarded by a mutex, persisted to one
//!   JSON file after every mutation
//! - [`SessionEntry`]: token plus creation and last-used timestamps
//! - TTL expiry is lazy on read ([`SessionCache::get`]) and bulk via
//!   [`SessionCache::prune`]
//! - Writes go through a temp file in the same directory followed by an
//!   atomic rename, so a crash never leaves a half-written file in place

#![deny(unsafe_code)]

pub mod cache;
pub mod errors;
pub mod persist;

pub use cache::{SessionCache, SessionEntry};
pub use errors::{Result, SessionStoreError};
