//! # parley-core
//!
//! Foundation types shared by every parley crate.
//!
//! - **Branded IDs**: [`ThreadId`] keeps conversation keys from being mixed
//!   up with other strings
//! - **Clocks**: [`Clock`] abstracts epoch-millisecond time so TTL logic can
//!   be tested without sleeping
//! - **Text helpers**: bounded truncation for diagnostics that end up in
//!   responses
//! - **Logging**: [`logging::init_subscriber`] installs the process-wide
//!   `tracing` subscriber

#![deny(unsafe_code)]

pub mod clock;
pub mod ids;
pub mod logging;
pub mod text;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ids::ThreadId;
