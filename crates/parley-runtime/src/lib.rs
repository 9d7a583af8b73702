//! # parley-runtime
//!
//! The concurrency core between the HTTP surface and the agent conduit.
//!
//! - [`ThreadSerializer`]: per-thread FIFO, at most one task per thread in
//!   flight, queue state dropped as soon as a thread drains
//! - [`AdmissionLimiter`]: global cap on in-flight invocations; rejects
//!   instead of queueing, releases through an RAII [`AdmissionPermit`]
//! - [`Bridge`]: admission, serialization, cache lookup, invocation and
//!   cache write-back for one message
//! - [`pruner::spawn_prune_task`]: periodic TTL sweep of the session cache

#![deny(unsafe_code)]

pub mod admission;
pub mod bridge;
pub mod errors;
pub mod pruner;
pub mod serializer;

pub use admission::{AdmissionLimiter, AdmissionPermit};
pub use bridge::{Bridge, InvocationDefaults, MessageReply, RESUME_FAILURE_MARKERS, is_resume_failure};
pub use errors::{BridgeError, Result};
pub use serializer::ThreadSerializer;
