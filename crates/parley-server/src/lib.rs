//! # parley-server
//!
//! Axum HTTP surface in front of the [`parley_runtime::Bridge`].
//!
//! - `POST /message`: bearer auth, admission, bounded body read, prompt
//!   forwarding
//! - `GET /health`: liveness plus live counters, no auth
//! - Everything else: JSON 404
//! - Graceful shutdown via `tokio::signal` + `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod server;
pub mod shutdown;

pub use config::ServerConfig;
pub use errors::ApiError;
pub use server::{AppState, ParleyServer};
pub use shutdown::ShutdownCoordinator;
