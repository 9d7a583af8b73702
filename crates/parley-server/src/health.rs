//! `/health` endpoint.

use std::time::Instant;

use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Admission slots currently held.
    pub active_requests: usize,
    /// Admission cap.
    pub max_concurrent: usize,
    /// Entries in the session cache, expired-but-unpruned included.
    pub cached_sessions: usize,
}

/// Build a health response from live counters.
pub fn health_check(
    start_time: Instant,
    active_requests: usize,
    max_concurrent: usize,
    cached_sessions: usize,
) -> HealthResponse {
    HealthResponse {
        status: "ok",
        uptime_secs: start_time.elapsed().as_secs(),
        active_requests,
        max_concurrent,
        cached_sessions,
    }
}
