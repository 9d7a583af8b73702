//! Invocation request and result types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Everything needed to run one agent turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvocationRequest {
    /// Trimmed prompt text.
    pub prompt: String,
    /// Session token to resume, if the thread has one.
    pub resume_token: Option<String>,
    /// `--max-turns`.
    pub max_turns: u32,
    /// Comma-separated tool list for `--allowedTools`. Omitted when empty.
    pub allowed_tools: String,
    /// Text for `--append-system-prompt`. Omitted when `None` or empty.
    pub append_system_prompt: Option<String>,
    /// Child working directory.
    pub working_dir: PathBuf,
    /// Hard deadline for the whole exchange.
    pub timeout: Duration,
}

/// The agent's JSON result document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationResult {
    /// Document type, normally `"result"`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// e.g. `"success"`, `"error_max_turns"`.
    #[serde(default)]
    pub subtype: String,
    /// Whether the agent flagged its own run as an error.
    #[serde(default)]
    pub is_error: bool,
    /// Reply text.
    #[serde(default)]
    pub result: String,
    /// Token to resume this conversation next time.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Agent-reported wall time.
    #[serde(default)]
    pub duration_ms: u64,
    /// Agent-reported cost.
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
}
