//! Agent CLI and session cache settings.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const HOUR_MS: u64 = 60 * 60 * 1000;

/// Defaults applied to every external agent invocation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentSettings {
    /// Executable name or path of the agent CLI.
    pub binary: String,
    /// Working directory for the agent process. `None` means the bridge's
    /// own working directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// Comma-separated tool allowlist passed to the agent.
    pub allowed_tools: String,
    /// Upper bound on agentic turns per prompt.
    pub max_turns: u32,
    /// Hard timeout per invocation in milliseconds.
    pub timeout_ms: u64,
    /// Text appended to the agent's system prompt; empty disables it.
    pub system_prompt: String,
}

impl AgentSettings {
    /// Per-invocation timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Resolve the working directory, falling back to the process cwd.
    pub fn resolved_working_dir(&self) -> PathBuf {
        match &self.working_dir {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            binary: "claude".to_string(),
            working_dir: None,
            allowed_tools: "Read,Grep,Glob,Bash,WebSearch".to_string(),
            max_turns: 3,
            timeout_ms: 180_000,
            system_prompt: String::new(),
        }
    }
}

/// Session cache location and expiry.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Path of the JSON file backing the cache.
    pub path: String,
    /// Idle time after which a thread's session is forgotten, in hours.
    pub ttl_hours: u64,
    /// How often expired entries are swept, in milliseconds.
    pub prune_interval_ms: u64,
}

impl SessionSettings {
    /// Session TTL as a [`Duration`].
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_hours.saturating_mul(HOUR_MS))
    }

    /// Prune interval as a [`Duration`].
    pub fn prune_interval(&self) -> Duration {
        Duration::from_millis(self.prune_interval_ms)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            path: "data/sessions.json".to_string(),
            ttl_hours: 4,
            prune_interval_ms: HOUR_MS,
        }
    }
}
