//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file may contain any subset of fields and missing ones keep their
//! compiled default.

mod agent;
mod server;

pub use agent::*;
pub use server::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for the bridge.
///
/// Example settings file:
///
/// ```json
/// {
///   "auth": { "apiKey": "secret" },
///   "server": { "port": 9000 },
///   "agent": { "maxTurns": 5, "allowedTools": "Read,Grep" },
///   "sessions": { "ttlHours": 12 }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeSettings {
    /// HTTP listener settings.
    pub server: ServerSettings,
    /// Bearer-token authentication.
    pub auth: AuthSettings,
    /// Global admission limits.
    pub limits: LimitSettings,
    /// External agent CLI invocation defaults.
    pub agent: AgentSettings,
    /// Session cache location and expiry.
    pub sessions: SessionSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Upper bound for `sessions.pruneIntervalMs`: one year.
const MAX_PRUNE_INTERVAL_MS: u64 = 365 * 24 * 60 * 60 * 1000;

impl BridgeSettings {
    /// Check cross-field invariants that serde cannot express.
    ///
    /// Called once at startup after every layer has been applied.
    pub fn validate(&self) -> Result<()> {
        if self.auth.api_key.as_deref().is_none_or(str::is_empty) {
            return Err(SettingsError::InvalidValue(
                "auth.apiKey is required (set API_KEY)".into(),
            ));
        }
        if self.sessions.ttl_hours == 0 {
            return Err(SettingsError::InvalidValue(
                "sessions.ttlHours must be greater than zero".into(),
            ));
        }
        if self.sessions.prune_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "sessions.pruneIntervalMs must be greater than zero".into(),
            ));
        }
        if self.sessions.prune_interval_ms > MAX_PRUNE_INTERVAL_MS {
            return Err(SettingsError::InvalidValue(
                "sessions.pruneIntervalMs must be at most one year".into(),
            ));
        }
        if self.limits.max_concurrent == 0 {
            return Err(SettingsError::InvalidValue(
                "limits.maxConcurrent must be at least 1".into(),
            ));
        }
        if self.agent.max_turns == 0 {
            return Err(SettingsError::InvalidValue(
                "agent.maxTurns must be at least 1".into(),
            ));
        }
        if self.agent.timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "agent.timeoutMs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
