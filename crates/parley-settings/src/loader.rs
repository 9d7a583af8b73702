//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`BridgeSettings::default()`]
//! 2. If a settings file is given and exists, deep-merge its values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::BridgeSettings;

/// Load settings from an optional file, then apply process env overrides.
pub fn load_settings(path: Option<&Path>) -> Result<BridgeSettings> {
    let mut settings = match path {
        Some(path) => load_settings_from_path(path)?,
        None => BridgeSettings::default(),
    };
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Load settings from a specific file without env overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<BridgeSettings> {
    let defaults = serde_json::to_value(BridgeSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply overrides from the process environment.
pub fn apply_env_overrides(settings: &mut BridgeSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable lookup.
///
/// Empty values are treated as unset. Numeric values must parse and fall
/// within range; invalid values are ignored with a warning so the file or
/// default value stays in effect.
pub fn apply_overrides_from(settings: &mut BridgeSettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = EnvReader { lookup };

    // ── Auth / server ───────────────────────────────────────────────
    if let Some(v) = env.string("API_KEY") {
        settings.auth.api_key = Some(v);
    }
    if let Some(v) = env.string("HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u64_in("PORT", 1, u64::from(u16::MAX)) {
        settings.server.port = u16::try_from(v).unwrap_or(settings.server.port);
    }
    if let Some(v) = env.u64_in("MAX_BODY_BYTES", 1024, 16 * 1024 * 1024) {
        settings.server.max_body_bytes = usize::try_from(v).unwrap_or(settings.server.max_body_bytes);
    }
    if let Some(v) = env.u64_in("MAX_CONCURRENT", 1, 1_000) {
        settings.limits.max_concurrent = usize::try_from(v).unwrap_or(settings.limits.max_concurrent);
    }

    // ── Agent CLI ───────────────────────────────────────────────────
    if let Some(v) = env.string("CLAUDE_BINARY") {
        settings.agent.binary = v;
    }
    if let Some(v) = env.string("CLAUDE_WORKING_DIR") {
        settings.agent.working_dir = Some(v);
    }
    if let Some(v) = env.string("CLAUDE_ALLOWED_TOOLS") {
        settings.agent.allowed_tools = v;
    }
    if let Some(v) = env.u64_in("CLAUDE_MAX_TURNS", 1, 1_000) {
        settings.agent.max_turns = u32::try_from(v).unwrap_or(settings.agent.max_turns);
    }
    if let Some(v) = env.u64_in("CLAUDE_TIMEOUT_MS", 1_000, 3_600_000) {
        settings.agent.timeout_ms = v;
    }
    if let Some(v) = env.string("CLAUDE_SYSTEM_PROMPT") {
        settings.agent.system_prompt = v;
    }

    // ── Sessions ────────────────────────────────────────────────────
    if let Some(v) = env.string("SESSION_STORE_PATH") {
        settings.sessions.path = v;
    }
    if let Some(v) = env.u64_in("SESSION_TTL_HOURS", 1, 24 * 365) {
        settings.sessions.ttl_hours = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.bool("LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = self.string(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u64_in(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = self.string(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, min, max, "invalid integer env var, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
