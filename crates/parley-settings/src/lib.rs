//! # parley-settings
//!
//! Configuration management with layered sources.
//!
//! Settings are resolved from four layers (lowest to highest priority):
//! 1. **Compiled defaults**: [`BridgeSettings::default()`]
//! 2. **Settings file**: an optional JSON file, deep-merged over defaults
//! 3. **Environment variables**: `API_KEY`, `PORT`, `CLAUDE_*`, ...
//! 4. **Command-line flags**: applied by the binary after loading
//!
//! Unlike a global singleton, the loaded [`BridgeSettings`] value is passed
//! explicitly to every component that needs it.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{apply_env_overrides, apply_overrides_from, deep_merge, load_settings, load_settings_from_path};
pub use types::*;
