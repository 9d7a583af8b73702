//! Branded identifier types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Thread used when a request does not name one.
pub const DEFAULT_THREAD: &str = "default";

/// Caller-supplied key grouping a sequence of prompts into one conversation.
///
/// The value is opaque: any non-empty string the caller sends is accepted
/// verbatim and used as the cache and queue key.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    /// Wrap a raw thread identifier.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Resolve an optional identifier from a request, falling back to
    /// [`DEFAULT_THREAD`] when it is missing.
    pub fn or_default(raw: Option<String>) -> Self {
        raw.map_or_else(Self::default, Self)
    }

    /// Borrow the raw string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the raw string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self(DEFAULT_THREAD.to_owned())
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ThreadId {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_owned()))
    }
}

impl AsRef<str> for ThreadId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}
