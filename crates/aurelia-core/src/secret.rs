use std::fmt;

use serde::Deserialize;

/// Wrapper for sensitive strings with redacted Debug/Display.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Read a secret from the process environment. Empty values count as absent.
#[must_use]
pub fn from_env(key: &str) -> Option<Secret> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(Secret::new)
}
