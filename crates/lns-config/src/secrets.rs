//! Runtime secret resolution.
//!
//! Config YAML stores only the env var NAME (`source.token_env`). The value is
//! resolved once at startup and handed to the source client constructor.
//! `Debug` redacts the value; errors mention the NAME only.

use anyhow::{bail, Result};
use serde_json::Value;

/// Bearer token for the legacy source.
#[derive(Clone)]
pub struct SourceToken(String);

impl SourceToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SourceToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SourceToken(<REDACTED>)")
    }
}

/// Resolve the source token.
///
/// - `source.token_env` absent: `Ok(None)` (the source is unauthenticated).
/// - `source.token_env` names an unset or blank variable: error naming it.
pub fn resolve_source_token(config_json: &Value) -> Result<Option<SourceToken>> {
    let Some(var_name) = config_json
        .pointer("/source/token_env")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
    else {
        return Ok(None);
    };

    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Ok(Some(SourceToken(v))),
        _ => bail!(
            "SECRETS_MISSING: required env var '{}' (source token) is not set or empty",
            var_name
        ),
    }
}
