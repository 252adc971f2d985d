use std::fmt;

/// Failure talking to the legacy service. Every variant is treated as
/// transient by the retry layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Connect, timeout, or body-read failure.
    Transport(String),
    /// Non-2xx response. `code` is the HTTP status when known.
    Api { code: Option<u16>, message: String },
    /// Response body was not the expected JSON shape.
    Decode(String),
    /// Client could not be constructed from its settings.
    Config(String),
}

impl SourceError {
    /// Stable label used as an `errors_by_kind` key.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::Transport(_) => "transport",
            SourceError::Api { .. } => "api",
            SourceError::Decode(_) => "decode",
            SourceError::Config(_) => "config",
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Transport(msg) => write!(f, "transport error: {msg}"),
            SourceError::Api {
                code: Some(c),
                message,
            } => write!(f, "source api error status={c}: {message}"),
            SourceError::Api {
                code: None,
                message,
            } => write!(f, "source api error: {message}"),
            SourceError::Decode(msg) => write!(f, "decode error: {msg}"),
            SourceError::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {}
