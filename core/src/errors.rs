use thiserror::Error;

/// Marker the API embeds in quota-exhaustion error bodies.
pub(crate) const RESOURCE_EXHAUSTED_MARKER: &str = "RESOURCE_EXHAUSTED";

/// Assistant errors
#[derive(Error, Debug)]
pub enum AssistantError {
    /// The endpoint refused service due to quota exhaustion (HTTP 429 or a
    /// RESOURCE_EXHAUSTED marker in the error body). Classified once, at the
    /// transport boundary; callers match on the variant, never on strings.
    #[error("Rate limited: {message}")]
    RateLimited { message: String },

    #[error("HTTP Error: {status_code} - {message}")]
    Http { status_code: u16, message: String },

    #[error("Transport Error: {0}")]
    Transport(String),

    #[error("Malformed Response: {0}")]
    MalformedResponse(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Storage Error: {0}")]
    Storage(String),

    #[error("Audio Error: {0}")]
    Audio(String),

    #[error("Form Relay Error: {0}")]
    Form(String),

    #[error("Session Error: {0}")]
    Session(String),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AssistantError {
    /// True when this error should trigger the bounded-backoff retry path
    /// and the "high volume" user-facing message.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AssistantError::RateLimited { .. })
    }

    /// Classify a non-success HTTP exchange. 429 and quota-marker bodies
    /// become `RateLimited`; everything else stays a plain HTTP error.
    pub fn from_http_status(status_code: u16, body: String) -> Self {
        if status_code == 429 || body.contains(RESOURCE_EXHAUSTED_MARKER) {
            AssistantError::RateLimited { message: body }
        } else {
            AssistantError::Http {
                status_code,
                message: body,
            }
        }
    }
}

impl From<reqwest::Error> for AssistantError {
    fn from(err: reqwest::Error) -> Self {
        AssistantError::Transport(err.to_string())
    }
}

/// Result type for assistant operations
pub type AssistantResult<T> = Result<T, AssistantError>;
