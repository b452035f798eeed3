use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Session-state errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// Session creation refused because the per-IP concurrency cap is reached.
    #[error("Rate limit exceeded: maximum {limit} concurrent sessions per IP")]
    RateLimitExceeded { limit: usize },

    /// Status query for a session id that does not exist or was swept.
    #[error("Session not found: {session_id}")]
    NotFound { session_id: String },
}

/// Upstream stream errors
#[derive(Debug, Error)]
pub enum StreamError {
    /// A single malformed chunk; the pipeline skips it and keeps consuming.
    #[error("Malformed stream chunk: {message}")]
    Chunk { message: String },

    /// The upstream stream itself failed; fatal for the session.
    #[error("Upstream stream failed: {message}")]
    Upstream { message: String },
}

impl StreamError {
    /// The `error_type` label carried on published `error` events.
    pub fn error_type(&self) -> &'static str {
        match self {
            StreamError::Chunk { .. } => "stream_chunk",
            StreamError::Upstream { .. } => "api_error",
        }
    }

    /// The upstream-provided message, without the layer prefix.
    pub fn message(&self) -> &str {
        match self {
            StreamError::Chunk { message } | StreamError::Upstream { message } => message,
        }
    }
}

/// Per-segment build errors; always recovered by skipping the segment
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("Segment too short to form a thought ({len} chars)")]
    TooShort { len: usize },
}

/// Subscriber delivery errors
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Subscriber connection closed")]
    Closed,

    #[error("Delivery failed: {message}")]
    Delivery { message: String },
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Result type alias for subscriber delivery
pub type SinkResult<T> = Result<T, SinkError>;
