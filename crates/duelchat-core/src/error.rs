use thiserror::Error;

/// A convenience `Result` alias using [`DuelchatError`].
pub type DuelchatResult<T> = Result<T, DuelchatError>;

/// Top-level error type for the duelchat service.
#[derive(Error, Debug)]
pub enum DuelchatError {
    /// A session was created with an id that is already registered.
    #[error("session '{0}' already exists")]
    DuplicateSessionId(String),

    /// A session id could not be resolved (absent, evicted, or ended).
    #[error("session '{0}' not found")]
    SessionNotFound(String),

    /// A persona role is not present in the catalog.
    #[error("unknown persona: {0}")]
    UnknownPersona(String),

    /// The generation backend failed to produce a reply.
    ///
    /// Never surfaced to callers: the conversation engine absorbs it into a
    /// degraded-but-successful fallback reply.
    #[error("generation backend error: {0}")]
    Backend(String),

    /// A caller-supplied deadline elapsed before the backend returned.
    #[error("deadline exceeded while waiting for the generation backend")]
    DeadlineExceeded,

    /// An error from an outbound HTTP request.
    #[error("HTTP error: {0}")]
    Http(String),

    /// An error in configuration parsing or validation.
    #[error("config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}
