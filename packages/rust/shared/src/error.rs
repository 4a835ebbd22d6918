//! Error types for lodebot.
//!
//! Library crates use [`LodebotError`] via `thiserror`.
//! The `lodebot` binary wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all lodebot operations.
#[derive(Debug, thiserror::Error)]
pub enum LodebotError {
    /// Malformed command arguments (empty name, bad id, wrong arity).
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// World name not in the known world catalog.
    #[error("unknown world '{world}'")]
    InvalidWorld { world: String },

    /// Search returned no candidates, or upstream has no record for an id.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// Transport failure, non-success HTTP status, or undecodable upstream body.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A class id reported upstream is missing from the class table.
    #[error("class id {class_id} ({name}) has no role mapping; the class table is stale")]
    DataIntegrity { class_id: u32, name: String },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Local parse error (schedule spec, command text).
    #[error("parse error: {message}")]
    Parse { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LodebotError>;

/// The closed failure taxonomy surfaced to whoever renders a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    InvalidArgument,
    NotFound,
    UpstreamUnavailable,
    DataIntegrityFault,
    Internal,
}

impl FailureKind {
    /// Text shown to the chat user for this kind of failure.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::InvalidArgument => "Invalid arguments. Usage: lookup <world> <forename> <surname> or lookupId <id>",
            Self::NotFound => "User not found",
            Self::UpstreamUnavailable => "The Lodestone lookup failed, please try again later",
            Self::DataIntegrityFault => {
                "This character has a class the bot does not know yet; an operator has been notified"
            }
            Self::Internal => "Something went wrong",
        }
    }

    /// Whether re-issuing the same command can succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::UpstreamUnavailable)
    }
}

impl LodebotError {
    /// Create an invalid-argument error from any displayable message.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: msg.into(),
        }
    }

    /// Create a not-found error from any displayable message.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound {
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Collapse this error into the user-facing failure taxonomy.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidArgument { .. } | Self::InvalidWorld { .. } => {
                FailureKind::InvalidArgument
            }
            Self::NotFound { .. } => FailureKind::NotFound,
            Self::UpstreamUnavailable(_) => FailureKind::UpstreamUnavailable,
            Self::DataIntegrity { .. } => FailureKind::DataIntegrityFault,
            Self::Config { .. } | Self::Io { .. } | Self::Parse { .. } => FailureKind::Internal,
        }
    }
}
