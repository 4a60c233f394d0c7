//! Error types shared by the batch, upload and paging engines

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised while planning or driving multi-request protocols
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// A required parameter was missing or empty
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A batch plan is already holding its maximum number of steps
    #[error("batch plan is full (capacity {capacity})")]
    CapacityExceeded { capacity: usize },

    /// A step declared a dependency on an id the plan does not contain
    #[error("step '{step_id}' depends on '{dependency_id}', which is not part of the batch")]
    InvalidDependency {
        step_id: String,
        dependency_id: String,
    },

    /// The server advertised the same next link it was just fetched from
    #[error("detected nextLink loop, next link value: {link}")]
    NextLinkLoop { link: String },

    /// An upload slice response was neither a session nor a decodable item
    #[error("upload completed ambiguously (status {status}): {body}")]
    AmbiguousUploadCompletion { status: u16, body: String },

    /// The remote service answered with a non-success status
    #[error("remote request failed with status {status}: {body}")]
    RemoteFailure { status: u16, body: String },

    /// The operation is not allowed in the object's current state
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// The upload session can no longer accept bytes
    #[error("upload session {upload_url} expired{}", .expired_at.as_ref().map(|at| format!(" at {at}")).unwrap_or_default())]
    UploadSessionExpired {
        upload_url: String,
        expired_at: Option<DateTime<Utc>>,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Whatever the request adapter raised
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, OrchestrationError>;

impl OrchestrationError {
    /// Shorthand for [`OrchestrationError::InvalidArgument`]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Whether resubmitting the same request could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::RemoteFailure { .. })
    }

    /// Whether the server broke the protocol contract
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::NextLinkLoop { .. } | Self::AmbiguousUploadCompletion { .. }
        )
    }

    /// HTTP status attached to the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteFailure { status, .. } => Some(*status),
            Self::AmbiguousUploadCompletion { status, .. } => Some(*status),
            _ => None,
        }
    }
}
