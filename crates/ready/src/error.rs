use thiserror::Error;
use vigil_core::CoreError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadyError {
    /// Same text the Gardener API returns for a project that never turns ready.
    #[error("Resource \"{key}\" could not be initialized within {timeout_ms} ms")]
    Timeout { key: String, timeout_ms: u64 },
    #[error("resource \"{key}\" failed: {detail}")]
    Failed { key: String, detail: String },
    #[error("resource \"{key}\" was deleted before it became ready")]
    Deleted { key: String },
    #[error("wait for \"{key}\" was cancelled")]
    Cancelled { key: String },
    #[error("a wait for \"{key}\" is already pending")]
    AlreadyWaiting { key: String },
    #[error("watch stream for \"{key}\" closed")]
    StreamClosed { key: String },
    #[error(transparent)]
    Malformed(#[from] CoreError),
}

impl ReadyError {
    /// Metric label for this outcome.
    pub fn outcome(&self) -> &'static str {
        match self {
            ReadyError::Timeout { .. } => "timeout",
            ReadyError::Failed { .. } => "failed",
            ReadyError::Deleted { .. } => "deleted",
            ReadyError::Cancelled { .. } => "cancelled",
            ReadyError::AlreadyWaiting { .. } => "duplicate",
            ReadyError::StreamClosed { .. } => "closed",
            ReadyError::Malformed(_) => "malformed",
        }
    }

    /// Timeouts are user-displayable and map to a gateway timeout upstream.
    pub fn is_timeout(&self) -> bool { matches!(self, ReadyError::Timeout { .. }) }
}
