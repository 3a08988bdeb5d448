/// Programming-level failures: events that cannot be applied without
/// corrupting a cache. These are surfaced to callers, never swallowed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("object has no identifying key at {path}")]
    MissingKey { path: String },
    #[error("malformed watch event: {0}")]
    MalformedEvent(String),
}
