use std::path::PathBuf;
use std::time::Duration;

use kubedeck_types::ResourceKind;
use thiserror::Error;

/// Errors raised by the repository pool
#[derive(Clone, Debug, Error)]
pub enum PoolError {
    #[error("invalid kubeconfig {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("max contexts must be between 1 and {max}, got {value}")]
    Validation { value: usize, max: usize },

    #[error("failed to connect to context '{context}': {reason}")]
    Connection { context: String, reason: String },

    #[error("informers for context '{context}' did not sync within {}s", timeout.as_secs())]
    SyncTimeout { context: String, timeout: Duration },

    #[error("context '{0}' is not loaded")]
    NotLoaded(String),

    #[error("context '{0}' is already loading")]
    LoadInProgress(String),

    #[error("context '{0}' was never loaded")]
    NeverAttempted(String),

    #[error("repository pool is closed")]
    Closed,
}

impl PoolError {
    /// Context-level failures put the context in the Failed state
    pub fn is_context_failure(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::SyncTimeout { .. })
    }
}

/// Errors raised while establishing a client for a context
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("context '{0}' not found in kubeconfig")]
    UnknownContext(String),

    #[error("invalid client configuration: {0}")]
    Config(String),

    #[error("API server unreachable: {0}")]
    Unreachable(String),
}

/// An error returned by the API server for a live request
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{reason} ({code}): {message}")]
pub struct RemoteError {
    /// Status reason, e.g. `Forbidden`, `Conflict`, `NotFound`
    pub reason: String,
    /// HTTP status code, 0 when the request never got a response
    pub code: u16,
    pub message: String,
}

impl RemoteError {
    pub fn new(reason: impl Into<String>, code: u16, message: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            code,
            message: message.into(),
        }
    }

    pub fn is_forbidden(&self) -> bool {
        self.code == 403
    }

    pub fn is_not_found(&self) -> bool {
        self.code == 404
    }

    pub fn is_conflict(&self) -> bool {
        self.code == 409
    }
}

impl From<kube::Error> for RemoteError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(resp) => Self::new(resp.reason, resp.code, resp.message),
            other => Self::new("Transport", 0, other.to_string()),
        }
    }
}

/// Errors raised by repository reads and live operations
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{0} are still syncing")]
    NotReady(ResourceKind),

    #[error("{kind} unavailable: {reason}")]
    Unavailable { kind: ResourceKind, reason: String },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: ResourceKind, name: String },

    #[error("{0}")]
    Unsupported(String),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("repository for context '{0}' has been stopped")]
    Stopped(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}
