//! Error taxonomy for the Dynia control plane

use thiserror::Error;

/// A provider (compute/DNS/origin-CA) call failed.
///
/// `retryable` mirrors the provider's own judgment (e.g. a 5xx or a
/// connection reset is retryable, a 404 or 401 is not) and is preserved
/// when the error is folded into [`DyniaError::Provider`].
#[derive(Error, Debug, Clone)]
#[error("provider error: {message}")]
pub struct ProviderError {
    pub message: String,
    pub retryable: bool,
}

impl ProviderError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum DyniaError {
    /// Input failed schema or naming rules. Never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// Invariant violation attempted (e.g. two active nodes). Never retried.
    #[error("state invariant violated: {0}")]
    State(String),

    /// Compute/DNS/origin-CA call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Executor/SSH was not reachable.
    #[error("transport error: {0}")]
    Transport(String),

    /// An artifact failed to reach its declared state.
    #[error("convergence error rendering {artifact}: {message}")]
    Convergence { artifact: String, message: String },

    /// A readiness check exhausted its retries.
    #[error("health check failed: {0}")]
    Health(String),

    /// A write attempted to persist a forbidden (secret-shaped) field.
    #[error("refusing to persist state containing a secret-shaped field: {0}")]
    SecretLeak(String),

    /// Filesystem error while loading/saving state.
    #[error("state I/O failure: {0}")]
    Io(String),

    /// The state document failed schema validation.
    #[error("state schema error: {0}")]
    Schema(String),

    /// A named resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl DyniaError {
    /// Whether the operation that produced this error is safe to retry per
    /// the backoff discipline in spec §5/§7.
    pub fn is_retryable(&self) -> bool {
        match self {
            DyniaError::Provider(p) => p.retryable,
            DyniaError::Transport(_) => true,
            DyniaError::Validation(_)
            | DyniaError::State(_)
            | DyniaError::Convergence { .. }
            | DyniaError::Health(_)
            | DyniaError::SecretLeak(_)
            | DyniaError::Io(_)
            | DyniaError::Schema(_)
            | DyniaError::NotFound(_) => false,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        DyniaError::Validation(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        DyniaError::State(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        DyniaError::NotFound(msg.into())
    }
}

impl From<std::io::Error> for DyniaError {
    fn from(err: std::io::Error) -> Self {
        DyniaError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DyniaError {
    fn from(err: serde_json::Error) -> Self {
        DyniaError::Schema(err.to_string())
    }
}

impl From<reqwest::Error> for DyniaError {
    fn from(err: reqwest::Error) -> Self {
        let retryable =
            err.is_timeout() || err.is_connect() || err.status().is_some_and(|s| s.is_server_error());
        DyniaError::Provider(ProviderError {
            message: err.to_string(),
            retryable,
        })
    }
}

pub type Result<T> = std::result::Result<T, DyniaError>;
