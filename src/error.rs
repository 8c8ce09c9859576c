/// Failures reported by the command backend.
///
/// Every variant is recoverable: callers log it and return to a stable
/// view (an inline error in the terminal, or a recheckable setup step).
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("no active session")]
    NoActiveSession,
    #[error("failed to spawn session: {0}")]
    Spawn(String),
    #[error("pty error: {0}")]
    Pty(String),
    #[error("dependency check failed: {0}")]
    Probe(String),
    #[error("install failed: {0}")]
    Install(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type BackendResult<T> = Result<T, BackendError>;
