use std::path::PathBuf;

/// Every recoverable failure the engine reports to its caller.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("username cannot be empty")]
    InvalidName,
    #[error("user '{0}' already exists")]
    DuplicateUser(String),
    #[error("user '{0}' not found")]
    UserNotFound(String),
    #[error("could not persist user data to {path}: {reason}")]
    Persistence { path: PathBuf, reason: String },
    #[error("no passages available")]
    EmptyCatalog,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn persistence<P: Into<PathBuf>, E: std::fmt::Display>(path: P, err: E) -> Self {
        EngineError::Persistence {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
