use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoverError {
    /// The OS refused access to the connection table. Recoverable: the
    /// caller is expected to switch to the subprocess fallback.
    #[error("connection table access denied: {0}")]
    PermissionDenied(String),

    /// Any other enumeration failure, from either backend.
    #[error("socket enumeration failed: {0}")]
    Enumeration(String),

    /// The probing HTTP clients could not be constructed.
    #[error("probe client construction failed: {0}")]
    HttpClient(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, DiscoverError>;
