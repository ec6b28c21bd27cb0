#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
    #[error("Invalid URL: {0}")]
    Url(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failure reported by a [`TabStorage`](crate::store::TabStorage) backend.
///
/// Never surfaces past [`TabSession`](crate::store::TabSession): every storage
/// failure degrades to an empty descriptor.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Storage is disabled or not reachable in this context.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// The backend refused the write (quota, permissions).
    #[error("storage write rejected: {0}")]
    WriteRejected(String),
}
